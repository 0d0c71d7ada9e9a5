//! Uniform Store
//!
//! Named animation and shading parameters shared by every render pass.
//! The store is owned by the scene and handed to consumers by reference;
//! all writes happen on the frame thread.
//!
//! Writing a shape parameter does NOT mark the terrain dirty on its own.
//! The code path that writes one is expected to call
//! [`ChangeBroadcaster::broadcast_change`](super::ChangeBroadcaster::broadcast_change)
//! itself.

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use crate::error::UniformError;
use crate::render::TextureHandle;

/// Uniform names as the shaders see them.
pub mod names {
    pub const TIME: &str = "u_time";
    pub const RESOLUTION: &str = "u_resolution";
    pub const SUN_LIGHT_COLOR: &str = "u_sunLightColor";
    pub const SUN_LIGHT_POS: &str = "u_sunLightPos";
    pub const SUN_TEXTURE: &str = "u_sunTexture";
    pub const HEIGHT_MAP: &str = "u_heightMap";

    // Hill (terrain shape) values
    pub const BUMP_HEIGHT: &str = "u_bumpHeight";
    pub const HEIGHT: &str = "u_height";
    pub const HILL_FACTOR: &str = "u_hillFactor";
    pub const SPIKYNESS: &str = "u_spikyness";

    /// Every uniform whose change requires regenerating the height field.
    pub const SHAPE_PARAMETERS: [&str; 4] = [BUMP_HEIGHT, HEIGHT, HILL_FACTOR, SPIKYNESS];
}

/// Default sun position in world space (z-up).
pub const DEFAULT_SUN_POSITION: Vec3 = Vec3::new(450.0, 5000.0, 400.0);

/// Type tag of a uniform. Fixed for the lifetime of a name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Texture,
}

impl UniformKind {
    /// Short tag used in logs (`f`, `v2`, `v3`, `t`).
    pub fn tag(&self) -> &'static str {
        match self {
            UniformKind::Float => "f",
            UniformKind::Vec2 => "v2",
            UniformKind::Vec3 => "v3",
            UniformKind::Texture => "t",
        }
    }
}

/// Current value of a uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    /// Texture reference; `None` until a producer publishes one.
    Texture(Option<TextureHandle>),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Texture(_) => UniformKind::Texture,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            UniformValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            UniformValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            UniformValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<TextureHandle> {
        match self {
            UniformValue::Texture(t) => *t,
            _ => None,
        }
    }
}

/// Registry of named uniforms.
#[derive(Clone, Debug, Default)]
pub struct UniformStore {
    values: HashMap<String, UniformValue>,
}

impl UniformStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Create a store holding the scene's standard uniform set.
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        let defaults = [
            (names::TIME, UniformValue::Float(1.0)),
            (names::RESOLUTION, UniformValue::Vec2(Vec2::ZERO)),
            (names::SUN_LIGHT_COLOR, UniformValue::Vec3(Vec3::new(1.0, 0.7, 0.6))),
            (names::SUN_LIGHT_POS, UniformValue::Vec3(DEFAULT_SUN_POSITION)),
            (names::SUN_TEXTURE, UniformValue::Texture(None)),
            (names::HEIGHT_MAP, UniformValue::Texture(None)),
            (names::BUMP_HEIGHT, UniformValue::Float(50.0)),
            (names::HEIGHT, UniformValue::Float(5.0)),
            (names::HILL_FACTOR, UniformValue::Float(0.0005)),
            (names::SPIKYNESS, UniformValue::Float(0.0001)),
        ];
        for (name, value) in defaults {
            store.values.insert(name.to_string(), value);
        }
        store
    }

    /// Introduce a uniform, or overwrite one already declared with the same tag.
    pub fn declare(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
        if let Some(existing) = self.values.get(name) {
            Self::check_kind(name, existing.kind(), value.kind())?;
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Current value of `name`, if declared.
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values.get(name).copied()
    }

    /// Overwrite a declared uniform in place.
    ///
    /// The new value must carry the tag the name was declared with; on
    /// mismatch the stored value is left untouched.
    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| UniformError::Unknown(name.to_string()))?;
        Self::check_kind(name, slot.kind(), value.kind())?;
        *slot = value;
        Ok(())
    }

    /// Confirm that `name` is declared with tag `kind`.
    pub fn ensure_type_tag(&self, name: &str, kind: UniformKind) -> Result<(), UniformError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| UniformError::Unknown(name.to_string()))?;
        Self::check_kind(name, value.kind(), kind)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(|v| v.as_float())
    }

    pub fn vec2(&self, name: &str) -> Option<Vec2> {
        self.get(name).and_then(|v| v.as_vec2())
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        self.get(name).and_then(|v| v.as_vec3())
    }

    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        self.get(name).and_then(|v| v.as_texture())
    }

    /// Advance `u_time` by `delta`. Declares it if missing.
    pub fn advance_time(&mut self, delta: f32) {
        let time = self.float(names::TIME).unwrap_or(0.0) + delta;
        self.values
            .insert(names::TIME.to_string(), UniformValue::Float(time));
    }

    /// Record the drawable surface size in `u_resolution`.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.values.insert(
            names::RESOLUTION.to_string(),
            UniformValue::Vec2(Vec2::new(width as f32, height as f32)),
        );
    }

    /// Whether `name` is one of the hill values that shape the terrain.
    pub fn is_shape_parameter(name: &str) -> bool {
        names::SHAPE_PARAMETERS.contains(&name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check_kind(
        name: &str,
        expected: UniformKind,
        found: UniformKind,
    ) -> Result<(), UniformError> {
        if expected == found {
            Ok(())
        } else {
            Err(UniformError::TypeMismatch {
                name: name.to_string(),
                expected,
                found,
            })
        }
    }
}
