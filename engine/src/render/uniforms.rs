//! Uniform Structs for GPU Shaders
//!
//! GPU-compatible snapshots of the [`UniformStore`] and per-drawable state.
//! Both must match the WGSL structs in `shaders/common.wgsl` exactly.

use glam::{Mat4, Vec3};

use crate::uniforms::{UniformStore, names};

/// Per-frame scene uniforms (bind group 0, binding 0).
///
/// WGSL layout (144 bytes):
///   offset   0: view_proj (mat4x4<f32>)       = 64 bytes
///   offset  64: camera_pos (vec3<f32>)        = 12 bytes
///   offset  76: time (f32)                    = 4 bytes
///   offset  80: sun_light_color (vec3<f32>)   = 12 bytes
///   offset  92: bump_height (f32)             = 4 bytes
///   offset  96: sun_light_pos (vec3<f32>)     = 12 bytes
///   offset 108: height (f32)                  = 4 bytes
///   offset 112: resolution (vec2<f32>)        = 8 bytes
///   offset 120: hill_factor (f32)             = 4 bytes
///   offset 124: spikyness (f32)               = 4 bytes
///   offset 128: has_height_map (u32)          = 4 bytes
///   offset 132: _pad0 (u32)                   = 4 bytes
///   offset 136: target_size (vec2<f32>)       = 8 bytes
///   Total: 144 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub time: f32,
    pub sun_light_color: [f32; 3],
    pub bump_height: f32,
    pub sun_light_pos: [f32; 3],
    pub height: f32,
    pub resolution: [f32; 2],
    pub hill_factor: f32,
    pub spikyness: f32,
    /// 1 when `u_heightMap` points at a rendered height field
    pub has_height_map: u32,
    pub _pad0: u32,
    /// Size of the offscreen target being drawn; zero for on-screen passes
    pub target_size: [f32; 2],
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self::from_store(&UniformStore::with_defaults(), Mat4::IDENTITY, Vec3::ZERO)
    }
}

impl SceneUniforms {
    /// Snapshot `store` together with the camera for upload.
    pub fn from_store(store: &UniformStore, view_proj: Mat4, camera_pos: Vec3) -> Self {
        let float = |name: &str| store.float(name).unwrap_or(0.0);
        let vec3 = |name: &str| store.vec3(name).unwrap_or(Vec3::ZERO).to_array();

        Self {
            view_proj: view_proj.to_cols_array_2d(),
            camera_pos: camera_pos.to_array(),
            time: float(names::TIME),
            sun_light_color: vec3(names::SUN_LIGHT_COLOR),
            bump_height: float(names::BUMP_HEIGHT),
            sun_light_pos: vec3(names::SUN_LIGHT_POS),
            height: float(names::HEIGHT),
            resolution: store
                .vec2(names::RESOLUTION)
                .unwrap_or_default()
                .to_array(),
            hill_factor: float(names::HILL_FACTOR),
            spikyness: float(names::SPIKYNESS),
            has_height_map: store.texture(names::HEIGHT_MAP).is_some() as u32,
            _pad0: 0,
            target_size: [0.0, 0.0],
        }
    }

    /// Same snapshot, marked as drawing into a `width` x `height` target.
    pub fn for_target(mut self, width: u32, height: u32) -> Self {
        self.target_size = [width as f32, height as f32];
        self
    }
}

/// Per-drawable uniforms (bind group 1, binding 0).
///
/// WGSL layout (80 bytes):
///   offset  0: model (mat4x4<f32>) = 64 bytes
///   offset 64: color (vec4<f32>)   = 16 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawableUniforms {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl Default for DrawableUniforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

// Compile-time assertion to verify struct sizes match WGSL layout
const _: () = {
    assert!(
        std::mem::size_of::<SceneUniforms>() == 144,
        "SceneUniforms must be 144 bytes to match WGSL"
    );
    assert!(
        std::mem::size_of::<DrawableUniforms>() == 80,
        "DrawableUniforms must be 80 bytes to match WGSL"
    );
};
