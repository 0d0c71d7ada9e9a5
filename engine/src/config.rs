//! Scene Configuration
//!
//! Sizes, counts and toggles for the hills scene. Every field has a default,
//! so a config file only needs the values it changes.
//!
//! The binary reads the JSON file named by `HILLS_CONFIG` when set.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::render::PixelLayout;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV_VAR: &str = "HILLS_CONFIG";

// ============================================================================
// TYPES
// ============================================================================

/// Terrain plane and height-field layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Plane width in world units (one height sample per unit).
    pub width: u32,
    /// Plane depth in world units.
    pub height: u32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub pixel_layout: PixelLayout,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            width_segments: 256,
            height_segments: 256,
            pixel_layout: PixelLayout::default(),
        }
    }
}

/// Tree placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoliageConfig {
    pub tree_count: usize,
    /// Trees with ground below this height hide while water is shown.
    /// The water plane sits at the same height.
    pub sea_level: f32,
    pub seed: u32,
    /// Keep candidates this far inside the plane edge.
    pub margin: f32,
    pub tree_radius: f32,
    pub tree_height: f32,
}

impl Default for FoliageConfig {
    fn default() -> Self {
        Self {
            tree_count: 150,
            sea_level: 20.0,
            seed: 1337,
            margin: 16.0,
            tree_radius: 6.0,
            tree_height: 28.0,
        }
    }
}

/// Placement of the decorative scene components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneLayoutConfig {
    pub sun_size: f32,
    pub sun_segments: u32,
    /// Radians per frame while the sun is moving.
    pub sun_orbit_speed: f32,
    pub water_size: f32,
    pub ground_size: f32,
    pub ground_depth: f32,
    pub mesh_star_count: usize,
    pub mesh_star_radius: f32,
    pub particle_star_count: usize,
    pub particle_star_radius: f32,
    pub cloud_count: usize,
    pub cloud_size_min: f32,
    pub cloud_size_max: f32,
    pub cloud_altitude: f32,
    /// Seed for star and cloud scatter.
    pub seed: u32,
}

impl Default for SceneLayoutConfig {
    fn default() -> Self {
        Self {
            sun_size: 512.0,
            sun_segments: 32,
            sun_orbit_speed: 0.002,
            water_size: 3000.0,
            ground_size: 1100.0,
            ground_depth: 400.0,
            mesh_star_count: 18,
            mesh_star_radius: 8000.0,
            particle_star_count: 500,
            particle_star_radius: 6000.0,
            cloud_count: 12,
            cloud_size_min: 60.0,
            cloud_size_max: 160.0,
            cloud_altitude: 900.0,
            seed: 2024,
        }
    }
}

/// Window settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            vsync: true,
            title: "Procedural Hills".to_string(),
        }
    }
}

/// Everything the scene needs at startup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub terrain: TerrainConfig,
    pub foliage: FoliageConfig,
    pub layout: SceneLayoutConfig,
    pub render: RenderConfig,
}

// ============================================================================
// LOADING
// ============================================================================

impl SceneConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("[SceneConfig] loaded {}", path.display());
        Ok(config)
    }

    /// Load the file named by [`CONFIG_ENV_VAR`], or defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                log::info!("[SceneConfig] {CONFIG_ENV_VAR} not set, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let TerrainConfig { width, height, .. } = self.terrain;
        if width == 0 || height == 0 {
            return Err(ConfigError::PlaneSize { width, height });
        }
        self.terrain.pixel_layout.validate()
    }
}
