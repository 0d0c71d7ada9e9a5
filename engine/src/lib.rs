//! Hills Engine Library
//!
//! A procedural hills scene built around a GPU height field. A displacement
//! program renders the terrain heights offscreen; the same pixels drive the
//! visible terrain mesh and a CPU height field used to keep the camera and
//! the trees on the ground.
//!
//! # Modules
//!
//! - [`uniforms`] - Shared shading parameters and hill-value change tracking
//! - [`render`] - GPU context seam (wgpu and software), offscreen height renderer, shaders
//! - [`terrain`] - Displacement function, height field and the terrain surface
//! - [`foliage`] - Tree placement on the terrain
//! - [`camera`] - Orbit and terrain-following player camera
//! - [`scene`] - Component registry, frame tick, UI bridge and scene objects
//! - [`config`] - Scene configuration with JSON loading
//!
//! # Example
//!
//! ```ignore
//! use hills_engine::config::SceneConfig;
//! use hills_engine::render::CpuContext;
//! use hills_engine::scene::{build_scene, HillParameter, SceneEvent};
//!
//! let mut gpu = CpuContext::new();
//! let (mut app, mut bridge) = build_scene(&mut gpu, &SceneConfig::default())?;
//!
//! // First tick renders the initial height field
//! app.tick(&mut gpu);
//! let ground = app.terrain().map(|t| t.query_height(0.0, 0.0));
//!
//! // A slider moved: the terrain regenerates on the next tick
//! bridge.apply(&mut app, &mut gpu, SceneEvent::HillValueChanged(HillParameter::Height, 8.0));
//! app.tick(&mut gpu);
//! ```

pub mod camera;
pub mod config;
pub mod error;
pub mod foliage;
pub mod render;
pub mod scene;
pub mod terrain;
pub mod uniforms;

// Re-export the types most callers touch
pub use config::SceneConfig;
pub use error::{
    ConfigError, GpuInitError, OutOfRangeQueryError, RenderTargetError, UniformError,
    UnknownListenerError,
};
pub use render::{CpuContext, GpuContext, OffscreenHeightRenderer, WgpuContext};
pub use scene::{AppScene, SceneEvent, StateBridge, build_scene};
pub use terrain::{HeightField, NO_HEIGHT, TerrainSurface};
pub use uniforms::{ChangeBroadcaster, UniformStore};
