//! Render Module
//!
//! GPU plumbing for the hills scene: the [`GpuContext`] seam with its wgpu
//! and software implementations, the offscreen height renderer, mesh
//! geometry, shader sources and the uniform structs uploaded each frame.

pub mod cpu_context;
pub mod geometry;
pub mod gpu_context;
pub mod offscreen;
pub mod readback;
pub mod shader_loader;
pub mod uniforms;
pub mod wgpu_context;

// Re-export commonly used types for convenience
pub use cpu_context::{CpuContext, CpuDrawable, PixelKernel};
pub use geometry::{Geometry, MeshData, MeshVertex, Topology, build_mesh};
pub use gpu_context::{
    DrawList, DrawableHandle, GpuContext, ProgramHandle, SceneGraph, ShaderDefinition,
    TargetHandle, TextureHandle,
};
pub use offscreen::{OffscreenHeightRenderer, PixelLayout};
pub use shader_loader::{BASIC_PROGRAM, DISPLACEMENT_PROGRAM, ProgramSource, TERRAIN_PROGRAM};
pub use uniforms::{DrawableUniforms, SceneUniforms};
pub use wgpu_context::WgpuContext;
