//! GPU Context
//!
//! The narrow GPU surface the terrain pipeline depends on: compile a program,
//! allocate an offscreen target, draw into it, read it back, and build
//! drawables. Two backends implement it: [`WgpuContext`](super::WgpuContext)
//! on real hardware and [`CpuContext`](super::CpuContext) in software.

use glam::Mat4;

use super::geometry::Geometry;
use crate::error::RenderTargetError;
use crate::uniforms::UniformStore;

/// Compiled shader program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Offscreen color target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetHandle(pub u32);

/// Sampleable texture (the color attachment of a target).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Mesh bound to a program, ready to be put in a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawableHandle(pub u32);

/// Compile-time constant injected ahead of a program's source.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderDefinition {
    pub name: String,
    pub value: f32,
}

impl ShaderDefinition {
    pub fn new(name: &str, value: f32) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }

    /// WGSL declaration for this definition.
    pub fn to_wgsl(&self) -> String {
        format!("const {}: f32 = {:?};\n", self.name, self.value)
    }
}

/// GPU operations used by the height-field pipeline and scene components.
///
/// Handles are only meaningful to the context that issued them.
pub trait GpuContext {
    /// Compile a program from vertex and fragment sources plus definitions.
    fn compile_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
        definitions: &[ShaderDefinition],
    ) -> Result<ProgramHandle, RenderTargetError>;

    /// Allocate a `width` x `height` offscreen float target.
    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<TargetHandle, RenderTargetError>;

    /// Run `program` over every pixel of `target`.
    fn render_to_target(
        &mut self,
        target: TargetHandle,
        program: ProgramHandle,
        uniforms: &UniformStore,
    ) -> Result<(), RenderTargetError>;

    /// Synchronously copy `target` back to the CPU as a flat float array,
    /// `channels_per_pixel` floats per pixel, rows in order.
    fn read_pixels(&mut self, target: TargetHandle) -> Result<Vec<f32>, RenderTargetError>;

    /// Texture that samples `target`'s color attachment.
    fn target_texture(&self, target: TargetHandle) -> Result<TextureHandle, RenderTargetError>;

    /// Upload `geometry` and bind it to `program`.
    fn create_mesh(
        &mut self,
        geometry: &Geometry,
        program: ProgramHandle,
    ) -> Result<DrawableHandle, RenderTargetError>;

    /// Set a drawable's model matrix.
    fn set_transform(&mut self, drawable: DrawableHandle, transform: Mat4);

    /// Set a drawable's base color (linear RGBA).
    fn set_color(&mut self, drawable: DrawableHandle, color: [f32; 4]);

    /// Show or hide a drawable without removing it from the scene.
    fn set_visible(&mut self, drawable: DrawableHandle, visible: bool);

    /// Number of floats per pixel returned by [`GpuContext::read_pixels`].
    fn channels_per_pixel(&self) -> usize {
        4
    }
}

/// Scene-graph collaborator: which drawables get traversed each frame.
pub trait SceneGraph {
    fn add_drawable(&mut self, drawable: DrawableHandle);
    fn remove_drawable(&mut self, drawable: DrawableHandle);
}

/// Ordered list of drawables attached to the scene.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    drawables: Vec<DrawableHandle>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = DrawableHandle> + '_ {
        self.drawables.iter().copied()
    }

    pub fn contains(&self, drawable: DrawableHandle) -> bool {
        self.drawables.contains(&drawable)
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }
}

impl SceneGraph for DrawList {
    fn add_drawable(&mut self, drawable: DrawableHandle) {
        if !self.drawables.contains(&drawable) {
            self.drawables.push(drawable);
        }
    }

    fn remove_drawable(&mut self, drawable: DrawableHandle) {
        self.drawables.retain(|d| *d != drawable);
    }
}
