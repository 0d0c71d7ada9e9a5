//! Software GPU Context
//!
//! A [`GpuContext`] that evaluates the displacement program on the CPU.
//! Used for headless runs and tests. Drawables are tracked (transform, color,
//! visibility) but never rasterized.

use glam::{Mat4, Vec2};

use super::geometry::{Geometry, Topology, build_mesh};
use super::gpu_context::{
    DrawableHandle, GpuContext, ProgramHandle, ShaderDefinition, TargetHandle, TextureHandle,
};
use super::shader_loader::definitions;
use crate::error::RenderTargetError;
use crate::terrain::displacement::height_from_store;
use crate::uniforms::UniformStore;

/// Per-pixel program body: world position in, height out.
pub type PixelKernel = fn(&UniformStore, Vec2) -> f32;

#[derive(Clone, Debug)]
struct CpuProgram {
    label: String,
    definitions: Vec<ShaderDefinition>,
}

impl CpuProgram {
    fn definition(&self, name: &str) -> Option<f32> {
        self.definitions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value)
    }
}

#[derive(Clone, Debug)]
struct CpuTarget {
    width: u32,
    height: u32,
    pixels: Vec<f32>,
}

/// Drawable state as the scene last set it.
#[derive(Clone, Debug, PartialEq)]
pub struct CpuDrawable {
    pub program: ProgramHandle,
    pub topology: Topology,
    pub vertex_count: usize,
    pub transform: Mat4,
    pub color: [f32; 4],
    pub visible: bool,
}

/// CPU implementation of [`GpuContext`].
pub struct CpuContext {
    channels: usize,
    kernel: PixelKernel,
    programs: Vec<CpuProgram>,
    targets: Vec<CpuTarget>,
    drawables: Vec<CpuDrawable>,
    draw_calls: u64,
}

impl Default for CpuContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuContext {
    /// Four channels per pixel, terrain displacement kernel.
    pub fn new() -> Self {
        Self {
            channels: 4,
            kernel: height_from_store,
            programs: Vec::new(),
            targets: Vec::new(),
            drawables: Vec::new(),
            draw_calls: 0,
        }
    }

    /// Use `channels` floats per pixel instead of four.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// Replace the per-pixel program body.
    pub fn with_kernel(mut self, kernel: PixelKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn drawable(&self, handle: DrawableHandle) -> Option<&CpuDrawable> {
        self.drawables.get(handle.0 as usize)
    }

    pub fn drawable_count(&self) -> usize {
        self.drawables.len()
    }

    pub fn program_label(&self, handle: ProgramHandle) -> Option<&str> {
        self.programs.get(handle.0 as usize).map(|p| p.label.as_str())
    }

    /// Number of completed `render_to_target` calls.
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    fn target(&self, handle: TargetHandle) -> Result<&CpuTarget, RenderTargetError> {
        self.targets
            .get(handle.0 as usize)
            .ok_or(RenderTargetError::UnknownHandle {
                kind: "target",
                id: handle.0,
            })
    }

    fn drawable_mut(&mut self, handle: DrawableHandle) -> Option<&mut CpuDrawable> {
        let drawable = self.drawables.get_mut(handle.0 as usize);
        if drawable.is_none() {
            log::warn!("[CpuContext] ignoring unknown drawable {}", handle.0);
        }
        drawable
    }
}

impl GpuContext for CpuContext {
    fn compile_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
        definitions: &[ShaderDefinition],
    ) -> Result<ProgramHandle, RenderTargetError> {
        if vertex_source.trim().is_empty() || fragment_source.trim().is_empty() {
            return Err(RenderTargetError::Compile(format!(
                "{label}: empty shader stage"
            )));
        }
        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(CpuProgram {
            label: label.to_string(),
            definitions: definitions.to_vec(),
        });
        Ok(handle)
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<TargetHandle, RenderTargetError> {
        if width == 0 || height == 0 {
            return Err(RenderTargetError::Allocation(format!(
                "cannot allocate a {width}x{height} target"
            )));
        }
        let handle = TargetHandle(self.targets.len() as u32);
        self.targets.push(CpuTarget {
            width,
            height,
            pixels: vec![0.0; width as usize * height as usize * self.channels],
        });
        Ok(handle)
    }

    fn render_to_target(
        &mut self,
        target: TargetHandle,
        program: ProgramHandle,
        uniforms: &UniformStore,
    ) -> Result<(), RenderTargetError> {
        let program = self
            .programs
            .get(program.0 as usize)
            .ok_or(RenderTargetError::UnknownHandle {
                kind: "program",
                id: program.0,
            })?;
        let channel = program
            .definition(definitions::HEIGHT_CHANNEL)
            .unwrap_or(0.0) as usize;
        if channel >= self.channels {
            return Err(RenderTargetError::Draw(format!(
                "{}: height channel {channel} outside {}-channel target",
                program.label, self.channels
            )));
        }

        let channels = self.channels;
        let kernel = self.kernel;
        let target = self
            .targets
            .get_mut(target.0 as usize)
            .ok_or(RenderTargetError::UnknownHandle {
                kind: "target",
                id: target.0,
            })?;

        let half = Vec2::new(target.width as f32, target.height as f32) * 0.5;
        let row_len = target.width as usize * channels;
        for (py, row) in target.pixels.chunks_exact_mut(row_len).enumerate() {
            for (px, pixel) in row.chunks_exact_mut(channels).enumerate() {
                let world = Vec2::new(px as f32, py as f32) - half;
                pixel.fill(0.0);
                pixel[channel] = kernel(uniforms, world);
            }
        }

        self.draw_calls += 1;
        Ok(())
    }

    fn read_pixels(&mut self, target: TargetHandle) -> Result<Vec<f32>, RenderTargetError> {
        Ok(self.target(target)?.pixels.clone())
    }

    fn target_texture(&self, target: TargetHandle) -> Result<TextureHandle, RenderTargetError> {
        self.target(target)?;
        Ok(TextureHandle(target.0))
    }

    fn create_mesh(
        &mut self,
        geometry: &Geometry,
        program: ProgramHandle,
    ) -> Result<DrawableHandle, RenderTargetError> {
        if program.0 as usize >= self.programs.len() {
            return Err(RenderTargetError::UnknownHandle {
                kind: "program",
                id: program.0,
            });
        }
        let mesh = build_mesh(geometry);
        let handle = DrawableHandle(self.drawables.len() as u32);
        self.drawables.push(CpuDrawable {
            program,
            topology: geometry.topology(),
            vertex_count: mesh.vertices.len(),
            transform: Mat4::IDENTITY,
            color: [1.0; 4],
            visible: true,
        });
        Ok(handle)
    }

    fn set_transform(&mut self, drawable: DrawableHandle, transform: Mat4) {
        if let Some(d) = self.drawable_mut(drawable) {
            d.transform = transform;
        }
    }

    fn set_color(&mut self, drawable: DrawableHandle, color: [f32; 4]) {
        if let Some(d) = self.drawable_mut(drawable) {
            d.color = color;
        }
    }

    fn set_visible(&mut self, drawable: DrawableHandle, visible: bool) {
        if let Some(d) = self.drawable_mut(drawable) {
            d.visible = visible;
        }
    }

    fn channels_per_pixel(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(_: &UniformStore, p: Vec2) -> f32 {
        p.x + 10.0 * p.y
    }

    #[test]
    fn test_empty_stage_fails_to_compile() {
        let mut ctx = CpuContext::new();
        let err = ctx.compile_program("empty", "", "fn fs_main() {}", &[]);
        assert!(matches!(err, Err(RenderTargetError::Compile(_))));
    }

    #[test]
    fn test_zero_sized_target_fails() {
        let mut ctx = CpuContext::new();
        assert!(matches!(
            ctx.create_render_target(0, 4),
            Err(RenderTargetError::Allocation(_))
        ));
    }

    #[test]
    fn test_pixels_follow_world_mapping() {
        let mut ctx = CpuContext::new().with_kernel(ramp);
        let program = ctx.compile_program("ramp", "vs", "fs", &[]).unwrap();
        let target = ctx.create_render_target(4, 2).unwrap();
        ctx.render_to_target(target, program, &UniformStore::new())
            .unwrap();

        let pixels = ctx.read_pixels(target).unwrap();
        assert_eq!(pixels.len(), 4 * 2 * 4);
        // Pixel (0, 0) is world (-2, -1)
        assert_eq!(pixels[0], -2.0 - 10.0);
        // Pixel (3, 1) is world (1, 0)
        assert_eq!(pixels[(4 + 3) * 4], 1.0);
        assert_eq!(pixels[1], 0.0);
    }

    #[test]
    fn test_height_channel_definition() {
        let mut ctx = CpuContext::new().with_kernel(ramp);
        let defs = [ShaderDefinition::new(definitions::HEIGHT_CHANNEL, 2.0)];
        let program = ctx.compile_program("ramp", "vs", "fs", &defs).unwrap();
        let target = ctx.create_render_target(2, 2).unwrap();
        ctx.render_to_target(target, program, &UniformStore::new())
            .unwrap();

        let pixels = ctx.read_pixels(target).unwrap();
        assert_eq!(pixels[0], 0.0);
        assert_eq!(pixels[2], -1.0 - 10.0);
    }

    #[test]
    fn test_height_channel_outside_pixel_is_draw_error() {
        let mut ctx = CpuContext::new().with_channels(1);
        let defs = [ShaderDefinition::new(definitions::HEIGHT_CHANNEL, 1.0)];
        let program = ctx.compile_program("bad", "vs", "fs", &defs).unwrap();
        let target = ctx.create_render_target(2, 2).unwrap();
        assert!(matches!(
            ctx.render_to_target(target, program, &UniformStore::new()),
            Err(RenderTargetError::Draw(_))
        ));
        assert_eq!(ctx.draw_calls(), 0);
    }

    #[test]
    fn test_drawable_state_is_tracked() {
        let mut ctx = CpuContext::new();
        let program = ctx.compile_program("basic", "vs", "fs", &[]).unwrap();
        let drawable = ctx
            .create_mesh(
                &Geometry::Cone {
                    radius: 1.0,
                    height: 2.0,
                    segments: 4,
                },
                program,
            )
            .unwrap();

        ctx.set_visible(drawable, false);
        ctx.set_color(drawable, [0.1, 0.2, 0.3, 1.0]);
        let state = ctx.drawable(drawable).unwrap();
        assert!(!state.visible);
        assert_eq!(state.color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(state.topology, Topology::Triangles);
    }
}
