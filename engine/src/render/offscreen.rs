//! Offscreen Height Renderer
//!
//! Runs the displacement program into an offscreen float target and reads
//! the result back so the CPU sees the same heights the terrain mesh does.
//!
//! Two targets are used in turn. A pass draws into the one not currently
//! published, reads it back, and only then swaps, so a failed pass leaves
//! both `pixel_data` and `texture` exactly as the last good pass left them.

use std::sync::Arc;

use super::gpu_context::{GpuContext, ProgramHandle, ShaderDefinition, TargetHandle, TextureHandle};
use super::shader_loader::{DISPLACEMENT_PROGRAM, definitions};
use crate::error::{ConfigError, RenderTargetError};
use crate::uniforms::UniformStore;

/// How height samples are packed into readback pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PixelLayout {
    pub channels_per_pixel: usize,
    /// Channel that carries the height.
    pub height_channel: usize,
}

impl Default for PixelLayout {
    fn default() -> Self {
        Self {
            channels_per_pixel: 4,
            height_channel: 0,
        }
    }
}

impl PixelLayout {
    pub fn new(channels_per_pixel: usize, height_channel: usize) -> Result<Self, ConfigError> {
        let layout = Self {
            channels_per_pixel,
            height_channel,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels_per_pixel == 0 || self.height_channel >= self.channels_per_pixel {
            return Err(ConfigError::PixelLayout {
                channels: self.channels_per_pixel,
                height_channel: self.height_channel,
            });
        }
        Ok(())
    }

    /// Definitions that route the height into the configured channel.
    pub fn definitions(&self) -> Vec<ShaderDefinition> {
        vec![ShaderDefinition::new(
            definitions::HEIGHT_CHANNEL,
            self.height_channel as f32,
        )]
    }
}

fn check_layout(ctx: &dyn GpuContext, layout: PixelLayout) -> Result<(), RenderTargetError> {
    let context = ctx.channels_per_pixel();
    if layout.channels_per_pixel != context {
        return Err(RenderTargetError::LayoutMismatch {
            layout: layout.channels_per_pixel,
            context,
        });
    }
    Ok(())
}

/// Offscreen renderer for the terrain height field.
pub struct OffscreenHeightRenderer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    program: ProgramHandle,
    targets: [TargetHandle; 2],
    /// Index into `targets` of the published target.
    front: usize,
    pixel_data: Arc<[f32]>,
    texture: Option<TextureHandle>,
    passes: u64,
}

impl OffscreenHeightRenderer {
    /// Create a renderer for an already compiled `program`.
    ///
    /// `layout` must match the context's readback width, otherwise every
    /// pass would come back short.
    pub fn new(
        ctx: &mut dyn GpuContext,
        width: u32,
        height: u32,
        layout: PixelLayout,
        program: ProgramHandle,
    ) -> Result<Self, RenderTargetError> {
        check_layout(ctx, layout)?;
        let targets = [
            ctx.create_render_target(width, height)?,
            ctx.create_render_target(width, height)?,
        ];
        log::info!(
            "[OffscreenHeightRenderer] allocated 2 targets of {}x{} ({} channels)",
            width,
            height,
            layout.channels_per_pixel
        );

        Ok(Self {
            width,
            height,
            layout,
            program,
            targets,
            front: 0,
            pixel_data: Arc::from(Vec::<f32>::new()),
            texture: None,
            passes: 0,
        })
    }

    /// Compile the embedded displacement program and create a renderer for it.
    pub fn with_displacement_program(
        ctx: &mut dyn GpuContext,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Self, RenderTargetError> {
        check_layout(ctx, layout)?;
        let program = ctx.compile_program(
            DISPLACEMENT_PROGRAM.label,
            DISPLACEMENT_PROGRAM.vertex,
            DISPLACEMENT_PROGRAM.fragment,
            &layout.definitions(),
        )?;
        Self::new(ctx, width, height, layout, program)
    }

    /// Draw the program over the whole target and read it back.
    ///
    /// On success `pixel_data` and `texture` both reflect this pass. On
    /// failure neither changes.
    pub fn render_pass(
        &mut self,
        ctx: &mut dyn GpuContext,
        uniforms: &UniformStore,
    ) -> Result<(), RenderTargetError> {
        let back = 1 - self.front;
        let target = self.targets[back];

        ctx.render_to_target(target, self.program, uniforms)?;
        let pixels = ctx.read_pixels(target)?;

        let expected = self.expected_len();
        if pixels.len() != expected {
            return Err(RenderTargetError::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        let texture = ctx.target_texture(target)?;

        // Publish
        self.front = back;
        self.pixel_data = Arc::from(pixels);
        self.texture = Some(texture);
        self.passes += 1;
        Ok(())
    }

    /// Floats of the last successful pass. Empty before the first one.
    pub fn pixel_data(&self) -> &Arc<[f32]> {
        &self.pixel_data
    }

    /// Texture of the last successful pass.
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Number of successful passes.
    pub fn pass_count(&self) -> u64 {
        self.passes
    }

    /// width x height x channels
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.channels_per_pixel
    }
}
