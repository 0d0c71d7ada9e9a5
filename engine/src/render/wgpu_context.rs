//! wgpu GPU Context
//!
//! [`GpuContext`] on real hardware. Owns the device and queue, the optional
//! window surface, every program, offscreen target and drawable, plus a lazy
//! pipeline cache keyed by program and pipeline kind.
//!
//! Bind group layout shared by all pipelines:
//! - group 0: binding 0 = [`SceneUniforms`], binding 1 = height map texture
//! - group 1: binding 0 = [`DrawableUniforms`]

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::geometry::{Geometry, MeshVertex, Topology, build_mesh};
use super::gpu_context::{
    DrawList, DrawableHandle, GpuContext, ProgramHandle, ShaderDefinition, TargetHandle,
    TextureHandle,
};
use super::readback::read_texture_f32;
use super::shader_loader::{compose_program, create_shader_module};
use super::uniforms::{DrawableUniforms, SceneUniforms};
use crate::error::{GpuInitError, RenderTargetError};
use crate::uniforms::{UniformStore, names};

/// Offscreen height targets are full float so readback is exact.
pub const HEIGHT_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Color format used for mesh pipelines when there is no window.
const HEADLESS_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.03,
    b: 0.08,
    a: 1.0,
};

const MESH_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum PipelineKind {
    /// Fullscreen pass into a height target
    Offscreen,
    /// Indexed mesh drawn to the window
    Mesh(Topology),
}

struct SurfaceTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
}

struct GpuProgram {
    label: String,
    module: wgpu::ShaderModule,
}

struct GpuTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct GpuDrawable {
    program: ProgramHandle,
    topology: Topology,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniforms: DrawableUniforms,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    visible: bool,
}

/// wgpu implementation of [`GpuContext`].
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: Option<SurfaceTarget>,

    scene_layout: wgpu::BindGroupLayout,
    drawable_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,

    frame_scene_buffer: wgpu::Buffer,
    offscreen_scene_buffer: wgpu::Buffer,
    placeholder_height_view: wgpu::TextureView,
    offscreen_scene_bind_group: wgpu::BindGroup,
    offscreen_drawable_bind_group: wgpu::BindGroup,

    programs: Vec<GpuProgram>,
    targets: Vec<GpuTarget>,
    drawables: Vec<GpuDrawable>,
    pipelines: HashMap<(ProgramHandle, PipelineKind), wgpu::RenderPipeline>,
    /// Frame bind groups keyed by the height map they expose.
    frame_bind_groups: HashMap<Option<TextureHandle>, wgpu::BindGroup>,
}

impl WgpuContext {
    /// Create a context with no window, for offscreen work only.
    pub fn headless() -> Result<Self, GpuInitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;
        let (device, queue) = Self::request_device(&adapter)?;
        Ok(Self::from_parts(device, queue, None))
    }

    /// Create a context that presents to `window`.
    pub fn for_window(window: Arc<Window>, vsync: bool) -> Result<Self, GpuInitError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;
        let (device, queue) = Self::request_device(&adapter)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .unwrap_or(HEADLESS_COLOR_FORMAT);
        log::info!("[WgpuContext] Surface format: {:?}", surface_format);

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else if surface_caps
            .present_modes
            .contains(&wgpu::PresentMode::Mailbox)
        {
            wgpu::PresentMode::Mailbox
        } else {
            wgpu::PresentMode::AutoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, config.width, config.height);

        Ok(Self::from_parts(
            device,
            queue,
            Some(SurfaceTarget {
                surface,
                config,
                depth_view,
            }),
        ))
    }

    fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), GpuInitError> {
        let info = adapter.get_info();
        log::info!(
            "[WgpuContext] Using adapter: {} ({:?})",
            info.name,
            info.backend
        );
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Hills Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))?;
        Ok((device, queue))
    }

    fn from_parts(device: wgpu::Device, queue: wgpu::Queue, surface: Option<SurfaceTarget>) -> Self {
        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });
        let drawable_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Drawable Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&scene_layout, &drawable_layout],
            push_constant_ranges: &[],
        });

        let scene_size = std::mem::size_of::<SceneUniforms>() as u64;
        let frame_scene_buffer = create_uniform_buffer(&device, "Frame Scene Uniforms", scene_size);
        let offscreen_scene_buffer =
            create_uniform_buffer(&device, "Offscreen Scene Uniforms", scene_size);

        // 1x1 stand-in for passes that must not read a height map
        let placeholder = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Placeholder Height Map"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HEIGHT_TARGET_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let placeholder_height_view = placeholder.create_view(&wgpu::TextureViewDescriptor::default());

        let offscreen_scene_bind_group = create_scene_bind_group(
            &device,
            &scene_layout,
            &offscreen_scene_buffer,
            &placeholder_height_view,
        );
        let identity = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Offscreen Drawable Uniforms"),
            contents: bytemuck::bytes_of(&DrawableUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let offscreen_drawable_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Offscreen Drawable Bind Group"),
            layout: &drawable_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: identity.as_entire_binding(),
            }],
        });

        Self {
            device,
            queue,
            surface,
            scene_layout,
            drawable_layout,
            pipeline_layout,
            frame_scene_buffer,
            offscreen_scene_buffer,
            placeholder_height_view,
            offscreen_scene_bind_group,
            offscreen_drawable_bind_group,
            programs: Vec::new(),
            targets: Vec::new(),
            drawables: Vec::new(),
            pipelines: HashMap::new(),
            frame_bind_groups: HashMap::new(),
        }
    }

    /// Handle window resize
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(target) = self.surface.as_mut() {
            target.config.width = width;
            target.config.height = height;
            target.surface.configure(&self.device, &target.config);
            target.depth_view = create_depth_view(&self.device, width, height);
        }
    }

    /// Current surface size, `None` when headless.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface
            .as_ref()
            .map(|t| (t.config.width, t.config.height))
    }

    /// Draw every visible drawable in `draw_list` to the window.
    ///
    /// Headless contexts skip the frame.
    pub fn render_frame(
        &mut self,
        draw_list: &DrawList,
        uniforms: &UniformStore,
        view_proj: Mat4,
        camera_pos: Vec3,
    ) -> Result<(), wgpu::SurfaceError> {
        if self.surface.is_none() {
            log::debug!("[WgpuContext] headless, skipping frame");
            return Ok(());
        }

        // Pipelines and bind groups first; the pass below only borrows
        for handle in draw_list.iter() {
            let Some(drawable) = self.drawables.get(handle.0 as usize) else {
                continue;
            };
            let key = (drawable.program, PipelineKind::Mesh(drawable.topology));
            if let Err(err) = self.ensure_pipeline(key.0, key.1) {
                log::error!("[WgpuContext] {err}");
            }
        }
        let height_map = uniforms
            .texture(names::HEIGHT_MAP)
            .filter(|t| (t.0 as usize) < self.targets.len());
        self.ensure_frame_bind_group(height_map);

        let scene = SceneUniforms::from_store(uniforms, view_proj, camera_pos);
        self.queue
            .write_buffer(&self.frame_scene_buffer, 0, bytemuck::bytes_of(&scene));

        let Some(target) = self.surface.as_ref() else {
            return Ok(());
        };
        let frame = target.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(frame_group) = self.frame_bind_groups.get(&height_map) {
                pass.set_bind_group(0, frame_group, &[]);
            }
            for handle in draw_list.iter() {
                let Some(drawable) = self.drawables.get(handle.0 as usize) else {
                    continue;
                };
                if !drawable.visible {
                    continue;
                }
                let key = (drawable.program, PipelineKind::Mesh(drawable.topology));
                let Some(pipeline) = self.pipelines.get(&key) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(1, &drawable.bind_group, &[]);
                pass.set_vertex_buffer(0, drawable.vertex_buffer.slice(..));
                pass.set_index_buffer(drawable.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..drawable.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn color_format(&self) -> wgpu::TextureFormat {
        self.surface
            .as_ref()
            .map(|t| t.config.format)
            .unwrap_or(HEADLESS_COLOR_FORMAT)
    }

    fn ensure_frame_bind_group(&mut self, height_map: Option<TextureHandle>) {
        if self.frame_bind_groups.contains_key(&height_map) {
            return;
        }
        let view = height_map
            .and_then(|t| self.targets.get(t.0 as usize))
            .map(|t| &t.view)
            .unwrap_or(&self.placeholder_height_view);
        let group = create_scene_bind_group(
            &self.device,
            &self.scene_layout,
            &self.frame_scene_buffer,
            view,
        );
        self.frame_bind_groups.insert(height_map, group);
    }

    fn ensure_pipeline(
        &mut self,
        program: ProgramHandle,
        kind: PipelineKind,
    ) -> Result<(), RenderTargetError> {
        if self.pipelines.contains_key(&(program, kind)) {
            return Ok(());
        }
        let gpu_program = self
            .programs
            .get(program.0 as usize)
            .ok_or(RenderTargetError::UnknownHandle {
                kind: "program",
                id: program.0,
            })?;

        let (label, color_format, blend, buffers, topology, depth_stencil) = match kind {
            PipelineKind::Offscreen => (
                format!("{} Offscreen Pipeline", gpu_program.label),
                HEIGHT_TARGET_FORMAT,
                None,
                Vec::new(),
                wgpu::PrimitiveTopology::TriangleList,
                None,
            ),
            PipelineKind::Mesh(topology) => (
                format!("{} Mesh Pipeline", gpu_program.label),
                self.color_format(),
                Some(wgpu::BlendState::ALPHA_BLENDING),
                vec![wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &MESH_VERTEX_ATTRIBUTES,
                }],
                match topology {
                    Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
                    Topology::Points => wgpu::PrimitiveTopology::PointList,
                },
                Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
            ),
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &gpu_program.module,
                    entry_point: Some("vs_main"),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &gpu_program.module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderTargetError::Compile(format!("{label}: {err}")));
        }

        log::debug!("[WgpuContext] created {label}");
        self.pipelines.insert((program, kind), pipeline);
        Ok(())
    }

    fn gpu_target(&self, target: TargetHandle) -> Result<&GpuTarget, RenderTargetError> {
        self.targets
            .get(target.0 as usize)
            .ok_or(RenderTargetError::UnknownHandle {
                kind: "target",
                id: target.0,
            })
    }

    fn drawable_mut(&mut self, handle: DrawableHandle) -> Option<&mut GpuDrawable> {
        let drawable = self.drawables.get_mut(handle.0 as usize);
        if drawable.is_none() {
            log::warn!("[WgpuContext] ignoring unknown drawable {}", handle.0);
        }
        drawable
    }

    fn upload_drawable_uniforms(&mut self, handle: DrawableHandle) {
        if let Some(drawable) = self.drawables.get(handle.0 as usize) {
            self.queue.write_buffer(
                &drawable.uniform_buffer,
                0,
                bytemuck::bytes_of(&drawable.uniforms),
            );
        }
    }
}

impl GpuContext for WgpuContext {
    fn compile_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
        definitions: &[ShaderDefinition],
    ) -> Result<ProgramHandle, RenderTargetError> {
        let source = compose_program(definitions, vertex_source, fragment_source);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = create_shader_module(&self.device, label, &source);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderTargetError::Compile(format!("{label}: {err}")));
        }

        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(GpuProgram {
            label: label.to_string(),
            module,
        });
        log::info!("[WgpuContext] compiled program `{label}`");
        Ok(handle)
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<TargetHandle, RenderTargetError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderTargetError::Allocation(format!(
                "{width}x{height} target outside 1..={max}"
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Height Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HEIGHT_TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderTargetError::Allocation(err.to_string()));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let handle = TargetHandle(self.targets.len() as u32);
        self.targets.push(GpuTarget {
            texture,
            view,
            width,
            height,
        });
        Ok(handle)
    }

    fn render_to_target(
        &mut self,
        target: TargetHandle,
        program: ProgramHandle,
        uniforms: &UniformStore,
    ) -> Result<(), RenderTargetError> {
        let (width, height) = {
            let t = self.gpu_target(target)?;
            (t.width, t.height)
        };
        self.ensure_pipeline(program, PipelineKind::Offscreen)?;

        let scene = SceneUniforms::from_store(uniforms, Mat4::IDENTITY, Vec3::ZERO)
            .for_target(width, height);
        self.queue
            .write_buffer(&self.offscreen_scene_buffer, 0, bytemuck::bytes_of(&scene));

        let gpu_target = self.gpu_target(target)?;
        let pipeline = self
            .pipelines
            .get(&(program, PipelineKind::Offscreen))
            .ok_or(RenderTargetError::UnknownHandle {
                kind: "program",
                id: program.0,
            })?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Height Pass Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Height Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &gpu_target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.offscreen_scene_bind_group, &[]);
            pass.set_bind_group(1, &self.offscreen_drawable_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderTargetError::Draw(err.to_string()));
        }
        Ok(())
    }

    fn read_pixels(&mut self, target: TargetHandle) -> Result<Vec<f32>, RenderTargetError> {
        let t = self.gpu_target(target)?;
        read_texture_f32(&self.device, &self.queue, &t.texture, t.width, t.height)
    }

    fn target_texture(&self, target: TargetHandle) -> Result<TextureHandle, RenderTargetError> {
        self.gpu_target(target)?;
        Ok(TextureHandle(target.0))
    }

    fn create_mesh(
        &mut self,
        geometry: &Geometry,
        program: ProgramHandle,
    ) -> Result<DrawableHandle, RenderTargetError> {
        let label = self
            .programs
            .get(program.0 as usize)
            .map(|p| p.label.clone())
            .ok_or(RenderTargetError::UnknownHandle {
                kind: "program",
                id: program.0,
            })?;
        let mesh = build_mesh(geometry);

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Vertex Buffer")),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Index Buffer")),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let uniforms = DrawableUniforms::default();
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Drawable Uniforms")),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Drawable Bind Group")),
            layout: &self.drawable_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let handle = DrawableHandle(self.drawables.len() as u32);
        self.drawables.push(GpuDrawable {
            program,
            topology: geometry.topology(),
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            uniforms,
            uniform_buffer,
            bind_group,
            visible: true,
        });
        Ok(handle)
    }

    fn set_transform(&mut self, drawable: DrawableHandle, transform: Mat4) {
        if let Some(d) = self.drawable_mut(drawable) {
            d.uniforms.model = transform.to_cols_array_2d();
            self.upload_drawable_uniforms(drawable);
        }
    }

    fn set_color(&mut self, drawable: DrawableHandle, color: [f32; 4]) {
        if let Some(d) = self.drawable_mut(drawable) {
            d.uniforms.color = color;
            self.upload_drawable_uniforms(drawable);
        }
    }

    fn set_visible(&mut self, drawable: DrawableHandle, visible: bool) {
        if let Some(d) = self.drawable_mut(drawable) {
            d.visible = visible;
        }
    }
}

fn create_uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_scene_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    height_view: &wgpu::TextureView,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Scene Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(height_view),
            },
        ],
    })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
