//! Sun
//!
//! Emissive sphere with a glow shell of twice its radius, drawn at
//! `u_sunLightPos`. While moving it orbits the scene centre and writes the
//! new light position back every frame.

use std::any::Any;

use glam::{Mat4, Quat, Vec3};

use super::component::{FrameContext, SceneComponent};
use crate::error::RenderTargetError;
use crate::render::{DrawableHandle, Geometry, GpuContext, ProgramHandle, SceneGraph};
use crate::uniforms::{DEFAULT_SUN_POSITION, UniformValue, names};

const GLOW_COLOR: [f32; 4] = [1.0, 0.55, 0.3, 0.25];

pub struct Sun {
    body: DrawableHandle,
    glow: DrawableHandle,
    position: Vec3,
    orbit_speed: f32,
    moving: bool,
}

impl Sun {
    pub fn new(
        gpu: &mut dyn GpuContext,
        program: ProgramHandle,
        size: f32,
        segments: u32,
        light_color: Vec3,
        orbit_speed: f32,
    ) -> Result<Self, RenderTargetError> {
        let body = gpu.create_mesh(
            &Geometry::Sphere {
                radius: size,
                width_segments: segments,
                height_segments: segments,
            },
            program,
        )?;
        gpu.set_color(body, light_color.extend(1.0).to_array());

        let glow = gpu.create_mesh(
            &Geometry::Sphere {
                radius: 2.0 * size,
                width_segments: segments,
                height_segments: segments,
            },
            program,
        )?;
        gpu.set_color(glow, GLOW_COLOR);

        let mut sun = Self {
            body,
            glow,
            position: DEFAULT_SUN_POSITION,
            orbit_speed,
            moving: false,
        };
        sun.place(gpu, DEFAULT_SUN_POSITION);
        Ok(sun)
    }

    pub fn start_movement(&mut self) {
        self.moving = true;
    }

    pub fn stop_movement(&mut self) {
        self.moving = false;
    }

    pub fn set_moving(&mut self, moving: bool) {
        self.moving = moving;
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn drawables(&self) -> [DrawableHandle; 2] {
        [self.body, self.glow]
    }

    fn place(&mut self, gpu: &mut dyn GpuContext, position: Vec3) {
        self.position = position;
        let transform = Mat4::from_translation(position);
        gpu.set_transform(self.body, transform);
        gpu.set_transform(self.glow, transform);
    }
}

impl SceneComponent for Sun {
    fn update(&mut self, frame: &mut FrameContext<'_>) {
        let mut position = frame
            .uniforms
            .vec3(names::SUN_LIGHT_POS)
            .unwrap_or(self.position);

        if self.moving {
            // Rises and sets over the plane
            position = Quat::from_rotation_x(self.orbit_speed) * position;
            if let Err(err) = frame
                .uniforms
                .set(names::SUN_LIGHT_POS, UniformValue::Vec3(position))
            {
                log::error!("[Sun] {err}");
            }
        }

        if position != self.position {
            self.place(frame.gpu, position);
        }
    }

    fn attach_to(&mut self, scene: &mut dyn SceneGraph) {
        scene.add_drawable(self.body);
        scene.add_drawable(self.glow);
    }

    fn detach_from(&mut self, scene: &mut dyn SceneGraph) {
        scene.remove_drawable(self.body);
        scene.remove_drawable(self.glow);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
