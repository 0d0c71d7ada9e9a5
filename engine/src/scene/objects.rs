//! Decorative Scene Objects
//!
//! Builders for the water plane, the container ground, the two star systems
//! and the clouds. None of them take part in the height-field pipeline.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Mat4, Quat, Vec3};

use super::component::StaticMeshes;
use crate::config::SceneLayoutConfig;
use crate::error::RenderTargetError;
use crate::foliage::XorShift32;
use crate::render::shader_loader::definitions;
use crate::render::{BASIC_PROGRAM, Geometry, GpuContext, ProgramHandle, ShaderDefinition};

const WATER_COLOR: [f32; 4] = [0.05, 0.28, 0.42, 0.8];
const GROUND_COLOR: [f32; 4] = [0.22, 0.16, 0.11, 1.0];
const STAR_COLOR: [f32; 4] = [1.0, 0.96, 0.85, 1.0];
const CLOUD_COLOR: [f32; 4] = [0.92, 0.92, 0.95, 0.85];

const STAR_SIZE: f32 = 20.0;
const CLOUD_SEGMENTS: u32 = 16;

/// The two flavours of the basic program.
#[derive(Clone, Copy, Debug)]
pub struct ScenePrograms {
    /// Lit by the sun.
    pub lit: ProgramHandle,
    /// Flat color, ignores lighting.
    pub emissive: ProgramHandle,
}

impl ScenePrograms {
    pub fn compile(gpu: &mut dyn GpuContext) -> Result<Self, RenderTargetError> {
        let mut compile = |emissive: f32| {
            gpu.compile_program(
                BASIC_PROGRAM.label,
                BASIC_PROGRAM.vertex,
                BASIC_PROGRAM.fragment,
                &[ShaderDefinition::new(definitions::EMISSIVE, emissive)],
            )
        };
        Ok(Self {
            lit: compile(0.0)?,
            emissive: compile(1.0)?,
        })
    }
}

/// Translucent plane at the sea level.
pub fn build_water(
    gpu: &mut dyn GpuContext,
    programs: &ScenePrograms,
    size: f32,
    sea_level: f32,
) -> Result<StaticMeshes, RenderTargetError> {
    let water = gpu.create_mesh(
        &Geometry::Plane {
            width: size,
            height: size,
            width_segments: 1,
            height_segments: 1,
        },
        programs.lit,
    )?;
    gpu.set_transform(water, Mat4::from_translation(Vec3::Z * sea_level));
    gpu.set_color(water, WATER_COLOR);
    Ok(StaticMeshes::new("water", vec![water]))
}

/// Open box under the terrain: a floor `depth` below zero and four walls.
pub fn build_container_ground(
    gpu: &mut dyn GpuContext,
    programs: &ScenePrograms,
    size: f32,
    depth: f32,
) -> Result<StaticMeshes, RenderTargetError> {
    let half = size * 0.5;
    let floor = Geometry::Plane {
        width: size,
        height: size,
        width_segments: 1,
        height_segments: 1,
    };
    let wall = Geometry::Plane {
        width: size,
        height: depth,
        width_segments: 1,
        height_segments: 1,
    };

    // Walls stand up from the XY plane, centred half a depth below zero
    let wall_centre = -depth * 0.5;
    let placements = [
        (&floor, Mat4::from_translation(Vec3::new(0.0, 0.0, -depth))),
        (
            &wall,
            Mat4::from_translation(Vec3::new(0.0, -half, wall_centre))
                * Mat4::from_rotation_x(FRAC_PI_2),
        ),
        (
            &wall,
            Mat4::from_translation(Vec3::new(0.0, half, wall_centre))
                * Mat4::from_rotation_x(-FRAC_PI_2),
        ),
        (
            &wall,
            Mat4::from_translation(Vec3::new(-half, 0.0, wall_centre))
                * Mat4::from_rotation_z(FRAC_PI_2)
                * Mat4::from_rotation_x(-FRAC_PI_2),
        ),
        (
            &wall,
            Mat4::from_translation(Vec3::new(half, 0.0, wall_centre))
                * Mat4::from_rotation_z(FRAC_PI_2)
                * Mat4::from_rotation_x(FRAC_PI_2),
        ),
    ];

    let mut drawables = Vec::with_capacity(placements.len());
    for (geometry, transform) in placements {
        let drawable = gpu.create_mesh(geometry, programs.lit)?;
        gpu.set_transform(drawable, transform);
        gpu.set_color(drawable, GROUND_COLOR);
        drawables.push(drawable);
    }
    Ok(StaticMeshes::new("container_ground", drawables))
}

/// Point on the upper half of a sphere of `radius`.
fn sky_point(rng: &mut XorShift32, radius: f32) -> Vec3 {
    let azimuth = rng.range(0.0, TAU);
    let elevation = rng.range(0.05, 1.0).asin();
    Vec3::new(
        elevation.cos() * azimuth.cos(),
        elevation.cos() * azimuth.sin(),
        elevation.sin(),
    ) * radius
}

/// `count` small emissive spheres scattered over the sky at `radius`.
pub fn build_mesh_star_system(
    gpu: &mut dyn GpuContext,
    programs: &ScenePrograms,
    count: usize,
    radius: f32,
    seed: u32,
) -> Result<StaticMeshes, RenderTargetError> {
    let mut rng = XorShift32::new(seed);
    let star = Geometry::Sphere {
        radius: STAR_SIZE,
        width_segments: 8,
        height_segments: 6,
    };

    let mut drawables = Vec::with_capacity(count);
    for _ in 0..count {
        let drawable = gpu.create_mesh(&star, programs.emissive)?;
        let scale = rng.range(0.5, 1.5);
        gpu.set_transform(
            drawable,
            Mat4::from_scale_rotation_translation(
                Vec3::splat(scale),
                Quat::IDENTITY,
                sky_point(&mut rng, radius),
            ),
        );
        gpu.set_color(drawable, STAR_COLOR);
        drawables.push(drawable);
    }
    Ok(StaticMeshes::new("mesh_star_system", drawables))
}

/// `count` point particles over the sky at `radius`, one drawable.
pub fn build_particle_star_system(
    gpu: &mut dyn GpuContext,
    programs: &ScenePrograms,
    count: usize,
    radius: f32,
    seed: u32,
) -> Result<StaticMeshes, RenderTargetError> {
    let mut rng = XorShift32::new(seed);
    let positions = (0..count).map(|_| sky_point(&mut rng, radius)).collect();
    let drawable = gpu.create_mesh(&Geometry::Points { positions }, programs.emissive)?;
    gpu.set_color(drawable, STAR_COLOR);
    Ok(StaticMeshes::new("particle_star_system", vec![drawable]))
}

/// One cloud per entry: a soft sphere with a size drawn from
/// `[cloud_size_min, cloud_size_max]`, scattered above the terrain.
pub fn build_clouds(
    gpu: &mut dyn GpuContext,
    programs: &ScenePrograms,
    layout: &SceneLayoutConfig,
) -> Result<Vec<StaticMeshes>, RenderTargetError> {
    let mut rng = XorShift32::new(layout.seed ^ 0x9E37_79B9);
    let spread = layout.ground_size * 0.5;

    let mut clouds = Vec::with_capacity(layout.cloud_count);
    for _ in 0..layout.cloud_count {
        let size = rng.range(layout.cloud_size_min, layout.cloud_size_max);
        let position = Vec3::new(
            rng.range(-spread, spread),
            rng.range(-spread, spread),
            layout.cloud_altitude + rng.range(-size, size),
        );
        let drawable = gpu.create_mesh(
            &Geometry::Sphere {
                radius: size,
                width_segments: CLOUD_SEGMENTS,
                height_segments: CLOUD_SEGMENTS,
            },
            programs.lit,
        )?;
        // Flattened
        gpu.set_transform(
            drawable,
            Mat4::from_scale_rotation_translation(
                Vec3::new(1.6, 1.0, 0.45),
                Quat::IDENTITY,
                position,
            ),
        );
        gpu.set_color(drawable, CLOUD_COLOR);
        clouds.push(StaticMeshes::new("cloud", vec![drawable]));
    }
    Ok(clouds)
}
