//! Scene Setup
//!
//! Builds the full hills scene from a [`SceneConfig`] in the order the frame
//! loop expects: sun, terrain, initial broadcast, water, container ground,
//! star systems, clouds.

use glam::Vec3;

use super::app::{AppScene, keys};
use super::bridge::StateBridge;
use super::objects::{
    ScenePrograms, build_clouds, build_container_ground, build_mesh_star_system,
    build_particle_star_system, build_water,
};
use super::sun::Sun;
use crate::camera::SceneCamera;
use crate::config::SceneConfig;
use crate::error::RenderTargetError;
use crate::render::GpuContext;
use crate::terrain::TerrainSurface;
use crate::uniforms::{UniformStore, names};

/// Fallback when the store has no sun light color.
const SUN_LIGHT_COLOR: Vec3 = Vec3::new(1.0, 0.7, 0.6);

/// Build every component, attach it and broadcast the initial hill values.
///
/// The terrain regenerates on the first tick.
pub fn build_scene(
    gpu: &mut dyn GpuContext,
    config: &SceneConfig,
) -> Result<(AppScene, StateBridge), RenderTargetError> {
    let (width, height) = (config.render.width, config.render.height);
    let mut uniforms = UniformStore::with_defaults();
    uniforms.set_resolution(width, height);
    let mut camera = SceneCamera::new(1.0);
    camera.set_viewport(width, height);

    let mut app = AppScene::new(uniforms, camera);
    let bridge = StateBridge::new();
    let programs = ScenePrograms::compile(gpu)?;
    let layout = &config.layout;

    let light_color = app
        .uniforms()
        .vec3(names::SUN_LIGHT_COLOR)
        .unwrap_or(SUN_LIGHT_COLOR);
    let sun = Sun::new(
        gpu,
        programs.emissive,
        layout.sun_size,
        layout.sun_segments,
        light_color,
        layout.sun_orbit_speed,
    )?;
    app.add_component(keys::SUN, Box::new(sun));

    let mut terrain = TerrainSurface::new(gpu, app.changes_mut(), &config.terrain, &config.foliage)?;
    terrain.set_water_active(gpu, true);
    app.add_component(keys::TERRAIN, Box::new(terrain));

    bridge.broadcast_initial(&mut app);

    let water = build_water(gpu, &programs, layout.water_size, config.foliage.sea_level)?;
    app.add_component(keys::WATER, Box::new(water));

    let ground = build_container_ground(gpu, &programs, layout.ground_size, layout.ground_depth)?;
    app.add_component(keys::GROUND_ENV, Box::new(ground));

    let mesh_stars = build_mesh_star_system(
        gpu,
        &programs,
        layout.mesh_star_count,
        layout.mesh_star_radius,
        layout.seed,
    )?;
    app.add_component(keys::MESH_STAR_SYSTEM, Box::new(mesh_stars));

    let particle_stars = build_particle_star_system(
        gpu,
        &programs,
        layout.particle_star_count,
        layout.particle_star_radius,
        layout.seed.wrapping_add(1),
    )?;
    app.add_component(keys::PARTICLE_STAR_SYSTEM, Box::new(particle_stars));

    for (i, cloud) in build_clouds(gpu, &programs, layout)?.into_iter().enumerate() {
        app.add_component(&keys::cloud(i), Box::new(cloud));
    }

    log::info!(
        "[Scene] built {} components, {} drawables",
        app.component_keys().count(),
        app.draw_list().len()
    );
    Ok((app, bridge))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{CpuContext, PixelLayout};
    use crate::scene::SceneEvent;
    use crate::terrain::{SurfaceState, TERRAIN_LISTENER_ID};

    fn small_config() -> SceneConfig {
        let mut config = SceneConfig::default();
        config.terrain.width = 64;
        config.terrain.height = 64;
        config.terrain.width_segments = 8;
        config.terrain.height_segments = 8;
        config.foliage.tree_count = 8;
        config.foliage.margin = 4.0;
        config
    }

    #[test]
    fn test_scene_has_every_component_in_order() {
        let mut gpu = CpuContext::new();
        let (app, _) = build_scene(&mut gpu, &small_config()).unwrap();

        let order: Vec<&str> = app.component_keys().collect();
        assert_eq!(
            &order[..6],
            &[
                keys::SUN,
                keys::TERRAIN,
                keys::WATER,
                keys::GROUND_ENV,
                keys::MESH_STAR_SYSTEM,
                keys::PARTICLE_STAR_SYSTEM,
            ]
        );
        assert_eq!(order.len(), 6 + SceneConfig::default().layout.cloud_count);
        assert_eq!(order[6], "cloud0");
    }

    #[test]
    fn test_initial_broadcast_drives_first_regeneration() {
        let mut gpu = CpuContext::new();
        let (mut app, _) = build_scene(&mut gpu, &small_config()).unwrap();
        assert!(app.changes().is_listener_dirty(TERRAIN_LISTENER_ID));

        app.tick(&mut gpu);
        let terrain = app.terrain().unwrap();
        assert_eq!(terrain.state(), SurfaceState::Clean);
        assert_eq!(terrain.height_field().version(), 1);
        assert!(!app.changes().is_dirty());
        assert!(app.draw_list().contains(terrain.tree_drawables()[0]));
    }

    #[test]
    fn test_water_off_shows_every_tree() {
        let mut gpu = CpuContext::new();
        let (mut app, mut bridge) = build_scene(&mut gpu, &small_config()).unwrap();
        app.tick(&mut gpu);

        bridge.apply(&mut app, &mut gpu, SceneEvent::WaterToggled(false));
        assert!(!app.has_component(keys::WATER));
        let terrain = app.terrain().unwrap();
        assert_eq!(terrain.foliage().visible_count(), terrain.foliage().entities().len());

        bridge.apply(&mut app, &mut gpu, SceneEvent::WaterToggled(true));
        assert!(app.has_component(keys::WATER));
    }

    #[test]
    fn test_layout_wider_than_readback_fails_build() {
        let mut config = small_config();
        config.terrain.pixel_layout = PixelLayout::new(2, 0).unwrap();
        assert!(config.validate().is_ok());

        let mut gpu = CpuContext::new();
        assert!(matches!(
            build_scene(&mut gpu, &config),
            Err(RenderTargetError::LayoutMismatch {
                layout: 2,
                context: 4
            })
        ));
    }

    #[test]
    fn test_moving_sun_writes_light_position() {
        let mut gpu = CpuContext::new();
        let (mut app, mut bridge) = build_scene(&mut gpu, &small_config()).unwrap();
        let before = app.uniforms().vec3(names::SUN_LIGHT_POS).unwrap();

        app.tick(&mut gpu);
        assert_eq!(app.uniforms().vec3(names::SUN_LIGHT_POS), Some(before));

        bridge.apply(&mut app, &mut gpu, SceneEvent::MovingSunToggled(true));
        app.tick(&mut gpu);
        let after = app.uniforms().vec3(names::SUN_LIGHT_POS).unwrap();
        assert_ne!(after, before);
        assert!((after.length() - before.length()).abs() < 1e-2);
        assert_eq!(app.get_component::<Sun>(keys::SUN).unwrap().position(), after);
    }
}
