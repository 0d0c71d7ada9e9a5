//! App Scene
//!
//! Owns the uniform store, the change broadcaster, the draw list, the camera
//! and the keyed component registry, and runs the per-frame tick.

use crate::camera::{CameraMode, SceneCamera};
use crate::render::{DrawList, GpuContext};
use crate::terrain::TerrainSurface;
use crate::uniforms::{ChangeBroadcaster, UniformStore};

use super::component::{FrameContext, SceneComponent};

/// `u_time` advance per frame.
pub const TIME_STEP: f32 = 0.05;

/// Frame on which the camera switches to the player view.
pub const PLAYER_VIEW_FRAME: u64 = 120;

/// Registry keys for the scene's components.
pub mod keys {
    pub const SUN: &str = "sun";
    pub const TERRAIN: &str = "mainPlane";
    pub const WATER: &str = "water";
    pub const GROUND_ENV: &str = "groundEnv";
    pub const MESH_STAR_SYSTEM: &str = "meshStarSystem";
    pub const PARTICLE_STAR_SYSTEM: &str = "particleStarSystem";
    /// Clouds are keyed `cloud0`, `cloud1`, ...
    pub const CLOUD_PREFIX: &str = "cloud";

    pub fn cloud(index: usize) -> String {
        format!("{CLOUD_PREFIX}{index}")
    }
}

pub struct AppScene {
    components: Vec<(String, Box<dyn SceneComponent>)>,
    draw_list: DrawList,
    uniforms: UniformStore,
    changes: ChangeBroadcaster,
    camera: SceneCamera,
    frame: u64,
}

impl AppScene {
    pub fn new(uniforms: UniformStore, camera: SceneCamera) -> Self {
        Self {
            components: Vec::new(),
            draw_list: DrawList::new(),
            uniforms,
            changes: ChangeBroadcaster::new(),
            camera,
            frame: 0,
        }
    }

    /// Attach `component` and store it under `key`. A component already
    /// under `key` is detached and replaced in place.
    pub fn add_component(&mut self, key: &str, mut component: Box<dyn SceneComponent>) {
        component.attach_to(&mut self.draw_list);
        match self.components.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => {
                log::warn!("[AppScene] replacing component `{key}`");
                slot.detach_from(&mut self.draw_list);
                *slot = component;
            }
            None => self.components.push((key.to_string(), component)),
        }
    }

    /// Detach and return the component under `key`.
    pub fn remove_component(&mut self, key: &str) -> Option<Box<dyn SceneComponent>> {
        let index = self.components.iter().position(|(k, _)| k == key)?;
        let (_, mut component) = self.components.remove(index);
        component.detach_from(&mut self.draw_list);
        Some(component)
    }

    pub fn has_component(&self, key: &str) -> bool {
        self.components.iter().any(|(k, _)| k == key)
    }

    pub fn get_component<T: SceneComponent>(&self, key: &str) -> Option<&T> {
        self.components
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, c)| c.as_any().downcast_ref::<T>())
    }

    pub fn get_component_mut<T: SceneComponent>(&mut self, key: &str) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find(|(k, _)| k == key)
            .and_then(|(_, c)| c.as_any_mut().downcast_mut::<T>())
    }

    /// Keys in insertion order.
    pub fn component_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.iter().map(|(k, _)| k.as_str())
    }

    /// One frame: advance time, update every component in insertion order,
    /// then move the camera.
    pub fn tick(&mut self, gpu: &mut dyn GpuContext) {
        self.frame += 1;
        self.uniforms.advance_time(TIME_STEP);

        let mut frame = FrameContext {
            gpu,
            scene: &mut self.draw_list,
            uniforms: &mut self.uniforms,
            changes: &mut self.changes,
            frame: self.frame,
        };
        for (_, component) in &mut self.components {
            component.update(&mut frame);
        }

        if self.frame == PLAYER_VIEW_FRAME {
            self.camera.enter_player_view();
        }
        if self.camera.mode() == CameraMode::Player {
            let terrain = self
                .components
                .iter()
                .find(|(k, _)| k == keys::TERRAIN)
                .and_then(|(_, c)| c.as_any().downcast_ref::<TerrainSurface>());
            if let Some(terrain) = terrain {
                self.camera.follow_terrain(terrain);
            }
        }
    }

    /// Track a new drawable surface size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.uniforms.set_resolution(width, height);
        self.camera.set_viewport(width, height);
    }

    pub fn switch_to_player_view(&mut self) {
        self.camera.enter_player_view();
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    pub fn uniforms(&self) -> &UniformStore {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformStore {
        &mut self.uniforms
    }

    pub fn changes(&self) -> &ChangeBroadcaster {
        &self.changes
    }

    pub fn changes_mut(&mut self) -> &mut ChangeBroadcaster {
        &mut self.changes
    }

    pub fn camera(&self) -> &SceneCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut SceneCamera {
        &mut self.camera
    }

    /// Terrain, when present.
    pub fn terrain(&self) -> Option<&TerrainSurface> {
        self.get_component(keys::TERRAIN)
    }

    pub fn terrain_mut(&mut self) -> Option<&mut TerrainSurface> {
        self.get_component_mut(keys::TERRAIN)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::render::{CpuContext, DrawableHandle, SceneGraph};
    use crate::uniforms::names;

    /// Records its updates in a shared log.
    struct Probe {
        name: &'static str,
        drawable: DrawableHandle,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl SceneComponent for Probe {
        fn update(&mut self, _frame: &mut FrameContext<'_>) {
            self.log.borrow_mut().push(self.name);
        }

        fn attach_to(&mut self, scene: &mut dyn SceneGraph) {
            scene.add_drawable(self.drawable);
        }

        fn detach_from(&mut self, scene: &mut dyn SceneGraph) {
            scene.remove_drawable(self.drawable);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn probe(name: &'static str, id: u32, log: &Rc<RefCell<Vec<&'static str>>>) -> Box<Probe> {
        Box::new(Probe {
            name,
            drawable: DrawableHandle(id),
            log: Rc::clone(log),
        })
    }

    fn app() -> AppScene {
        AppScene::new(UniformStore::with_defaults(), SceneCamera::new(1.0))
    }

    #[test]
    fn test_components_update_in_insertion_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut app = app();
        app.add_component("b", probe("b", 1, &log));
        app.add_component("a", probe("a", 2, &log));
        app.add_component("c", probe("c", 3, &log));

        app.tick(&mut CpuContext::new());
        assert_eq!(*log.borrow(), vec!["b", "a", "c"]);
        assert_eq!(app.component_keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_add_and_remove_touch_the_draw_list() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut app = app();
        app.add_component("water", probe("water", 7, &log));
        assert!(app.draw_list().contains(DrawableHandle(7)));

        let removed = app.remove_component("water");
        assert!(removed.is_some());
        assert!(!app.draw_list().contains(DrawableHandle(7)));
        assert!(!app.has_component("water"));
        assert!(app.remove_component("water").is_none());
    }

    #[test]
    fn test_replacing_a_key_detaches_the_old_component() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut app = app();
        app.add_component("x", probe("old", 1, &log));
        app.add_component("x", probe("new", 2, &log));

        assert!(!app.draw_list().contains(DrawableHandle(1)));
        assert!(app.draw_list().contains(DrawableHandle(2)));
        assert_eq!(app.get_component::<Probe>("x").map(|p| p.name), Some("new"));
    }

    #[test]
    fn test_get_component_wrong_type_is_none() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut app = app();
        app.add_component(keys::TERRAIN, probe("t", 1, &log));
        assert!(app.terrain().is_none());
        assert!(app.get_component::<Probe>(keys::TERRAIN).is_some());
    }

    #[test]
    fn test_tick_advances_time_and_switches_view() {
        let mut app = app();
        let mut gpu = CpuContext::new();
        let start = app.uniforms().float(names::TIME).unwrap();

        for _ in 0..PLAYER_VIEW_FRAME - 1 {
            app.tick(&mut gpu);
        }
        assert_eq!(app.camera().mode(), CameraMode::Orbit);

        app.tick(&mut gpu);
        assert_eq!(app.frame(), PLAYER_VIEW_FRAME);
        assert_eq!(app.camera().mode(), CameraMode::Player);
        let time = app.uniforms().float(names::TIME).unwrap();
        assert!((time - start - TIME_STEP * PLAYER_VIEW_FRAME as f32).abs() < 1e-3);
    }

    #[test]
    fn test_resize_updates_resolution() {
        let mut app = app();
        app.resize(800, 400);
        assert_eq!(
            app.uniforms().vec2(names::RESOLUTION),
            Some(glam::Vec2::new(800.0, 400.0))
        );
        assert_eq!(app.camera().aspect, 2.0);
    }
}
