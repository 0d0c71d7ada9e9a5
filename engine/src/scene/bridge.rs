//! State Bridge
//!
//! Turns discrete UI events into uniform writes, change broadcasts and
//! component add/remove. Components toggled off are parked here and
//! re-attached when toggled back on.

use std::collections::HashMap;

use super::app::{AppScene, keys};
use super::component::SceneComponent;
use super::sun::Sun;
use crate::render::GpuContext;
use crate::uniforms::{UniformValue, names};

/// One of the four hill values that shape the terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HillParameter {
    BumpHeight,
    Height,
    HillFactor,
    Spikyness,
}

impl HillParameter {
    pub const ALL: [HillParameter; 4] = [
        HillParameter::BumpHeight,
        HillParameter::Height,
        HillParameter::HillFactor,
        HillParameter::Spikyness,
    ];

    /// Uniform written when this value changes.
    pub fn uniform_name(self) -> &'static str {
        match self {
            HillParameter::BumpHeight => names::BUMP_HEIGHT,
            HillParameter::Height => names::HEIGHT,
            HillParameter::HillFactor => names::HILL_FACTOR,
            HillParameter::Spikyness => names::SPIKYNESS,
        }
    }
}

/// A discrete change coming from the UI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SceneEvent {
    HillValueChanged(HillParameter, f32),
    WaterToggled(bool),
    GroundEnvToggled(bool),
    MovingSunToggled(bool),
    Spawned,
}

#[derive(Default)]
pub struct StateBridge {
    parked: HashMap<&'static str, Box<dyn SceneComponent>>,
}

impl StateBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `component` off-scene until its toggle turns on.
    pub fn park(&mut self, key: &'static str, component: Box<dyn SceneComponent>) {
        self.parked.insert(key, component);
    }

    pub fn is_parked(&self, key: &str) -> bool {
        self.parked.contains_key(key)
    }

    /// Mark the hill values changed so every terrain listener reacts to the
    /// current values.
    pub fn broadcast_initial(&self, app: &mut AppScene) {
        app.changes_mut().broadcast_change();
    }

    /// Current value of a hill parameter.
    pub fn hill_value(&self, app: &AppScene, parameter: HillParameter) -> Option<f32> {
        app.uniforms().float(parameter.uniform_name())
    }

    pub fn apply(&mut self, app: &mut AppScene, gpu: &mut dyn GpuContext, event: SceneEvent) {
        log::debug!("[StateBridge] {event:?}");
        match event {
            SceneEvent::HillValueChanged(parameter, value) => {
                let name = parameter.uniform_name();
                match app.uniforms_mut().set(name, UniformValue::Float(value)) {
                    Ok(()) => app.changes_mut().broadcast_change(),
                    Err(err) => log::error!("[StateBridge] {err}"),
                }
            }
            SceneEvent::WaterToggled(on) => {
                self.toggle(app, keys::WATER, on);
                match app.terrain_mut() {
                    Some(terrain) => terrain.set_water_active(gpu, on),
                    None => log::warn!("[StateBridge] water toggled without a terrain"),
                }
            }
            SceneEvent::GroundEnvToggled(on) => self.toggle(app, keys::GROUND_ENV, on),
            SceneEvent::MovingSunToggled(on) => match app.get_component_mut::<Sun>(keys::SUN) {
                Some(sun) => sun.set_moving(on),
                None => log::warn!("[StateBridge] no sun to move"),
            },
            SceneEvent::Spawned => app.switch_to_player_view(),
        }
    }

    fn toggle(&mut self, app: &mut AppScene, key: &'static str, on: bool) {
        if on {
            if app.has_component(key) {
                return;
            }
            match self.parked.remove(key) {
                Some(component) => app.add_component(key, component),
                None => log::warn!("[StateBridge] nothing parked under `{key}`"),
            }
        } else if let Some(component) = app.remove_component(key) {
            self.parked.insert(key, component);
        }
    }
}
