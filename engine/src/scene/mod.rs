//! Scene Module
//!
//! The hills scene around the terrain pipeline: the component registry and
//! frame tick, the UI bridge, the sun and the decorative objects.

pub mod app;
pub mod bridge;
pub mod component;
pub mod objects;
pub mod setup;
pub mod sun;

pub use app::{AppScene, PLAYER_VIEW_FRAME, TIME_STEP, keys};
pub use bridge::{HillParameter, SceneEvent, StateBridge};
pub use component::{FrameContext, SceneComponent, StaticMeshes};
pub use objects::ScenePrograms;
pub use setup::build_scene;
pub use sun::Sun;
