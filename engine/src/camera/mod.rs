//! Camera Module
//!
//! Camera state and math for the hills scene. Window-system agnostic.

pub mod controller;

pub use controller::{
    CameraMode, ORBIT_START_POSITION, PLAYER_EYE_HEIGHT, PLAYER_START_POSITION, SceneCamera,
};
