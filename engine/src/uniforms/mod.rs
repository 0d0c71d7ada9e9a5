//! Uniforms Module
//!
//! Shared animation/shading parameters and the change tracking that tells
//! terrain consumers when the hill values moved.

pub mod change_broadcaster;
pub mod store;

pub use change_broadcaster::{ChangeBroadcaster, ListenerState};
pub use store::{DEFAULT_SUN_POSITION, UniformKind, UniformStore, UniformValue, names};
