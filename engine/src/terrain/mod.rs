//! Terrain Module
//!
//! The height-field pipeline: the displacement function, the cached CPU
//! height field and the terrain surface that keeps both in step with the
//! hill values.

pub mod displacement;
pub mod height_field;
pub mod surface;

pub use displacement::{HillValues, displacement, height_from_store};
pub use height_field::{HeightField, HeightSampler, NO_HEIGHT};
pub use surface::{HeightFieldSlot, SurfaceState, TERRAIN_LISTENER_ID, TerrainSurface};
