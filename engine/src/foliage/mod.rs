//! Foliage Module
//!
//! Tree placement on top of the terrain height query.

pub mod placement;
pub mod scatter;

pub use placement::{FoliagePlacement, HeightQuery, PlacementDone, TREE_GROUND_OFFSET, TreeEntity};
pub use scatter::{ScatterGenerator, XorShift32};
