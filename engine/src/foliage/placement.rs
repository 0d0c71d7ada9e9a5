//! Foliage Placement
//!
//! Places trees on the terrain through a height query and keeps them on the
//! ground as the terrain regenerates. Trees below the sea level are hidden
//! while water is shown.

use glam::{Vec2, Vec3};

use crate::terrain::NO_HEIGHT;

/// Tree base is raised this far above the queried ground height.
pub const TREE_GROUND_OFFSET: f32 = 5.0;

/// Height lookup the placement is built on; returns [`NO_HEIGHT`] off the field.
pub type HeightQuery = Box<dyn Fn(f32, f32) -> f32>;

/// Called once with every placed entity when `place_all` finishes.
pub type PlacementDone = Box<dyn FnMut(&[TreeEntity])>;

/// One placed tree. `position.z` is the raw ground height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeEntity {
    pub position: Vec3,
    pub visible: bool,
}

impl TreeEntity {
    /// Where the tree mesh goes: ground height plus [`TREE_GROUND_OFFSET`].
    pub fn render_position(&self) -> Vec3 {
        self.position + Vec3::Z * TREE_GROUND_OFFSET
    }
}

/// Tree placement driven by a height query.
pub struct FoliagePlacement {
    query: HeightQuery,
    on_done: PlacementDone,
    entities: Vec<TreeEntity>,
    sea_level: f32,
}

impl FoliagePlacement {
    pub fn new(query: HeightQuery, on_done: PlacementDone, sea_level: f32) -> Self {
        Self {
            query,
            on_done,
            entities: Vec::new(),
            sea_level,
        }
    }

    /// Replace all entities with up to `n` trees, one per candidate, in
    /// candidate order. Candidates off the height field are skipped.
    ///
    /// Returns the number placed.
    pub fn place_all(&mut self, n: usize, candidates: impl Iterator<Item = Vec2>) -> usize {
        self.entities.clear();
        let mut skipped = 0;

        for candidate in candidates.take(n) {
            let z = (self.query)(candidate.x, candidate.y);
            if z == NO_HEIGHT {
                skipped += 1;
                continue;
            }
            self.entities.push(TreeEntity {
                position: Vec3::new(candidate.x, candidate.y, z),
                visible: true,
            });
        }

        if skipped > 0 {
            log::warn!(
                "[FoliagePlacement] skipped {} candidates outside the height field",
                skipped
            );
        }
        log::info!("[FoliagePlacement] placed {} trees", self.entities.len());
        (self.on_done)(&self.entities);
        self.entities.len()
    }

    /// Re-query every tree's height. With `sea_level_active`, trees under
    /// the sea level are hidden; otherwise every tree is shown.
    pub fn update_positions(&mut self, sea_level_active: bool) {
        for entity in &mut self.entities {
            let z = (self.query)(entity.position.x, entity.position.y);
            if z != NO_HEIGHT {
                entity.position.z = z;
            }
        }

        if sea_level_active {
            self.hide_all_below_sea_level();
        } else {
            self.show_all();
        }
    }

    /// Hide trees whose ground is under the sea level, show the rest.
    pub fn hide_all_below_sea_level(&mut self) {
        let sea_level = self.sea_level;
        for entity in &mut self.entities {
            entity.visible = entity.position.z >= sea_level;
        }
    }

    pub fn show_all(&mut self) {
        for entity in &mut self.entities {
            entity.visible = true;
        }
    }

    pub fn has_entities(&self) -> bool {
        !self.entities.is_empty()
    }

    pub fn entities(&self) -> &[TreeEntity] {
        &self.entities
    }

    pub fn visible_count(&self) -> usize {
        self.entities.iter().filter(|e| e.visible).count()
    }

    pub fn sea_level(&self) -> f32 {
        self.sea_level
    }
}
