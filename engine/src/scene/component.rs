//! Scene Components
//!
//! Everything the scene holds (sun, terrain, water, stars, clouds) is a
//! [`SceneComponent`]: it owns its drawables, adds them to and removes them
//! from the scene graph, and gets one `update` per frame.

use std::any::Any;

use crate::render::{DrawableHandle, GpuContext, SceneGraph};
use crate::uniforms::{ChangeBroadcaster, UniformStore};

/// What a component can touch during one frame.
pub struct FrameContext<'a> {
    pub gpu: &'a mut dyn GpuContext,
    pub scene: &'a mut dyn SceneGraph,
    pub uniforms: &'a mut UniformStore,
    pub changes: &'a mut ChangeBroadcaster,
    /// 1 on the first frame.
    pub frame: u64,
}

/// One object in the scene.
pub trait SceneComponent: Any {
    /// Per-frame tick. Runs to completion.
    fn update(&mut self, frame: &mut FrameContext<'_>);

    /// Add this component's drawables to `scene`.
    fn attach_to(&mut self, scene: &mut dyn SceneGraph);

    /// Remove this component's drawables from `scene`.
    fn detach_from(&mut self, scene: &mut dyn SceneGraph);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ============================================================================
// MESH COMPONENT
// ============================================================================

/// A fixed set of drawables that never changes after creation.
///
/// Water, the container ground and the star systems are all this shape.
pub struct StaticMeshes {
    label: &'static str,
    drawables: Vec<DrawableHandle>,
}

impl StaticMeshes {
    pub fn new(label: &'static str, drawables: Vec<DrawableHandle>) -> Self {
        Self { label, drawables }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn drawables(&self) -> &[DrawableHandle] {
        &self.drawables
    }
}

impl SceneComponent for StaticMeshes {
    fn update(&mut self, _frame: &mut FrameContext<'_>) {}

    fn attach_to(&mut self, scene: &mut dyn SceneGraph) {
        for drawable in &self.drawables {
            scene.add_drawable(*drawable);
        }
    }

    fn detach_from(&mut self, scene: &mut dyn SceneGraph) {
        for drawable in &self.drawables {
            scene.remove_drawable(*drawable);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
