//! Terrain Surface
//!
//! Owns the offscreen height renderer, the cached CPU height field and the
//! visible terrain mesh, and keeps the trees on the ground.
//!
//! Per frame the surface checks its listener on the [`ChangeBroadcaster`].
//! When the hill values moved it regenerates:
//!
//! 1. run the displacement pass
//! 2. swap in the new height field
//! 3. point `u_heightMap` at the new texture
//! 4. acknowledge the change
//! 5. move the trees onto the new ground
//!
//! A failed pass keeps the previous field and texture, skips the
//! acknowledgment and leaves the surface `Dirty`, so the next frame tries
//! again.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::Mat4;

use super::height_field::{HeightField, HeightSampler};
use crate::config::{FoliageConfig, TerrainConfig};
use crate::error::{OutOfRangeQueryError, RenderTargetError};
use crate::foliage::{FoliagePlacement, ScatterGenerator};
use crate::render::shader_loader::definitions;
use crate::render::{
    BASIC_PROGRAM, DrawableHandle, Geometry, GpuContext, OffscreenHeightRenderer, ProgramHandle,
    SceneGraph, ShaderDefinition, TERRAIN_PROGRAM,
};
use crate::scene::{FrameContext, SceneComponent};
use crate::uniforms::{ChangeBroadcaster, UniformStore, UniformValue, names};

/// Listener id the surface registers with the change broadcaster.
pub const TERRAIN_LISTENER_ID: &str = "terrain_surface";

const TREE_COLOR: [f32; 4] = [0.13, 0.32, 0.12, 1.0];
const TREE_SEGMENTS: u32 = 8;

/// Shared, swappable handle to the current height field.
pub type HeightFieldSlot = Rc<RefCell<Arc<HeightField>>>;

/// Where the surface is in its regeneration cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    /// Height field matches the current hill values.
    Clean,
    /// Hill values changed and the height field has not caught up.
    Dirty,
    /// A pass is in flight.
    Regenerating,
}

/// The animated terrain plane.
pub struct TerrainSurface {
    renderer: OffscreenHeightRenderer,
    field: HeightFieldSlot,
    state: SurfaceState,
    mesh: DrawableHandle,
    tree_program: ProgramHandle,
    tree_geometry: Geometry,
    trees: Vec<DrawableHandle>,
    foliage: FoliagePlacement,
    scatter: ScatterGenerator,
    tree_count: usize,
    water_active: bool,
    attached: bool,
}

impl TerrainSurface {
    /// Compile the terrain programs, allocate the height targets and build
    /// the plane mesh. Registers [`TERRAIN_LISTENER_ID`] with `changes`.
    ///
    /// The height field stays empty until the first change is processed.
    pub fn new(
        ctx: &mut dyn GpuContext,
        changes: &mut ChangeBroadcaster,
        terrain: &TerrainConfig,
        foliage: &FoliageConfig,
    ) -> Result<Self, RenderTargetError> {
        let layout = terrain.pixel_layout;
        let renderer = OffscreenHeightRenderer::with_displacement_program(
            ctx,
            terrain.width,
            terrain.height,
            layout,
        )?;

        let surface_program = ctx.compile_program(
            TERRAIN_PROGRAM.label,
            TERRAIN_PROGRAM.vertex,
            TERRAIN_PROGRAM.fragment,
            &layout.definitions(),
        )?;
        let mesh = ctx.create_mesh(
            &Geometry::Plane {
                width: terrain.width as f32,
                height: terrain.height as f32,
                width_segments: terrain.width_segments,
                height_segments: terrain.height_segments,
            },
            surface_program,
        )?;

        let tree_program = ctx.compile_program(
            BASIC_PROGRAM.label,
            BASIC_PROGRAM.vertex,
            BASIC_PROGRAM.fragment,
            &[ShaderDefinition::new(definitions::EMISSIVE, 0.0)],
        )?;

        let field: HeightFieldSlot = Rc::new(RefCell::new(Arc::new(HeightField::empty(
            terrain.width,
            terrain.height,
            layout,
        ))));
        let query_slot = Rc::clone(&field);
        let placement = FoliagePlacement::new(
            Box::new(move |x, y| query_slot.borrow().query(x, y)),
            Box::new(|entities| {
                log::info!("[TerrainSurface] {} trees ready", entities.len());
            }),
            foliage.sea_level,
        );

        changes.register_listener(TERRAIN_LISTENER_ID);

        Ok(Self {
            renderer,
            field,
            state: SurfaceState::Clean,
            mesh,
            tree_program,
            tree_geometry: Geometry::Cone {
                radius: foliage.tree_radius,
                height: foliage.tree_height,
                segments: TREE_SEGMENTS,
            },
            trees: Vec::new(),
            foliage: placement,
            scatter: ScatterGenerator::new(
                foliage.seed,
                terrain.width as f32,
                terrain.height as f32,
                foliage.margin,
            ),
            tree_count: foliage.tree_count,
            water_active: false,
            attached: false,
        })
    }

    /// Advance one frame. Regenerates when the hill values changed since
    /// this surface last caught up.
    pub fn update(
        &mut self,
        ctx: &mut dyn GpuContext,
        scene: &mut dyn SceneGraph,
        store: &mut UniformStore,
        changes: &mut ChangeBroadcaster,
    ) -> SurfaceState {
        if !changes.is_listener_dirty(TERRAIN_LISTENER_ID) {
            self.state = SurfaceState::Clean;
            return self.state;
        }

        self.state = SurfaceState::Regenerating;
        if let Err(err) = self.renderer.render_pass(ctx, store) {
            log::error!(
                "[TerrainSurface] height pass failed, keeping pass {}: {err}",
                self.renderer.pass_count()
            );
            self.state = SurfaceState::Dirty;
            return self.state;
        }

        let field = HeightField::new(
            self.renderer.width(),
            self.renderer.height(),
            self.renderer.layout(),
            Arc::clone(self.renderer.pixel_data()),
            self.renderer.pass_count(),
        );
        *self.field.borrow_mut() = Arc::new(field);

        if let Some(texture) = self.renderer.texture() {
            if let Err(err) = store.set(names::HEIGHT_MAP, UniformValue::Texture(Some(texture))) {
                log::error!("[TerrainSurface] {err}");
            }
        }

        if let Ok(true) = changes.acknowledge(TERRAIN_LISTENER_ID) {
            log::debug!("[TerrainSurface] every listener caught up");
        }

        self.refresh_foliage(ctx, scene);
        self.state = SurfaceState::Clean;
        log::info!(
            "[TerrainSurface] regenerated height field (pass {})",
            self.renderer.pass_count()
        );
        self.state
    }

    /// Raw ground height at world `(x, y)`. Out-of-range queries are logged
    /// and return [`NO_HEIGHT`](super::NO_HEIGHT).
    pub fn query_height(&self, x: f32, y: f32) -> f32 {
        self.field.borrow().query(x, y)
    }

    pub fn try_query_height(&self, x: f32, y: f32) -> Result<f32, OutOfRangeQueryError> {
        self.field.borrow().try_query(x, y)
    }

    /// Current height field snapshot.
    pub fn height_field(&self) -> Arc<HeightField> {
        Arc::clone(&self.field.borrow())
    }

    /// Shared slot that always holds the current height field.
    pub fn height_field_slot(&self) -> HeightFieldSlot {
        Rc::clone(&self.field)
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn renderer(&self) -> &OffscreenHeightRenderer {
        &self.renderer
    }

    pub fn foliage(&self) -> &FoliagePlacement {
        &self.foliage
    }

    pub fn mesh(&self) -> DrawableHandle {
        self.mesh
    }

    pub fn tree_drawables(&self) -> &[DrawableHandle] {
        &self.trees
    }

    pub fn water_active(&self) -> bool {
        self.water_active
    }

    /// Water shown: hide trees under the sea level. Water hidden: show all.
    pub fn set_water_active(&mut self, ctx: &mut dyn GpuContext, active: bool) {
        self.water_active = active;
        if active {
            self.foliage.hide_all_below_sea_level();
        } else {
            self.foliage.show_all();
        }
        self.sync_trees(ctx, None);
    }

    /// Add the plane and every tree to `scene`.
    pub fn attach_to(&mut self, scene: &mut dyn SceneGraph) {
        scene.add_drawable(self.mesh);
        for tree in &self.trees {
            scene.add_drawable(*tree);
        }
        self.attached = true;
    }

    pub fn detach_from(&mut self, scene: &mut dyn SceneGraph) {
        scene.remove_drawable(self.mesh);
        for tree in &self.trees {
            scene.remove_drawable(*tree);
        }
        self.attached = false;
    }

    fn refresh_foliage(&mut self, ctx: &mut dyn GpuContext, scene: &mut dyn SceneGraph) {
        if self.foliage.has_entities() {
            self.foliage.update_positions(self.water_active);
        } else {
            self.foliage.place_all(self.tree_count, &mut self.scatter);
            if self.water_active {
                self.foliage.hide_all_below_sea_level();
            }
        }
        self.sync_trees(ctx, Some(scene));
    }

    /// Mirror entity positions and visibility onto the tree drawables,
    /// creating drawables for new entities.
    fn sync_trees(&mut self, ctx: &mut dyn GpuContext, mut scene: Option<&mut dyn SceneGraph>) {
        let entities = self.foliage.entities();

        while self.trees.len() < entities.len() {
            let tree = match ctx.create_mesh(&self.tree_geometry, self.tree_program) {
                Ok(tree) => tree,
                Err(err) => {
                    log::error!("[TerrainSurface] failed to create tree mesh: {err}");
                    break;
                }
            };
            ctx.set_color(tree, TREE_COLOR);
            if self.attached {
                if let Some(scene) = scene.as_deref_mut() {
                    scene.add_drawable(tree);
                }
            }
            self.trees.push(tree);
        }

        for (i, tree) in self.trees.iter().enumerate() {
            match entities.get(i) {
                Some(entity) => {
                    ctx.set_transform(*tree, Mat4::from_translation(entity.render_position()));
                    ctx.set_visible(*tree, entity.visible);
                }
                None => ctx.set_visible(*tree, false),
            }
        }
    }
}

impl HeightSampler for TerrainSurface {
    fn sample_height(&self, x: f32, y: f32) -> f32 {
        self.query_height(x, y)
    }
}

impl SceneComponent for TerrainSurface {
    fn update(&mut self, frame: &mut FrameContext<'_>) {
        TerrainSurface::update(self, frame.gpu, frame.scene, frame.uniforms, frame.changes);
    }

    fn attach_to(&mut self, scene: &mut dyn SceneGraph) {
        TerrainSurface::attach_to(self, scene);
    }

    fn detach_from(&mut self, scene: &mut dyn SceneGraph) {
        TerrainSurface::detach_from(self, scene);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::render::{CpuContext, DrawList, PixelLayout, TextureHandle};
    use crate::terrain::NO_HEIGHT;

    /// Ground rises one unit per unit of x.
    fn slope(_: &UniformStore, p: Vec2) -> f32 {
        p.x
    }

    fn small_configs() -> (TerrainConfig, FoliageConfig) {
        let terrain = TerrainConfig {
            width: 32,
            height: 32,
            width_segments: 4,
            height_segments: 4,
            ..TerrainConfig::default()
        };
        let foliage = FoliageConfig {
            tree_count: 10,
            sea_level: 0.0,
            margin: 2.0,
            ..FoliageConfig::default()
        };
        (terrain, foliage)
    }

    struct Rig {
        ctx: CpuContext,
        scene: DrawList,
        store: UniformStore,
        changes: ChangeBroadcaster,
        surface: TerrainSurface,
    }

    fn rig(ctx: CpuContext) -> Rig {
        let (terrain, foliage) = small_configs();
        let mut ctx = ctx;
        let mut changes = ChangeBroadcaster::new();
        let mut scene = DrawList::new();
        let mut surface = TerrainSurface::new(&mut ctx, &mut changes, &terrain, &foliage).unwrap();
        surface.attach_to(&mut scene);
        Rig {
            ctx,
            scene,
            store: UniformStore::with_defaults(),
            changes,
            surface,
        }
    }

    impl Rig {
        fn update(&mut self) -> SurfaceState {
            self.surface.update(
                &mut self.ctx,
                &mut self.scene,
                &mut self.store,
                &mut self.changes,
            )
        }
    }

    #[test]
    fn test_new_surface_is_clean_and_empty() {
        let r = rig(CpuContext::new().with_kernel(slope));
        assert_eq!(r.surface.state(), SurfaceState::Clean);
        assert!(r.surface.height_field().is_empty());
        assert_eq!(r.surface.query_height(0.0, 0.0), NO_HEIGHT);
        assert_eq!(r.changes.listener_count(), 1);
        assert!(r.scene.contains(r.surface.mesh()));
    }

    #[test]
    fn test_no_change_means_no_pass() {
        let mut r = rig(CpuContext::new().with_kernel(slope));
        assert_eq!(r.update(), SurfaceState::Clean);
        assert_eq!(r.ctx.draw_calls(), 0);
        assert_eq!(r.surface.renderer().pass_count(), 0);
    }

    #[test]
    fn test_change_regenerates_field_and_places_trees() {
        let mut r = rig(CpuContext::new().with_kernel(slope));
        r.changes.broadcast_change();

        assert_eq!(r.update(), SurfaceState::Clean);
        assert!(!r.changes.is_listener_dirty(TERRAIN_LISTENER_ID));
        assert_eq!(r.surface.height_field().version(), 1);
        assert_eq!(r.surface.query_height(3.0, -7.0), 3.0);
        assert_eq!(r.surface.try_query_height(-16.0, -16.0), Ok(-16.0));
        assert!(r.surface.try_query_height(16.0, 0.0).is_err());
        assert!(r.store.texture(names::HEIGHT_MAP).is_some());

        let trees = r.surface.tree_drawables().to_vec();
        assert_eq!(trees.len(), r.surface.foliage().entities().len());
        assert_eq!(trees.len(), 10);
        for (tree, entity) in trees.iter().zip(r.surface.foliage().entities()) {
            assert!(r.scene.contains(*tree));
            let drawable = r.ctx.drawable(*tree).unwrap();
            assert_eq!(
                drawable.transform.w_axis.truncate(),
                entity.render_position()
            );
            assert_eq!(entity.position.z, entity.position.x.floor());
        }

        // Nothing changed since: the next frame is free
        r.update();
        assert_eq!(r.ctx.draw_calls(), 1);
    }

    #[test]
    fn test_height_map_uniform_follows_published_target() {
        let mut r = rig(CpuContext::new().with_kernel(slope));
        r.changes.broadcast_change();
        r.update();
        let first = r.store.texture(names::HEIGHT_MAP);
        assert_eq!(first, r.surface.renderer().texture());

        r.changes.broadcast_change();
        r.update();
        let second = r.store.texture(names::HEIGHT_MAP);
        assert_eq!(second, r.surface.renderer().texture());
        assert_ne!(first, second);
        assert!(matches!(second, Some(TextureHandle(_))));
    }

    #[test]
    fn test_height_map_is_never_declared_by_the_surface() {
        let mut r = rig(CpuContext::new().with_kernel(slope));
        r.store = UniformStore::new();
        r.changes.broadcast_change();

        assert_eq!(r.update(), SurfaceState::Clean);
        assert_eq!(r.store.get(names::HEIGHT_MAP), None);
        assert_eq!(r.surface.height_field().version(), 1);
    }

    #[test]
    fn test_water_toggle_hides_low_trees() {
        let mut r = rig(CpuContext::new().with_kernel(slope));
        r.changes.broadcast_change();
        r.update();

        r.surface.set_water_active(&mut r.ctx, true);
        for (tree, entity) in r
            .surface
            .tree_drawables()
            .iter()
            .zip(r.surface.foliage().entities())
        {
            let visible = r.ctx.drawable(*tree).unwrap().visible;
            assert_eq!(visible, entity.position.z >= 0.0);
        }

        r.surface.set_water_active(&mut r.ctx, false);
        assert!(
            r.surface
                .tree_drawables()
                .iter()
                .all(|t| r.ctx.drawable(*t).unwrap().visible)
        );
    }

    #[test]
    fn test_mismatched_layout_fails_construction() {
        let (mut terrain, foliage) = small_configs();
        terrain.pixel_layout = PixelLayout::new(2, 0).unwrap();
        let mut ctx = CpuContext::new().with_kernel(slope);
        let mut changes = ChangeBroadcaster::new();

        let result = TerrainSurface::new(&mut ctx, &mut changes, &terrain, &foliage);
        assert!(matches!(
            result,
            Err(RenderTargetError::LayoutMismatch {
                layout: 2,
                context: 4
            })
        ));
        assert_eq!(changes.listener_count(), 0);
    }

    #[test]
    fn test_failed_pass_stays_dirty() {
        let mut r = rig(CpuContext::new().with_kernel(slope));
        // Every readback is short from here on
        r.ctx = r.ctx.with_channels(1);
        r.changes.broadcast_change();

        assert_eq!(r.update(), SurfaceState::Dirty);
        assert!(r.changes.is_listener_dirty(TERRAIN_LISTENER_ID));
        assert!(r.surface.height_field().is_empty());
        assert!(r.surface.tree_drawables().is_empty());
        assert_eq!(r.store.texture(names::HEIGHT_MAP), None);

        // Retried next frame
        assert_eq!(r.update(), SurfaceState::Dirty);
        assert_eq!(r.ctx.draw_calls(), 2);
    }

    #[test]
    fn test_detach_removes_every_drawable() {
        let mut r = rig(CpuContext::new().with_kernel(slope));
        r.changes.broadcast_change();
        r.update();
        assert_eq!(r.scene.len(), 11);

        r.surface.detach_from(&mut r.scene);
        assert!(r.scene.is_empty());
    }
}
