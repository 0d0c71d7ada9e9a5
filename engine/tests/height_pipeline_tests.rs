//! Height Pipeline Tests
//!
//! End-to-end behaviour of the terrain height field: the change barrier,
//! offscreen pass readback, world-to-pixel queries, fail-stale regeneration
//! and tree placement on the result. Runs on the software GPU context.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Mat4, Vec2};
use hills_engine::config::{FoliageConfig, TerrainConfig};
use hills_engine::error::RenderTargetError;
use hills_engine::foliage::{FoliagePlacement, XorShift32};
use hills_engine::render::{
    CpuContext, DrawList, DrawableHandle, Geometry, GpuContext, OffscreenHeightRenderer,
    PixelLayout, ProgramHandle, ShaderDefinition, TargetHandle, TextureHandle,
};
use hills_engine::terrain::{
    HeightField, NO_HEIGHT, SurfaceState, TERRAIN_LISTENER_ID, TerrainSurface,
};
use hills_engine::uniforms::{ChangeBroadcaster, UniformStore, UniformValue, names};

// ============================================================================
// HELPERS
// ============================================================================

/// 42 at the world origin, 0 everywhere else.
fn spike_at_origin(_: &UniformStore, p: Vec2) -> f32 {
    if p == Vec2::ZERO { 42.0 } else { 0.0 }
}

/// Height depends on position and on `u_height`, so a hill-value change
/// produces different pixels.
fn scaled_ramp(store: &UniformStore, p: Vec2) -> f32 {
    let scale = store.float(names::HEIGHT).unwrap_or(1.0);
    (p.x + 3.0 * p.y) * scale
}

/// A CPU context whose draws fail while `failing` is set.
struct FlakyContext {
    inner: CpuContext,
    failing: Rc<Cell<bool>>,
}

impl FlakyContext {
    fn new(inner: CpuContext) -> (Self, Rc<Cell<bool>>) {
        let failing = Rc::new(Cell::new(false));
        (
            Self {
                inner,
                failing: Rc::clone(&failing),
            },
            failing,
        )
    }
}

impl GpuContext for FlakyContext {
    fn compile_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
        definitions: &[ShaderDefinition],
    ) -> Result<ProgramHandle, RenderTargetError> {
        self.inner
            .compile_program(label, vertex_source, fragment_source, definitions)
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<TargetHandle, RenderTargetError> {
        self.inner.create_render_target(width, height)
    }

    fn render_to_target(
        &mut self,
        target: TargetHandle,
        program: ProgramHandle,
        uniforms: &UniformStore,
    ) -> Result<(), RenderTargetError> {
        if self.failing.get() {
            return Err(RenderTargetError::Draw("device lost".to_string()));
        }
        self.inner.render_to_target(target, program, uniforms)
    }

    fn read_pixels(&mut self, target: TargetHandle) -> Result<Vec<f32>, RenderTargetError> {
        self.inner.read_pixels(target)
    }

    fn target_texture(&self, target: TargetHandle) -> Result<TextureHandle, RenderTargetError> {
        self.inner.target_texture(target)
    }

    fn create_mesh(
        &mut self,
        geometry: &Geometry,
        program: ProgramHandle,
    ) -> Result<DrawableHandle, RenderTargetError> {
        self.inner.create_mesh(geometry, program)
    }

    fn set_transform(&mut self, drawable: DrawableHandle, transform: Mat4) {
        self.inner.set_transform(drawable, transform);
    }

    fn set_color(&mut self, drawable: DrawableHandle, color: [f32; 4]) {
        self.inner.set_color(drawable, color);
    }

    fn set_visible(&mut self, drawable: DrawableHandle, visible: bool) {
        self.inner.set_visible(drawable, visible);
    }

    fn channels_per_pixel(&self) -> usize {
        self.inner.channels_per_pixel()
    }
}

fn terrain_config(size: u32) -> TerrainConfig {
    TerrainConfig {
        width: size,
        height: size,
        width_segments: 4,
        height_segments: 4,
        ..TerrainConfig::default()
    }
}

fn foliage_config(tree_count: usize, sea_level: f32) -> FoliageConfig {
    FoliageConfig {
        tree_count,
        sea_level,
        margin: 1.0,
        ..FoliageConfig::default()
    }
}

// ============================================================================
// CHANGE BARRIER
// ============================================================================

#[test]
fn test_scenario_b_two_listener_barrier() {
    let mut changes = ChangeBroadcaster::new();
    changes.register_listener("A");
    changes.register_listener("B");

    changes.broadcast_change();
    assert!(changes.is_dirty());

    assert_eq!(changes.acknowledge("A"), Ok(false));
    assert!(changes.is_dirty());

    assert_eq!(changes.acknowledge("B"), Ok(true));
    assert!(!changes.is_dirty());
}

#[test]
fn test_barrier_holds_for_random_sequences() {
    let ids = ["terrain", "foliage", "camera"];
    let mut rng = XorShift32::new(99);

    for _ in 0..50 {
        let mut changes = ChangeBroadcaster::new();
        for id in ids {
            changes.register_listener(id);
        }
        // Model: which listeners still owe an acknowledgment
        let mut pending = [false; 3];

        for _ in 0..40 {
            let was_dirty = changes.is_dirty();
            let roll = rng.next_u32() % 4;
            if roll == 0 {
                changes.broadcast_change();
                pending = [true; 3];
            } else {
                let i = (roll - 1) as usize;
                let cleared = changes.acknowledge(ids[i]).unwrap();
                pending[i] = false;
                // Reports the transition to clean exactly once
                assert_eq!(cleared, was_dirty && !pending.contains(&true));
            }
            assert_eq!(changes.is_dirty(), pending.contains(&true));
        }
    }
}

#[test]
fn test_unknown_acknowledgment_changes_nothing() {
    let mut changes = ChangeBroadcaster::new();
    changes.register_listener("A");
    changes.broadcast_change();

    let err = changes.acknowledge("ghost").unwrap_err();
    assert_eq!(err.0, "ghost");
    assert!(changes.is_dirty());
    assert!(changes.is_listener_dirty("A"));

    changes.acknowledge("A").unwrap();
    assert!(changes.acknowledge("ghost").is_err());
    assert!(!changes.is_dirty());
}

// ============================================================================
// READBACK AND QUERY
// ============================================================================

#[test]
fn test_scenario_a_centre_pixel() {
    let mut ctx = CpuContext::new().with_kernel(spike_at_origin);
    let mut renderer =
        OffscreenHeightRenderer::with_displacement_program(&mut ctx, 100, 100, PixelLayout::default())
            .unwrap();
    renderer.render_pass(&mut ctx, &UniformStore::with_defaults()).unwrap();

    let pixels = renderer.pixel_data();
    assert_eq!(pixels[(50 * 100 + 50) * 4], 42.0);

    let field = HeightField::new(100, 100, renderer.layout(), Arc::clone(pixels), 1);
    assert_eq!(field.query(0.0, 0.0), 42.0);
    assert_eq!(field.query(1.0, 0.0), 0.0);
}

#[test]
fn test_query_reads_the_index_formula() {
    let (w, h) = (40u32, 20u32);
    let mut ctx = CpuContext::new().with_kernel(scaled_ramp);
    let mut renderer =
        OffscreenHeightRenderer::with_displacement_program(&mut ctx, w, h, PixelLayout::default())
            .unwrap();
    renderer.render_pass(&mut ctx, &UniformStore::with_defaults()).unwrap();
    let field = HeightField::new(w, h, renderer.layout(), Arc::clone(renderer.pixel_data()), 1);

    let mut rng = XorShift32::new(5);
    for _ in 0..200 {
        let x = rng.range(-(w as f32) / 2.0, w as f32 / 2.0 - 0.01);
        let y = rng.range(-(h as f32) / 2.0, h as f32 / 2.0 - 0.01);
        let x_idx = (x + w as f32 / 2.0).floor() as usize;
        let y_idx = (y + h as f32 / 2.0).floor() as usize;
        let expected = renderer.pixel_data()[y_idx * w as usize * 4 + x_idx * 4];
        assert_eq!(field.query(x, y), expected, "query ({x}, {y})");
    }
}

#[test]
fn test_boundary_edges_and_one_beyond() {
    let (w, h) = (16u32, 8u32);
    let mut ctx = CpuContext::new().with_kernel(scaled_ramp);
    let mut renderer =
        OffscreenHeightRenderer::with_displacement_program(&mut ctx, w, h, PixelLayout::default())
            .unwrap();
    renderer.render_pass(&mut ctx, &UniformStore::with_defaults()).unwrap();
    let field = HeightField::new(w, h, renderer.layout(), Arc::clone(renderer.pixel_data()), 1);

    let (hw, hh) = (w as f32 / 2.0, h as f32 / 2.0);
    assert_ne!(field.query(-hw, -hh), NO_HEIGHT);
    assert_ne!(field.query(hw - 1.0, hh - 1.0), NO_HEIGHT);

    assert_eq!(field.query(-hw - 1.0, 0.0), NO_HEIGHT);
    assert_eq!(field.query(hw, 0.0), NO_HEIGHT);
    assert_eq!(field.query(0.0, -hh - 1.0), NO_HEIGHT);
    assert_eq!(field.query(0.0, hh), NO_HEIGHT);
}

#[test]
fn test_custom_pixel_layout_end_to_end() {
    let layout = PixelLayout::new(2, 1).unwrap();
    let mut ctx = CpuContext::new().with_channels(2).with_kernel(spike_at_origin);
    let mut renderer =
        OffscreenHeightRenderer::with_displacement_program(&mut ctx, 10, 10, layout).unwrap();
    renderer.render_pass(&mut ctx, &UniformStore::with_defaults()).unwrap();

    assert_eq!(renderer.pixel_data().len(), 10 * 10 * 2);
    let field = HeightField::new(10, 10, layout, Arc::clone(renderer.pixel_data()), 1);
    assert_eq!(field.query(0.0, 0.0), 42.0);
}

// ============================================================================
// FAIL-STALE REGENERATION
// ============================================================================

#[test]
fn test_scenario_c_failed_pass_keeps_prior_heights() {
    let (mut ctx, failing) = FlakyContext::new(CpuContext::new().with_kernel(scaled_ramp));
    let mut changes = ChangeBroadcaster::new();
    let mut scene = DrawList::new();
    let mut store = UniformStore::with_defaults();
    let mut surface = TerrainSurface::new(
        &mut ctx,
        &mut changes,
        &terrain_config(32),
        &foliage_config(6, 0.0),
    )
    .unwrap();

    changes.broadcast_change();
    assert_eq!(
        surface.update(&mut ctx, &mut scene, &mut store, &mut changes),
        SurfaceState::Clean
    );
    let before = surface.query_height(3.0, -2.0);
    let texture_before = store.texture(names::HEIGHT_MAP);
    assert_eq!(before, (3.0 - 6.0) * 5.0);

    // Hill value moves, but the pass fails
    store.set(names::HEIGHT, UniformValue::Float(9.0)).unwrap();
    changes.broadcast_change();
    failing.set(true);
    assert_eq!(
        surface.update(&mut ctx, &mut scene, &mut store, &mut changes),
        SurfaceState::Dirty
    );
    assert_eq!(surface.query_height(3.0, -2.0), before);
    assert_eq!(store.texture(names::HEIGHT_MAP), texture_before);
    assert!(changes.is_listener_dirty(TERRAIN_LISTENER_ID));

    // Device recovers: the pending change goes through
    failing.set(false);
    assert_eq!(
        surface.update(&mut ctx, &mut scene, &mut store, &mut changes),
        SurfaceState::Clean
    );
    assert_eq!(surface.query_height(3.0, -2.0), (3.0 - 6.0) * 9.0);
    assert_ne!(store.texture(names::HEIGHT_MAP), texture_before);
    assert!(!changes.is_dirty());
}

#[test]
fn test_trees_follow_regenerated_ground() {
    let mut ctx = CpuContext::new().with_kernel(scaled_ramp);
    let mut changes = ChangeBroadcaster::new();
    let mut scene = DrawList::new();
    let mut store = UniformStore::with_defaults();
    let mut surface = TerrainSurface::new(
        &mut ctx,
        &mut changes,
        &terrain_config(32),
        &foliage_config(12, -1.0e9),
    )
    .unwrap();
    surface.attach_to(&mut scene);

    changes.broadcast_change();
    surface.update(&mut ctx, &mut scene, &mut store, &mut changes);
    let first: Vec<_> = surface.foliage().entities().to_vec();
    assert_eq!(first.len(), 12);

    store.set(names::HEIGHT, UniformValue::Float(2.0)).unwrap();
    changes.broadcast_change();
    surface.update(&mut ctx, &mut scene, &mut store, &mut changes);

    let second = surface.foliage().entities();
    assert_eq!(second.len(), first.len());
    for (a, b) in first.iter().zip(second) {
        assert_eq!(a.position.truncate(), b.position.truncate());
        assert_eq!(b.position.z, surface.query_height(b.position.x, b.position.y));
        assert_eq!(b.position.z, a.position.z * 2.0 / 5.0);
    }
}

// ============================================================================
// FOLIAGE
// ============================================================================

#[test]
fn test_scenario_d_sea_level_visibility() {
    let mut ctx = CpuContext::new().with_kernel(scaled_ramp);
    let mut renderer =
        OffscreenHeightRenderer::with_displacement_program(&mut ctx, 32, 32, PixelLayout::default())
            .unwrap();
    renderer.render_pass(&mut ctx, &UniformStore::with_defaults()).unwrap();
    let field = HeightField::new(32, 32, renderer.layout(), Arc::clone(renderer.pixel_data()), 1);

    let sea_level = 10.0;
    let mut foliage = FoliagePlacement::new(
        Box::new(move |x, y| field.query(x, y)),
        Box::new(|_| {}),
        sea_level,
    );
    let candidates = (-6..6).map(|i| Vec2::new(i as f32 * 2.0, 1.0));
    foliage.place_all(12, candidates);

    foliage.update_positions(true);
    for entity in foliage.entities() {
        assert_eq!(entity.visible, entity.position.z >= sea_level);
    }
    assert!(foliage.visible_count() > 0);
    assert!(foliage.visible_count() < foliage.entities().len());

    foliage.update_positions(false);
    assert_eq!(foliage.visible_count(), foliage.entities().len());
}

#[test]
fn test_placement_skips_candidates_off_the_field() {
    let mut ctx = CpuContext::new().with_kernel(scaled_ramp);
    let mut renderer =
        OffscreenHeightRenderer::with_displacement_program(&mut ctx, 8, 8, PixelLayout::default())
            .unwrap();
    renderer.render_pass(&mut ctx, &UniformStore::with_defaults()).unwrap();
    let field = HeightField::new(8, 8, renderer.layout(), Arc::clone(renderer.pixel_data()), 1);

    let mut foliage = FoliagePlacement::new(
        Box::new(move |x, y| field.query(x, y)),
        Box::new(|_| {}),
        0.0,
    );
    let candidates = [Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(-1.0, -1.0)];
    assert_eq!(foliage.place_all(3, candidates.into_iter()), 2);
    assert!(foliage.entities().iter().all(|e| e.position.z != NO_HEIGHT));
}
