//! Candidate Scatter
//!
//! Deterministic pseudo-random placement candidates. The same seed always
//! yields the same sequence, so a scene rebuilds with identical foliage.

use glam::Vec2;

// ============================================================================
// SIMPLE RNG (xorshift32)
// ============================================================================

/// Minimal deterministic generator using xorshift32.
#[derive(Clone, Debug)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// A seed of 0 is bumped to 1 because xorshift32 needs a non-zero state.
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Pseudo-random `f32` in `[0.0, 1.0)`.
    pub fn next_f32(&mut self) -> f32 {
        unit_f32(self.next_u32())
    }

    /// Pseudo-random `f32` in `[min, max)`.
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }
}

/// Top 24 bits of `bits` scaled into `[0.0, 1.0)`. Every value is exact in
/// an `f32`, so the result never rounds up to 1.0.
fn unit_f32(bits: u32) -> f32 {
    (bits >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
}

// ============================================================================
// SCATTER
// ============================================================================

/// Endless stream of (x, y) candidates inside a rectangle centred on the
/// origin.
#[derive(Clone, Debug)]
pub struct ScatterGenerator {
    rng: XorShift32,
    half_extent: Vec2,
}

impl ScatterGenerator {
    /// Candidates cover `width` x `height`, shrunk by `margin` on every side.
    pub fn new(seed: u32, width: f32, height: f32, margin: f32) -> Self {
        let half_extent = (Vec2::new(width, height) * 0.5 - Vec2::splat(margin)).max(Vec2::ZERO);
        Self {
            rng: XorShift32::new(seed),
            half_extent,
        }
    }

    pub fn half_extent(&self) -> Vec2 {
        self.half_extent
    }
}

impl Iterator for ScatterGenerator {
    type Item = Vec2;

    fn next(&mut self) -> Option<Vec2> {
        let x = self.rng.range(-self.half_extent.x, self.half_extent.x);
        let y = self.rng.range(-self.half_extent.y, self.half_extent.y);
        Some(Vec2::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::render::PixelLayout;
    use crate::terrain::HeightField;

    #[test]
    fn test_same_seed_same_sequence() {
        let a: Vec<Vec2> = ScatterGenerator::new(42, 100.0, 100.0, 0.0).take(16).collect();
        let b: Vec<Vec2> = ScatterGenerator::new(42, 100.0, 100.0, 0.0).take(16).collect();
        assert_eq!(a, b);

        let c: Vec<Vec2> = ScatterGenerator::new(43, 100.0, 100.0, 0.0).take(16).collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_candidates_stay_inside_margin() {
        let scatter = ScatterGenerator::new(7, 200.0, 100.0, 10.0);
        for p in scatter.take(500) {
            assert!(p.x.abs() <= 90.0, "x out of bounds: {}", p.x);
            assert!(p.y.abs() <= 40.0, "y out of bounds: {}", p.y);
        }
    }

    #[test]
    fn test_unit_range_is_half_open() {
        assert_eq!(unit_f32(0), 0.0);
        assert!(unit_f32(u32::MAX) < 1.0);
        let mut rng = XorShift32::new(9);
        assert!((0..10_000).map(|_| rng.next_f32()).all(|v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_zero_margin_candidates_all_hit_the_field() {
        let (w, h) = (32u32, 16u32);
        let field = HeightField::new(
            w,
            h,
            PixelLayout::default(),
            Arc::from(vec![1.0; (w * h * 4) as usize]),
            1,
        );
        let scatter = ScatterGenerator::new(5, w as f32, h as f32, 0.0);
        for p in scatter.take(2_000) {
            assert!(field.try_query(p.x, p.y).is_ok(), "candidate {p} missed the field");
        }
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = XorShift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }
}
