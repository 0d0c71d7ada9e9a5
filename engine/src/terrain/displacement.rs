//! Terrain Displacement
//!
//! CPU evaluation of the displacement program in `shaders/displacement.wgsl`.
//! The noise functions mirror the WGSL line for line so the software context
//! produces the same height field as the GPU pass.

use glam::{Vec2, Vec3};

use crate::uniforms::{UniformStore, names};

/// Scales `u_hillFactor` into a noise frequency for the rolling hills.
pub const HILL_FREQUENCY_SCALE: f32 = 8.0;

/// Scales `u_spikyness` into a noise frequency for the ridged spikes.
pub const SPIKE_FREQUENCY_SCALE: f32 = 400.0;

/// Share of `u_bumpHeight` given to the ridged spikes.
pub const SPIKE_WEIGHT: f32 = 0.3;

/// The four hill values that shape the terrain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HillValues {
    pub bump_height: f32,
    pub height: f32,
    pub hill_factor: f32,
    pub spikyness: f32,
}

impl Default for HillValues {
    fn default() -> Self {
        Self {
            bump_height: 50.0,
            height: 5.0,
            hill_factor: 0.0005,
            spikyness: 0.0001,
        }
    }
}

impl HillValues {
    /// Read the hill values from the store, falling back to defaults for
    /// anything missing.
    pub fn from_store(store: &UniformStore) -> Self {
        let defaults = Self::default();
        Self {
            bump_height: store
                .float(names::BUMP_HEIGHT)
                .unwrap_or(defaults.bump_height),
            height: store.float(names::HEIGHT).unwrap_or(defaults.height),
            hill_factor: store
                .float(names::HILL_FACTOR)
                .unwrap_or(defaults.hill_factor),
            spikyness: store.float(names::SPIKYNESS).unwrap_or(defaults.spikyness),
        }
    }
}

// ============================================================================
// Noise Functions (matching WGSL for consistency)
// ============================================================================

fn hash21(p: Vec2) -> f32 {
    let p3 = Vec3::new(p.x, p.y, p.x) * 0.1031;
    let p3 = p3 - p3.floor();
    let p3 = p3 + Vec3::splat(p3.dot(Vec3::new(p3.y, p3.z, p3.x) + Vec3::splat(33.33)));
    ((p3.x + p3.y) * p3.z).fract()
}

fn noise2d(p: Vec2) -> f32 {
    let i = p.floor();
    let f = p - i;
    let u = f * f * (Vec2::splat(3.0) - f * 2.0);

    let a = hash21(i);
    let b = hash21(i + Vec2::new(1.0, 0.0));
    let c = hash21(i + Vec2::new(0.0, 1.0));
    let d = hash21(i + Vec2::new(1.0, 1.0));

    let ab = a + (b - a) * u.x;
    let cd = c + (d - c) * u.x;
    ab + (cd - ab) * u.y
}

/// Fractal Brownian motion, roughly in [0, 1).
pub fn fbm(p: Vec2, octaves: u32) -> f32 {
    let mut value = 0.0;
    let mut amplitude = 0.5;
    let mut p = p;

    for _ in 0..octaves {
        value += amplitude * noise2d(p);
        p *= 2.0;
        amplitude *= 0.5;
    }

    value
}

/// Ridged noise for sharp crests, normalized to [0, 1].
pub fn ridged(p: Vec2, octaves: u32) -> f32 {
    let mut value = 0.0;
    let mut amplitude = 1.0;
    let mut max_value = 0.0;
    let mut p = p;

    for _ in 0..octaves {
        let n = 1.0 - (noise2d(p) * 2.0 - 1.0).abs();
        value += amplitude * n * n;
        max_value += amplitude;
        amplitude *= 0.5;
        p *= 2.0;
    }

    value / max_value
}

/// Terrain height at world position `p`.
pub fn displacement(p: Vec2, hills: &HillValues) -> f32 {
    let rolling = fbm(p * hills.hill_factor * HILL_FREQUENCY_SCALE, 5);
    let spikes = ridged(p * hills.spikyness * SPIKE_FREQUENCY_SCALE, 4);
    let bumps = rolling * hills.bump_height + spikes * hills.bump_height * SPIKE_WEIGHT;
    bumps * hills.height * 0.2
}

/// Terrain height at `p` using the hill values currently in `store`.
pub fn height_from_store(store: &UniformStore, p: Vec2) -> f32 {
    displacement(p, &HillValues::from_store(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::UniformValue;

    #[test]
    fn test_fbm_range() {
        for i in 0..200 {
            let p = Vec2::new(i as f32 * 0.37, i as f32 * 0.71);
            let v = fbm(p, 5);
            assert!((0.0..1.0).contains(&v), "fbm out of range: {v}");
        }
    }

    #[test]
    fn test_ridged_range() {
        for i in 0..200 {
            let p = Vec2::new(i as f32 * 1.3, -(i as f32) * 0.4);
            let v = ridged(p, 4);
            assert!((0.0..=1.0).contains(&v), "ridged out of range: {v}");
        }
    }

    #[test]
    fn test_zero_height_flattens_terrain() {
        let hills = HillValues {
            height: 0.0,
            ..HillValues::default()
        };
        assert_eq!(displacement(Vec2::new(12.0, -40.0), &hills), 0.0);
    }

    #[test]
    fn test_height_scales_linearly() {
        let p = Vec2::new(100.0, 230.0);
        let base = HillValues::default();
        let doubled = HillValues {
            height: base.height * 2.0,
            ..base
        };
        let a = displacement(p, &base);
        let b = displacement(p, &doubled);
        assert!((b - 2.0 * a).abs() < 1e-3);
    }

    #[test]
    fn test_reads_store_values() {
        let mut store = UniformStore::with_defaults();
        let p = Vec2::new(-64.0, 32.0);
        let before = height_from_store(&store, p);
        store
            .set(names::BUMP_HEIGHT, UniformValue::Float(100.0))
            .unwrap();
        let after = height_from_store(&store, p);
        assert!((after - 2.0 * before).abs() < 1e-3);
    }
}
