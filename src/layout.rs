//! Ring placement for spawned mobs.
//!
//! Index 0 sits on the origin. Ring `k` (half-width `k`, side `2k + 1`)
//! holds the `8k` indices from `(2k - 1)²` to `(2k + 1)² - 1`, walked as four
//! edges of `2k` cells. Positions depend on the index alone, so growing the
//! population never moves mobs that already exist.

use glam::Vec3;

/// Place `index` on the spiral around `origin`, `scale` units per cell.
pub fn position_for_index(origin: Vec3, index: usize, scale: f32) -> Vec3 {
    let (x, z) = grid_cell(index);
    Vec3::new(x as f32, 0.0, z as f32) * scale + origin
}

/// Integer cell of `index` on the spiral.
pub fn grid_cell(index: usize) -> (i64, i64) {
    if index == 0 {
        return (0, 0);
    }

    let k = ring_of(index);
    // Walk in the 1-based numbering where the ring ends at (2k + 1)².
    let n = index as i64 + 1;
    let t = 2 * k;
    let mut m = (t + 1) * (t + 1);

    if n >= m - t {
        return (k - (m - n), -k);
    }
    m -= t;

    if n >= m - t {
        return (-k, -k + (m - n));
    }
    m -= t;

    if n >= m - t {
        (-k + (m - n), k)
    } else {
        (k, k - (m - n - t))
    }
}

/// Smallest `k` with `(2k + 1)² > index`.
fn ring_of(index: usize) -> i64 {
    let index = index as i64;
    let mut k = ((((index + 1) as f64).sqrt() - 1.0) / 2.0).ceil().max(0.0) as i64;
    while (2 * k + 1) * (2 * k + 1) <= index {
        k += 1;
    }
    while k > 0 && (2 * k - 1) * (2 * k - 1) > index {
        k -= 1;
    }
    k
}

/// Spawn layout bound to an origin and spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnLayout {
    pub origin: Vec3,
    pub scale: f32,
}

impl SpawnLayout {
    pub fn new(origin: Vec3, scale: f32) -> Self {
        Self { origin, scale }
    }

    pub fn position(&self, index: usize) -> Vec3 {
        position_for_index(self.origin, index, self.scale)
    }
}
