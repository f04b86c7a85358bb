//! Raycast queries against the environment.
//!
//! The pipeline only depends on [`CollisionWorld`]; [`StaticScene`] is a
//! small box/plane scene good enough for headless runs and tests.

use glam::Vec3;
use rayon::prelude::*;

/// Layer mask matching every collider.
pub const ALL_LAYERS: u32 = u32::MAX;

/// A single ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastCommand {
    pub origin: Vec3,
    /// Need not be normalized; a zero direction never hits.
    pub direction: Vec3,
    pub max_distance: f32,
    pub layer_mask: u32,
}

impl RaycastCommand {
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32, layer_mask: u32) -> Self {
        Self {
            origin,
            direction,
            max_distance,
            layer_mask,
        }
    }
}

impl Default for RaycastCommand {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO, 0.0, 0)
    }
}

/// Closest surface hit by a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub point: Vec3,
    /// Unit normal facing back toward the ray origin
    pub normal: Vec3,
    pub distance: f32,
    /// Index of the collider in its scene
    pub collider: usize,
}

/// Environment the pipeline casts rays against.
pub trait CollisionWorld: Send + Sync {
    fn cast(&self, ray: &RaycastCommand) -> Option<RaycastHit>;
}

/// Cast every command, writing `hits[i]` for `commands[i]`, in parallel
/// batches of at least `min_batch` rays.
pub fn cast_batch(
    world: &dyn CollisionWorld,
    commands: &[RaycastCommand],
    hits: &mut [Option<RaycastHit>],
    min_batch: usize,
) {
    hits.par_iter_mut()
        .zip(commands.par_iter())
        .with_min_len(min_batch.max(1))
        .for_each(|(hit, ray)| *hit = world.cast(ray));
}

/// Collider geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Axis-aligned box
    Aabb { min: Vec3, max: Vec3 },
    /// Infinite plane through `point`
    Plane { point: Vec3, normal: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub shape: Shape,
    /// Layer index; matched against `1 << layer`
    pub layer: u32,
}

/// Static box/plane scene.
#[derive(Debug, Clone, Default)]
pub struct StaticScene {
    colliders: Vec<Collider>,
}

impl StaticScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_box(mut self, min: Vec3, max: Vec3, layer: u32) -> Self {
        self.colliders.push(Collider {
            shape: Shape::Aabb {
                min: min.min(max),
                max: min.max(max),
            },
            layer,
        });
        self
    }

    pub fn with_plane(mut self, point: Vec3, normal: Vec3, layer: u32) -> Self {
        self.colliders.push(Collider {
            shape: Shape::Plane {
                point,
                normal: normal.normalize_or_zero(),
            },
            layer,
        });
        self
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }
}

impl CollisionWorld for StaticScene {
    fn cast(&self, ray: &RaycastCommand) -> Option<RaycastHit> {
        let dir = ray.direction.normalize_or_zero();
        if dir == Vec3::ZERO || ray.max_distance <= 0.0 {
            return None;
        }

        let mut best: Option<RaycastHit> = None;
        for (index, collider) in self.colliders.iter().enumerate() {
            let layer_bit = 1u32.checked_shl(collider.layer).unwrap_or(0);
            if ray.layer_mask & layer_bit == 0 {
                continue;
            }
            let found = match collider.shape {
                Shape::Aabb { min, max } => intersect_aabb(ray.origin, dir, min, max),
                Shape::Plane { point, normal } => intersect_plane(ray.origin, dir, point, normal),
            };
            if let Some((distance, normal)) = found {
                let closer = best.map_or(true, |b| distance < b.distance);
                if distance <= ray.max_distance && closer {
                    best = Some(RaycastHit {
                        point: ray.origin + dir * distance,
                        normal,
                        distance,
                        collider: index,
                    });
                }
            }
        }
        best
    }
}

/// Slab test. Rays starting inside the box do not hit it.
fn intersect_aabb(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_axis = 0;

    for axis in 0..3 {
        let (o, d, lo, hi) = (origin[axis], dir[axis], min[axis], max[axis]);
        if d.abs() < 1e-8 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let (mut t0, mut t1) = ((lo - o) / d, (hi - o) / d);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > t_enter {
            t_enter = t0;
            enter_axis = axis;
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    if t_enter < 0.0 || !t_enter.is_finite() {
        return None;
    }
    let mut normal = Vec3::ZERO;
    normal[enter_axis] = -dir[enter_axis].signum();
    Some((t_enter, normal))
}

fn intersect_plane(origin: Vec3, dir: Vec3, point: Vec3, normal: Vec3) -> Option<(f32, Vec3)> {
    let denom = normal.dot(dir);
    if denom.abs() < 1e-8 {
        return None;
    }
    let t = (point - origin).dot(normal) / denom;
    if t < 0.0 {
        return None;
    }
    let facing = if denom < 0.0 { normal } else { -normal };
    Some((t, facing))
}
