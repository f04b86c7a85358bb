//! Transforms and the small vector helpers the stages share.

use glam::{Quat, Vec3};

/// Position and rotation of a pooled object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Local +Z rotated into world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rotation from Euler angles in degrees, applied Z, then X, then Y.
pub fn rotation_from_euler_deg(degrees: Vec3) -> Quat {
    Quat::from_euler(
        glam::EulerRot::YXZ,
        degrees.y.to_radians(),
        degrees.x.to_radians(),
        degrees.z.to_radians(),
    )
}

/// Step `current` toward `target` by at most `max_delta`, landing exactly on
/// `target` when it is within reach.
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let to = target - current;
    let dist = to.length();
    if dist <= max_delta || dist == 0.0 {
        return target;
    }
    current + to / dist * max_delta
}

/// Mirror `v` about the plane with normal `normal`.
pub fn reflect(v: Vec3, normal: Vec3) -> Vec3 {
    let n = normal.normalize_or_zero();
    v - 2.0 * v.dot(n) * n
}

/// Unsigned angle between two vectors in degrees. Zero if either is zero.
pub fn angle_deg(a: Vec3, b: Vec3) -> f32 {
    let denom = (a.length_squared() * b.length_squared()).sqrt();
    if denom < 1e-15 {
        return 0.0;
    }
    let cos = (a.dot(b) / denom).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Linear interpolation with `t` clamped to [0, 1].
pub fn lerp_clamped(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}
