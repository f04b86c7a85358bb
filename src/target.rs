//! Moving target that mobs walk toward.

use glam::Vec3;

use crate::config::SimSettings;

/// Ping-pongs the target along x between two borders.
#[derive(Debug, Clone)]
pub struct TargetOscillator {
    base: Vec3,
    left: f32,
    right: f32,
    speed: f32,
    elapsed: f32,
}

impl TargetOscillator {
    pub fn new(base: Vec3, left: f32, right: f32, speed: f32) -> Self {
        Self {
            base,
            left,
            right,
            speed,
            elapsed: 0.0,
        }
    }

    pub fn from_settings(settings: &SimSettings) -> Self {
        Self::new(
            settings.target_origin,
            settings.target_left,
            settings.target_right,
            settings.target_speed,
        )
    }

    /// Position after `time` seconds.
    pub fn position_at(&self, time: f32) -> Vec3 {
        let span = (self.right - self.left).abs();
        Vec3::new(
            ping_pong(time * self.speed, span) + self.left,
            self.base.y,
            self.base.z,
        )
    }

    /// Advance the clock by `dt` and return the new position.
    pub fn advance(&mut self, dt: f32) -> Vec3 {
        self.elapsed += dt.max(0.0);
        self.position()
    }

    pub fn position(&self) -> Vec3 {
        self.position_at(self.elapsed)
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

/// Bounce `t` back and forth within `[0, length]`.
pub fn ping_pong(t: f32, length: f32) -> f32 {
    if length <= 0.0 {
        return 0.0;
    }
    let cycle = (t.abs()).rem_euclid(length * 2.0);
    length - (cycle - length).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_pong() {
        assert_eq!(ping_pong(0.0, 10.0), 0.0);
        assert_eq!(ping_pong(4.0, 10.0), 4.0);
        assert_eq!(ping_pong(10.0, 10.0), 10.0);
        assert_eq!(ping_pong(14.0, 10.0), 6.0);
        assert_eq!(ping_pong(20.0, 10.0), 0.0);
        assert_eq!(ping_pong(3.0, 0.0), 0.0);
    }

    #[test]
    fn test_oscillator_stays_within_borders() {
        let mut target = TargetOscillator::new(Vec3::new(0.0, 5.0, 100.0), -50.0, 50.0, 60.0);
        for _ in 0..500 {
            let pos = target.advance(0.016);
            assert!(pos.x >= -50.0 && pos.x <= 50.0);
            assert_eq!(pos.z, 100.0);
            assert_eq!(pos.y, 5.0);
        }
    }

    #[test]
    fn test_negative_dt_does_not_rewind() {
        let mut target = TargetOscillator::new(Vec3::ZERO, 0.0, 10.0, 1.0);
        target.advance(2.0);
        target.advance(-1.0);
        assert_eq!(target.elapsed(), 2.0);
    }
}
