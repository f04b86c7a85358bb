//! Spear structure-of-arrays state and the ballistic stages.
//!
//! A spear is `Inactive` while parked, `Starting` for the tick it is thrown
//! and `Active` while flying. Each tick an active spear picks up gravity,
//! casts a ray along its velocity, bounces off whatever it hits and goes
//! back to `Inactive` once it falls below the ground plane.

use glam::Vec3;
use rayon::prelude::*;

use crate::config::SimSettings;
use crate::error::Result;
use crate::physics::{cast_batch, RaycastCommand, RaycastHit};
use crate::stage::{BoxedStage, BufferId, Lane, Stage, StageAccess, StageChain, TickContext};
use crate::transform::{reflect, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpearState {
    #[default]
    Inactive,
    Starting,
    Active,
}

/// Per-spear columns, co-indexed with the spear pool.
#[derive(Debug, Default)]
pub struct SpearSimState {
    velocities: Vec<Vec3>,
    states: Vec<SpearState>,
    rays: Vec<RaycastCommand>,
    hits: Vec<Option<RaycastHit>>,
}

impl SpearSimState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn is_consistent(&self) -> bool {
        self.velocities.len() == self.states.len()
    }

    /// Truncate at the tail or append resting `Inactive` rows
    pub fn resize(&mut self, len: usize) {
        self.velocities.resize(len, Vec3::ZERO);
        self.states.resize(len, SpearState::Inactive);
    }

    /// Mark row `index` as thrown; it launches on the next pipeline run
    pub fn launch(&mut self, index: usize) {
        if index < self.states.len() {
            self.states[index] = SpearState::Starting;
            self.velocities[index] = Vec3::ZERO;
        }
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn states(&self) -> &[SpearState] {
        &self.states
    }

    pub fn hits(&self) -> &[Option<RaycastHit>] {
        &self.hits
    }

    /// Count of rows in each state: (inactive, starting, active)
    pub fn census(&self) -> (usize, usize, usize) {
        self.states
            .iter()
            .fold((0, 0, 0), |(i, s, a), state| match state {
                SpearState::Inactive => (i + 1, s, a),
                SpearState::Starting => (i, s + 1, a),
                SpearState::Active => (i, s, a + 1),
            })
    }

    fn prepare_scratch(&mut self) {
        let len = self.states.len();
        self.rays.resize(len, RaycastCommand::default());
        self.hits.resize(len, None);
    }

    pub fn frame<'a>(&'a mut self, transforms: &'a mut [Transform]) -> SpearFrame<'a> {
        self.prepare_scratch();
        SpearFrame {
            transforms,
            velocities: &mut self.velocities,
            states: &mut self.states,
            rays: &mut self.rays,
            hits: &mut self.hits,
        }
    }
}

/// Spear buffers for one tick
pub struct SpearFrame<'a> {
    pub transforms: &'a mut [Transform],
    pub velocities: &'a mut [Vec3],
    pub states: &'a mut [SpearState],
    pub rays: &'a mut [RaycastCommand],
    pub hits: &'a mut [Option<RaycastHit>],
}

pub struct SpearLane;

impl Lane for SpearLane {
    const NAME: &'static str = "spears";
    type Frame<'a> = SpearFrame<'a>;
}

fn min_len(ctx: &TickContext<'_>) -> usize {
    ctx.settings.min_batch.max(1)
}

/// Gravity for flying spears, launch for thrown ones, reset for parked ones.
pub struct SpearGravity;

impl Stage<SpearLane> for SpearGravity {
    fn name(&self) -> &'static str {
        "spear_gravity"
    }

    fn access(&self) -> StageAccess {
        StageAccess::new(
            &[BufferId::SpearStates],
            &[
                BufferId::SpearStates,
                BufferId::SpearVelocities,
                BufferId::SpearTransforms,
            ],
        )
    }

    fn run(&self, frame: &mut SpearFrame<'_>, ctx: &TickContext<'_>) -> Result<()> {
        let gravity = ctx.settings.gravity * ctx.dt;
        let launch = ctx.settings.spear_launch_speed;

        frame
            .transforms
            .par_iter_mut()
            .zip(frame.velocities.par_iter_mut())
            .zip(frame.states.par_iter_mut())
            .with_min_len(min_len(ctx))
            .for_each(|((transform, velocity), state)| match *state {
                SpearState::Active => *velocity += gravity,
                SpearState::Inactive => {
                    *velocity = Vec3::ZERO;
                    transform.position = Vec3::ZERO;
                }
                SpearState::Starting => {
                    *velocity = transform.forward() * launch;
                    *state = SpearState::Active;
                }
            });
        Ok(())
    }
}

/// One ray per spear along its velocity, as long as this tick's travel.
pub struct SpearRaycastSetup;

impl Stage<SpearLane> for SpearRaycastSetup {
    fn name(&self) -> &'static str {
        "spear_raycast_setup"
    }

    fn access(&self) -> StageAccess {
        StageAccess::new(
            &[BufferId::SpearTransforms, BufferId::SpearVelocities],
            &[BufferId::SpearRays],
        )
    }

    fn run(&self, frame: &mut SpearFrame<'_>, ctx: &TickContext<'_>) -> Result<()> {
        let transforms = &*frame.transforms;
        let velocities = &*frame.velocities;
        let mask = ctx.settings.wall_mask();
        let dt = ctx.dt;

        frame
            .rays
            .par_iter_mut()
            .with_min_len(min_len(ctx))
            .enumerate()
            .for_each(|(i, ray)| {
                let velocity = velocities[i];
                let distance = (velocity * dt).length();
                *ray = RaycastCommand::new(transforms[i].position, velocity, distance, mask);
            });
        Ok(())
    }
}

/// Batched ballistic casts.
pub struct SpearRaycast;

impl Stage<SpearLane> for SpearRaycast {
    fn name(&self) -> &'static str {
        "spear_raycast"
    }

    fn access(&self) -> StageAccess {
        StageAccess::new(&[BufferId::SpearRays], &[BufferId::SpearHits])
    }

    fn run(&self, frame: &mut SpearFrame<'_>, ctx: &TickContext<'_>) -> Result<()> {
        cast_batch(ctx.scene, frame.rays, frame.hits, ctx.settings.min_batch);
        Ok(())
    }
}

/// Bounce velocities of spears that hit something this tick.
pub struct SpearCollisionResponse;

impl Stage<SpearLane> for SpearCollisionResponse {
    fn name(&self) -> &'static str {
        "spear_collision_response"
    }

    fn access(&self) -> StageAccess {
        StageAccess::new(
            &[BufferId::SpearHits, BufferId::SpearStates],
            &[BufferId::SpearVelocities],
        )
    }

    fn run(&self, frame: &mut SpearFrame<'_>, ctx: &TickContext<'_>) -> Result<()> {
        let hits = &*frame.hits;
        let states = &*frame.states;
        let settings = ctx.settings;

        frame
            .velocities
            .par_iter_mut()
            .with_min_len(min_len(ctx))
            .enumerate()
            .for_each(|(i, velocity)| {
                if states[i] != SpearState::Active {
                    return;
                }
                if let Some(hit) = hits[i] {
                    *velocity = bounce(*velocity, hit.normal, settings);
                }
            });
        Ok(())
    }
}

/// Integrate free flight, snap to hit surfaces, enforce the far boundary
/// and park spears that dropped below ground.
pub struct SpearMovement;

impl Stage<SpearLane> for SpearMovement {
    fn name(&self) -> &'static str {
        "spear_movement"
    }

    fn access(&self) -> StageAccess {
        StageAccess::new(
            &[BufferId::SpearHits],
            &[
                BufferId::SpearTransforms,
                BufferId::SpearVelocities,
                BufferId::SpearStates,
            ],
        )
    }

    fn run(&self, frame: &mut SpearFrame<'_>, ctx: &TickContext<'_>) -> Result<()> {
        let hits = &*frame.hits;
        let settings = ctx.settings;
        let dt = ctx.dt;

        frame
            .transforms
            .par_iter_mut()
            .zip(frame.velocities.par_iter_mut())
            .zip(frame.states.par_iter_mut())
            .with_min_len(min_len(ctx))
            .enumerate()
            .for_each(|(i, ((transform, velocity), state))| {
                if *state != SpearState::Active {
                    return;
                }
                let (position, next_velocity) =
                    fly(transform, *velocity, hits[i].as_ref(), dt, settings);
                transform.position = position;
                *velocity = next_velocity;
                if position.y < 0.0 {
                    *state = SpearState::Inactive;
                }
            });
        Ok(())
    }
}

/// Reflect `velocity` off `normal` and scale it by the bounce attenuation.
pub fn bounce(velocity: Vec3, normal: Vec3, settings: &SimSettings) -> Vec3 {
    reflect(velocity, normal) * settings.bounce.factor(normal)
}

/// Movement of one active spear. Returns the new position and velocity.
///
/// Past the far boundary the spear is pulled back and its velocity is
/// mirrored about its own forward axis. There is no surface there, so the
/// attenuation is the one for a zero normal (`at_flat`).
pub fn fly(
    transform: &Transform,
    velocity: Vec3,
    hit: Option<&RaycastHit>,
    dt: f32,
    settings: &SimSettings,
) -> (Vec3, Vec3) {
    if let Some(hit) = hit {
        return (hit.point + Vec3::new(0.0, settings.hit_lift, 0.0), velocity);
    }

    let travel = (velocity * dt).length();
    let mut position = transform.position + velocity * travel;
    let mut velocity = velocity;
    if position.z > settings.boundary_z {
        position.z = settings.boundary_clamp_z;
        velocity = reflect(velocity, transform.forward()) * settings.bounce.factor(Vec3::ZERO);
    }
    (position, velocity)
}

/// Gravity, setup, cast, response, movement.
pub fn standard_chain() -> Result<StageChain<SpearLane>> {
    let stages: Vec<BoxedStage<SpearLane>> = vec![
        Box::new(SpearGravity),
        Box::new(SpearRaycastSetup),
        Box::new(SpearRaycast),
        Box::new(SpearCollisionResponse),
        Box::new(SpearMovement),
    ];
    StageChain::new(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BounceAttenuation;
    use crate::physics::StaticScene;
    use crate::transform::rotation_from_euler_deg;

    fn ctx<'a>(settings: &'a SimSettings, scene: &'a StaticScene, dt: f32) -> TickContext<'a> {
        TickContext {
            dt,
            target: Vec3::ZERO,
            settings,
            scene,
        }
    }

    #[test]
    fn test_boundary_mirrors_about_forward() {
        let settings = SimSettings::default();
        let thrown = Transform {
            position: Vec3::new(0.0, 10.0, 199.0),
            rotation: settings.throwing_rotation(),
        };
        let (pos, vel) = fly(&thrown, Vec3::new(0.0, 0.0, 10.0), None, 0.1, &settings);
        assert_eq!(pos.z, 198.0);
        // Forward is (0, 1, 1) / sqrt(2); zero-normal factor is 0.5
        assert!((vel - Vec3::new(0.0, -5.0, 0.0)).length() < 1e-4);

        let level = Transform::from_position(Vec3::new(0.0, 10.0, 199.0));
        let (_, vel) = fly(&level, Vec3::new(0.0, 0.0, 10.0), None, 0.1, &settings);
        assert!((vel - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-4);
    }

    #[test]
    fn test_boundary_factor_follows_settings() {
        let settings = SimSettings {
            bounce: BounceAttenuation {
                at_flat: 0.8,
                at_inverted: 1.0,
            },
            ..SimSettings::default()
        };
        let level = Transform::from_position(Vec3::new(0.0, 10.0, 199.0));
        let (_, vel) = fly(&level, Vec3::new(0.0, 0.0, 10.0), None, 0.1, &settings);
        assert!((vel - Vec3::new(0.0, 0.0, -8.0)).length() < 1e-4);
    }

    #[test]
    fn test_free_flight_scales_by_travel() {
        let settings = SimSettings::default();
        let start = Transform::from_position(Vec3::new(0.0, 10.0, 0.0));
        let (pos, vel) = fly(&start, Vec3::new(0.0, 0.0, 2.0), None, 0.5, &settings);
        assert!((pos - Vec3::new(0.0, 10.0, 2.0)).length() < 1e-6);
        assert_eq!(vel, Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_hit_snaps_above_surface() {
        let settings = SimSettings::default();
        let hit = RaycastHit {
            point: Vec3::new(1.0, 2.0, 3.0),
            normal: Vec3::Y,
            distance: 0.5,
            collider: 0,
        };
        let (pos, _) = fly(&Transform::IDENTITY, Vec3::NEG_Y, Some(&hit), 0.1, &settings);
        assert!((pos - Vec3::new(1.0, 2.1, 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_launch_then_ground_contact() {
        let settings = SimSettings::default();
        let scene = StaticScene::new();
        let chain = standard_chain().unwrap();

        let mut spears = SpearSimState::new();
        spears.resize(2);
        spears.launch(0);
        let mut transforms = vec![
            Transform {
                position: Vec3::new(0.0, 1.0, 0.0),
                rotation: rotation_from_euler_deg(settings.throwing_rotation_deg),
            },
            Transform::from_position(Vec3::new(5.0, 5.0, 5.0)),
        ];

        chain
            .run(&mut spears.frame(&mut transforms), &ctx(&settings, &scene, 0.02))
            .unwrap();
        assert_eq!(spears.states()[0], SpearState::Active);
        assert!(spears.velocities()[0].y > 0.0 && spears.velocities()[0].z > 0.0);
        assert!(transforms[0].position.z > 0.0);
        // Parked spears are pinned to the origin
        assert_eq!(spears.states()[1], SpearState::Inactive);
        assert_eq!(transforms[1].position, Vec3::ZERO);

        let mut landed_at = None;
        for tick in 0..2_000 {
            chain
                .run(&mut spears.frame(&mut transforms), &ctx(&settings, &scene, 0.02))
                .unwrap();
            if spears.states()[0] == SpearState::Inactive {
                landed_at = Some(tick);
                assert!(transforms[0].position.y < 0.0);
                break;
            }
        }
        assert!(landed_at.is_some(), "spear never came down");

        chain
            .run(&mut spears.frame(&mut transforms), &ctx(&settings, &scene, 0.02))
            .unwrap();
        assert_eq!(spears.states()[0], SpearState::Inactive);
        assert_eq!(spears.velocities()[0], Vec3::ZERO);
        assert_eq!(transforms[0].position, Vec3::ZERO);
    }

    #[test]
    fn test_wall_hit_bounces_back() {
        let settings = SimSettings::default();
        let scene = StaticScene::new().with_box(
            Vec3::new(-10.0, 0.0, 1.0),
            Vec3::new(10.0, 20.0, 2.0),
            settings.wall_layer,
        );
        let chain = standard_chain().unwrap();

        let mut spears = SpearSimState::new();
        spears.resize(1);
        spears.launch(0);
        let mut transforms = vec![Transform::from_position(Vec3::new(0.0, 5.0, 0.0))];

        // Identity rotation launches straight along +Z into the wall
        chain
            .run(&mut spears.frame(&mut transforms), &ctx(&settings, &scene, 0.1))
            .unwrap();
        let hit = spears.hits()[0].expect("wall within one tick of travel");
        assert_eq!(hit.normal, Vec3::NEG_Z);
        assert!(spears.velocities()[0].z < 0.0);
        assert!((transforms[0].position - (hit.point + Vec3::new(0.0, 0.1, 0.0))).length() < 1e-5);
    }

    #[test]
    fn test_census() {
        let mut spears = SpearSimState::new();
        spears.resize(3);
        spears.launch(2);
        assert_eq!(spears.census(), (2, 1, 0));
    }
}
