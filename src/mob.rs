//! Mob structure-of-arrays state and the mob stages.

use glam::Vec3;
use rayon::prelude::*;

use crate::error::Result;
use crate::physics::{cast_batch, RaycastCommand, RaycastHit};
use crate::stage::{BoxedStage, BufferId, Lane, Stage, StageAccess, StageChain, TickContext};
use crate::transform::{move_towards, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MobState {
    #[default]
    ToTarget,
    Throw,
    FromTarget,
}

/// Per-mob columns, co-indexed with the mob pool.
#[derive(Debug, Default)]
pub struct MobSimState {
    start_pos: Vec<Vec3>,
    target_pos: Vec<Vec3>,
    states: Vec<MobState>,
    rays: Vec<RaycastCommand>,
    hits: Vec<Option<RaycastHit>>,
}

impl MobSimState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Columns agree on length
    pub fn is_consistent(&self) -> bool {
        self.start_pos.len() == self.states.len() && self.target_pos.len() == self.states.len()
    }

    /// Truncate at the tail or append zeroed `ToTarget` rows. Retained rows
    /// keep their data.
    pub fn resize(&mut self, len: usize) {
        self.start_pos.resize(len, Vec3::ZERO);
        self.target_pos.resize(len, Vec3::ZERO);
        self.states.resize(len, MobState::ToTarget);
    }

    /// Initialise row `index` for a freshly spawned mob
    pub fn set_spawn(&mut self, index: usize, start: Vec3, target: Vec3) {
        self.start_pos[index] = start;
        self.target_pos[index] = target;
        self.states[index] = MobState::ToTarget;
    }

    pub fn start_pos(&self) -> &[Vec3] {
        &self.start_pos
    }

    pub fn target_pos(&self) -> &[Vec3] {
        &self.target_pos
    }

    pub fn states(&self) -> &[MobState] {
        &self.states
    }

    pub fn set_state(&mut self, index: usize, state: MobState) {
        if let Some(slot) = self.states.get_mut(index) {
            *slot = state;
        }
    }

    pub fn hits(&self) -> &[Option<RaycastHit>] {
        &self.hits
    }

    /// Size the ray scratch buffers to the row count
    fn prepare_scratch(&mut self) {
        let len = self.states.len();
        self.rays.resize(len, RaycastCommand::default());
        self.hits.resize(len, None);
    }

    /// Borrow every column together with the pool's transforms
    pub fn frame<'a>(&'a mut self, transforms: &'a mut [Transform]) -> MobFrame<'a> {
        self.prepare_scratch();
        MobFrame {
            transforms,
            start_pos: &self.start_pos,
            target_pos: &self.target_pos,
            states: &mut self.states,
            rays: &mut self.rays,
            hits: &mut self.hits,
        }
    }
}

/// Mob buffers for one tick
pub struct MobFrame<'a> {
    pub transforms: &'a mut [Transform],
    pub start_pos: &'a [Vec3],
    pub target_pos: &'a [Vec3],
    pub states: &'a mut [MobState],
    pub rays: &'a mut [RaycastCommand],
    pub hits: &'a mut [Option<RaycastHit>],
}

pub struct MobLane;

impl Lane for MobLane {
    const NAME: &'static str = "mobs";
    type Frame<'a> = MobFrame<'a>;
}

/// Build a ray from each mob toward its target, raised to wall height.
pub struct MobRaycastSetup;

impl Stage<MobLane> for MobRaycastSetup {
    fn name(&self) -> &'static str {
        "mob_raycast_setup"
    }

    fn access(&self) -> StageAccess {
        StageAccess::new(
            &[BufferId::MobTransforms, BufferId::MobTargetPos],
            &[BufferId::MobRays],
        )
    }

    fn run(&self, frame: &mut MobFrame<'_>, ctx: &TickContext<'_>) -> Result<()> {
        let transforms = &*frame.transforms;
        let targets = frame.target_pos;
        let range = ctx.settings.shooting_range;
        let mask = ctx.settings.wall_mask();
        let wall_y = ctx.target.y;

        frame
            .rays
            .par_iter_mut()
            .with_min_len(ctx.settings.min_batch.max(1))
            .enumerate()
            .for_each(|(i, ray)| {
                let origin = transforms[i].position;
                let aim = Vec3::new(targets[i].x, wall_y, targets[i].z);
                *ray = RaycastCommand::new(origin, aim - origin, range, mask);
            });
        Ok(())
    }
}

/// Batched line-of-sight casts.
pub struct MobRaycast;

impl Stage<MobLane> for MobRaycast {
    fn name(&self) -> &'static str {
        "mob_raycast"
    }

    fn access(&self) -> StageAccess {
        StageAccess::new(&[BufferId::MobRays], &[BufferId::MobHits])
    }

    fn run(&self, frame: &mut MobFrame<'_>, ctx: &TickContext<'_>) -> Result<()> {
        cast_batch(ctx.scene, frame.rays, frame.hits, ctx.settings.min_batch);
        Ok(())
    }
}

/// Walk toward the active waypoint and advance the state machine.
pub struct MobMovement;

impl Stage<MobLane> for MobMovement {
    fn name(&self) -> &'static str {
        "mob_movement"
    }

    fn access(&self) -> StageAccess {
        StageAccess::new(
            &[BufferId::MobStartPos, BufferId::MobTargetPos, BufferId::MobHits],
            &[BufferId::MobTransforms, BufferId::MobStates],
        )
    }

    fn run(&self, frame: &mut MobFrame<'_>, ctx: &TickContext<'_>) -> Result<()> {
        let step = ctx.dt * ctx.settings.mob_speed;
        let arrive = ctx.settings.arrive_radius;
        let starts = frame.start_pos;
        let targets = frame.target_pos;
        let hits = &*frame.hits;

        frame
            .transforms
            .par_iter_mut()
            .zip(frame.states.par_iter_mut())
            .with_min_len(ctx.settings.min_batch.max(1))
            .enumerate()
            .for_each(|(i, (transform, state))| {
                let sighted = hits[i].is_some();
                transform.position = step_mob(
                    transform.position,
                    state,
                    starts[i],
                    targets[i],
                    sighted,
                    step,
                    arrive,
                );
            });
        Ok(())
    }
}

/// One mob update. Returns the new position and updates `state` in place.
pub fn step_mob(
    position: Vec3,
    state: &mut MobState,
    start: Vec3,
    target: Vec3,
    sighted: bool,
    step: f32,
    arrive: f32,
) -> Vec3 {
    if *state == MobState::ToTarget && sighted {
        *state = MobState::Throw;
    }

    match *state {
        MobState::ToTarget => {
            let next = move_towards(position, target, step);
            if next.distance(target) < arrive {
                *state = MobState::FromTarget;
            }
            next
        }
        MobState::FromTarget => {
            let next = move_towards(position, start, step);
            if next.distance(start) < arrive {
                *state = MobState::ToTarget;
            }
            next
        }
        // Stands still until a spear is handed out
        MobState::Throw => position,
    }
}

/// Setup, cast, move.
pub fn standard_chain() -> Result<StageChain<MobLane>> {
    let stages: Vec<BoxedStage<MobLane>> = vec![
        Box::new(MobRaycastSetup),
        Box::new(MobRaycast),
        Box::new(MobMovement),
    ];
    StageChain::new(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimSettings;
    use crate::physics::StaticScene;

    #[test]
    fn test_resize_preserves_retained_rows() {
        let mut mobs = MobSimState::new();
        mobs.resize(3);
        mobs.set_spawn(1, Vec3::X, Vec3::Z);
        mobs.set_state(1, MobState::FromTarget);
        mobs.resize(2);
        mobs.resize(4);
        assert_eq!(mobs.start_pos()[1], Vec3::X);
        assert_eq!(mobs.states()[1], MobState::FromTarget);
        assert_eq!(mobs.states()[3], MobState::ToTarget);
        assert_eq!(mobs.start_pos()[3], Vec3::ZERO);
        assert!(mobs.is_consistent());
    }

    #[test]
    fn test_step_lands_on_target_without_overshoot() {
        let mut state = MobState::ToTarget;
        let target = Vec3::new(0.0, 1.0, 1.0);
        let from = Vec3::new(0.0, 1.0, 0.0);
        let pos = step_mob(from, &mut state, Vec3::ZERO, target, false, 2.0, 2.0);
        assert_eq!(pos, target);
        assert_eq!(state, MobState::FromTarget);
    }

    #[test]
    fn test_step_sighting_switches_to_throw_and_holds() {
        let mut state = MobState::ToTarget;
        let start = Vec3::new(0.0, 1.0, 0.0);
        let target = Vec3::new(0.0, 1.0, 40.0);
        let pos = step_mob(start, &mut state, start, target, true, 1.0, 2.0);
        assert_eq!(state, MobState::Throw);
        assert_eq!(pos, start);
    }

    #[test]
    fn test_step_returns_home() {
        let mut state = MobState::FromTarget;
        let start = Vec3::ZERO;
        let from = Vec3::new(0.0, 0.0, 2.5);
        let pos = step_mob(from, &mut state, start, Vec3::Z * 10.0, true, 1.0, 2.0);
        assert!((pos.z - 1.5).abs() < 1e-6);
        assert_eq!(state, MobState::ToTarget);
    }

    #[test]
    fn test_chain_spots_wall() {
        let settings = SimSettings::default();
        let scene = StaticScene::new().with_box(
            Vec3::new(-100.0, 0.0, 30.0),
            Vec3::new(100.0, 10.0, 31.0),
            settings.wall_layer,
        );
        let ctx = TickContext {
            dt: 0.1,
            target: Vec3::new(0.0, 5.0, 100.0),
            settings: &settings,
            scene: &scene,
        };

        let mut mobs = MobSimState::new();
        mobs.resize(2);
        mobs.set_spawn(0, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 100.0));
        // Second mob stands past the wall, looking away from it
        mobs.set_spawn(1, Vec3::new(0.0, 1.0, 50.0), Vec3::new(0.0, 1.0, 100.0));
        let mut transforms = vec![
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            Transform::from_position(Vec3::new(0.0, 1.0, 50.0)),
        ];

        let chain = standard_chain().unwrap();
        chain.run(&mut mobs.frame(&mut transforms), &ctx).unwrap();

        assert!(mobs.hits()[0].is_some());
        assert_eq!(mobs.states(), &[MobState::Throw, MobState::ToTarget]);
        assert_eq!(transforms[0].position, Vec3::new(0.0, 1.0, 0.0));
        assert!((transforms[1].position.z - 50.1).abs() < 1e-4);
    }
}
