// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Simulation container

use glam::Vec3;

use crate::config::SimSettings;
use crate::entity::{MobBody, SpearBody};
use crate::error::{Result, SimError};
use crate::layout::SpawnLayout;
use crate::mob::{MobSimState, MobState};
use crate::physics::CollisionWorld;
use crate::pipeline::SimulationPipeline;
use crate::pool::EntityPool;
use crate::population::{PopulationChange, PopulationController, Roster};
use crate::spear::{SpearSimState, SpearState};
use crate::stage::TickContext;

/// What happened during one tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    pub tick: u64,
    /// Set when the pipeline did not run this tick
    pub skipped: Option<SimError>,
    pub spears_thrown: usize,
    pub spears_returned: usize,
    /// Throwing mobs left waiting for a free spear
    pub throws_deferred: usize,
}

/// Simulation container
///
/// Owns the pools, their state rows, the stage pipeline and the collision
/// scene. Population changes and ticks both take `&mut self`, so a resize
/// can never overlap a pipeline run.
pub struct Simulation<W: CollisionWorld> {
    settings: SimSettings,
    scene: W,
    roster: Roster,
    population: PopulationController,
    pipeline: SimulationPipeline,
    target: Vec3,
    tick: u64,
}

impl<W: CollisionWorld> Simulation<W> {
    /// Create an empty simulation
    pub fn new(settings: SimSettings, scene: W) -> Result<Self> {
        let pipeline = SimulationPipeline::standard()?;
        let population = PopulationController::new(
            SpawnLayout::new(settings.spawn_origin, settings.spawn_spacing),
            settings.spears_per_mob,
        );
        let roster = Roster::new(settings.mob_pool_expandable, settings.spear_pool_expandable);

        Ok(Self {
            target: settings.target_origin,
            settings,
            scene,
            roster,
            population,
            pipeline,
            tick: 0,
        })
    }

    /// Add (`delta > 0`) or remove (`delta < 0`) mobs. The count never
    /// drops below zero.
    pub fn set_mob_count(&mut self, delta: i64) -> PopulationChange {
        self.population.apply(&mut self.roster, delta, self.target.z)
    }

    pub fn mob_count(&self) -> usize {
        self.roster.mob_pool.len()
    }

    pub fn spear_count(&self) -> usize {
        self.roster.spear_pool.len()
    }

    /// Advance the simulation by `dt` seconds with the target at `target`.
    pub fn tick(&mut self, dt: f32, target: Vec3) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            tracing::warn!(dt, "invalid tick delta, using 0");
            0.0
        };
        self.target = target;

        if let Err(err) = self.roster.check_aligned() {
            tracing::warn!(tick = self.tick, %err, "skipping tick");
            report.skipped = Some(err);
            return report;
        }

        if let Err(err) = self.run_pipeline(dt, target) {
            tracing::warn!(tick = self.tick, %err, "pipeline failed");
            report.skipped = Some(err);
            return report;
        }

        report.spears_returned = self.return_spent_spears();
        let (thrown, deferred) = self.hand_out_spears();
        report.spears_thrown = thrown;
        report.throws_deferred = deferred;

        tracing::trace!(?report, "tick done");
        report
    }

    fn run_pipeline(&mut self, dt: f32, target: Vec3) -> Result<()> {
        let ctx = TickContext {
            dt,
            target,
            settings: &self.settings,
            scene: &self.scene,
        };
        let Roster {
            mob_pool,
            mobs,
            spear_pool,
            spears,
        } = &mut self.roster;

        self.pipeline.run(
            &mut mobs.frame(mob_pool.transforms_mut()),
            &mut spears.frame(spear_pool.transforms_mut()),
            &ctx,
        )
    }

    /// Give grounded spears back to the pool
    fn return_spent_spears(&mut self) -> usize {
        let roster = &mut self.roster;
        let spent: Vec<usize> = roster
            .spear_pool
            .used_indices()
            .filter(|&i| roster.spears.states().get(i) == Some(&SpearState::Inactive))
            .collect();

        let mut returned = 0;
        for index in spent {
            let Some(handle) = roster.spear_pool.handle_at(index) else {
                continue;
            };
            if roster.spear_pool.return_to_pool(handle).is_ok() {
                returned += 1;
            }
        }
        returned
    }

    /// Spawn a spear for every mob in `Throw`. Mobs that find no spear
    /// keep throwing next tick.
    fn hand_out_spears(&mut self) -> (usize, usize) {
        let offset = self.settings.throwing_point;
        let rotation = self.settings.throwing_rotation();
        let roster = &mut self.roster;

        let mut thrown = 0;
        let mut deferred = 0;
        for i in 0..roster.mobs.len() {
            if roster.mobs.states()[i] != MobState::Throw {
                continue;
            }
            let position = roster.mob_pool.transforms()[i].position + offset;
            match roster.spear_pool.spawn(position, rotation) {
                Ok(handle) => {
                    if roster.spears.len() < roster.spear_pool.len() {
                        roster.spears.resize(roster.spear_pool.len());
                    }
                    if let Some(index) = roster.spear_pool.index_of(handle) {
                        roster.spears.launch(index);
                    }
                    roster.mobs.set_state(i, MobState::FromTarget);
                    thrown += 1;
                }
                Err(err) => {
                    tracing::debug!(mob = i, %err, "throw deferred");
                    deferred += 1;
                }
            }
        }
        (thrown, deferred)
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    pub fn scene(&self) -> &W {
        &self.scene
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Ticks advanced so far, skipped ones included
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn mob_pool(&self) -> &EntityPool<MobBody> {
        &self.roster.mob_pool
    }

    pub fn spear_pool(&self) -> &EntityPool<SpearBody> {
        &self.roster.spear_pool
    }

    /// Direct pool access. Resizing through this leaves the state rows
    /// behind; the next tick is skipped until a population change
    /// realigns them.
    pub fn mob_pool_mut(&mut self) -> &mut EntityPool<MobBody> {
        &mut self.roster.mob_pool
    }

    pub fn spear_pool_mut(&mut self) -> &mut EntityPool<SpearBody> {
        &mut self.roster.spear_pool
    }

    pub fn mobs(&self) -> &MobSimState {
        &self.roster.mobs
    }

    pub fn spears(&self) -> &SpearSimState {
        &self.roster.spears
    }

    pub fn pipeline(&self) -> &SimulationPipeline {
        &self.pipeline
    }
}
