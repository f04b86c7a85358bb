//! Mob and spear population: pools plus their structure-of-arrays rows.

use crate::entity::{MobBody, SpearBody};
use crate::error::{Result, SimError};
use crate::layout::SpawnLayout;
use crate::mob::MobSimState;
use crate::pool::EntityPool;
use crate::spear::SpearSimState;
use glam::{Quat, Vec3};

/// Both pools with their co-indexed state
pub struct Roster {
    pub mob_pool: EntityPool<MobBody>,
    pub mobs: MobSimState,
    pub spear_pool: EntityPool<SpearBody>,
    pub spears: SpearSimState,
}

impl Roster {
    pub fn new(mob_expandable: bool, spear_expandable: bool) -> Self {
        Self {
            mob_pool: EntityPool::new("mobs", 0, mob_expandable),
            mobs: MobSimState::new(),
            spear_pool: EntityPool::new("spears", 0, spear_expandable),
            spears: SpearSimState::new(),
        }
    }

    /// Error out if any pool disagrees with its state rows
    pub fn check_aligned(&self) -> Result<()> {
        if self.mob_pool.len() != self.mobs.len() || !self.mobs.is_consistent() {
            return Err(SimError::Desync {
                lane: "mobs",
                pool_len: self.mob_pool.len(),
                state_len: self.mobs.len(),
            });
        }
        if self.spear_pool.len() != self.spears.len() || !self.spears.is_consistent() {
            return Err(SimError::Desync {
                lane: "spears",
                pool_len: self.spear_pool.len(),
                state_len: self.spears.len(),
            });
        }
        Ok(())
    }

    /// Resize state rows to match their pools. Returns true if anything moved.
    pub fn reconcile(&mut self) -> bool {
        let mut changed = false;
        if self.mobs.len() != self.mob_pool.len() || !self.mobs.is_consistent() {
            tracing::warn!(
                pool_len = self.mob_pool.len(),
                state_len = self.mobs.len(),
                "realigning mob state"
            );
            self.mobs.resize(self.mob_pool.len());
            changed = true;
        }
        if self.spears.len() != self.spear_pool.len() || !self.spears.is_consistent() {
            tracing::warn!(
                pool_len = self.spear_pool.len(),
                state_len = self.spears.len(),
                "realigning spear state"
            );
            self.spears.resize(self.spear_pool.len());
            changed = true;
        }
        changed
    }
}

/// Outcome of a population request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PopulationChange {
    pub mobs_added: usize,
    pub mobs_removed: usize,
    pub spears_added: usize,
    pub spears_removed: usize,
}

/// Applies mob-count deltas and keeps the spear pool in step
#[derive(Debug, Clone, Copy)]
pub struct PopulationController {
    layout: SpawnLayout,
    spears_per_mob: usize,
}

impl PopulationController {
    /// Every mob gets at least one spear slot; a ratio of 0 counts as 1.
    pub fn new(layout: SpawnLayout, spears_per_mob: usize) -> Self {
        Self {
            layout,
            spears_per_mob: spears_per_mob.max(1),
        }
    }

    pub fn spears_per_mob(&self) -> usize {
        self.spears_per_mob
    }

    pub fn layout(&self) -> &SpawnLayout {
        &self.layout
    }

    /// Grow or shrink the mob population by `delta`, stopping at zero.
    /// New mobs head for `target_z` along their own column.
    ///
    /// Any mob slots that appeared in the pool without a state row are
    /// spawned on the layout first, and the spear pool is topped up on
    /// every call, whatever the sign of `delta`.
    pub fn apply(&self, roster: &mut Roster, delta: i64, target_z: f32) -> PopulationChange {
        let placed = roster.mobs.len();
        roster.reconcile();
        if roster.mob_pool.len() > placed {
            self.place_mobs(roster, placed, target_z);
        }

        let mut change = PopulationChange::default();
        if delta > 0 {
            change.mobs_added = self.grow_mobs(roster, delta, target_z);
        } else if delta < 0 {
            let removed = roster.mob_pool.expand(delta);
            roster.mobs.resize(roster.mob_pool.len());
            let spears_removed = roster.spear_pool.expand(-(removed as i64));
            roster.spears.resize(roster.spear_pool.len());
            change.mobs_removed = removed;
            change.spears_removed = spears_removed;
        }
        change.spears_added = self.fill_spears(roster);

        tracing::debug!(
            delta,
            mobs = roster.mob_pool.len(),
            spears = roster.spear_pool.len(),
            ?change,
            "population changed"
        );
        change
    }

    fn grow_mobs(&self, roster: &mut Roster, delta: i64, target_z: f32) -> usize {
        let old_len = roster.mob_pool.len();
        roster.mob_pool.expand(delta);
        roster.mobs.resize(roster.mob_pool.len());
        self.place_mobs(roster, old_len, target_z);
        roster.mob_pool.len() - old_len
    }

    /// Spawn a mob into every free slot from `first` on, positioned by the
    /// layout for the slot it lands in.
    fn place_mobs(&self, roster: &mut Roster, first: usize, target_z: f32) {
        for index in first..roster.mob_pool.len() {
            if roster.mob_pool.is_used(index) {
                continue;
            }
            let spot = self.layout.position(index);
            let handle = match roster.mob_pool.spawn(spot, Quat::IDENTITY) {
                Ok(handle) => handle,
                Err(err) => {
                    tracing::warn!(%err, "mob spawn failed");
                    continue;
                }
            };
            // The pool may hand out an earlier free slot; rows follow the slot
            let Some(slot) = roster.mob_pool.index_of(handle) else {
                continue;
            };
            let position = self.layout.position(slot);
            roster.mob_pool.transforms_mut()[slot].position = position;
            let target = Vec3::new(position.x, position.y, target_z);
            roster.mobs.set_spawn(slot, position, target);
        }
    }

    fn fill_spears(&self, roster: &mut Roster) -> usize {
        let wanted = roster.mob_pool.len() * self.spears_per_mob;
        let missing = wanted.saturating_sub(roster.spear_pool.len());
        let added = roster.spear_pool.expand(missing as i64);
        roster.spears.resize(roster.spear_pool.len());
        added
    }
}
