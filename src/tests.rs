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

//! Simulation-level scenarios

#[cfg(test)]
mod tests {
    #![allow(clippy::module_inception)]
    use crate::layout::position_for_index;
    use crate::{MobState, SimError, SimSettings, Simulation, SpearState, StaticScene};
    use glam::Vec3;

    fn open_field(settings: SimSettings) -> Simulation<StaticScene> {
        Simulation::new(settings, StaticScene::new()).unwrap()
    }

    /// Low wall 10 units in front of the spawn area. Mob sight lines cross
    /// it; spear arcs clear it.
    fn low_wall(settings: SimSettings) -> Simulation<StaticScene> {
        let scene = StaticScene::new().with_box(
            Vec3::new(-20.0, 0.0, 10.0),
            Vec3::new(20.0, 2.0, 11.0),
            settings.wall_layer,
        );
        Simulation::new(settings, scene).unwrap()
    }

    fn assert_aligned(sim: &Simulation<StaticScene>) {
        assert_eq!(sim.mob_pool().len(), sim.mobs().len());
        assert_eq!(sim.spear_pool().len(), sim.spears().len());
        assert!(sim.mob_pool().is_consistent());
        assert!(sim.spear_pool().is_consistent());
        let ratio = sim.settings().spears_per_mob.max(1);
        assert!(sim.spear_count() >= sim.mob_count() * ratio);
    }

    #[test]
    fn test_populate_from_empty() {
        let settings = SimSettings::default();
        let origin = settings.spawn_origin;
        let spacing = settings.spawn_spacing;
        let mut sim = open_field(settings);

        let change = sim.set_mob_count(100);
        assert_eq!(change.mobs_added, 100);
        assert_eq!(sim.mob_count(), 100);
        assert!(sim.spear_count() >= 100);
        assert_aligned(&sim);

        for i in 0..100 {
            assert_eq!(sim.mobs().states()[i], MobState::ToTarget);
            let expected = position_for_index(origin, i, spacing);
            assert_eq!(sim.mob_pool().transforms()[i].position, expected);
            assert_eq!(sim.mobs().target_pos()[i].z, 100.0);
        }
    }

    #[test]
    fn test_mob_reaches_close_target_in_one_tick() {
        let settings = SimSettings {
            target_origin: Vec3::new(0.0, 5.0, 1.0),
            ..SimSettings::default()
        };
        let target = settings.target_origin;
        let mut sim = open_field(settings);
        sim.set_mob_count(1);

        let report = sim.tick(2.0, target);
        assert!(report.skipped.is_none());
        assert_eq!(sim.mob_pool().transforms()[0].position, Vec3::new(0.0, 1.0, 1.0));
        assert_eq!(sim.mobs().states()[0], MobState::FromTarget);
    }

    #[test]
    fn test_shrink_past_zero() {
        let mut sim = open_field(SimSettings::default());
        sim.set_mob_count(30);
        let change = sim.set_mob_count(-50);
        assert_eq!(change.mobs_removed, 30);
        assert_eq!(sim.mob_count(), 0);
        assert_aligned(&sim);

        // Ticking an empty simulation is fine
        let report = sim.tick(0.1, sim.target());
        assert!(report.skipped.is_none());
    }

    #[test]
    fn test_grow_then_shrink_restores_count() {
        let mut sim = open_field(SimSettings::default());
        sim.set_mob_count(20);
        let spears = sim.spear_count();
        sim.set_mob_count(1000);
        sim.set_mob_count(-1000);
        assert_eq!(sim.mob_count(), 20);
        assert_eq!(sim.spear_count(), spears);
        assert_aligned(&sim);
    }

    #[test]
    fn test_blocked_mob_throws_in_same_tick() {
        let settings = SimSettings::default();
        let target = settings.target_origin;
        let mut sim = low_wall(settings);
        sim.set_mob_count(1);

        let report = sim.tick(0.1, target);
        assert_eq!(report.spears_thrown, 1);
        assert_eq!(sim.mobs().states()[0], MobState::FromTarget);
        assert_eq!(sim.spear_pool().in_use(), 1);
        assert_eq!(sim.spears().states()[0], SpearState::Starting);
        let spawned = sim.spear_pool().transforms()[0].position;
        assert!((spawned - Vec3::new(0.8, 1.8, 0.0)).length() < 1e-5);

        sim.tick(0.1, target);
        assert_eq!(sim.spears().states()[0], SpearState::Active);
        assert!(sim.spears().velocities()[0].z > 0.0);
        assert_aligned(&sim);
    }

    #[test]
    fn test_landed_spears_go_back_to_pool() {
        let settings = SimSettings::default();
        let target = settings.target_origin;
        let mut sim = low_wall(settings);
        sim.set_mob_count(1);

        let mut returned = 0;
        for _ in 0..200 {
            let report = sim.tick(0.1, target);
            assert!(report.skipped.is_none());
            returned += report.spears_returned;
            assert_aligned(&sim);
            if returned > 0 {
                break;
            }
        }
        assert!(returned > 0, "no spear ever landed");

        let parked_in_use = sim
            .spear_pool()
            .used_indices()
            .filter(|&i| sim.spears().states()[i] == SpearState::Inactive)
            .count();
        assert_eq!(parked_in_use, 0);
    }

    #[test]
    fn test_exhausted_spear_pool_defers_throw() {
        let settings = SimSettings {
            spear_pool_expandable: false,
            ..SimSettings::default()
        };
        let target = settings.target_origin;
        let mut sim = low_wall(settings);
        sim.set_mob_count(1);
        assert_eq!(sim.spear_count(), 1);

        // The only spear leaves; the mob walks back onto its start
        assert_eq!(sim.tick(0.1, target).spears_thrown, 1);
        sim.tick(0.1, target);
        assert_eq!(sim.mobs().states()[0], MobState::ToTarget);

        // Still blocked, but the spear is in flight
        let report = sim.tick(0.1, target);
        assert_eq!(report.spears_thrown, 0);
        assert_eq!(report.throws_deferred, 1);
        assert_eq!(sim.mobs().states()[0], MobState::Throw);
        assert_eq!(sim.spear_pool().in_use(), 1);

        for _ in 0..300 {
            let report = sim.tick(0.1, target);
            assert_aligned(&sim);
            if report.spears_returned > 0 {
                // The landed slot is handed out in the same tick
                assert_eq!(report.spears_thrown, 1);
                assert_eq!(report.throws_deferred, 0);
                assert_eq!(sim.mobs().states()[0], MobState::FromTarget);
                assert_eq!(sim.spear_count(), 1);
                return;
            }
            assert_eq!(report.throws_deferred, 1);
            assert_eq!(sim.mobs().states()[0], MobState::Throw);
        }
        panic!("spear never landed");
    }

    #[test]
    fn test_expandable_spear_pool_grows_on_throw() {
        let settings = SimSettings::default();
        let target = settings.target_origin;
        let mut sim = low_wall(settings);
        sim.set_mob_count(1);
        assert_eq!(sim.spear_count(), 1);

        assert_eq!(sim.tick(0.1, target).spears_thrown, 1);
        sim.tick(0.1, target);

        // Second throw while the first spear still flies
        let report = sim.tick(0.1, target);
        assert_eq!(report.spears_thrown, 1);
        assert_eq!(report.throws_deferred, 0);
        assert_eq!(sim.spear_count(), 2);
        assert_eq!(sim.spears().len(), 2);
        assert_eq!(sim.spears().states()[0], SpearState::Active);
        assert_eq!(sim.spears().states()[1], SpearState::Starting);
    }

    #[test]
    fn test_zero_spear_ratio_still_covers_every_mob() {
        let settings = SimSettings {
            spears_per_mob: 0,
            spear_pool_expandable: false,
            ..SimSettings::default()
        };
        let mut sim = open_field(settings);
        sim.set_mob_count(100);
        assert_eq!(sim.spear_count(), 100);
        assert_aligned(&sim);

        sim.set_mob_count(-40);
        assert_eq!(sim.spear_count(), 60);
        assert_aligned(&sim);
    }

    #[test]
    fn test_direct_mob_pool_growth_is_adopted() {
        let settings = SimSettings::default();
        let origin = settings.spawn_origin;
        let spacing = settings.spawn_spacing;
        let mut sim = open_field(settings);
        sim.set_mob_count(5);
        sim.mob_pool_mut().expand(3);
        assert!(sim.tick(0.1, sim.target()).skipped.is_some());

        sim.set_mob_count(0);
        assert_eq!(sim.mob_count(), 8);
        assert!(sim.spear_count() >= sim.mob_count());
        for i in 5..8 {
            let expected = position_for_index(origin, i, spacing);
            assert!(sim.mob_pool().is_used(i));
            assert_eq!(sim.mob_pool().transforms()[i].position, expected);
            assert_eq!(sim.mobs().start_pos()[i], expected);
            assert_eq!(sim.mobs().states()[i], MobState::ToTarget);
        }
        assert_aligned(&sim);

        let report = sim.tick(0.1, sim.target());
        assert!(report.skipped.is_none());
        let start = position_for_index(origin, 7, spacing);
        assert!(sim.mob_pool().transforms()[7].position.z > start.z);
    }

    #[test]
    fn test_desync_skips_tick_until_reconciled() {
        let mut sim = open_field(SimSettings::default());
        sim.set_mob_count(5);
        sim.spear_pool_mut().expand(3);

        let report = sim.tick(0.1, sim.target());
        assert_eq!(
            report.skipped,
            Some(SimError::Desync {
                lane: "spears",
                pool_len: 8,
                state_len: 5
            })
        );
        let before = sim.mob_pool().transforms()[1].position;

        sim.set_mob_count(0);
        let report = sim.tick(0.1, sim.target());
        assert!(report.skipped.is_none());
        assert_ne!(sim.mob_pool().transforms()[1].position, before);
        assert_aligned(&sim);
    }

    #[test]
    fn test_invalid_dt_is_clamped() {
        let mut sim = open_field(SimSettings::default());
        sim.set_mob_count(3);
        let before: Vec<Vec3> = sim.mob_pool().transforms().iter().map(|t| t.position).collect();

        for dt in [f32::NAN, -1.0, f32::INFINITY] {
            let report = sim.tick(dt, sim.target());
            assert!(report.skipped.is_none());
        }
        let after: Vec<Vec3> = sim.mob_pool().transforms().iter().map(|t| t.position).collect();
        assert_eq!(before, after);
        assert_eq!(sim.tick_count(), 3);
    }
}
