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

//! Spear Pipeline - data-parallel crowd and projectile simulation
//!
//! Pooled mobs walk toward a moving target, throw spears when a wall blocks
//! their line of sight, and spears fly ballistically until they land. Each
//! tick runs as two chains of parallel stages over structure-of-arrays
//! buffers.

pub mod bitset;
pub mod config;
pub mod entity;
pub mod error;
pub mod layout;
pub mod mob;
pub mod physics;
pub mod pipeline;
pub mod pool;
pub mod population;
pub mod prelude;
pub mod sim;
pub mod spear;
pub mod stage;
pub mod target;
pub mod transform;

#[cfg(test)]
mod tests;

pub use config::{BounceAttenuation, SimSettings};
pub use entity::{MobBody, ObjectHandle, Poolable, SceneNode, SpearBody};
pub use error::*;
pub use layout::{position_for_index, SpawnLayout};
pub use mob::{MobFrame, MobLane, MobSimState, MobState};
pub use physics::{cast_batch, CollisionWorld, RaycastCommand, RaycastHit, StaticScene};
pub use pipeline::{ExecutionProfile, SimulationPipeline, StageProfiler, StageStats};
pub use pool::EntityPool;
pub use population::{PopulationChange, PopulationController, Roster};
pub use sim::{Simulation, TickReport};
pub use spear::{SpearFrame, SpearLane, SpearSimState, SpearState};
pub use stage::{
    BoxedStage, BufferId, Lane, Stage, StageAccess, StageChain, StageTiming, TickContext,
};
pub use target::TargetOscillator;
pub use transform::Transform;
