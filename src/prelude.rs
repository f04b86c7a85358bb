//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use spear_pipeline::prelude::*;
//! ```

pub use crate::config::SimSettings;
pub use crate::error::{Result, SimError};
pub use crate::mob::MobState;
pub use crate::physics::{CollisionWorld, StaticScene};
pub use crate::population::PopulationChange;
pub use crate::sim::{Simulation, TickReport};
pub use crate::spear::SpearState;
pub use crate::target::TargetOscillator;
pub use crate::transform::Transform;
pub use glam::{Quat, Vec3};
