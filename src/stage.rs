//! Pipeline stages and their declared buffer access.
//!
//! A stage is one data-parallel transform over a lane's buffers. Stages
//! declare which buffers they read and write; a [`StageChain`] runs them in
//! order and uses the declarations to reject orderings that would consume a
//! per-tick buffer before it was produced.

use smallvec::SmallVec;
use std::time::{Duration, Instant};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::config::SimSettings;
use crate::error::{Result, SimError};
use crate::physics::CollisionWorld;

/// Shared buffers touched by pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    MobTransforms,
    MobStartPos,
    MobTargetPos,
    MobStates,
    MobRays,
    MobHits,
    SpearTransforms,
    SpearVelocities,
    SpearStates,
    SpearRays,
    SpearHits,
}

impl BufferId {
    /// Rebuilt every tick; reading one before it is written reads stale data.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            BufferId::MobRays | BufferId::MobHits | BufferId::SpearRays | BufferId::SpearHits
        )
    }
}

type BufferList = SmallVec<[BufferId; 4]>;

/// Stage access metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageAccess {
    pub reads: BufferList,
    pub writes: BufferList,
}

impl StageAccess {
    pub fn new(reads: &[BufferId], writes: &[BufferId]) -> Self {
        Self {
            reads: reads.iter().copied().collect(),
            writes: writes.iter().copied().collect(),
        }
    }

    /// Union of all reads/writes
    pub fn merge(&self, other: &StageAccess) -> StageAccess {
        let mut merged = self.clone();
        for read in &other.reads {
            if !merged.reads.contains(read) {
                merged.reads.push(*read);
            }
        }
        for write in &other.writes {
            if !merged.writes.contains(write) {
                merged.writes.push(*write);
            }
        }
        merged
    }

    /// Write/write or read/write overlap on any buffer
    pub fn conflicts_with(&self, other: &StageAccess) -> bool {
        self.writes
            .iter()
            .any(|w| other.writes.contains(w) || other.reads.contains(w))
            || other.writes.iter().any(|w| self.reads.contains(w))
    }

    pub fn touches(&self, buffer: BufferId) -> bool {
        self.reads.contains(&buffer) || self.writes.contains(&buffer)
    }
}

/// Per-tick inputs shared by every stage
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    pub dt: f32,
    /// Current target (and wall) position
    pub target: glam::Vec3,
    pub settings: &'a SimSettings,
    pub scene: &'a dyn CollisionWorld,
}

/// A family of buffers stages operate on (mobs, spears)
pub trait Lane: 'static {
    const NAME: &'static str;

    /// Borrowed view of the lane's buffers for one tick
    type Frame<'a>: Send;
}

/// One pipeline stage
pub trait Stage<L: Lane>: Send + Sync {
    fn name(&self) -> &'static str;

    fn access(&self) -> StageAccess;

    fn run(&self, frame: &mut L::Frame<'_>, ctx: &TickContext<'_>) -> Result<()>;
}

/// Boxed stage
pub type BoxedStage<L> = Box<dyn Stage<L>>;

/// Time spent in one stage during a run
#[derive(Debug, Clone)]
pub struct StageTiming {
    pub name: &'static str,
    pub duration: Duration,
}

/// Ordered, validated list of stages for one lane
pub struct StageChain<L: Lane> {
    stages: Vec<BoxedStage<L>>,
}

impl<L: Lane> StageChain<L> {
    /// Build a chain, checking producer-before-consumer order
    pub fn new(stages: Vec<BoxedStage<L>>) -> Result<Self> {
        let accesses: Vec<StageAccess> = stages.iter().map(|s| s.access()).collect();
        for (i, access) in accesses.iter().enumerate() {
            for &buffer in access.reads.iter().filter(|b| b.is_transient()) {
                let produced = accesses[..i].iter().any(|a| a.writes.contains(&buffer));
                if !produced {
                    return Err(SimError::StageOrder {
                        stage: stages[i].name(),
                        buffer,
                    });
                }
            }
        }
        Ok(Self { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Merged access of the whole chain
    pub fn access(&self) -> StageAccess {
        self.stages
            .iter()
            .fold(StageAccess::default(), |acc, s| acc.merge(&s.access()))
    }

    /// Run every stage in order. Each stage completes before the next one
    /// starts.
    pub fn run(
        &self,
        frame: &mut L::Frame<'_>,
        ctx: &TickContext<'_>,
    ) -> Result<Vec<StageTiming>> {
        let mut timings = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            #[cfg(feature = "profiling")]
            let _span = info_span!("stage", lane = L::NAME, name = stage.name()).entered();

            let start = Instant::now();
            stage.run(frame, ctx)?;
            let duration = start.elapsed();
            tracing::trace!(lane = L::NAME, stage = stage.name(), ?duration, "stage done");
            timings.push(StageTiming {
                name: stage.name(),
                duration,
            });
        }
        Ok(timings)
    }
}
