//! Per-tick pipeline execution and stage profiling.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::mob::{self, MobFrame, MobLane};
use crate::spear::{self, SpearFrame, SpearLane};
use crate::stage::{Lane, StageChain, StageTiming, TickContext};

/// Stage execution statistics
#[derive(Debug, Clone)]
pub struct StageStats {
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
    pub call_count: u64,
}

/// Stage profiler for collecting timing data
#[derive(Debug, Default)]
pub struct StageProfiler {
    timings: FxHashMap<&'static str, Vec<Duration>>,
    call_counts: FxHashMap<&'static str, u64>,
}

impl StageProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_execution(&mut self, stage: &'static str, duration: Duration) {
        self.timings.entry(stage).or_default().push(duration);
        self.call_counts
            .entry(stage)
            .and_modify(|c| *c += 1)
            .or_insert(1);
    }

    pub fn get_stats(&self, stage: &str) -> Option<StageStats> {
        let timings = self.timings.get(stage)?;
        if timings.is_empty() {
            return None;
        }

        let min = *timings.iter().min().unwrap_or(&Duration::ZERO);
        let max = *timings.iter().max().unwrap_or(&Duration::ZERO);
        let avg = timings.iter().sum::<Duration>() / timings.len() as u32;

        Some(StageStats {
            min,
            max,
            avg,
            call_count: *self.call_counts.get(stage).unwrap_or(&0),
        })
    }

    pub fn clear(&mut self) {
        self.timings.clear();
        self.call_counts.clear();
    }
}

/// Execution profile for one tick
#[derive(Debug, Clone)]
pub struct ExecutionProfile {
    pub total_tick_time: Duration,
    pub concurrent: bool,
    pub stage_timings: Vec<StageTiming>,
}

/// The mob and spear chains plus the policy for running them
pub struct SimulationPipeline {
    mobs: StageChain<MobLane>,
    spears: StageChain<SpearLane>,
    concurrent: bool,
    profiler: Mutex<StageProfiler>,
    last_profile: Mutex<Option<ExecutionProfile>>,
}

impl SimulationPipeline {
    /// Pipeline with the standard mob and spear stages
    pub fn standard() -> Result<Self> {
        Ok(Self::new(mob::standard_chain()?, spear::standard_chain()?))
    }

    /// Chains may only run side by side when their merged accesses are
    /// disjoint.
    pub fn new(mobs: StageChain<MobLane>, spears: StageChain<SpearLane>) -> Self {
        let concurrent = !mobs.access().conflicts_with(&spears.access());
        tracing::debug!(
            mob_stages = ?mobs.names(),
            spear_stages = ?spears.names(),
            concurrent,
            "pipeline plan"
        );
        Self {
            mobs,
            spears,
            concurrent,
            profiler: Mutex::new(StageProfiler::new()),
            last_profile: Mutex::new(None),
        }
    }

    pub fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    pub fn mob_chain(&self) -> &StageChain<MobLane> {
        &self.mobs
    }

    pub fn spear_chain(&self) -> &StageChain<SpearLane> {
        &self.spears
    }

    /// Run both chains to completion. Returning is the barrier: every
    /// stage write is visible to the caller.
    pub fn run(
        &self,
        mob_frame: &mut MobFrame<'_>,
        spear_frame: &mut SpearFrame<'_>,
        ctx: &TickContext<'_>,
    ) -> Result<()> {
        let start = Instant::now();

        let (mob_timings, spear_timings) = if self.concurrent {
            rayon::join(
                || self.run_chain(&self.mobs, mob_frame, ctx),
                || self.run_chain(&self.spears, spear_frame, ctx),
            )
        } else {
            (
                self.run_chain(&self.mobs, mob_frame, ctx),
                self.run_chain(&self.spears, spear_frame, ctx),
            )
        };

        let mut stage_timings = mob_timings?;
        stage_timings.extend(spear_timings?);
        *self.last_profile.lock() = Some(ExecutionProfile {
            total_tick_time: start.elapsed(),
            concurrent: self.concurrent,
            stage_timings,
        });
        Ok(())
    }

    fn run_chain<L: Lane>(
        &self,
        chain: &StageChain<L>,
        frame: &mut L::Frame<'_>,
        ctx: &TickContext<'_>,
    ) -> Result<Vec<StageTiming>> {
        let timings = chain.run(frame, ctx)?;
        let mut profiler = self.profiler.lock();
        for timing in &timings {
            profiler.record_execution(timing.name, timing.duration);
        }
        Ok(timings)
    }

    pub fn stats(&self, stage: &str) -> Option<StageStats> {
        self.profiler.lock().get_stats(stage)
    }

    pub fn clear_stats(&self) {
        self.profiler.lock().clear();
    }

    /// Profile of the most recent run
    pub fn profile(&self) -> Option<ExecutionProfile> {
        self.last_profile.lock().clone()
    }

    /// Print profiling information for the last tick
    pub fn print_profile(&self) {
        if let Some(profile) = self.profile() {
            println!(
                "Tick time: {:.3?} ({} stages, concurrent: {})",
                profile.total_tick_time,
                profile.stage_timings.len(),
                profile.concurrent
            );
            for (index, timing) in profile.stage_timings.iter().enumerate() {
                println!("  {:02}: {:<26} {:?}", index, timing.name, timing.duration);
            }
        } else {
            println!("No profiling data collected yet.");
        }
    }
}
