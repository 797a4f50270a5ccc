// Copyright 2025 John Brosnihan
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
//! System scheduler with parallel execution support
//!
//! Systems are organized into stages that execute sequentially. Within a
//! stage the matching chunks are split into work items and dispatched to a
//! Rayon pool; every work item runs all matching systems of the stage over
//! its chunks in registration order. Systems of one stage may not both
//! write the same component.
//!
//! Each stage ends with a barrier followed by playback of the commands the
//! work items recorded, so structural changes made in one stage are visible
//! to the next one.
//!
//! ```text
//! Idle -> Querying -> Dispatching -> Executing -> Joining -> PlayingBack -> Idle
//! ```

use std::collections::BTreeSet;
use std::time::Instant;

use log::{debug, info, trace, warn};

use crate::config::SchedulerConfig;
use crate::ecs::archetype::Chunk;
use crate::ecs::command::{CommandBuffer, CommandEntry, CommandSegment};
use crate::ecs::query::Query;
use crate::ecs::system::{AccessDecl, EntityMut, System, TickContext, TickTime};
use crate::ecs::World;
use crate::error::{EcsError, Result};
use crate::physics::PhysicsBackend;
use crate::pool::VecPool;

/// Stage identifier for grouping systems
///
/// Systems in the same stage run in one parallel phase, while stages execute
/// sequentially in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageId(pub usize);

impl StageId {
    /// Create a new stage ID
    pub fn new(id: usize) -> Self {
        StageId(id)
    }
}

/// Pre-defined stages for a gameplay frame
pub mod stages {
    use super::StageId;

    /// Spawning and other structural setup for the frame
    pub const BEGIN_SIMULATION: StageId = StageId(0);

    /// Steering and input-driven movement
    pub const SIMULATION: StageId = StageId(1);

    /// Adjustments to rigid-body state before the physics step
    pub const PHYSICS_SETUP: StageId = StageId(2);

    /// Copying simulation state to presentation objects
    pub const PRESENTATION: StageId = StageId(3);

    /// Cleanup at the end of the frame
    pub const END_SIMULATION: StageId = StageId(4);
}

/// Handle returned by [`Scheduler::add_system`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(usize);

/// Phase of the scheduler's tick cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for a tick
    Idle,
    /// Preparing systems and matching archetypes
    Querying,
    /// Splitting matching chunks into work items
    Dispatching,
    /// Work items are running
    Executing,
    /// Waiting for all work items and collecting their segments
    Joining,
    /// Applying recorded commands
    PlayingBack,
    /// The pool has been released
    ShutDown,
}

/// Counters for one call to [`Scheduler::run_tick`]
#[derive(Debug, Default)]
pub struct TickReport {
    /// Per-entity updates attempted
    pub entities_processed: usize,
    /// Per-entity updates that returned an error
    pub entity_failures: usize,
    /// Commands applied at stage barriers
    pub commands_applied: usize,
    /// Commands skipped during playback
    pub playback_failures: Vec<EcsError>,
    /// Stages that ran
    pub stages_run: usize,
}

/// A system with metadata for scheduling
struct ScheduledSystem {
    system: Box<dyn System>,
    stage: StageId,
    query: Query,
    access: AccessDecl,
    active: bool,
}

/// Chunk handed to a worker together with the systems to run on it
struct WorkItem<'w> {
    chunk: &'w mut Chunk,
    systems: Vec<usize>,
}

#[derive(Default)]
struct WorkOutcome {
    processed: usize,
    failures: usize,
    segment: Option<CommandSegment>,
}

/// System scheduler with staged parallel execution
///
/// # Examples
///
/// ```
/// use gameplay_ecs::ecs::scheduler::{stages, Scheduler};
/// use gameplay_ecs::ecs::{AccessDecl, FnSystem, Query, World};
/// use gameplay_ecs::config::SchedulerConfig;
/// use gameplay_ecs::physics::NoObstacles;
/// use gameplay_ecs::ecs::TickTime;
///
/// let mut scheduler = Scheduler::new(SchedulerConfig::new(2)).unwrap();
/// scheduler
///     .add_system(
///         FnSystem::new("noop", Query::new(), AccessDecl::new(), |_, _, _| Ok(())),
///         stages::SIMULATION,
///     )
///     .unwrap();
///
/// let mut world = World::new();
/// world.create_entity().unwrap();
/// let report = scheduler
///     .run_tick(&mut world, TickTime::new(0.0, 0.016), &NoObstacles)
///     .unwrap();
/// assert_eq!(report.entities_processed, 1);
/// ```
pub struct Scheduler {
    config: SchedulerConfig,
    systems: Vec<ScheduledSystem>,
    state: SchedulerState,
    tick: u64,
    segment_pool: VecPool<CommandEntry>,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    #[cfg(not(feature = "parallel"))]
    shut_down: bool,
}

impl Scheduler {
    /// Create a scheduler and start its worker pool
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        let workers = config.resolved_workers();

        #[cfg(feature = "parallel")]
        let pool = Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("ecs-worker-{}", i))
                .build()?,
        );

        info!("scheduler started with {} workers", workers);
        Ok(Scheduler {
            segment_pool: VecPool::with_config(config.segment_pool.clone()),
            config,
            systems: Vec::new(),
            state: SchedulerState::Idle,
            tick: 0,
            #[cfg(feature = "parallel")]
            pool,
            #[cfg(not(feature = "parallel"))]
            shut_down: false,
        })
    }

    /// Add a system to a stage
    ///
    /// Fails with `AccessConflict` if another system of the stage writes a
    /// component this system also writes.
    pub fn add_system<S: System + 'static>(&mut self, system: S, stage: StageId) -> Result<SystemId> {
        let access = system.access();
        for other in self.systems.iter().filter(|s| s.stage == stage) {
            if let Some(ty) = other.access.write_conflict(&access) {
                return Err(EcsError::AccessConflict {
                    component: ty.name(),
                    first: other.system.name().to_string(),
                    second: system.name().to_string(),
                });
            }
        }

        debug!("registered system `{}` in stage {}", system.name(), stage.0);
        let id = SystemId(self.systems.len());
        self.systems.push(ScheduledSystem {
            query: system.query(),
            access,
            system: Box::new(system),
            stage,
            active: true,
        });
        Ok(id)
    }

    /// Get the number of registered systems
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Get the number of distinct stages in use
    pub fn stage_count(&self) -> usize {
        self.stage_ids().len()
    }

    /// Current phase of the tick cycle
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of ticks started so far
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Name of a registered system
    pub fn system_name(&self, id: SystemId) -> Option<&str> {
        self.systems.get(id.0).map(|s| s.system.name())
    }

    /// Command segment buffer pool shared by all ticks
    pub fn segment_pool(&self) -> &VecPool<CommandEntry> {
        &self.segment_pool
    }

    fn stage_ids(&self) -> Vec<StageId> {
        let ids: BTreeSet<StageId> = self.systems.iter().map(|s| s.stage).collect();
        ids.into_iter().collect()
    }

    #[cfg(feature = "parallel")]
    fn is_shut_down(&self) -> bool {
        self.pool.is_none()
    }

    #[cfg(not(feature = "parallel"))]
    fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Run every stage once
    ///
    /// Per-entity failures are logged and counted; the tick continues.
    /// `AccessConflict` and `CapacityExceeded` abort the tick and are
    /// returned. Access declarations of all stages are checked before the
    /// first stage runs, so a conflict leaves the world untouched. Stages
    /// completed before a capacity failure keep their effects.
    pub fn run_tick(
        &mut self,
        world: &mut World,
        time: TickTime,
        physics: &dyn PhysicsBackend,
    ) -> Result<TickReport> {
        if self.is_shut_down() {
            return Err(EcsError::SchedulerShutdown);
        }
        self.tick += 1;
        let ctx = TickContext::new(time, self.tick, physics);
        let started = Instant::now();

        let result = self.run_stages(world, &ctx);
        self.state = SchedulerState::Idle;

        if let Ok(report) = &result {
            trace!(
                "tick {}: {} stages, {} updates in {:?}",
                self.tick,
                report.stages_run,
                report.entities_processed,
                started.elapsed()
            );
        }
        result
    }

    fn run_stages(&mut self, world: &mut World, ctx: &TickContext<'_>) -> Result<TickReport> {
        self.state = SchedulerState::Querying;
        self.refresh_declarations()?;

        let mut report = TickReport::default();
        for stage in self.stage_ids() {
            self.run_stage(stage, world, ctx, &mut report)?;
            report.stages_run += 1;
        }
        Ok(report)
    }

    /// Refresh every system's query and access declaration, then reject
    /// write/write overlaps within a stage
    fn refresh_declarations(&mut self) -> Result<()> {
        for scheduled in &mut self.systems {
            scheduled.query = scheduled.system.query();
            scheduled.access = scheduled.system.access();
        }

        for stage in self.stage_ids() {
            let in_stage: Vec<&ScheduledSystem> = self.systems.iter().filter(|s| s.stage == stage).collect();
            for (i, first) in in_stage.iter().enumerate() {
                for second in &in_stage[i + 1..] {
                    if let Some(ty) = first.access.write_conflict(&second.access) {
                        return Err(EcsError::AccessConflict {
                            component: ty.name(),
                            first: first.system.name().to_string(),
                            second: second.system.name().to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Let the systems of a stage prepare, recording which take part
    fn prepare_stage(&mut self, stage: StageId, world: &World, time: &TickTime) -> Result<()> {
        for scheduled in self.systems.iter_mut().filter(|s| s.stage == stage) {
            scheduled.active = match scheduled.system.prepare(world, time) {
                Ok(active) => active,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("system `{}` skipped this tick: {}", scheduled.system.name(), err);
                    false
                }
            };
        }
        Ok(())
    }

    fn run_stage(
        &mut self,
        stage: StageId,
        world: &mut World,
        ctx: &TickContext<'_>,
        report: &mut TickReport,
    ) -> Result<()> {
        let started = Instant::now();

        self.state = SchedulerState::Querying;
        self.prepare_stage(stage, world, &ctx.time)?;
        let active: Vec<usize> = self
            .systems
            .iter()
            .enumerate()
            .filter(|(_, s)| s.stage == stage && s.active)
            .map(|(i, _)| i)
            .collect();

        self.state = SchedulerState::Dispatching;
        let mut items = Vec::new();
        for archetype in world.archetypes_mut() {
            let matching: Vec<usize> = active
                .iter()
                .copied()
                .filter(|&i| self.systems[i].query.matches(archetype.signature()))
                .collect();
            if matching.is_empty() {
                continue;
            }
            for chunk in archetype.chunks_mut() {
                if !chunk.is_empty() {
                    items.push(WorkItem {
                        chunk,
                        systems: matching.clone(),
                    });
                }
            }
        }
        let chunk_count = items.len();
        let item_size = self.config.work_item_size(chunk_count);

        self.state = SchedulerState::Executing;
        let outcomes = self.execute(&mut items, item_size, ctx);
        drop(items);

        self.state = SchedulerState::Joining;
        let mut buffer = CommandBuffer::new();
        for outcome in outcomes {
            report.entities_processed += outcome.processed;
            report.entity_failures += outcome.failures;
            if let Some(segment) = outcome.segment {
                buffer.push_segment(segment);
            }
        }

        self.state = SchedulerState::PlayingBack;
        let playback = buffer.playback(world);
        for entries in buffer.into_buffers() {
            self.segment_pool.release(entries);
        }
        let playback = playback?;
        report.commands_applied += playback.applied;
        report.playback_failures.extend(playback.failures);

        if self.config.log_stage_timing {
            debug!(
                "stage {}: {} chunks, {} commands in {:?}",
                stage.0,
                chunk_count,
                playback.applied,
                started.elapsed()
            );
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn execute(&self, items: &mut [WorkItem<'_>], item_size: usize, ctx: &TickContext<'_>) -> Vec<WorkOutcome> {
        use rayon::prelude::*;

        let systems = &self.systems;
        let segment_pool = &self.segment_pool;
        let run = || {
            items
                .par_chunks_mut(item_size)
                .enumerate()
                .map(|(origin, batch)| run_work_item(origin as u32, batch, systems, segment_pool, ctx))
                .collect::<Vec<WorkOutcome>>()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => Vec::new(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn execute(&self, items: &mut [WorkItem<'_>], item_size: usize, ctx: &TickContext<'_>) -> Vec<WorkOutcome> {
        items
            .chunks_mut(item_size)
            .enumerate()
            .map(|(origin, batch)| run_work_item(origin as u32, batch, &self.systems, &self.segment_pool, ctx))
            .collect()
    }

    /// Release the worker pool
    ///
    /// Later calls to [`Scheduler::run_tick`] fail with `SchedulerShutdown`.
    pub fn shutdown(&mut self) {
        #[cfg(feature = "parallel")]
        {
            self.pool = None;
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.shut_down = true;
        }
        self.segment_pool.clear();
        self.state = SchedulerState::ShutDown;
        info!("scheduler shut down after {} ticks", self.tick);
    }
}

/// Run every matching system over the chunks of one work item
fn run_work_item(
    origin: u32,
    batch: &mut [WorkItem<'_>],
    systems: &[ScheduledSystem],
    segment_pool: &VecPool<CommandEntry>,
    ctx: &TickContext<'_>,
) -> WorkOutcome {
    let mut outcome = WorkOutcome::default();
    let mut segment = CommandSegment::with_buffer(origin, segment_pool.acquire());

    for item in batch.iter_mut() {
        for &index in &item.systems {
            let scheduled = &systems[index];
            for row in 0..item.chunk.len() {
                let entity = item.chunk.entities()[row];
                let mut view = EntityMut::new(entity, row, &mut *item.chunk, &scheduled.access);
                outcome.processed += 1;
                if let Err(err) = scheduled.system.update(&mut view, &mut segment, ctx) {
                    outcome.failures += 1;
                    warn!("system `{}` failed on {}: {}", scheduled.system.name(), entity, err);
                }
            }
        }
    }

    if segment.is_empty() {
        segment_pool.release(segment.into_buffer());
    } else {
        outcome.segment = Some(segment);
    }
    outcome
}
