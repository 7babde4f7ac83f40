// world.rs - Update loop: ordered systems followed by one flush

use crate::ecs::{short_type_name, EntityError, EntityManager, FlushStats};
use crate::job::{DispatchError, ExternalData, JobScheduler, ParallelJob, TaskFailure};
use rayon::ThreadPool;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Task(#[from] TaskFailure),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error("system '{system}' failed: {message}")]
    System { system: &'static str, message: String },
}

/// What a system sees during one update.
pub struct SystemContext<'w> {
    pub entities: &'w Arc<EntityManager>,
    pub scheduler: &'w JobScheduler,
    pub executor: &'w ThreadPool,
}

impl SystemContext<'_> {
    /// Dispatch `J` and wait for every sub-range to finish.
    pub fn run_job<J: ParallelJob>(&self, external: Option<&ExternalData>) -> Result<(), WorldError> {
        self.scheduler
            .execute_parallel_job::<J>(self.entities, external, self.executor)?
            .wait()?;
        Ok(())
    }
}

/// One step of the update loop. Systems typically dispatch jobs and join
/// them; structural changes they request are applied after every system
/// has run.
pub trait System: Send {
    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }

    fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), WorldError>;
}

/// Owns the entity store, the scheduler, the executor and the ordered
/// system list.
pub struct World {
    entities: Arc<EntityManager>,
    scheduler: JobScheduler,
    executor: Arc<ThreadPool>,
    systems: Vec<Box<dyn System>>,
    tick: u64,
}

impl World {
    pub fn new(entities: Arc<EntityManager>, scheduler: JobScheduler, executor: Arc<ThreadPool>) -> Self {
        Self {
            entities,
            scheduler,
            executor,
            systems: Vec::new(),
            tick: 0,
        }
    }

    /// Append a system; systems run in insertion order.
    pub fn add_system(&mut self, system: impl System + 'static) -> &mut Self {
        tracing::debug!(system = system.name(), "adding system");
        self.systems.push(Box::new(system));
        self
    }

    pub fn entities(&self) -> &Arc<EntityManager> {
        &self.entities
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn executor(&self) -> &Arc<ThreadPool> {
        &self.executor
    }

    /// Completed updates.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|system| system.name()).collect()
    }

    /// Run every system, then flush.
    ///
    /// A failing system aborts the update before the flush; commands it and
    /// earlier systems buffered stay pending for the next flush.
    pub fn update(&mut self) -> Result<FlushStats, WorldError> {
        let ctx = SystemContext {
            entities: &self.entities,
            scheduler: &self.scheduler,
            executor: &self.executor,
        };
        for system in &mut self.systems {
            let name = system.name();
            tracing::trace!(tick = self.tick, system = name, "running system");
            if let Err(err) = system.update(&ctx) {
                tracing::error!(tick = self.tick, system = name, error = %err, "system failed");
                return Err(err);
            }
        }

        let stats = self.entities.flush()?;
        self.tick += 1;
        Ok(stats)
    }
}
