// scheduler.rs - Workload-aware dispatch of parallel jobs
//
// A dispatch queries the matching pools, estimates the workload of every
// live index, and splits each pool into contiguous sub-ranges of roughly
// `target_workload_per_thread`. Small pools run inline on the caller;
// larger ones are spawned on the caller's rayon pool. The scheduler keeps no
// state between dispatches.

use super::handle::{Completion, ExecutionHandle, TaskFailure, TaskResult};
use super::{ExternalData, JobRegistry, ParallelJob};
use crate::config::{ConfigError, EcsConfig};
use crate::ecs::{short_type_name, ArchetypeKey, ArrayRange, EntityManager, EntityQuery, PoolError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("job '{job}' is not registered")]
    UnregisteredJob { job: &'static str },

    #[error("job '{job}' needs external data '{key}', which was not provided")]
    MissingExternalData { job: &'static str, key: String },

    #[error("external data '{key}' for job '{job}' is not a {expected}")]
    ExternalDataType {
        job: &'static str,
        key: String,
        expected: &'static str,
    },

    #[error("job '{job}' estimated a workload of {estimate} for index {index}; estimates must be at least 1")]
    InvalidWorkload {
        job: &'static str,
        index: usize,
        estimate: u32,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Contiguous run of live indexes handed to one task, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubRange {
    pub first: usize,
    pub last: usize,
    pub workload: u64,
}

/// How one pool is split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Partition {
    /// Number of tasks the pool's workload calls for. At most one means the
    /// pool runs inline.
    pub tasks: usize,
    pub ranges: Vec<SubRange>,
}

/// Split `(index, estimate)` pairs, ascending by index, into sub-ranges.
///
/// `ceil(W / target)` tasks are used when that fits in `threads`; otherwise
/// exactly `threads` tasks with the target lowered to `max(1, W / threads)`.
/// A sub-range closes once its running sum reaches the target, and the last
/// open sub-range takes everything left once `tasks - 1` have closed.
pub(crate) fn partition(estimates: &[(usize, u32)], target: u32, threads: usize) -> Partition {
    let (Some(&(first_index, _)), Some(&(last_index, _))) = (estimates.first(), estimates.last()) else {
        return Partition {
            tasks: 0,
            ranges: Vec::new(),
        };
    };

    let workload: u64 = estimates.iter().map(|&(_, estimate)| u64::from(estimate)).sum();
    let threads = threads.max(1);
    let target = u64::from(target.max(1));
    let desired = usize::try_from(workload.div_ceil(target)).unwrap_or(usize::MAX);
    let (tasks, target) = if desired > threads {
        (threads, (workload / threads as u64).max(1))
    } else {
        (desired, target)
    };

    if tasks <= 1 {
        return Partition {
            tasks,
            ranges: vec![SubRange {
                first: first_index,
                last: last_index,
                workload,
            }],
        };
    }

    let mut ranges = Vec::with_capacity(tasks);
    let mut open: Option<usize> = None;
    let mut accumulated = 0u64;
    for &(index, estimate) in estimates {
        let first = *open.get_or_insert(index);
        accumulated += u64::from(estimate);
        if accumulated >= target && ranges.len() + 1 < tasks {
            ranges.push(SubRange {
                first,
                last: index,
                workload: accumulated,
            });
            open = None;
            accumulated = 0;
        }
    }
    if let Some(first) = open {
        ranges.push(SubRange {
            first,
            last: last_index,
            workload: accumulated,
        });
    }

    Partition { tasks, ranges }
}

/// Everything needed to run one pool once its estimates are in.
struct PoolPlan<J> {
    key: ArchetypeKey,
    range: Arc<ArrayRange>,
    partition: Partition,
    /// One instance per sub-range, in sub-range order.
    jobs: Vec<J>,
}

/// Dispatches registered [`ParallelJob`]s over the entity store.
pub struct JobScheduler {
    registry: Arc<JobRegistry>,
    target_workload_per_thread: u32,
}

impl JobScheduler {
    pub fn new(registry: Arc<JobRegistry>, config: &EcsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry,
            target_workload_per_thread: config.target_workload_per_thread,
        })
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn target_workload_per_thread(&self) -> u32 {
        self.target_workload_per_thread
    }

    /// Run `J` over every live index of every matching pool.
    ///
    /// Contract errors (unregistered job, missing or mistyped external data,
    /// an estimate below 1) are returned before any index is executed.
    /// Sub-ranges that run inline have finished when this returns; spawned
    /// ones are joined through the returned handle. Never call
    /// [`EntityManager::flush`] before the handle has been waited on.
    pub fn execute_parallel_job<J: ParallelJob>(
        &self,
        entities: &Arc<EntityManager>,
        external: Option<&ExternalData>,
        executor: &rayon::ThreadPool,
    ) -> Result<ExecutionHandle, DispatchError> {
        let compiled = self
            .registry
            .compiled::<J>()
            .ok_or(DispatchError::UnregisteredJob {
                job: short_type_name::<J>(),
            })?;
        let job_name = compiled.name();
        compiled.check_external(external)?;

        let mut query = EntityQuery::new();
        J::default().query(&mut query);
        let threads = executor.current_num_threads().max(1);

        let mut plans: Vec<PoolPlan<J>> = Vec::new();
        let mut total_workload = 0u64;
        {
            let matched = entities.start_query(&query);
            for pool in matched.iter() {
                let range = pool.get_array_range();
                if range.is_empty() {
                    continue;
                }

                let estimator = compiled.instantiate(pool, external)?;
                let mut estimates = Vec::with_capacity(range.live_count());
                for index in range.live_indexes() {
                    let estimate = estimator.estimate_workload(index);
                    if estimate < 1 {
                        return Err(DispatchError::InvalidWorkload {
                            job: job_name,
                            index,
                            estimate,
                        });
                    }
                    estimates.push((index, estimate));
                }

                let partition = partition(&estimates, self.target_workload_per_thread, threads);
                total_workload += partition.ranges.iter().map(|sub| sub.workload).sum::<u64>();
                let jobs = if partition.tasks <= 1 {
                    vec![estimator]
                } else {
                    partition
                        .ranges
                        .iter()
                        .map(|_| compiled.instantiate(pool, external))
                        .collect::<Result<Vec<_>, _>>()?
                };
                plans.push(PoolPlan {
                    key: pool.key().clone(),
                    range: Arc::new(range),
                    partition,
                    jobs,
                });
            }
        }

        tracing::debug!(
            job = job_name,
            query = %query.describe(),
            pools = plans.len(),
            workload = total_workload,
            threads,
            "dispatching parallel job"
        );

        let (sender, receiver) = crossbeam_channel::unbounded::<TaskResult>();
        let mut thread_ordinal = 0usize;
        let mut spawned = 0usize;

        for plan in plans {
            let PoolPlan {
                key,
                range,
                partition,
                jobs,
            } = plan;

            if partition.tasks <= 1 {
                tracing::trace!(job = job_name, pool = %key, thread_ordinal, "running pool inline");
                for mut job in jobs {
                    for index in range.live_indexes() {
                        job.execute(entities, index, thread_ordinal);
                    }
                }
                thread_ordinal += 1;
                continue;
            }

            for (sub, mut job) in partition.ranges.into_iter().zip(jobs) {
                tracing::trace!(
                    job = job_name,
                    pool = %key,
                    thread_ordinal,
                    first = sub.first,
                    last = sub.last,
                    workload = sub.workload,
                    "spawning sub-range"
                );
                let sender = sender.clone();
                let entities = Arc::clone(entities);
                let range = Arc::clone(&range);
                let ordinal = thread_ordinal;
                executor.spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        for index in range.live_in(sub.first..sub.last + 1) {
                            job.execute(&entities, index, ordinal);
                        }
                    }));
                    let result = outcome.map_err(|payload| TaskFailure::from_panic(ordinal, payload));
                    // The handle may already be gone; nobody is left to tell.
                    let _ = sender.send(result);
                });
                thread_ordinal += 1;
                spawned += 1;
            }
        }

        let completion = match spawned {
            0 => Completion::Ready,
            1 => Completion::Single(receiver),
            pending => Completion::All { receiver, pending },
        };
        Ok(ExecutionHandle::new(completion, thread_ordinal))
    }
}
