//! Completion handle of one job dispatch

use crossbeam_channel::Receiver;
use std::any::Any;
use thiserror::Error;

/// Failure of an asynchronously dispatched sub-range.
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("task on thread ordinal {thread_ordinal} panicked: {message}")]
    Panicked { thread_ordinal: usize, message: String },

    #[error("{missing} task(s) ended without reporting")]
    Lost { missing: usize },
}

impl TaskFailure {
    pub(crate) fn from_panic(thread_ordinal: usize, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TaskFailure::Panicked {
            thread_ordinal,
            message,
        }
    }
}

pub(crate) type TaskResult = Result<(), TaskFailure>;

/// How a dispatch completes.
#[derive(Debug)]
pub enum Completion {
    /// Every sub-range ran inline; nothing to wait for.
    Ready,
    /// Exactly one task was spawned.
    Single(Receiver<TaskResult>),
    /// Several tasks were spawned; all must report.
    All {
        receiver: Receiver<TaskResult>,
        pending: usize,
    },
}

/// Returned by [`JobScheduler::execute_parallel_job`](super::JobScheduler::execute_parallel_job).
///
/// Dropping the handle does not cancel anything; spawned tasks still run to
/// completion.
#[derive(Debug)]
pub struct ExecutionHandle {
    completion: Completion,
    thread_count: usize,
    is_async: bool,
}

impl ExecutionHandle {
    pub(crate) fn new(completion: Completion, thread_count: usize) -> Self {
        let is_async = !matches!(completion, Completion::Ready);
        Self {
            completion,
            thread_count,
            is_async,
        }
    }

    /// Number of thread ordinals handed out, inline runs included.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Whether any sub-range was spawned on the executor.
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Number of spawned tasks.
    pub fn task_count(&self) -> usize {
        match &self.completion {
            Completion::Ready => 0,
            Completion::Single(_) => 1,
            Completion::All { pending, .. } => *pending,
        }
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Whether every spawned task has reported, without blocking.
    pub fn is_complete(&self) -> bool {
        match &self.completion {
            Completion::Ready => true,
            Completion::Single(receiver) => !receiver.is_empty(),
            Completion::All { receiver, pending } => receiver.len() >= *pending,
        }
    }

    /// Block until every spawned task has finished. Returns the first
    /// failure; the remaining tasks are still awaited.
    pub fn wait(self) -> Result<(), TaskFailure> {
        let (receiver, pending) = match self.completion {
            Completion::Ready => return Ok(()),
            Completion::Single(receiver) => (receiver, 1),
            Completion::All { receiver, pending } => (receiver, pending),
        };

        let mut first_failure = None;
        for received in 0..pending {
            let outcome = match receiver.recv() {
                Ok(outcome) => outcome,
                Err(_) => Err(TaskFailure::Lost {
                    missing: pending - received,
                }),
            };
            if let Err(failure) = outcome {
                let lost = matches!(failure, TaskFailure::Lost { .. });
                if first_failure.is_none() {
                    first_failure = Some(failure);
                }
                if lost {
                    break;
                }
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}
