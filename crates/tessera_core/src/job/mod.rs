//! Parallel jobs over archetype pools.
//!
//! A job type declares the columns and external values it reads, is
//! registered once in a [`JobRegistry`], and is dispatched by the
//! [`JobScheduler`], which splits every matching pool by estimated workload.

mod external;
mod handle;
mod parallel_job;
mod registration_error;
mod registry;
mod scheduler;

pub use external::ExternalData;
pub use handle::{Completion, ExecutionHandle, TaskFailure};
pub use parallel_job::{JobDeclaration, ParallelJob};
pub use registration_error::JobRegistrationError;
pub use registry::JobRegistry;
pub use scheduler::{DispatchError, JobScheduler};
