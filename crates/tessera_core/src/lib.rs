//! Tessera core
//!
//! Contains the simulation-side building blocks:
//! - Archetype entity store with deferred structural changes
//! - Workload-aware parallel job scheduler
//! - Store and scheduler configuration

pub mod config;
pub mod ecs;
pub mod job;

pub use config::{ConfigError, EcsConfig, PoolGrowth};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
