//! Tessera Runtime
//!
//! Boots the entity store and job scheduler and runs the chunk streaming
//! demo for a fixed number of updates.
//!
//! Usage: `tessera [config.json]`

mod chunks;

use anyhow::{Context, Result};
use chunks::{
    Camera, CameraFlightSystem, Chunk, ChunkMeshingSystem, ChunkPrioritizationJob,
    ChunkPrioritizationSystem, ChunkStreamingSystem,
};
use glam::Vec3;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tessera_core::ecs::{ComponentRegistry, EntityManager, World};
use tessera_core::job::{JobRegistry, JobScheduler};
use tessera_core::EcsConfig;

const UPDATES: u64 = 12;
const VIEW_RADIUS: i32 = 12;
const VIEW_HEIGHT: i32 = 1;
const MESH_BUDGET: usize = 256;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Tessera v{}", tessera_core::VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => EcsConfig::from_json_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => EcsConfig::default(),
    };
    tracing::info!(
        target_workload_per_thread = config.target_workload_per_thread,
        initial_capacity = config.pool.initial_capacity,
        "configuration loaded"
    );

    let components = Arc::new(ComponentRegistry::builder().register::<Chunk>()?.build());
    let mut jobs = JobRegistry::new(Arc::clone(&components));
    jobs.register::<ChunkPrioritizationJob>()?;
    tracing::info!(jobs = ?jobs.job_names(), "jobs registered");

    let executor = Arc::new(rayon::ThreadPoolBuilder::new().build()?);
    tracing::info!(threads = executor.current_num_threads(), "executor ready");

    let camera = Arc::new(RwLock::new(Camera {
        world_offset: Vec3::new(8.0, 64.0, 8.0),
    }));
    let mut world = World::new(
        Arc::new(EntityManager::new(components, &config)?),
        JobScheduler::new(Arc::new(jobs), &config)?,
        executor,
    );
    let streaming = ChunkStreamingSystem::new(Arc::clone(&camera), VIEW_RADIUS, VIEW_HEIGHT);
    let unloads = streaming.unloads();
    world
        .add_system(CameraFlightSystem {
            camera: Arc::clone(&camera),
            velocity: Vec3::new(12.0, 0.0, 5.0),
        })
        .add_system(streaming)
        .add_system(ChunkPrioritizationSystem::new(Arc::clone(&camera)))
        .add_system(ChunkMeshingSystem::new(MESH_BUDGET));
    tracing::info!(systems = ?world.system_names(), "world ready");

    for _ in 0..UPDATES {
        let started = Instant::now();
        let stats = world.update()?;
        tracing::info!(
            tick = world.tick(),
            created = stats.created,
            destroyed = stats.destroyed,
            chunks = world.entities().live_entity_count(),
            pools = world.entities().pool_count(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "update complete"
        );
    }

    let histogram = chunks::priority_histogram(world.entities())?;
    for (priority, count) in histogram {
        tracing::info!(priority, count, "chunks by priority");
    }
    tracing::info!(
        unloaded = unloads.unloaded(),
        unmeshed = unloads.unmeshed(),
        dirty = chunks::dirty_chunk_count(world.entities())?,
        "chunk streaming summary"
    );

    tracing::info!("Runtime shut down cleanly");
    Ok(())
}
