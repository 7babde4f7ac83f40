//! Chunk streaming demo: a camera flies over a grid of chunks, chunks near
//! it are streamed in and out as entities, and a parallel job ranks them by
//! distance every update. A meshing pass then works through the dirty
//! chunks, most urgent first.

use glam::{IVec3, Vec3};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_core::define_component;
use tessera_core::ecs::{
    Entity, EntityDestroyContext, EntityError, EntityManager, EntityQuery, FieldArray, System,
    SystemContext, WorldError,
};
use tessera_core::job::{ExternalData, JobDeclaration, ParallelJob};

/// Edge length of a chunk in world units.
pub const CHUNK_SIZE: f32 = 16.0;

/// Distance covered by one priority step.
pub const PRIORITY_FALLOFF: f32 = 46.0 / 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Chunk {
    pub chunk_pos_x: i32,
    pub chunk_pos_y: i32,
    pub chunk_pos_z: i32,
    /// Set until the chunk's mesh has been generated.
    pub is_dirty: bool,
    /// 0 is the most urgent.
    pub priority: i32,
}
define_component!(Chunk, "Chunk", {
    chunk_pos_x: i32,
    chunk_pos_y: i32,
    chunk_pos_z: i32,
    is_dirty: bool,
    priority: i32,
});

impl Chunk {
    pub fn at(pos: IVec3) -> Self {
        Self {
            chunk_pos_x: pos.x,
            chunk_pos_y: pos.y,
            chunk_pos_z: pos.z,
            is_dirty: true,
            priority: 0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub world_offset: Vec3,
}

pub type SharedCamera = Arc<RwLock<Camera>>;

fn chunk_of(world: Vec3) -> IVec3 {
    (world / CHUNK_SIZE).floor().as_ivec3()
}

/// Writes each chunk's distance to the camera, in falloff steps, to
/// `priority`.
#[derive(Default)]
pub struct ChunkPrioritizationJob {
    camera: Option<Arc<Camera>>,
    x: Option<FieldArray<i32>>,
    y: Option<FieldArray<i32>>,
    z: Option<FieldArray<i32>>,
    priority: Option<FieldArray<i32>>,
}

impl ParallelJob for ChunkPrioritizationJob {
    fn declare(decl: &mut JobDeclaration<Self>) {
        decl.external::<Camera>("camera", |job, camera| job.camera = Some(camera))
            .data::<Chunk, i32>(&["chunk_pos_x"], |job, array| job.x = Some(array))
            .data::<Chunk, i32>(&["chunk_pos_y"], |job, array| job.y = Some(array))
            .data::<Chunk, i32>(&["chunk_pos_z"], |job, array| job.z = Some(array))
            .data::<Chunk, i32>(&["priority"], |job, array| job.priority = Some(array));
    }

    fn query(&self, query: &mut EntityQuery) {
        query.add_with::<Chunk>();
    }

    fn estimate_workload(&self, _index: usize) -> u32 {
        3
    }

    fn execute(&mut self, _entities: &EntityManager, index: usize, _thread_ordinal: usize) {
        let (Some(camera), Some(x), Some(y), Some(z), Some(priority)) =
            (&self.camera, &self.x, &self.y, &self.z, &self.priority)
        else {
            return;
        };
        let chunk_world = IVec3::new(x.get(index), y.get(index), z.get(index)).as_vec3() * CHUNK_SIZE;
        let distance = chunk_world.distance(camera.world_offset);
        priority.set(index, (distance / PRIORITY_FALLOFF) as i32);
    }
}

/// Moves the camera by a fixed velocity each update.
pub struct CameraFlightSystem {
    pub camera: SharedCamera,
    pub velocity: Vec3,
}

impl System for CameraFlightSystem {
    fn update(&mut self, _ctx: &SystemContext<'_>) -> Result<(), WorldError> {
        self.camera.write().world_offset += self.velocity;
        Ok(())
    }
}

/// Counters fed by the destroy callback of every streamed chunk.
#[derive(Debug, Default)]
pub struct UnloadStats {
    unloaded: AtomicUsize,
    unmeshed: AtomicUsize,
}

impl UnloadStats {
    pub fn unloaded(&self) -> usize {
        self.unloaded.load(Ordering::Relaxed)
    }

    /// Chunks that left the view before their mesh was built.
    pub fn unmeshed(&self) -> usize {
        self.unmeshed.load(Ordering::Relaxed)
    }

    fn record(&self, context: &EntityDestroyContext) {
        self.unloaded.fetch_add(1, Ordering::Relaxed);
        let Some(chunk) = context.get::<Chunk>() else {
            return;
        };
        if chunk.is_dirty {
            self.unmeshed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(
            entity = %context.entity(),
            x = chunk.chunk_pos_x,
            y = chunk.chunk_pos_y,
            z = chunk.chunk_pos_z,
            dirty = chunk.is_dirty,
            "chunk unloaded"
        );
    }
}

/// Keeps every chunk within `radius` (horizontally) and `height` (vertically)
/// of the camera loaded as an entity.
pub struct ChunkStreamingSystem {
    camera: SharedCamera,
    radius: i32,
    height: i32,
    loaded: HashMap<IVec3, Entity>,
    unloads: Arc<UnloadStats>,
}

impl ChunkStreamingSystem {
    pub fn new(camera: SharedCamera, radius: i32, height: i32) -> Self {
        Self {
            camera,
            radius,
            height,
            loaded: HashMap::new(),
            unloads: Arc::new(UnloadStats::default()),
        }
    }

    pub fn unloads(&self) -> Arc<UnloadStats> {
        Arc::clone(&self.unloads)
    }

    fn load(&self, entities: &EntityManager, pos: IVec3) -> Result<Entity, EntityError> {
        let unloads = Arc::clone(&self.unloads);
        entities.create_entity(
            Some(Box::new(move |context: &EntityDestroyContext| unloads.record(context))),
            (Chunk::at(pos),),
        )
    }

    fn in_range(&self, center: IVec3, pos: IVec3) -> bool {
        let offset = (pos - center).abs();
        offset.x <= self.radius && offset.z <= self.radius && offset.y <= self.height
    }
}

impl System for ChunkStreamingSystem {
    fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), WorldError> {
        let center = chunk_of(self.camera.read().world_offset);

        let leaving: Vec<IVec3> = self
            .loaded
            .keys()
            .copied()
            .filter(|&pos| !self.in_range(center, pos))
            .collect();
        for pos in &leaving {
            if let Some(entity) = self.loaded.remove(pos) {
                ctx.entities.destroy_entity(entity)?;
            }
        }

        let mut entering = 0usize;
        for dx in -self.radius..=self.radius {
            for dy in -self.height..=self.height {
                for dz in -self.radius..=self.radius {
                    let pos = center + IVec3::new(dx, dy, dz);
                    if self.loaded.contains_key(&pos) {
                        continue;
                    }
                    let entity = self.load(ctx.entities, pos)?;
                    self.loaded.insert(pos, entity);
                    entering += 1;
                }
            }
        }

        tracing::debug!(
            center = %center,
            entering,
            leaving = leaving.len(),
            loaded = self.loaded.len(),
            "streamed chunks"
        );
        Ok(())
    }
}

/// Dispatches [`ChunkPrioritizationJob`] with the current camera.
pub struct ChunkPrioritizationSystem {
    camera: SharedCamera,
}

impl ChunkPrioritizationSystem {
    pub fn new(camera: SharedCamera) -> Self {
        Self { camera }
    }
}

impl System for ChunkPrioritizationSystem {
    fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), WorldError> {
        let camera = *self.camera.read();
        let external = ExternalData::new().with("camera", camera);
        ctx.run_job::<ChunkPrioritizationJob>(Some(&external))
    }
}

/// Clears `is_dirty` on up to `budget` chunks per update, lowest priority
/// value first.
pub struct ChunkMeshingSystem {
    budget: usize,
    meshed: usize,
}

impl ChunkMeshingSystem {
    pub fn new(budget: usize) -> Self {
        Self { budget, meshed: 0 }
    }
}

impl System for ChunkMeshingSystem {
    fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), WorldError> {
        let Some(id) = ctx.entities.registry().id_of::<Chunk>() else {
            return Ok(());
        };
        let pools = ctx.entities.start_query(&EntityQuery::new().with::<Chunk>());
        let mut columns = Vec::with_capacity(pools.len());
        let mut dirty = Vec::new();
        for pool in pools.iter() {
            let is_dirty = pool.get_array::<bool>(id, &["is_dirty"]).map_err(EntityError::from)?;
            let priority = pool.get_array::<i32>(id, &["priority"]).map_err(EntityError::from)?;
            for index in pool.get_array_range().live_indexes() {
                if is_dirty.get(index) {
                    dirty.push((priority.get(index), index, columns.len()));
                }
            }
            columns.push(is_dirty);
        }

        dirty.sort_unstable();
        let batch = dirty.len().min(self.budget);
        for &(_, index, column) in &dirty[..batch] {
            columns[column].set(index, false);
        }
        self.meshed += batch;
        tracing::debug!(
            meshed = batch,
            waiting = dirty.len() - batch,
            total = self.meshed,
            "meshed chunks"
        );
        Ok(())
    }
}

/// Loaded chunks still waiting for a mesh.
pub fn dirty_chunk_count(entities: &EntityManager) -> anyhow::Result<usize> {
    let Some(id) = entities.registry().id_of::<Chunk>() else {
        return Ok(0);
    };
    let mut count = 0;
    let pools = entities.start_query(&EntityQuery::new().with::<Chunk>());
    for pool in pools.iter() {
        let is_dirty = pool.get_array::<bool>(id, &["is_dirty"])?;
        count += pool
            .get_array_range()
            .live_indexes()
            .filter(|&index| is_dirty.get(index))
            .count();
    }
    Ok(count)
}

/// Number of loaded chunks per priority value, lowest priority first.
pub fn priority_histogram(entities: &EntityManager) -> anyhow::Result<Vec<(i32, usize)>> {
    let Some(id) = entities.registry().id_of::<Chunk>() else {
        return Ok(Vec::new());
    };
    let mut counts: HashMap<i32, usize> = HashMap::new();
    let pools = entities.start_query(&EntityQuery::new().with::<Chunk>());
    for pool in pools.iter() {
        let priority = pool.get_array::<i32>(id, &["priority"])?;
        for index in pool.get_array_range().live_indexes() {
            *counts.entry(priority.get(index)).or_default() += 1;
        }
    }
    let mut histogram: Vec<(i32, usize)> = counts.into_iter().collect();
    histogram.sort_unstable();
    Ok(histogram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::ecs::{ComponentRegistry, World};
    use tessera_core::job::{JobRegistry, JobScheduler};
    use tessera_core::EcsConfig;

    fn world(camera: &SharedCamera) -> (World, Arc<UnloadStats>) {
        let config = EcsConfig {
            target_workload_per_thread: 30,
            ..EcsConfig::default()
        };
        let components = Arc::new(ComponentRegistry::builder().register::<Chunk>().unwrap().build());
        let mut jobs = JobRegistry::new(Arc::clone(&components));
        jobs.register::<ChunkPrioritizationJob>().unwrap();
        let executor = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap());

        let mut world = World::new(
            Arc::new(EntityManager::new(components, &config).unwrap()),
            JobScheduler::new(Arc::new(jobs), &config).unwrap(),
            executor,
        );
        let streaming = ChunkStreamingSystem::new(Arc::clone(camera), 2, 0);
        let unloads = streaming.unloads();
        world
            .add_system(streaming)
            .add_system(ChunkPrioritizationSystem::new(Arc::clone(camera)))
            .add_system(ChunkMeshingSystem::new(10));
        (world, unloads)
    }

    /// `(priority, is_dirty)` of every loaded chunk.
    fn chunk_states(entities: &EntityManager) -> Vec<(i32, bool)> {
        let id = entities.registry().id_of::<Chunk>().unwrap();
        let pools = entities.start_query(&EntityQuery::new().with::<Chunk>());
        let mut states = Vec::new();
        for pool in pools.iter() {
            let priority = pool.get_array::<i32>(id, &["priority"]).unwrap();
            let is_dirty = pool.get_array::<bool>(id, &["is_dirty"]).unwrap();
            for index in pool.get_array_range().live_indexes() {
                states.push((priority.get(index), is_dirty.get(index)));
            }
        }
        states
    }

    #[test]
    fn chunks_stream_in_and_get_ranked() {
        let camera: SharedCamera = Arc::new(RwLock::new(Camera {
            world_offset: Vec3::new(8.0, 8.0, 8.0),
        }));
        let (mut world, _) = world(&camera);

        let stats = world.update().unwrap();
        assert_eq!(stats.created, 25);
        // Chunks spawned this update are ranked on the next one.
        world.update().unwrap();

        let histogram = priority_histogram(world.entities()).unwrap();
        assert_eq!(histogram.iter().map(|&(_, count)| count).sum::<usize>(), 25);
        // The camera's own chunk origin is 8 * sqrt(3) away: priority 0.
        assert_eq!(histogram[0].0, 0);
        // The chunk at (-2, 0, -2) is about 57 units away: priority 2.
        assert_eq!(histogram.last().map(|&(priority, _)| priority), Some(2));
    }

    #[test]
    fn moving_camera_swaps_a_column_of_chunks() {
        let camera: SharedCamera = Arc::new(RwLock::new(Camera {
            world_offset: Vec3::new(8.0, 8.0, 8.0),
        }));
        let (mut world, unloads) = world(&camera);
        world.update().unwrap();

        camera.write().world_offset.x += CHUNK_SIZE;
        let stats = world.update().unwrap();
        assert_eq!(stats.created, 5);
        assert_eq!(stats.destroyed, 5);
        assert_eq!(world.entities().live_entity_count(), 25);
        assert_eq!(unloads.unloaded(), 5);
        // The column left behind is the farthest one, so it was never meshed.
        assert_eq!(unloads.unmeshed(), 5);
    }

    #[test]
    fn meshing_clears_the_most_urgent_chunks_first() {
        let camera: SharedCamera = Arc::new(RwLock::new(Camera {
            world_offset: Vec3::new(8.0, 8.0, 8.0),
        }));
        let (mut world, _) = world(&camera);

        world.update().unwrap();
        assert_eq!(dirty_chunk_count(world.entities()).unwrap(), 25);

        world.update().unwrap();
        assert_eq!(dirty_chunk_count(world.entities()).unwrap(), 15);
        let states = chunk_states(world.entities());
        let meshed_max = states.iter().filter(|state| !state.1).map(|state| state.0).max();
        let dirty_min = states.iter().filter(|state| state.1).map(|state| state.0).min();
        assert!(meshed_max <= dirty_min);

        world.update().unwrap();
        world.update().unwrap();
        assert_eq!(dirty_chunk_count(world.entities()).unwrap(), 0);
    }
}
