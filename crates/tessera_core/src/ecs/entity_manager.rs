// entity_manager.rs - Entity lifecycle and the deferred command buffer
//
// Handle bookkeeping (indexes, generations, kind lists, callbacks) is updated
// synchronously under the table lock. Pool data only changes in `flush`,
// which replays the command buffer in order under the store write lock.
//
// Lock order: table -> commands. `flush` holds the store write lock and takes
// the commands and table locks one at a time, never together.

use crate::config::{ConfigError, EcsConfig, PoolGrowth};
use crate::ecs::command::EntityCommand;
use crate::ecs::storage::{ArchetypeDataPool, PoolError};
use crate::ecs::{
    ArchetypeKey, Component, ComponentBundle, ComponentId, ComponentRegistry, ComponentValue,
    Entity, EntityDestroyCallback, EntityDestroyContext, EntityQuery,
};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("component '{name}' is not registered")]
    UnregisteredComponent { name: &'static str },

    #[error("component '{name}' appears more than once")]
    DuplicateComponent { name: &'static str },

    #[error("entity index {index} is out of bounds (table length {len})")]
    OutOfBounds { index: usize, len: usize },

    #[error("entity {entity} is stale (current generation {current})")]
    StaleEntity { entity: Entity, current: u32 },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Summary of one `flush`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    pub created: usize,
    pub destroyed: usize,
    /// Components overwritten in place.
    pub updated: usize,
    /// Entities moved to another pool by an add or remove.
    pub migrated: usize,
    /// Commands that had nothing to do.
    pub skipped: usize,
}

impl FlushStats {
    pub fn total(&self) -> usize {
        self.created + self.destroyed + self.updated + self.migrated + self.skipped
    }
}

/// Per-index entity records. All five tables share one length.
#[derive(Default)]
struct EntityTable {
    components: Vec<Vec<ComponentId>>,
    keys: Vec<ArchetypeKey>,
    generations: Vec<u32>,
    /// False while the index sits on the free list.
    alive: Vec<bool>,
    callbacks: Vec<Option<Box<dyn EntityDestroyCallback>>>,
    free: Vec<u32>,
    counter: u32,
}

impl EntityTable {
    #[inline]
    fn len(&self) -> usize {
        self.generations.len()
    }

    fn bounds(&self, index: u32) -> Result<usize, EntityError> {
        let slot = index as usize;
        if slot < self.len() {
            Ok(slot)
        } else {
            Err(EntityError::OutOfBounds {
                index: slot,
                len: self.len(),
            })
        }
    }

    /// Validate a handle against the current records.
    fn check(&self, entity: Entity) -> Result<usize, EntityError> {
        let slot = self.bounds(entity.index())?;
        let current = self.generations[slot];
        if current != entity.generation() || !self.alive[slot] {
            return Err(EntityError::StaleEntity { entity, current });
        }
        Ok(slot)
    }

    fn allocate(&mut self) -> u32 {
        self.free.pop().unwrap_or_else(|| {
            let index = self.counter;
            self.counter += 1;
            index
        })
    }
}

/// Materialized pools plus the pool each entity index currently lives in.
#[derive(Default)]
struct PoolStore {
    pools: HashMap<ArchetypeKey, ArchetypeDataPool>,
    placement: Vec<Option<ArchetypeKey>>,
}

impl PoolStore {
    fn placed(&self, slot: usize) -> Option<&ArchetypeKey> {
        self.placement.get(slot).and_then(Option::as_ref)
    }

    fn place(&mut self, slot: usize, key: Option<ArchetypeKey>) {
        if self.placement.len() <= slot {
            self.placement.resize(slot + 1, None);
        }
        self.placement[slot] = key;
    }
}

/// Owns every entity record, every archetype pool and the command buffer.
///
/// All methods take `&self`; share it as `Arc<EntityManager>`. Structural
/// changes are buffered and only become visible to queries after
/// [`flush`](Self::flush).
pub struct EntityManager {
    registry: Arc<ComponentRegistry>,
    growth: PoolGrowth,
    table: Mutex<EntityTable>,
    commands: Mutex<Vec<EntityCommand>>,
    store: RwLock<PoolStore>,
}

/// Pools matched by a query, borrowed under the store read lock.
///
/// Hold it only while setting up work; `flush` waits for it to drop.
pub struct QueryResult<'a> {
    store: RwLockReadGuard<'a, PoolStore>,
    keys: Vec<ArchetypeKey>,
}

impl QueryResult<'_> {
    /// Matching pools, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &ArchetypeDataPool> {
        self.keys.iter().filter_map(|key| self.store.pools.get(key))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl EntityManager {
    /// Build an empty store. Fails if `config` does not validate.
    pub fn new(registry: Arc<ComponentRegistry>, config: &EcsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry,
            growth: config.pool,
            table: Mutex::new(EntityTable::default()),
            commands: Mutex::new(Vec::new()),
            store: RwLock::new(PoolStore::default()),
        })
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Create an entity without a destroy callback.
    pub fn spawn<B: ComponentBundle>(&self, components: B) -> Result<Entity, EntityError> {
        self.create_entity(None, components)
    }

    /// Allocate an entity handle and buffer the creation of its data.
    ///
    /// The handle is usable immediately; the entity becomes visible to
    /// queries after the next `flush`. `destroy_callback` runs during the
    /// flush that removes the entity.
    pub fn create_entity<B: ComponentBundle>(
        &self,
        destroy_callback: Option<Box<dyn EntityDestroyCallback>>,
        components: B,
    ) -> Result<Entity, EntityError> {
        let values = components.into_values();
        let mut ids = Vec::with_capacity(values.len());
        for value in &values {
            let id = self
                .registry
                .id_of_type(value.type_id())
                .ok_or(EntityError::UnregisteredComponent { name: value.name() })?;
            if ids.contains(&id) {
                return Err(EntityError::DuplicateComponent { name: value.name() });
            }
            ids.push(id);
        }
        let key = ArchetypeKey::new(ids.clone());

        let mut table = self.table.lock();
        let index = table.allocate();
        let slot = index as usize;
        let generation = if slot == table.len() {
            table.components.push(ids);
            table.keys.push(key.clone());
            table.generations.push(0);
            table.alive.push(true);
            table.callbacks.push(destroy_callback);
            0
        } else {
            table.components[slot] = ids;
            table.keys[slot] = key.clone();
            table.callbacks[slot] = destroy_callback;
            table.alive[slot] = true;
            table.generations[slot]
        };

        self.commands.lock().push(EntityCommand::Create {
            index,
            generation,
            key,
            components: values,
        });
        Ok(Entity::new(index, generation))
    }

    /// Invalidate `entity` and buffer the removal of its data.
    ///
    /// The index returns to the free list right away, so a create issued
    /// before the next flush may reuse it.
    pub fn destroy_entity(&self, entity: Entity) -> Result<(), EntityError> {
        let mut table = self.table.lock();
        let slot = table.check(entity)?;
        table.generations[slot] = table.generations[slot].wrapping_add(1);
        table.alive[slot] = false;
        table.free.push(entity.index());
        let callback = table.callbacks[slot].take();

        self.commands.lock().push(EntityCommand::Destroy {
            index: entity.index(),
            generation: entity.generation(),
            callback,
        });
        Ok(())
    }

    /// Buffer an in-place overwrite of one component.
    pub fn set_component<C: Component>(&self, entity: Entity, component: C) -> Result<(), EntityError> {
        let id = self.component_id::<C>()?;
        let table = self.table.lock();
        table.check(entity)?;
        self.commands.lock().push(EntityCommand::SetComponent {
            index: entity.index(),
            generation: entity.generation(),
            id,
            value: ComponentValue::of(&component),
        });
        Ok(())
    }

    /// Buffer adding a component kind. Adding a kind the entity already has
    /// overwrites its value.
    pub fn add_component<C: Component>(&self, entity: Entity, component: C) -> Result<(), EntityError> {
        let id = self.component_id::<C>()?;
        let table = self.table.lock();
        table.check(entity)?;
        self.commands.lock().push(EntityCommand::AddComponent {
            index: entity.index(),
            generation: entity.generation(),
            id,
            value: ComponentValue::of(&component),
        });
        Ok(())
    }

    /// Buffer removing a component kind. Removing a kind the entity does
    /// not have is a no-op.
    pub fn remove_component<C: Component>(&self, entity: Entity) -> Result<(), EntityError> {
        let id = self.component_id::<C>()?;
        let table = self.table.lock();
        table.check(entity)?;
        self.commands.lock().push(EntityCommand::RemoveComponent {
            index: entity.index(),
            generation: entity.generation(),
            id,
        });
        Ok(())
    }

    /// Apply every buffered command, in the order it was issued.
    ///
    /// Must not run while a job dispatch is in flight. A failing command is
    /// logged and the rest of the batch still applies; the first error is
    /// returned.
    pub fn flush(&self) -> Result<FlushStats, EntityError> {
        let mut store = self.store.write();
        let commands = std::mem::take(&mut *self.commands.lock());
        if commands.is_empty() {
            return Ok(FlushStats::default());
        }

        let mut stats = FlushStats::default();
        let mut first_error = None;
        for command in commands {
            let label = command.label();
            let entity = command.entity();
            if let Err(err) = self.apply(&mut store, command, &mut stats) {
                tracing::error!(command = label, %entity, error = %err, "entity command failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        tracing::debug!(
            created = stats.created,
            destroyed = stats.destroyed,
            updated = stats.updated,
            migrated = stats.migrated,
            skipped = stats.skipped,
            pools = store.pools.len(),
            "flushed entity commands"
        );
        match first_error {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }

    fn apply(
        &self,
        store: &mut PoolStore,
        command: EntityCommand,
        stats: &mut FlushStats,
    ) -> Result<(), EntityError> {
        match command {
            EntityCommand::Create {
                index,
                key,
                components,
                ..
            } => {
                let slot = index as usize;
                self.pool_for(&mut store.pools, &key)?
                    .add_entity(slot, &components)?;
                store.place(slot, Some(key));
                stats.created += 1;
            }
            EntityCommand::Destroy {
                index,
                generation,
                callback,
            } => {
                let slot = index as usize;
                let Some(pool) = self.placed_pool(store, slot) else {
                    tracing::warn!(index, "destroy of an entity with no data; ignored");
                    stats.skipped += 1;
                    return Ok(());
                };
                if let Some(mut callback) = callback {
                    let context =
                        EntityDestroyContext::new(Entity::new(index, generation), pool.get_components(slot)?);
                    callback.before_destroy(&context);
                }
                pool.remove_entity(slot)?;
                store.place(slot, None);
                stats.destroyed += 1;
            }
            EntityCommand::SetComponent { index, id, value, .. } => {
                let slot = index as usize;
                match self.placed_pool(store, slot) {
                    Some(pool) if pool.key().contains(id) => {
                        pool.set_component(slot, &value)?;
                        stats.updated += 1;
                    }
                    _ => {
                        tracing::warn!(index, component = value.name(), "set of a component the entity does not have; ignored");
                        stats.skipped += 1;
                    }
                }
            }
            EntityCommand::AddComponent {
                index,
                generation,
                id,
                value,
            } => {
                let slot = index as usize;
                let Some(pool) = self.placed_pool(store, slot) else {
                    tracing::warn!(index, component = value.name(), "add to an entity with no data; ignored");
                    stats.skipped += 1;
                    return Ok(());
                };
                if pool.key().contains(id) {
                    pool.set_component(slot, &value)?;
                    stats.updated += 1;
                    return Ok(());
                }

                let mut values = pool.get_components(slot)?;
                values.push(value);
                let new_key = pool.key().with(id);
                pool.remove_entity(slot)?;
                self.pool_for(&mut store.pools, &new_key)?
                    .add_entity(slot, &values)?;
                store.place(slot, Some(new_key));
                self.sync_table(index, generation, |kinds| kinds.push(id));
                stats.migrated += 1;
            }
            EntityCommand::RemoveComponent {
                index,
                generation,
                id,
            } => {
                let slot = index as usize;
                let Some(pool) = self.placed_pool(store, slot).filter(|pool| pool.key().contains(id)) else {
                    tracing::warn!(index, component = %id, "remove of a component the entity does not have; ignored");
                    stats.skipped += 1;
                    return Ok(());
                };

                let values: Vec<ComponentValue> = pool
                    .get_components(slot)?
                    .into_iter()
                    .filter(|value| self.registry.id_of_type(value.type_id()) != Some(id))
                    .collect();
                let new_key = pool.key().without(id);
                pool.remove_entity(slot)?;
                self.pool_for(&mut store.pools, &new_key)?
                    .add_entity(slot, &values)?;
                store.place(slot, Some(new_key));
                self.sync_table(index, generation, |kinds| kinds.retain(|&kind| kind != id));
                stats.migrated += 1;
            }
        }
        Ok(())
    }

    fn placed_pool<'s>(&self, store: &'s mut PoolStore, slot: usize) -> Option<&'s mut ArchetypeDataPool> {
        let key = store.placed(slot)?.clone();
        store.pools.get_mut(&key)
    }

    fn pool_for<'p>(
        &self,
        pools: &'p mut HashMap<ArchetypeKey, ArchetypeDataPool>,
        key: &ArchetypeKey,
    ) -> Result<&'p mut ArchetypeDataPool, PoolError> {
        match pools.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                tracing::debug!(key = %key, "creating archetype pool");
                let pool = ArchetypeDataPool::new(key.clone(), Arc::clone(&self.registry), self.growth)?;
                Ok(entry.insert(pool))
            }
        }
    }

    /// Update the kind list of `index` unless the record has been reused
    /// since the command was issued.
    fn sync_table(&self, index: u32, generation: u32, update: impl FnOnce(&mut Vec<ComponentId>)) {
        let mut table = self.table.lock();
        let slot = index as usize;
        if table.generations.get(slot) != Some(&generation) {
            return;
        }
        update(&mut table.components[slot]);
        table.keys[slot] = ArchetypeKey::new(table.components[slot].clone());
    }

    pub fn new_query(&self) -> EntityQuery {
        EntityQuery::new()
    }

    /// Every pool whose key satisfies `query`, as of the last flush.
    pub fn start_query(&self, query: &EntityQuery) -> QueryResult<'_> {
        let store = self.store.read();
        let mut keys: Vec<ArchetypeKey> = match query.resolve(&self.registry) {
            Some(resolved) => store
                .pools
                .keys()
                .filter(|key| resolved.matches(key))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        keys.sort_by(|a, b| a.components().cmp(b.components()));
        QueryResult { store, keys }
    }

    /// Flushed value of component `C` on `entity`, if it has one.
    pub fn get_component<C: Component>(&self, entity: Entity) -> Result<Option<C>, EntityError> {
        let id = self.component_id::<C>()?;
        let slot = self.table.lock().check(entity)?;
        let store = self.store.read();
        let Some(pool) = store.placed(slot).and_then(|key| store.pools.get(key)) else {
            return Ok(None);
        };
        if !pool.key().contains(id) {
            return Ok(None);
        }
        Ok(pool.get_component(slot, id)?.get::<C>())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.table.lock().check(entity).is_ok()
    }

    /// Current generation stored for `index`.
    pub fn latest_generation(&self, index: u32) -> Result<u32, EntityError> {
        let table = self.table.lock();
        let slot = table.bounds(index)?;
        Ok(table.generations[slot])
    }

    /// Component kinds recorded for `index`, in the order they were given.
    pub fn component_kinds(&self, index: u32) -> Result<Vec<ComponentId>, EntityError> {
        let table = self.table.lock();
        let slot = table.bounds(index)?;
        Ok(table.components[slot].clone())
    }

    /// Archetype key recorded for `index`.
    pub fn archetype_of(&self, index: u32) -> Result<ArchetypeKey, EntityError> {
        let table = self.table.lock();
        let slot = table.bounds(index)?;
        Ok(table.keys[slot].clone())
    }

    pub fn pool_count(&self) -> usize {
        self.store.read().pools.len()
    }

    /// Entities with data in some pool, as of the last flush.
    pub fn live_entity_count(&self) -> usize {
        self.store.read().pools.values().map(ArchetypeDataPool::len).sum()
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.lock().len()
    }

    fn component_id<C: Component>(&self) -> Result<ComponentId, EntityError> {
        self.registry
            .id_of::<C>()
            .ok_or(EntityError::UnregisteredComponent { name: C::NAME })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy, Debug, PartialEq, Default)]
    struct Pos {
        x: f32,
        y: f32,
    }
    define_component!(Pos, "Pos", { x: f32, y: f32 });

    #[derive(Clone, Copy, Debug, PartialEq, Default)]
    struct Hp {
        value: i32,
    }
    define_component!(Hp, "Hp", { value: i32 });

    #[derive(Clone, Copy, Debug, PartialEq, Default)]
    struct Unknown {
        value: i32,
    }
    define_component!(Unknown, "Unknown", { value: i32 });

    fn manager() -> EntityManager {
        let registry = ComponentRegistry::builder()
            .register::<Pos>()
            .unwrap()
            .register::<Hp>()
            .unwrap()
            .build();
        EntityManager::new(Arc::new(registry), &EcsConfig::default()).unwrap()
    }

    #[test]
    fn creation_is_deferred_until_flush() {
        let entities = manager();
        let entity = entities.spawn((Pos { x: 1.0, y: 2.0 },)).unwrap();
        assert_eq!(entities.pending_commands(), 1);
        assert_eq!(entities.live_entity_count(), 0);
        assert_eq!(entities.get_component::<Pos>(entity).unwrap(), None);

        let stats = entities.flush().unwrap();
        assert_eq!(stats.created, 1);
        assert_eq!(entities.live_entity_count(), 1);
        assert_eq!(
            entities.get_component::<Pos>(entity).unwrap(),
            Some(Pos { x: 1.0, y: 2.0 })
        );
    }

    #[test]
    fn reuse_keeps_bumped_generation_and_stales_old_handle() {
        let entities = manager();
        let first = entities.spawn((Hp { value: 1 },)).unwrap();
        entities.destroy_entity(first).unwrap();
        let second = entities.spawn((Hp { value: 2 },)).unwrap();

        assert_eq!(second.index(), first.index());
        assert!(second.generation() > first.generation());
        assert!(!entities.is_alive(first));
        assert!(matches!(
            entities.destroy_entity(first),
            Err(EntityError::StaleEntity { .. })
        ));

        let stats = entities.flush().unwrap();
        assert_eq!((stats.created, stats.destroyed), (2, 1));
        assert_eq!(entities.get_component::<Hp>(second).unwrap(), Some(Hp { value: 2 }));
        assert_eq!(entities.live_entity_count(), 1);
    }

    #[test]
    fn add_then_remove_restores_archetype_and_values() {
        let entities = manager();
        let entity = entities.spawn((Pos { x: 3.0, y: 4.0 },)).unwrap();
        entities.flush().unwrap();
        let original = entities.archetype_of(entity.index()).unwrap();

        entities.add_component(entity, Hp { value: 9 }).unwrap();
        entities.flush().unwrap();
        assert_eq!(entities.archetype_of(entity.index()).unwrap().len(), 2);
        assert_eq!(entities.get_component::<Hp>(entity).unwrap(), Some(Hp { value: 9 }));

        entities.remove_component::<Hp>(entity).unwrap();
        entities.flush().unwrap();
        assert_eq!(entities.archetype_of(entity.index()).unwrap(), original);
        assert_eq!(
            entities.get_component::<Pos>(entity).unwrap(),
            Some(Pos { x: 3.0, y: 4.0 })
        );
        assert_eq!(entities.get_component::<Hp>(entity).unwrap(), None);
    }

    #[test]
    fn add_existing_overwrites_and_remove_absent_is_noop() {
        let entities = manager();
        let entity = entities.spawn((Hp { value: 1 },)).unwrap();
        entities.flush().unwrap();

        entities.add_component(entity, Hp { value: 5 }).unwrap();
        entities.remove_component::<Pos>(entity).unwrap();
        let stats = entities.flush().unwrap();
        assert_eq!((stats.updated, stats.skipped), (1, 1));
        assert_eq!(entities.get_component::<Hp>(entity).unwrap(), Some(Hp { value: 5 }));
        assert_eq!(entities.pool_count(), 1);
    }

    #[test]
    fn destroy_callback_sees_final_values() {
        let entities = manager();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let entity = entities
            .create_entity(
                Some(Box::new(move |ctx: &EntityDestroyContext| {
                    let hp = ctx.get::<Hp>().map_or(0, |hp| hp.value);
                    sink.store(hp as usize, Ordering::SeqCst);
                })),
                (Hp { value: 40 }, Pos::default()),
            )
            .unwrap();
        entities.flush().unwrap();
        entities.set_component(entity, Hp { value: 42 }).unwrap();
        entities.destroy_entity(entity).unwrap();
        entities.flush().unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 42);
        assert_eq!(entities.live_entity_count(), 0);
    }

    #[test]
    fn invalid_input_is_rejected() {
        let entities = manager();
        assert!(matches!(
            entities.spawn((Unknown { value: 0 },)),
            Err(EntityError::UnregisteredComponent { name: "Unknown" })
        ));
        assert!(matches!(
            entities.spawn((Hp { value: 0 }, Hp { value: 1 })),
            Err(EntityError::DuplicateComponent { name: "Hp" })
        ));
        assert!(matches!(
            entities.destroy_entity(Entity::new(12, 0)),
            Err(EntityError::OutOfBounds { index: 12, len: 0 })
        ));
        assert!(matches!(
            entities.latest_generation(3),
            Err(EntityError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn component_change_on_reused_index_does_not_clobber_new_record() {
        let entities = manager();
        let old = entities.spawn((Pos::default(),)).unwrap();
        entities.flush().unwrap();

        entities.add_component(old, Hp { value: 1 }).unwrap();
        entities.destroy_entity(old).unwrap();
        let new = entities.spawn((Pos::default(),)).unwrap();
        entities.flush().unwrap();

        assert_eq!(new.index(), old.index());
        let pos = entities.registry().id_of::<Pos>().unwrap();
        assert_eq!(entities.component_kinds(new.index()).unwrap(), vec![pos]);
        assert_eq!(entities.get_component::<Hp>(new).unwrap(), None);
    }

    #[test]
    fn queries_see_only_flushed_pools() {
        let entities = manager();
        entities.spawn((Pos::default(),)).unwrap();
        entities.spawn((Pos::default(), Hp::default())).unwrap();
        entities.spawn((Hp::default(),)).unwrap();

        let query = entities.new_query().with::<Pos>();
        assert!(entities.start_query(&query).is_empty());

        entities.flush().unwrap();
        let result = entities.start_query(&query);
        assert_eq!(result.len(), 2);
        assert_eq!(result.iter().map(ArchetypeDataPool::len).sum::<usize>(), 2);
        drop(result);

        let only_hp = EntityQuery::new().with::<Hp>().without::<Pos>();
        assert_eq!(entities.start_query(&only_hp).len(), 1);
    }

    #[test]
    fn zero_capacity_config_is_rejected() {
        let registry = Arc::new(ComponentRegistry::builder().register::<Pos>().unwrap().build());
        let config = EcsConfig {
            pool: PoolGrowth {
                initial_capacity: 0,
                ..PoolGrowth::default()
            },
            ..EcsConfig::default()
        };
        assert!(matches!(
            EntityManager::new(registry, &config),
            Err(ConfigError::NotPositive {
                field: "pool.initial_capacity"
            })
        ));
    }

    #[test]
    fn handles_forged_for_freed_indexes_are_stale() {
        let entities = manager();
        let victim = entities.spawn((Hp { value: 1 },)).unwrap();
        entities.flush().unwrap();
        entities.destroy_entity(victim).unwrap();

        let bumped = entities.latest_generation(victim.index()).unwrap();
        assert_eq!(bumped, victim.generation() + 1);
        let forged = Entity::from_bits((u64::from(bumped) << 32) | u64::from(victim.index()));
        assert!(!entities.is_alive(forged));
        assert!(matches!(
            entities.set_component(forged, Hp { value: 9 }),
            Err(EntityError::StaleEntity { .. })
        ));

        let reborn = entities.spawn((Hp { value: 2 },)).unwrap();
        assert_eq!(reborn, forged);
        assert!(entities.is_alive(forged));
    }
}

