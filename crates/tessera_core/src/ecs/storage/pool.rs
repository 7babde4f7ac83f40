// pool.rs - Columnar storage for all entities of one archetype
//
// Rows are addressed directly by entity index. The pool keeps a storage
// window [origin, origin + capacity) and an active window [start, end);
// indexes inside the active window that are not live are holes. Holes are
// only reused when the same index is added again.

use super::column::{Column, FieldArray};
use super::range::ArrayRange;
use crate::config::{ConfigError, PoolGrowth};
use crate::ecs::{
    ArchetypeKey, ComponentId, ComponentMeta, ComponentRegistrationError, ComponentRegistry,
    ComponentValue, Primitive, PrimitiveKind, Value,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("entity {index} already has data in pool {key}")]
    AlreadyPresent { index: usize, key: ArchetypeKey },

    #[error("entity {index} has no data in pool {key}")]
    NotPresent { index: usize, key: ArchetypeKey },

    #[error("component {component} is not part of pool {key}")]
    ComponentNotInPool { component: ComponentId, key: ArchetypeKey },

    #[error("component '{name}' appears more than once")]
    DuplicateComponent { name: &'static str },

    #[error("component type '{name}' is not registered")]
    UnregisteredType { name: &'static str },

    #[error("pool {key} expects {expected} components, got {actual}")]
    ComponentCount {
        key: ArchetypeKey,
        expected: usize,
        actual: usize,
    },

    #[error("component {value} does not match the registered layout of '{component}'")]
    LayoutMismatch { component: &'static str, value: String },

    #[error("field '{chain}' of '{component}' holds {actual}, not {expected}")]
    FieldKind {
        component: &'static str,
        chain: String,
        expected: PrimitiveKind,
        actual: PrimitiveKind,
    },

    #[error(transparent)]
    Registry(#[from] ComponentRegistrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// All entities that have exactly one component set.
pub struct ArchetypeDataPool {
    key: ArchetypeKey,
    registry: Arc<ComponentRegistry>,
    growth: PoolGrowth,
    /// First column of each key component, in key order.
    offsets: Vec<usize>,
    columns: Vec<Column>,
    origin: usize,
    capacity: usize,
    start: usize,
    end: usize,
    holes: BTreeSet<usize>,
}

impl ArchetypeDataPool {
    /// Create an empty pool for `key`.
    ///
    /// Fails if `growth` has a zero size or increment, or if `key` names a
    /// component id that `registry` does not contain.
    pub fn new(
        key: ArchetypeKey,
        registry: Arc<ComponentRegistry>,
        growth: PoolGrowth,
    ) -> Result<Self, PoolError> {
        growth.validate()?;

        let mut offsets = Vec::with_capacity(key.len());
        let mut columns = Vec::new();
        for &id in key.components() {
            let meta = registry
                .meta(id)
                .ok_or(ComponentRegistrationError::UnknownComponent { component: id })?;
            offsets.push(columns.len());
            columns.extend(
                meta.fields
                    .iter()
                    .map(|field| Column::new(field.kind, growth.initial_capacity)),
            );
        }

        Ok(Self {
            key,
            registry,
            growth,
            offsets,
            columns,
            origin: 0,
            capacity: growth.initial_capacity,
            start: 0,
            end: 0,
            holes: BTreeSet::new(),
        })
    }

    #[inline]
    pub fn key(&self) -> &ArchetypeKey {
        &self.key
    }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start - self.holes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Size of the storage window, in rows.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether entity `index` currently has a row in this pool.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end && !self.holes.contains(&index)
    }

    /// Add a row for entity `index` holding exactly one value per key
    /// component, in any order.
    pub fn add_entity(&mut self, index: usize, values: &[ComponentValue]) -> Result<(), PoolError> {
        if self.contains(index) {
            return Err(PoolError::AlreadyPresent {
                index,
                key: self.key.clone(),
            });
        }
        let ordered = self.order_values(values)?;

        if self.is_empty() {
            self.holes.clear();
            if index < self.origin || index >= self.origin + self.capacity {
                // Nothing to preserve; re-centre the window on the new index.
                self.origin = index;
            }
            self.start = index;
            self.end = index + 1;
        } else if index < self.start {
            self.ensure_window(index, self.end);
            self.holes.extend(index + 1..self.start);
            self.start = index;
        } else if index >= self.end {
            self.ensure_window(self.start, index + 1);
            self.holes.extend(self.end..index);
            self.end = index + 1;
        } else {
            self.holes.remove(&index);
        }

        for (position, value) in ordered.into_iter().enumerate() {
            self.write_fields(index, position, value.fields());
        }
        Ok(())
    }

    /// Drop the row of entity `index`.
    pub fn remove_entity(&mut self, index: usize) -> Result<(), PoolError> {
        if !self.contains(index) {
            return Err(PoolError::NotPresent {
                index,
                key: self.key.clone(),
            });
        }

        if index + 1 == self.end {
            self.end -= 1;
            while self.end > self.start && self.holes.remove(&(self.end - 1)) {
                self.end -= 1;
            }
        } else if index == self.start {
            self.start += 1;
            while self.start < self.end && self.holes.remove(&self.start) {
                self.start += 1;
            }
        } else {
            self.holes.insert(index);
        }

        if self.is_empty() {
            self.holes.clear();
        }
        self.maybe_shrink();
        Ok(())
    }

    /// Snapshot of component `id` for entity `index`.
    pub fn get_component(&self, index: usize, id: ComponentId) -> Result<ComponentValue, PoolError> {
        self.ensure_live(index)?;
        let position = self.position_of(id)?;
        let meta = self.meta_at(position)?;
        let slot = index - self.origin;
        let base = self.offsets[position];
        let fields = meta
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| Value::from_bits(field.kind, self.columns[base + i].load(slot)))
            .collect();
        Ok(ComponentValue::from_parts(meta.type_id, meta.name, fields))
    }

    /// Snapshot every component of entity `index`, in key order.
    pub fn get_components(&self, index: usize) -> Result<Vec<ComponentValue>, PoolError> {
        self.key
            .components()
            .iter()
            .map(|&id| self.get_component(index, id))
            .collect()
    }

    /// Overwrite one component of entity `index` in place.
    pub fn set_component(&self, index: usize, value: &ComponentValue) -> Result<(), PoolError> {
        self.ensure_live(index)?;
        let id = self
            .registry
            .id_of_type(value.type_id())
            .ok_or(PoolError::UnregisteredType { name: value.name() })?;
        let position = self.position_of(id)?;
        self.check_layout(self.meta_at(position)?, value)?;
        self.write_fields(index, position, value.fields());
        Ok(())
    }

    /// Typed view over the field at `chain` of component `id`.
    pub fn get_array<P: Primitive>(
        &self,
        id: ComponentId,
        chain: &[&str],
    ) -> Result<FieldArray<P>, PoolError> {
        let ordinal = self.registry.field_ordinal(id, chain)?;
        self.field_array(id, ordinal)
    }

    /// Typed view over field `ordinal` of component `id`.
    pub(crate) fn field_array<P: Primitive>(
        &self,
        id: ComponentId,
        ordinal: usize,
    ) -> Result<FieldArray<P>, PoolError> {
        let position = self.position_of(id)?;
        let meta = self.meta_at(position)?;
        let field = meta.fields.get(ordinal).ok_or_else(|| {
            PoolError::Registry(ComponentRegistrationError::UnknownField {
                component: meta.name,
                chain: format!("#{ordinal}"),
            })
        })?;
        if field.kind != P::KIND {
            return Err(PoolError::FieldKind {
                component: meta.name,
                chain: field.dotted(),
                expected: P::KIND,
                actual: field.kind,
            });
        }
        Ok(self.columns[self.offsets[position] + ordinal].view(self.origin))
    }

    /// Snapshot of the active window and its holes.
    pub fn get_array_range(&self) -> ArrayRange {
        ArrayRange::new(self.start, self.end, self.holes.clone())
    }

    /// Values sorted into key order, validated against the registry.
    fn order_values<'v>(
        &self,
        values: &'v [ComponentValue],
    ) -> Result<Vec<&'v ComponentValue>, PoolError> {
        if values.len() != self.key.len() {
            return Err(PoolError::ComponentCount {
                key: self.key.clone(),
                expected: self.key.len(),
                actual: values.len(),
            });
        }

        let mut ordered: Vec<Option<&ComponentValue>> = vec![None; self.key.len()];
        for value in values {
            let id = self
                .registry
                .id_of_type(value.type_id())
                .ok_or(PoolError::UnregisteredType { name: value.name() })?;
            let position = self.position_of(id)?;
            self.check_layout(self.meta_at(position)?, value)?;
            if ordered[position].replace(value).is_some() {
                return Err(PoolError::DuplicateComponent { name: value.name() });
            }
        }

        // Counts match and nothing repeats, so every slot is filled.
        Ok(ordered.into_iter().flatten().collect())
    }

    fn check_layout(&self, meta: &ComponentMeta, value: &ComponentValue) -> Result<(), PoolError> {
        let fits = meta.fields.len() == value.fields().len()
            && meta
                .fields
                .iter()
                .zip(value.fields())
                .all(|(field, v)| field.kind == v.kind());
        if fits {
            Ok(())
        } else {
            Err(PoolError::LayoutMismatch {
                component: meta.name,
                value: value.describe_type(),
            })
        }
    }

    fn write_fields(&self, index: usize, position: usize, fields: &[Value]) {
        let slot = index - self.origin;
        let base = self.offsets[position];
        for (i, value) in fields.iter().enumerate() {
            self.columns[base + i].store(slot, value.to_bits());
        }
    }

    fn ensure_live(&self, index: usize) -> Result<(), PoolError> {
        if self.contains(index) {
            Ok(())
        } else {
            Err(PoolError::NotPresent {
                index,
                key: self.key.clone(),
            })
        }
    }

    fn position_of(&self, id: ComponentId) -> Result<usize, PoolError> {
        self.key
            .position(id)
            .ok_or_else(|| PoolError::ComponentNotInPool {
                component: id,
                key: self.key.clone(),
            })
    }

    fn meta_at(&self, position: usize) -> Result<&ComponentMeta, PoolError> {
        let id = self.key.components()[position];
        self.registry
            .meta(id)
            .ok_or(PoolError::Registry(ComponentRegistrationError::UnknownComponent {
                component: id,
            }))
    }

    /// Grow the storage window in whole increments until it covers `lo..hi`.
    fn ensure_window(&mut self, lo: usize, hi: usize) {
        let step = self.growth.grow_increment;
        let mut origin = self.origin;
        let mut window_end = self.origin + self.capacity;

        if lo < origin {
            let steps = (origin - lo).div_ceil(step);
            origin = origin.saturating_sub(steps * step);
        }
        if hi > window_end {
            let steps = (hi - window_end).div_ceil(step);
            window_end += steps * step;
        }

        if origin != self.origin || window_end != self.origin + self.capacity {
            tracing::trace!(
                key = %self.key,
                old_capacity = self.capacity,
                new_capacity = window_end - origin,
                "growing archetype pool"
            );
            self.relocate(origin, window_end - origin);
        }
    }

    /// Release whole increments of unused rows at either end of the storage
    /// window, never going below the initial capacity.
    fn maybe_shrink(&mut self) {
        let step = self.growth.shrink_increment;
        let floor = self.growth.initial_capacity;
        let (lo, hi) = if self.is_empty() {
            (self.origin, self.origin)
        } else {
            (self.start, self.end)
        };

        let mut origin = self.origin;
        let mut capacity = self.capacity;
        while lo - origin >= step && capacity >= floor + step {
            origin += step;
            capacity -= step;
        }
        while origin + capacity - hi >= step && capacity >= floor + step {
            capacity -= step;
        }

        if origin != self.origin || capacity != self.capacity {
            tracing::trace!(
                key = %self.key,
                old_capacity = self.capacity,
                new_capacity = capacity,
                "shrinking archetype pool"
            );
            self.relocate(origin, capacity);
        }
    }

    /// Move every column to a new storage window that covers the active one.
    fn relocate(&mut self, origin: usize, capacity: usize) {
        let (from, to, count) = if self.is_empty() {
            (0, 0, 0)
        } else {
            (self.start - self.origin, self.start - origin, self.end - self.start)
        };
        for column in &mut self.columns {
            *column = column.relocated(capacity, from, to, count);
        }
        self.origin = origin;
        self.capacity = capacity;
    }
}
