//! Destroy callbacks
//!
//! A callback registered at creation runs once, during the `flush` that
//! removes the entity's data. It sees a snapshot of the doomed entity and
//! never the manager itself, so it cannot issue structural changes in the
//! middle of a flush.

use crate::ecs::{Component, ComponentValue, Entity};

/// Hook invoked right before an entity's data leaves its pool.
pub trait EntityDestroyCallback: Send {
    fn before_destroy(&mut self, context: &EntityDestroyContext);
}

impl<F> EntityDestroyCallback for F
where
    F: FnMut(&EntityDestroyContext) + Send,
{
    fn before_destroy(&mut self, context: &EntityDestroyContext) {
        self(context)
    }
}

/// Read-only view of an entity that is about to be removed.
#[derive(Debug, Clone)]
pub struct EntityDestroyContext {
    entity: Entity,
    components: Vec<ComponentValue>,
}

impl EntityDestroyContext {
    pub(crate) fn new(entity: Entity, components: Vec<ComponentValue>) -> Self {
        Self { entity, components }
    }

    /// Handle of the entity being destroyed.
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn components(&self) -> &[ComponentValue] {
        &self.components
    }

    /// Last stored value of component `C`, if the entity had one.
    pub fn get<C: Component>(&self) -> Option<C> {
        self.components.iter().find_map(|value| value.get::<C>())
    }
}
