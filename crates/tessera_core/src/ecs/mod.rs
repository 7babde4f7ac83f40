//! Entity Component System core types.
//!
//! Entities are generation-checked handles into dense tables; their data
//! lives in columnar archetype pools, one per distinct component set.
//! Structural changes are buffered and applied by
//! [`EntityManager::flush`], the single synchronization point of each
//! update.

mod archetype;
mod bundle;
mod command;
mod component;
mod destroy;
mod entity;
mod entity_manager;
mod query;
mod registry;
pub mod storage;
mod world;

pub use archetype::ArchetypeKey;
pub use bundle::ComponentBundle;
pub use component::{
    Component, ComponentValue, FieldMeta, FieldType, Primitive, PrimitiveKind, Value,
};
pub use destroy::{EntityDestroyCallback, EntityDestroyContext};
pub use entity::Entity;
pub use entity_manager::{EntityError, EntityManager, FlushStats, QueryResult};
pub use query::EntityQuery;
pub use registry::{
    ComponentId, ComponentMeta, ComponentRegistrationError, ComponentRegistry,
    ComponentRegistryBuilder,
};
pub use storage::{ArchetypeDataPool, ArrayRange, FieldArray, PoolError};
pub use world::{System, SystemContext, World, WorldError};

pub(crate) use component::short_type_name;
