// registry.rs - Immutable catalog of component kinds
//
// Component ids are dense u32s assigned in registration order. The catalog is
// built once at startup and shared behind an Arc; nothing mutates it after
// `build()`.

use crate::ecs::{Component, FieldMeta};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Dense identifier of a registered component kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u32);

impl ComponentId {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the raw index backing this id.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata describing a component kind's flattened layout.
#[derive(Clone, Debug)]
pub struct ComponentMeta {
    pub id: ComponentId,
    pub name: &'static str,
    pub type_id: TypeId,
    pub fields: Vec<FieldMeta>,
}

impl ComponentMeta {
    /// Resolve an access chain to the ordinal of a primitive leaf.
    pub fn field_ordinal(&self, chain: &[&str]) -> Option<usize> {
        self.fields.iter().position(|field| field.matches(chain))
    }

    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Errors raised while building the component catalog or resolving fields.
#[derive(Debug, Error)]
pub enum ComponentRegistrationError {
    #[error("component '{name}' is already registered")]
    DuplicateComponent { name: &'static str },

    #[error("component name '{name}' is used by more than one component type")]
    DuplicateName { name: &'static str },

    #[error("component id {component} is not registered")]
    UnknownComponent { component: ComponentId },

    #[error("component '{component}' has no primitive field at '{chain}'")]
    UnknownField { component: &'static str, chain: String },
}

/// Builder for [`ComponentRegistry`].
#[derive(Default)]
pub struct ComponentRegistryBuilder {
    components: Vec<ComponentMeta>,
    by_type: HashMap<TypeId, ComponentId>,
    by_name: HashMap<&'static str, ComponentId>,
}

impl ComponentRegistryBuilder {
    /// Register a component kind.
    pub fn register<C: Component>(mut self) -> Result<Self, ComponentRegistrationError> {
        let type_id = TypeId::of::<C>();
        if self.by_type.contains_key(&type_id) {
            return Err(ComponentRegistrationError::DuplicateComponent { name: C::NAME });
        }
        if self.by_name.contains_key(C::NAME) {
            return Err(ComponentRegistrationError::DuplicateName { name: C::NAME });
        }

        let id = ComponentId::new(self.components.len() as u32);
        self.by_type.insert(type_id, id);
        self.by_name.insert(C::NAME, id);
        self.components.push(ComponentMeta {
            id,
            name: C::NAME,
            type_id,
            fields: C::fields(),
        });
        Ok(self)
    }

    /// Freeze the catalog.
    pub fn build(self) -> ComponentRegistry {
        tracing::info!(
            components = self.components.len(),
            "component registry built"
        );
        ComponentRegistry {
            components: self.components,
            by_type: self.by_type,
            by_name: self.by_name,
        }
    }
}

/// Closed set of component kinds known to the store.
#[derive(Debug)]
pub struct ComponentRegistry {
    components: Vec<ComponentMeta>,
    by_type: HashMap<TypeId, ComponentId>,
    by_name: HashMap<&'static str, ComponentId>,
}

impl ComponentRegistry {
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
    }

    /// Look up the id of a Rust component type.
    #[inline]
    pub fn id_of<C: Component>(&self) -> Option<ComponentId> {
        self.id_of_type(TypeId::of::<C>())
    }

    #[inline]
    pub fn id_of_type(&self, type_id: TypeId) -> Option<ComponentId> {
        self.by_type.get(&type_id).copied()
    }

    #[inline]
    pub fn id_of_name(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn meta(&self, id: ComponentId) -> Option<&ComponentMeta> {
        self.components.get(id.index() as usize)
    }

    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        (id.index() as usize) < self.components.len()
    }

    /// Resolve `chain` inside component `id` to a stable field ordinal.
    pub fn field_ordinal(
        &self,
        id: ComponentId,
        chain: &[&str],
    ) -> Result<usize, ComponentRegistrationError> {
        let meta = self
            .meta(id)
            .ok_or(ComponentRegistrationError::UnknownComponent { component: id })?;
        meta.field_ordinal(chain)
            .ok_or_else(|| ComponentRegistrationError::UnknownField {
                component: meta.name,
                chain: chain.join("."),
            })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentMeta> {
        self.components.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{define_component, define_record};

    #[derive(Clone, Copy, Debug, Default)]
    struct Bounds {
        lo: i32,
        hi: i32,
    }
    define_record!(Bounds { lo: i32, hi: i32 });

    #[derive(Clone, Copy, Debug, Default)]
    struct Region {
        bounds: Bounds,
        weight: f32,
    }
    define_component!(Region, "Region", { bounds: Bounds, weight: f32 });

    #[derive(Clone, Copy, Debug, Default)]
    struct Label {
        code: i64,
    }
    define_component!(Label, "Region", { code: i64 });

    #[test]
    fn assigns_dense_ids_and_resolves_chains() {
        let registry = ComponentRegistry::builder()
            .register::<Region>()
            .unwrap()
            .build();

        let id = registry.id_of::<Region>().unwrap();
        assert_eq!(id.index(), 0);
        assert_eq!(registry.id_of_name("Region"), Some(id));
        assert_eq!(registry.field_ordinal(id, &["bounds", "hi"]).unwrap(), 1);
        assert_eq!(registry.field_ordinal(id, &["weight"]).unwrap(), 2);
    }

    #[test]
    fn chain_ending_at_a_record_is_rejected() {
        let registry = ComponentRegistry::builder()
            .register::<Region>()
            .unwrap()
            .build();
        let id = registry.id_of::<Region>().unwrap();

        let err = registry.field_ordinal(id, &["bounds"]).unwrap_err();
        assert!(matches!(err, ComponentRegistrationError::UnknownField { .. }));
        assert!(registry.field_ordinal(id, &["missing"]).is_err());
    }

    #[test]
    fn duplicate_registration_fails() {
        let err = ComponentRegistry::builder()
            .register::<Region>()
            .unwrap()
            .register::<Region>()
            .err()
            .unwrap();
        assert!(matches!(err, ComponentRegistrationError::DuplicateComponent { .. }));

        let err = ComponentRegistry::builder()
            .register::<Region>()
            .unwrap()
            .register::<Label>()
            .err()
            .unwrap();
        assert!(matches!(err, ComponentRegistrationError::DuplicateName { name: "Region" }));
    }
}
