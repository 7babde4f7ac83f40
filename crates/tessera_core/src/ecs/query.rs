//! With/without filters over archetype keys

use crate::ecs::{ArchetypeKey, Component, ComponentId, ComponentRegistry};
use std::any::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Term {
    Type { type_id: TypeId, name: &'static str },
    Id(ComponentId),
}

impl Term {
    fn of<C: Component>() -> Self {
        Term::Type {
            type_id: TypeId::of::<C>(),
            name: C::NAME,
        }
    }

    fn resolve(&self, registry: &ComponentRegistry) -> Option<ComponentId> {
        match *self {
            Term::Type { type_id, .. } => registry.id_of_type(type_id),
            Term::Id(id) => registry.contains(id).then_some(id),
        }
    }
}

/// Filter selecting every pool whose key contains all must-have kinds and
/// none of the must-not-have kinds.
///
/// ```ignore
/// let query = EntityQuery::new().with::<Chunk>().without::<Frozen>();
/// for pool in entities.start_query(&query).iter() { /* ... */ }
/// ```
#[derive(Clone, Debug, Default)]
pub struct EntityQuery {
    must_have: Vec<Term>,
    must_not_have: Vec<Term>,
}

/// Query terms mapped to component ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedQuery {
    must_have: Vec<ComponentId>,
    must_not_have: Vec<ComponentId>,
}

impl ResolvedQuery {
    pub fn matches(&self, key: &ArchetypeKey) -> bool {
        key.is_superset_of(&self.must_have) && key.is_disjoint_from(&self.must_not_have)
    }
}

impl EntityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<C: Component>(mut self) -> Self {
        self.must_have.push(Term::of::<C>());
        self
    }

    pub fn without<C: Component>(mut self) -> Self {
        self.must_not_have.push(Term::of::<C>());
        self
    }

    pub fn with_id(mut self, id: ComponentId) -> Self {
        self.must_have.push(Term::Id(id));
        self
    }

    pub fn without_id(mut self, id: ComponentId) -> Self {
        self.must_not_have.push(Term::Id(id));
        self
    }

    /// In-place variants, used by jobs filling a query they are handed.
    pub fn add_with<C: Component>(&mut self) -> &mut Self {
        self.must_have.push(Term::of::<C>());
        self
    }

    pub fn add_without<C: Component>(&mut self) -> &mut Self {
        self.must_not_have.push(Term::of::<C>());
        self
    }

    /// Names of the type-based terms, for logging.
    pub fn describe(&self) -> String {
        let fmt_terms = |terms: &[Term]| {
            terms
                .iter()
                .map(|term| match term {
                    Term::Type { name, .. } => (*name).to_string(),
                    Term::Id(id) => format!("#{id}"),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "with [{}] without [{}]",
            fmt_terms(&self.must_have),
            fmt_terms(&self.must_not_have)
        )
    }

    /// Map every term to a component id. Returns `None` when a must-have
    /// kind is not registered, since no pool can contain it. Unregistered
    /// must-not-have kinds are dropped.
    pub(crate) fn resolve(&self, registry: &ComponentRegistry) -> Option<ResolvedQuery> {
        let must_have = self
            .must_have
            .iter()
            .map(|term| term.resolve(registry))
            .collect::<Option<Vec<_>>>()?;
        let must_not_have = self
            .must_not_have
            .iter()
            .filter_map(|term| term.resolve(registry))
            .collect();
        Some(ResolvedQuery {
            must_have,
            must_not_have,
        })
    }

    /// Whether a pool with `key` satisfies this query.
    pub fn matches(&self, key: &ArchetypeKey, registry: &ComponentRegistry) -> bool {
        self.resolve(registry)
            .is_some_and(|resolved| resolved.matches(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;

    #[derive(Clone, Copy, Debug, Default)]
    struct Pos {
        x: f32,
    }
    define_component!(Pos, "Pos", { x: f32 });

    #[derive(Clone, Copy, Debug, Default)]
    struct Vel {
        x: f32,
    }
    define_component!(Vel, "Vel", { x: f32 });

    #[derive(Clone, Copy, Debug, Default)]
    struct Frozen {
        since: i64,
    }
    define_component!(Frozen, "Frozen", { since: i64 });

    #[derive(Clone, Copy, Debug, Default)]
    struct Ghost {
        alpha: f32,
    }
    define_component!(Ghost, "Ghost", { alpha: f32 });

    fn setup() -> (ComponentRegistry, ComponentId, ComponentId, ComponentId) {
        let registry = ComponentRegistry::builder()
            .register::<Pos>()
            .unwrap()
            .register::<Vel>()
            .unwrap()
            .register::<Frozen>()
            .unwrap()
            .build();
        let pos = registry.id_of::<Pos>().unwrap();
        let vel = registry.id_of::<Vel>().unwrap();
        let frozen = registry.id_of::<Frozen>().unwrap();
        (registry, pos, vel, frozen)
    }

    #[test]
    fn with_and_without_filter_keys() {
        let (registry, pos, vel, frozen) = setup();
        let query = EntityQuery::new().with::<Pos>().without::<Frozen>();

        assert!(query.matches(&ArchetypeKey::new(vec![pos]), &registry));
        assert!(query.matches(&ArchetypeKey::new(vec![pos, vel]), &registry));
        assert!(!query.matches(&ArchetypeKey::new(vec![pos, frozen]), &registry));
        assert!(!query.matches(&ArchetypeKey::new(vec![vel]), &registry));
    }

    #[test]
    fn unregistered_kinds_follow_set_semantics() {
        let (registry, pos, _, _) = setup();
        let key = ArchetypeKey::new(vec![pos]);

        assert!(!EntityQuery::new().with::<Ghost>().matches(&key, &registry));
        assert!(EntityQuery::new()
            .with::<Pos>()
            .without::<Ghost>()
            .matches(&key, &registry));
    }

    #[test]
    fn empty_query_matches_everything() {
        let (registry, _, vel, _) = setup();
        assert!(EntityQuery::new().matches(&ArchetypeKey::new(vec![vel]), &registry));
        assert!(EntityQuery::new().matches(&ArchetypeKey::default(), &registry));
        assert_eq!(
            EntityQuery::new().with::<Pos>().without_id(vel).describe(),
            "with [Pos] without [#1]"
        );
    }
}
