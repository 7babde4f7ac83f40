// archetype.rs - Archetype identification
//
// An archetype is a unique set of component kinds.
// Entities with the same component kinds share the same archetype pool.

use crate::ecs::ComponentId;
use std::fmt;

/// Canonical, order-independent identity of a component set.
///
/// The component ids are always stored sorted and deduplicated, so two keys
/// built from the same set in any order compare and hash equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ArchetypeKey {
    components: Vec<ComponentId>,
}

impl ArchetypeKey {
    /// Create a key from a list of component ids.
    ///
    /// The input will be sorted and deduplicated.
    pub fn new(mut components: Vec<ComponentId>) -> Self {
        components.sort_unstable();
        components.dedup();
        Self { components }
    }

    /// Sorted component ids in this archetype.
    #[inline]
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Check if this archetype contains a specific component.
    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.binary_search(&id).is_ok()
    }

    /// Position of `id` within the sorted component list.
    #[inline]
    pub fn position(&self, id: ComponentId) -> Option<usize> {
        self.components.binary_search(&id).ok()
    }

    /// Key for this set plus `id`.
    pub fn with(&self, id: ComponentId) -> Self {
        let mut components = self.components.clone();
        if let Err(at) = components.binary_search(&id) {
            components.insert(at, id);
        }
        Self { components }
    }

    /// Key for this set minus `id`.
    pub fn without(&self, id: ComponentId) -> Self {
        let mut components = self.components.clone();
        if let Ok(at) = components.binary_search(&id) {
            components.remove(at);
        }
        Self { components }
    }

    pub fn is_superset_of(&self, ids: &[ComponentId]) -> bool {
        ids.iter().all(|&id| self.contains(id))
    }

    pub fn is_disjoint_from(&self, ids: &[ComponentId]) -> bool {
        !ids.iter().any(|&id| self.contains(id))
    }
}

impl fmt::Display for ArchetypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, id) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ids(raw: &[u32]) -> Vec<ComponentId> {
        raw.iter().map(|&i| ComponentId::new(i)).collect()
    }

    #[test]
    fn key_is_order_independent() {
        let a = ArchetypeKey::new(ids(&[3, 1, 2]));
        let b = ArchetypeKey::new(ids(&[2, 3, 1, 1]));
        assert_eq!(a, b);

        let mut map = HashMap::new();
        map.insert(a, "pool");
        assert_eq!(map.get(&b), Some(&"pool"));
    }

    #[test]
    fn with_and_without_round_trip() {
        let base = ArchetypeKey::new(ids(&[0, 4]));
        let grown = base.with(ComponentId::new(2));
        assert_eq!(grown.components(), ids(&[0, 2, 4]).as_slice());
        assert_eq!(grown.position(ComponentId::new(4)), Some(2));
        assert_eq!(grown.without(ComponentId::new(2)), base);
        assert_eq!(base.with(ComponentId::new(0)), base);
    }

    #[test]
    fn superset_and_disjoint_checks() {
        let key = ArchetypeKey::new(ids(&[1, 2, 5]));
        assert!(key.is_superset_of(&ids(&[1, 5])));
        assert!(!key.is_superset_of(&ids(&[1, 3])));
        assert!(key.is_disjoint_from(&ids(&[0, 3])));
        assert!(!key.is_disjoint_from(&ids(&[2])));
        assert!(key.is_superset_of(&[]));
    }
}
