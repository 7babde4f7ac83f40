//! Component bundles for creating entities

use super::component::{Component, ComponentValue};

/// A group of components that can be handed to an entity atomically.
///
/// Implemented for tuples of typed components (up to eight) and for an
/// already type-erased `Vec<ComponentValue>`.
pub trait ComponentBundle {
    /// Snapshot every component of the bundle, in declaration order.
    fn into_values(self) -> Vec<ComponentValue>;
}

impl ComponentBundle for Vec<ComponentValue> {
    fn into_values(self) -> Vec<ComponentValue> {
        self
    }
}

impl ComponentBundle for () {
    fn into_values(self) -> Vec<ComponentValue> {
        Vec::new()
    }
}

macro_rules! impl_bundle {
    ($($t:ident),+) => {
        impl<$($t: Component),+> ComponentBundle for ($($t,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<ComponentValue> {
                let ($($t,)+) = self;
                vec![$(ComponentValue::of(&$t)),+]
            }
        }
    };
}

impl_bundle!(T1);
impl_bundle!(T1, T2);
impl_bundle!(T1, T2, T3);
impl_bundle!(T1, T2, T3, T4);
impl_bundle!(T1, T2, T3, T4, T5);
impl_bundle!(T1, T2, T3, T4, T5, T6);
impl_bundle!(T1, T2, T3, T4, T5, T6, T7);
impl_bundle!(T1, T2, T3, T4, T5, T6, T7, T8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Health {
        value: i32,
    }
    define_component!(Health, "Health", { value: i32 });

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Speed {
        value: f32,
    }
    define_component!(Speed, "Speed", { value: f32 });

    #[test]
    fn tuple_bundle_keeps_declaration_order() {
        let values = (Speed { value: 1.5 }, Health { value: 10 }).into_values();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].get::<Speed>(), Some(Speed { value: 1.5 }));
        assert_eq!(values[1].get::<Health>(), Some(Health { value: 10 }));
        assert!(().into_values().is_empty());
    }
}
