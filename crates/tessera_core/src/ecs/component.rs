// component.rs - Plain-data component kinds and their flattened field values
//
// Components are stored field-by-field. Every component (and every nested
// record inside one) flattens into an ordered list of primitive leaves; the
// order is the declaration order, depth first. That order is the field
// ordinal used by the registry and by the archetype pools.

use std::any::{type_name, TypeId};
use std::fmt;
use std::slice;

/// Primitive leaf types a component field may have.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A primitive that can live in a column.
///
/// Columns store every primitive as 64 raw bits, so the conversion must be
/// lossless in both directions.
pub trait Primitive: Copy + Send + Sync + 'static {
    const KIND: PrimitiveKind;

    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;
}

impl Primitive for bool {
    const KIND: PrimitiveKind = PrimitiveKind::Bool;

    #[inline]
    fn to_bits(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits != 0
    }
}

impl Primitive for i32 {
    const KIND: PrimitiveKind = PrimitiveKind::I32;

    #[inline]
    fn to_bits(self) -> u64 {
        self as u32 as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits as u32 as i32
    }
}

impl Primitive for i64 {
    const KIND: PrimitiveKind = PrimitiveKind::I64;

    #[inline]
    fn to_bits(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits as i64
    }
}

impl Primitive for f32 {
    const KIND: PrimitiveKind = PrimitiveKind::F32;

    #[inline]
    fn to_bits(self) -> u64 {
        f32::to_bits(self) as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl Primitive for f64 {
    const KIND: PrimitiveKind = PrimitiveKind::F64;

    #[inline]
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

/// A single flattened field value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::I32(_) => PrimitiveKind::I32,
            Value::I64(_) => PrimitiveKind::I64,
            Value::F32(_) => PrimitiveKind::F32,
            Value::F64(_) => PrimitiveKind::F64,
        }
    }

    /// Raw column representation.
    pub fn to_bits(self) -> u64 {
        match self {
            Value::Bool(v) => v.to_bits(),
            Value::I32(v) => Primitive::to_bits(v),
            Value::I64(v) => Primitive::to_bits(v),
            Value::F32(v) => Primitive::to_bits(v),
            Value::F64(v) => Primitive::to_bits(v),
        }
    }

    /// Rebuild a value of `kind` from its column representation.
    pub fn from_bits(kind: PrimitiveKind, bits: u64) -> Self {
        match kind {
            PrimitiveKind::Bool => Value::Bool(<bool as Primitive>::from_bits(bits)),
            PrimitiveKind::I32 => Value::I32(<i32 as Primitive>::from_bits(bits)),
            PrimitiveKind::I64 => Value::I64(<i64 as Primitive>::from_bits(bits)),
            PrimitiveKind::F32 => Value::F32(<f32 as Primitive>::from_bits(bits)),
            PrimitiveKind::F64 => Value::F64(<f64 as Primitive>::from_bits(bits)),
        }
    }
}

/// Layout of one primitive leaf: its access chain and kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMeta {
    pub path: Vec<&'static str>,
    pub kind: PrimitiveKind,
}

impl FieldMeta {
    /// Dotted form of the access chain, for diagnostics.
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }

    #[inline]
    pub fn matches(&self, chain: &[&str]) -> bool {
        self.path.len() == chain.len() && self.path.iter().zip(chain).all(|(a, b)| a == b)
    }
}

/// Anything that can appear as a component field: a primitive or a nested
/// record. Implemented for records by [`define_record!`](crate::define_record).
pub trait FieldType: Sized {
    /// Append the leaves of this type, prefixing each with `path`.
    fn describe(path: &mut Vec<&'static str>, out: &mut Vec<FieldMeta>);

    /// Append the leaf values of `self` in ordinal order.
    fn flatten(&self, out: &mut Vec<Value>);

    /// Rebuild from leaf values in ordinal order. Returns `None` if the
    /// values run out or a kind does not match.
    fn unflatten(values: &mut slice::Iter<'_, Value>) -> Option<Self>;
}

macro_rules! impl_primitive_field {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldType for $ty {
                fn describe(path: &mut Vec<&'static str>, out: &mut Vec<FieldMeta>) {
                    out.push(FieldMeta {
                        path: path.clone(),
                        kind: <$ty as Primitive>::KIND,
                    });
                }

                #[inline]
                fn flatten(&self, out: &mut Vec<Value>) {
                    out.push(Value::$variant(*self));
                }

                #[inline]
                fn unflatten(values: &mut slice::Iter<'_, Value>) -> Option<Self> {
                    match values.next()? {
                        Value::$variant(v) => Some(*v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_primitive_field!(
    bool => Bool,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

/// A registrable component kind.
///
/// Components are plain data. Implement through
/// [`define_component!`](crate::define_component) rather than by hand.
pub trait Component: FieldType + Send + Sync + 'static {
    /// Human-readable, unique name.
    const NAME: &'static str;

    /// Flattened field layout, in ordinal order.
    fn fields() -> Vec<FieldMeta> {
        let mut out = Vec::new();
        Self::describe(&mut Vec::new(), &mut out);
        out
    }
}

/// Type-erased snapshot of one component instance.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentValue {
    type_id: TypeId,
    name: &'static str,
    fields: Vec<Value>,
}

impl ComponentValue {
    /// Snapshot a typed component.
    pub fn of<C: Component>(component: &C) -> Self {
        let mut fields = Vec::new();
        component.flatten(&mut fields);
        Self {
            type_id: TypeId::of::<C>(),
            name: C::NAME,
            fields,
        }
    }

    pub(crate) fn from_parts(type_id: TypeId, name: &'static str, fields: Vec<Value>) -> Self {
        Self {
            type_id,
            name,
            fields,
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    #[inline]
    pub fn is<C: Component>(&self) -> bool {
        self.type_id == TypeId::of::<C>()
    }

    /// Rebuild the typed component, if this snapshot holds a `C`.
    pub fn get<C: Component>(&self) -> Option<C> {
        if !self.is::<C>() {
            return None;
        }
        let mut iter = self.fields.iter();
        let value = C::unflatten(&mut iter)?;
        iter.next().is_none().then_some(value)
    }

    /// Short description used in error messages.
    pub(crate) fn describe_type(&self) -> String {
        format!("{} ({} fields)", self.name, self.fields.len())
    }
}

impl<C: Component> From<C> for ComponentValue {
    fn from(component: C) -> Self {
        ComponentValue::of(&component)
    }
}

/// Name of a Rust type, for diagnostics.
#[inline]
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Implement [`FieldType`] for a plain struct so it can be nested inside a
/// component. Every field of the struct must be listed.
///
/// # Example
/// ```ignore
/// #[derive(Clone, Copy, Debug, Default)]
/// struct Aabb { min_x: f32, max_x: f32 }
///
/// define_record!(Aabb { min_x: f32, max_x: f32 });
/// ```
#[macro_export]
macro_rules! define_record {
    ($ty:ident { $($field:ident : $fty:ty),* $(,)? }) => {
        impl $crate::ecs::FieldType for $ty {
            #[allow(unused_variables)]
            fn describe(
                path: &mut ::std::vec::Vec<&'static str>,
                out: &mut ::std::vec::Vec<$crate::ecs::FieldMeta>,
            ) {
                $(
                    path.push(stringify!($field));
                    <$fty as $crate::ecs::FieldType>::describe(path, out);
                    path.pop();
                )*
            }

            #[allow(unused_variables)]
            fn flatten(&self, out: &mut ::std::vec::Vec<$crate::ecs::Value>) {
                $( <$fty as $crate::ecs::FieldType>::flatten(&self.$field, out); )*
            }

            #[allow(unused_variables)]
            fn unflatten(
                values: &mut ::std::slice::Iter<'_, $crate::ecs::Value>,
            ) -> ::std::option::Option<Self> {
                ::std::option::Option::Some(Self {
                    $( $field: <$fty as $crate::ecs::FieldType>::unflatten(values)?, )*
                })
            }
        }
    };
}

/// Implement [`Component`] (and [`FieldType`]) for a plain struct.
///
/// # Example
/// ```ignore
/// #[derive(Clone, Copy, Debug, Default)]
/// struct Chunk { x: i32, y: i32, z: i32, priority: i32 }
///
/// define_component!(Chunk, "Chunk", { x: i32, y: i32, z: i32, priority: i32 });
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ident, $name:expr, { $($field:ident : $fty:ty),* $(,)? }) => {
        $crate::define_record!($ty { $($field : $fty),* });

        impl $crate::ecs::Component for $ty {
            const NAME: &'static str = $name;
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{define_component, define_record};

    #[derive(Clone, Copy, Debug, PartialEq, Default)]
    struct Extent {
        min: f32,
        max: f32,
    }
    define_record!(Extent { min: f32, max: f32 });

    #[derive(Clone, Copy, Debug, PartialEq, Default)]
    struct Body {
        mass: f64,
        sleeping: bool,
        bounds: Extent,
        id: i64,
    }
    define_component!(Body, "Body", { mass: f64, sleeping: bool, bounds: Extent, id: i64 });

    #[test]
    fn nested_records_flatten_depth_first() {
        let fields = Body::fields();
        let paths: Vec<String> = fields.iter().map(FieldMeta::dotted).collect();
        assert_eq!(paths, ["mass", "sleeping", "bounds.min", "bounds.max", "id"]);
        assert_eq!(fields[2].kind, PrimitiveKind::F32);
        assert!(fields[3].matches(&["bounds", "max"]));
        assert!(!fields[3].matches(&["bounds"]));
    }

    #[test]
    fn component_value_restores_typed_component() {
        let body = Body {
            mass: 4.5,
            sleeping: true,
            bounds: Extent { min: -1.0, max: 2.5 },
            id: -9,
        };
        let value = ComponentValue::of(&body);
        assert_eq!(value.name(), "Body");
        assert_eq!(value.fields().len(), 5);
        assert_eq!(value.get::<Body>(), Some(body));
    }

    #[test]
    fn bits_round_trip_negative_and_float_values() {
        for v in [Value::I32(-7), Value::I64(i64::MIN), Value::F32(-0.5), Value::Bool(true)] {
            assert_eq!(Value::from_bits(v.kind(), v.to_bits()), v);
        }
    }
}
