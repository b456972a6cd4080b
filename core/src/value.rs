//! The dynamic state tree.
//!
//! Everything a store holds or an action carries is a [`Value`]: a
//! JSON-shaped tree whose containers are `Arc`-shared and immutable by
//! construction. Immutability is what makes change detection cheap:
//! a slice that did not change keeps its `Arc`, so downstream consumers
//! can compare by reference instead of walking the tree.
//!
//! # Reference equality
//!
//! [`Value::ref_eq`] is the engine's change-detection primitive: pointer
//! equality for containers and opaque leaves, value equality for scalars.
//! Structural equality ([`PartialEq`]) is also available and compares
//! container contents deeply.
//!
//! # Opaque leaves
//!
//! [`Value::opaque`] wraps an arbitrary `Any` payload for callers that
//! must thread non-data handles through the tree. Opaque leaves refuse
//! serialization and are what the runtime invariant checkers look for;
//! [`Value::component`] marks a handle as a view-component marker, which
//! the checkers exempt.
//!
//! # Examples
//!
//! ```
//! use statefold_core::{obj, arr, value::Value};
//!
//! let state = obj! {
//!     "count" => 0,
//!     "tags" => arr!["a", "b"],
//! };
//! assert_eq!(state.at_path(&["count"]), Some(&Value::Int(0)));
//! ```

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Ordered map used for object values.
///
/// `BTreeMap` keeps key order deterministic, which keeps serialized state
/// and test assertions stable.
pub type ValueMap = BTreeMap<String, Value>;

/// An opaque leaf: a non-data payload threaded through the state tree.
///
/// Carries the payload's type name (captured at construction) so the
/// runtime checkers can report what was found, and a component-marker
/// flag for opaque view handles the checkers exempt.
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: &'static str,
    component: bool,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    /// The Rust type name of the wrapped payload.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether this leaf is a view-component marker.
    #[must_use]
    pub const fn is_component(&self) -> bool {
        self.component
    }

    /// Downcast the payload to a concrete type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueValue")
            .field("type_name", &self.type_name)
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

/// A node in the state tree.
///
/// Containers (`Array`, `Object`) are `Arc`-shared: cloning a `Value` is
/// a reference bump, and an unchanged subtree keeps its pointer identity
/// across reducer runs.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absent / null.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// Immutable string.
    String(Arc<str>),
    /// Shared array.
    Array(Arc<Vec<Value>>),
    /// Shared string-keyed object.
    Object(Arc<ValueMap>),
    /// Opaque non-data leaf. See [`Value::opaque`].
    Opaque(OpaqueValue),
}

impl Value {
    /// Build an object value from a map.
    #[must_use]
    pub fn object(map: ValueMap) -> Self {
        Value::Object(Arc::new(map))
    }

    /// Build an array value from a vector.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    /// Build a string value.
    #[must_use]
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Wrap an arbitrary payload as an opaque leaf.
    ///
    /// Opaque leaves refuse serialization and trip the runtime invariant
    /// checkers when those are enabled.
    #[must_use]
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(OpaqueValue {
            type_name: std::any::type_name::<T>(),
            component: false,
            value: Arc::new(value),
        })
    }

    /// Wrap a payload as an opaque view-component marker.
    ///
    /// Component markers are exempt from the runtime invariant checkers.
    #[must_use]
    pub fn component<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(OpaqueValue {
            type_name: std::any::type_name::<T>(),
            component: true,
            value: Arc::new(value),
        })
    }

    /// Reference equality: pointer identity for containers and opaque
    /// leaves, value equality for scalars.
    ///
    /// This is the change-detection primitive used by reducer
    /// combination, selector memoization, and subscription deduplication.
    #[must_use]
    pub fn ref_eq(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x == y,
            (Value::String(x), Value::String(y)) => Arc::ptr_eq(x, y) || x == y,
            (Value::Array(x), Value::Array(y)) => Arc::ptr_eq(x, y),
            (Value::Object(x), Value::Object(y)) => Arc::ptr_eq(x, y),
            (Value::Opaque(x), Value::Opaque(y)) => x.ptr_eq(y),
            _ => false,
        }
    }

    /// Whether this value is `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// View as a bool, if it is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// View as an integer, if it is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// View as a float, if it is one.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// View as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// View as an array, if it is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// View as an object map, if it is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key on an object value.
    ///
    /// Returns `None` for non-objects and absent keys alike.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Walk a key path through nested objects.
    #[must_use]
    pub fn at_path(&self, keys: &[&str]) -> Option<&Value> {
        let mut current = self;
        for key in keys {
            current = current.get(key)?;
        }
        Some(current)
    }

    /// Structural type tag used in checker diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Opaque(o) => o.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Array(x), Value::Array(y)) => Arc::ptr_eq(x, y) || x == y,
            (Value::Object(x), Value::Object(y)) => Arc::ptr_eq(x, y) || x == y,
            (Value::Opaque(x), Value::Opaque(y)) => x.ptr_eq(y),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::object(map)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            },
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            },
            Value::Opaque(o) => Err(serde::ser::Error::custom(format!(
                "opaque value of type `{}` is not serializable",
                o.type_name()
            ))),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-shaped value")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }

    fn visit_bool<E: serde::de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: serde::de::Error>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Int(n))
    }

    fn visit_u64<E: serde::de::Error>(self, n: u64) -> Result<Value, E> {
        i64::try_from(n)
            .map(Value::Int)
            .map_err(|_| E::custom("integer out of range"))
    }

    fn visit_f64<E: serde::de::Error>(self, n: f64) -> Result<Value, E> {
        Ok(Value::Float(n))
    }

    fn visit_str<E: serde::de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::string(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = ValueMap::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            map.insert(key, value);
        }
        Ok(Value::object(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Build a [`Value::Object`] from `key => value` pairs.
///
/// Values go through [`Value::from`], so literals and nested `obj!`/`arr!`
/// invocations compose directly.
///
/// # Examples
///
/// ```
/// use statefold_core::{obj, arr};
///
/// let v = obj! { "count" => 1, "items" => arr![1, 2] };
/// assert_eq!(v.get("count").and_then(|c| c.as_int()), Some(1));
/// ```
#[macro_export]
macro_rules! obj {
    () => { $crate::value::Value::object($crate::value::ValueMap::new()) };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut map = $crate::value::ValueMap::new();
        $( map.insert(::std::string::String::from($key), $crate::value::Value::from($value)); )+
        $crate::value::Value::object(map)
    }};
}

/// Build a [`Value::Array`] from a list of values.
#[macro_export]
macro_rules! arr {
    () => { $crate::value::Value::array(::std::vec::Vec::new()) };
    ( $( $item:expr ),+ $(,)? ) => {
        $crate::value::Value::array(::std::vec![ $( $crate::value::Value::from($item) ),+ ])
    };
}
