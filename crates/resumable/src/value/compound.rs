//! Compound value types: objects, maps, and sets

use indexmap::{IndexMap, IndexSet};

use super::{HashableValue, Value};
use crate::locator::Locator;

/// A plain object with named fields.
///
/// Uses IndexMap to preserve field order, which the wire format relies on
/// for stable output.
#[derive(Debug, Clone, Default)]
pub struct ObjectValue {
    /// Optional factory that rebuilds a typed instance from the fields
    pub constructor: Option<Locator>,

    /// The object's fields in insertion order
    pub fields: IndexMap<String, Value>,
}

impl ObjectValue {
    /// Create an empty untyped object
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty object tagged with a constructor locator
    pub fn with_constructor(constructor: Locator) -> Self {
        Self {
            constructor: Some(constructor),
            fields: IndexMap::new(),
        }
    }

    /// Add a field (builder pattern)
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Get a field by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a field, returning the previous value
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }
}

/// An insertion-ordered mapping whose keys may be any value.
///
/// Primitive keys compare by content, heap keys by identity.
#[derive(Debug, Clone, Default)]
pub struct MapValue {
    entries: IndexMap<HashableValue, Value>,
}

impl MapValue {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the previous value for that key
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.entries.insert(HashableValue(key), value)
    }

    /// Add an entry (builder pattern)
    pub fn with_entry(mut self, key: Value, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a key
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(&HashableValue(key.clone()))
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (&k.0, v))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An insertion-ordered set of unique members.
#[derive(Debug, Clone, Default)]
pub struct SetValue {
    members: IndexSet<HashableValue>,
}

impl SetValue {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member; returns false if it was already present
    pub fn insert(&mut self, member: Value) -> bool {
        self.members.insert(HashableValue(member))
    }

    /// Add a member (builder pattern)
    pub fn with_member(mut self, member: Value) -> Self {
        self.insert(member);
        self
    }

    /// Membership test
    pub fn contains(&self, member: &Value) -> bool {
        self.members.contains(&HashableValue(member.clone()))
    }

    /// Iterate members in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.members.iter().map(|m| &m.0)
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_primitive_keys_compare_by_content() {
        let mut map = MapValue::new();
        map.insert(Value::string("a"), Value::Int(1));
        map.insert(Value::string("a"), Value::Int(2));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&Value::string("a")), Some(&Value::Int(2)));
    }

    #[test]
    fn test_map_heap_keys_compare_by_identity() {
        let k1 = Value::object(ObjectValue::new());
        let k2 = Value::object(ObjectValue::new());
        let map = MapValue::new()
            .with_entry(k1.clone(), Value::Int(1))
            .with_entry(k2.clone(), Value::Int(2));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&k1), Some(&Value::Int(1)));
        assert_eq!(map.get(&k2), Some(&Value::Int(2)));
    }

    #[test]
    fn test_set_deduplicates() {
        let set = SetValue::new()
            .with_member(Value::Int(1))
            .with_member(Value::Int(1))
            .with_member(Value::Float(1.0));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Value::Int(1)));
    }
}
