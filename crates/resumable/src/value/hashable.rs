//! Hashable wrapper for Value to enable use as map keys and set members

use std::hash::{Hash, Hasher};

use super::Value;

/// A wrapper for Value that implements Hash and Eq.
///
/// Primitives hash and compare by content (floats by bit pattern, so
/// `NaN` keys are usable). Heap values hash and compare by identity,
/// which matches how a host language keys maps by object reference.
#[derive(Debug, Clone)]
pub struct HashableValue(pub Value);

impl Hash for HashableValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash the discriminant first
        std::mem::discriminant(&self.0).hash(state);

        match &self.0 {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(n) => n.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Unresolvable(d) => d.hash(state),
            other => other.identity().hash(state),
        }
    }
}

impl PartialEq for HashableValue {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Unresolvable(a), Value::Unresolvable(b)) => a == b,
            (a, b) => a.same(b),
        }
    }
}

impl Eq for HashableValue {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_nan_is_a_usable_key() {
        let mut set = HashSet::new();
        set.insert(HashableValue(Value::Float(f64::NAN)));
        assert!(set.contains(&HashableValue(Value::Float(f64::NAN))));
    }

    #[test]
    fn test_clone_of_heap_value_is_equal() {
        let a = Value::array(vec![Value::Int(1)]);
        assert_eq!(HashableValue(a.clone()), HashableValue(a));
    }

    #[test]
    fn test_structurally_equal_heap_values_differ() {
        let a = Value::array(vec![Value::Int(1)]);
        let b = Value::array(vec![Value::Int(1)]);
        assert_ne!(HashableValue(a), HashableValue(b));
    }
}
