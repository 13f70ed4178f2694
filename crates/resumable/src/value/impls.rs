//! Value trait implementations: constructors, predicates, extractors, From traits, PartialEq

use std::collections::HashSet;
use std::sync::Arc;

use super::*;
use crate::locator::Locator;

// ═══════════════════════════════════════════════════════════════════
// Convenience Constructors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Create an array value
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Shared::new(items))
    }

    /// Create an object value
    pub fn object(obj: ObjectValue) -> Self {
        Value::Object(Shared::new(obj))
    }

    /// Create a map value
    pub fn map(map: MapValue) -> Self {
        Value::Map(Shared::new(map))
    }

    /// Create a set value
    pub fn set(set: SetValue) -> Self {
        Value::Set(Shared::new(set))
    }

    /// Wrap a value in a signal
    pub fn signal(value: Value) -> Self {
        Value::Reactive(ReactiveRef::signal(value))
    }

    /// Wrap a value in a store
    pub fn store(value: Value) -> Self {
        Value::Reactive(ReactiveRef::store(value))
    }

    /// Create a thunk over `locator` with captured values
    pub fn thunk(locator: Locator, captured: Vec<Value>) -> Self {
        Value::Thunk(ThunkRef::new(locator, captured))
    }

    /// Wrap a native closure
    pub fn function<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value, String> + Send + Sync + 'static,
    {
        Value::Function(NativeFn::new(name, func))
    }

    /// Wrap an application value
    pub fn custom(value: impl CustomValue) -> Self {
        Value::Custom(CustomRef::new(value))
    }

    /// Create an unresolvable marker
    pub fn unresolvable(diagnostic: impl AsRef<str>) -> Self {
        Value::Unresolvable(Arc::from(diagnostic.as_ref()))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Type Predicates
    // ═══════════════════════════════════════════════════════════════════
    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is a primitive (no identity)
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Undefined
                | Value::Null
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::String(_)
        )
    }

    /// Check if value is an unresolvable marker
    pub fn is_unresolvable(&self) -> bool {
        matches!(self, Value::Unresolvable(_))
    }

    /// Check if value can be invoked (thunk or native function)
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Thunk(_) | Value::Function(_))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Extractors (return Option for safe access)
    // ═══════════════════════════════════════════════════════════════════
    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract as f64 (converts from integers)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Extract string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract the array handle
    pub fn as_array(&self) -> Option<&Shared<Vec<Value>>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Extract the object handle
    pub fn as_object(&self) -> Option<&Shared<ObjectValue>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Extract the map handle
    pub fn as_map(&self) -> Option<&Shared<MapValue>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Extract the set handle
    pub fn as_set(&self) -> Option<&Shared<SetValue>> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    /// Extract the reactive handle
    pub fn as_reactive(&self) -> Option<&ReactiveRef> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    /// Extract the thunk handle
    pub fn as_thunk(&self) -> Option<&ThunkRef> {
        match self {
            Value::Thunk(t) => Some(t),
            _ => None,
        }
    }

    /// Extract the native function
    pub fn as_function(&self) -> Option<&NativeFn> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Extract the custom value handle
    pub fn as_custom(&self) -> Option<&CustomRef> {
        match self {
            Value::Custom(c) => Some(c),
            _ => None,
        }
    }

    /// Read an object field (or a store's field) by name
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.read().get(name).cloned(),
            Value::Reactive(r) => r.peek_field(name),
            _ => None,
        }
    }

    /// Read an array element by index
    pub fn element(&self, index: usize) -> Option<Value> {
        match self {
            Value::Array(items) => items.read().get(index).cloned(),
            _ => None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Structural Equality
    // ═══════════════════════════════════════════════════════════════════
    /// Structural equality that terminates on cyclic graphs.
    ///
    /// Heap values compare by content; a pair of nodes already under
    /// comparison is assumed equal. Functions and custom values compare by
    /// identity, thunks by locator and captured values.
    pub fn deep_eq(&self, other: &Value) -> bool {
        deep_eq(self, other, &mut HashSet::new())
    }
}

fn deep_eq(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    if let (Some(x), Some(y)) = (a.identity(), b.identity()) {
        if x == y || !seen.insert((x, y)) {
            return true;
        }
    }
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Unresolvable(x), Value::Unresolvable(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            let (x, y) = (x.read().clone(), y.read().clone());
            all_eq(x.iter(), y.iter(), seen)
        }
        (Value::Set(x), Value::Set(y)) => {
            let x: Vec<Value> = x.read().iter().cloned().collect();
            let y: Vec<Value> = y.read().iter().cloned().collect();
            all_eq(x.iter(), y.iter(), seen)
        }
        (Value::Map(x), Value::Map(y)) => {
            let x: Vec<(Value, Value)> = x.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let y: Vec<(Value, Value)> = y.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            x.len() == y.len()
                && x.iter()
                    .zip(&y)
                    .all(|((xk, xv), (yk, yv))| deep_eq(xk, yk, seen) && deep_eq(xv, yv, seen))
        }
        (Value::Object(x), Value::Object(y)) => {
            let (x, y) = (x.read().clone(), y.read().clone());
            x.constructor == y.constructor
                && x.fields.len() == y.fields.len()
                && x.fields
                    .iter()
                    .zip(&y.fields)
                    .all(|((xn, xv), (yn, yv))| xn == yn && deep_eq(xv, yv, seen))
        }
        (Value::Reactive(x), Value::Reactive(y)) => {
            x.variant() == y.variant() && deep_eq(&x.unwrap(), &y.unwrap(), seen)
        }
        (Value::Thunk(x), Value::Thunk(y)) => {
            x.locator() == y.locator()
                && match (x.captured(), y.captured()) {
                    (Ok(xs), Ok(ys)) => all_eq(xs.iter(), ys.iter(), seen),
                    _ => false,
                }
        }
        _ => false,
    }
}

fn all_eq<'a>(
    xs: impl ExactSizeIterator<Item = &'a Value>,
    ys: impl ExactSizeIterator<Item = &'a Value>,
    seen: &mut HashSet<(usize, usize)>,
) -> bool {
    xs.len() == ys.len() && xs.zip(ys).all(|(x, y)| deep_eq(x, y, seen))
}

// ═══════════════════════════════════════════════════════════════════
// PartialEq Implementation
// ═══════════════════════════════════════════════════════════════════

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

// ═══════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
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
        Value::String(Arc::from(s))
    }
}

impl From<ObjectValue> for Value {
    fn from(obj: ObjectValue) -> Self {
        Value::object(obj)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Constructors
    #[test]
    fn test_string_constructor() {
        let v = Value::string("hello");
        assert!(matches!(v, Value::String(_)));
    }

    #[test]
    fn test_heap_constructors_allocate_fresh_identities() {
        let a = Value::array(vec![]);
        let b = Value::array(vec![]);
        assert!(!a.same(&b));
        assert!(a.same(&a.clone()));
    }

    // Predicates
    #[test]
    fn test_is_primitive() {
        assert!(Value::Int(1).is_primitive());
        assert!(Value::string("x").is_primitive());
        assert!(!Value::array(vec![]).is_primitive());
        assert!(!Value::unresolvable("x").is_primitive());
    }

    #[test]
    fn test_is_callable() {
        let f = Value::function("noop", |_| Ok(Value::Undefined));
        assert!(f.is_callable());
        assert!(!Value::Null.is_callable());
    }

    // Extractors
    #[test]
    fn test_as_f64_widens_ints() {
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::string("hi").as_f64(), None);
    }

    #[test]
    fn test_field_reads_objects_and_stores() {
        let obj = ObjectValue::new().with_field("count", Value::Int(3));
        assert_eq!(Value::object(obj.clone()).field("count"), Some(Value::Int(3)));
        assert_eq!(Value::store(Value::object(obj)).field("count"), Some(Value::Int(3)));
        assert_eq!(Value::Int(3).field("count"), None);
    }

    // PartialEq
    #[test]
    fn test_partialeq_primitives() {
        assert_eq!(Value::Undefined, Value::Undefined);
        assert_ne!(Value::Undefined, Value::Null);
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_partialeq_is_structural_for_containers() {
        let a = Value::array(vec![Value::Int(1), Value::string("x")]);
        let b = Value::array(vec![Value::Int(1), Value::string("x")]);
        assert_eq!(a, b);
        assert!(!a.same(&b));
    }

    #[test]
    fn test_deep_eq_terminates_on_cycles() {
        let make = || {
            let obj = Value::object(ObjectValue::new().with_field("n", Value::Int(1)));
            if let Value::Object(o) = &obj {
                o.write().set("self", obj.clone());
            }
            obj
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn test_functions_compare_by_identity() {
        let f = Value::function("f", |_| Ok(Value::Null));
        let g = Value::function("f", |_| Ok(Value::Null));
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    // From trait
    #[test]
    fn test_from_primitives() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(1.5f64), Value::Float(1.5));
        assert_eq!(Value::from("hi"), Value::string("hi"));
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Int(7));
    }
}
