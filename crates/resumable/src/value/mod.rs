//! Value representation for pausable application state

mod callable;
mod compound;
mod custom;
mod display;
mod hashable;
mod impls;
mod reactive;
mod shared;
mod thunk;

pub use callable::{Invocation, NativeFn, NativeFnPtr};
pub use compound::{MapValue, ObjectValue, SetValue};
pub use custom::{CustomRef, CustomValue};
pub use hashable::HashableValue;
pub use reactive::{ConsumerId, Reactive, ReactiveRef, ReactiveVariant};
pub use shared::Shared;
pub use thunk::{InvocationContext, ThunkRef};

pub(crate) use thunk::Captures;

use std::sync::Arc;

/// Runtime value representation for resumable state.
///
/// Values are organized into three tiers:
/// - Tier 1: Primitives (no identity, copied by value)
/// - Tier 2: Heap containers (identity is the `Arc` pointer, interior
///   mutability so cyclic graphs can be built)
/// - Tier 3: Behavior and host values (thunks, native functions, custom types)
#[derive(Clone)]
pub enum Value {
    // ═══════════════════════════════════════════════════════════════════
    // Tier 1: Primitives
    // ═══════════════════════════════════════════════════════════════════
    /// Absent value
    Undefined,

    /// Explicit null
    Null,

    /// Boolean: `true` or `false`
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// Immutable text
    String(Arc<str>),

    // ═══════════════════════════════════════════════════════════════════
    // Tier 2: Heap Containers
    // ═══════════════════════════════════════════════════════════════════
    /// Ordered sequence
    Array(Shared<Vec<Value>>),

    /// Insertion-ordered key/value mapping
    Map(Shared<MapValue>),

    /// Insertion-ordered set of unique members
    Set(Shared<SetValue>),

    /// Plain structured object with named fields
    Object(Shared<ObjectValue>),

    /// Reactive wrapper around a plain value
    Reactive(ReactiveRef),

    // ═══════════════════════════════════════════════════════════════════
    // Tier 3: Behavior and Host Values
    // ═══════════════════════════════════════════════════════════════════
    /// Deferred behavior named by a locator, not necessarily loaded
    Thunk(ThunkRef),

    /// Host-provided callable
    Function(NativeFn),

    /// Application type serialized through a registered codec
    Custom(CustomRef),

    /// Placeholder for a value that could not be serialized or decoded
    Unresolvable(Arc<str>),
}

impl Value {
    /// Pointer identity of heap values.
    ///
    /// Primitives and unresolvable markers have no identity and return `None`.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(a.identity()),
            Value::Map(m) => Some(m.identity()),
            Value::Set(s) => Some(s.identity()),
            Value::Object(o) => Some(o.identity()),
            Value::Reactive(r) => Some(r.identity()),
            Value::Thunk(t) => Some(t.identity()),
            Value::Function(f) => Some(f.identity()),
            Value::Custom(c) => Some(c.identity()),
            Value::Undefined
            | Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Unresolvable(_) => None,
        }
    }

    /// Check whether two values are the same heap object.
    pub fn same(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// The codec tag used to dispatch encoding of this value.
    pub fn type_tag(&self) -> &str {
        match self {
            Value::Custom(c) => c.type_tag(),
            other => crate::error::type_name(other),
        }
    }
}
