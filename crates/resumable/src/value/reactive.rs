//! Reactive containers
//!
//! A reactive container wraps a plain value and records which consumers
//! read which fields. The subscriber table is runtime-only: pausing a
//! container keeps its variant and plain value, resuming creates a fresh
//! container with an empty table that refills as consumers read again.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};

use super::Value;

/// Which flavor of reactive wrapper to recreate on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactiveVariant {
    /// A single tracked value
    Signal,
    /// A tracked object whose fields are subscribed individually
    Store,
}

impl ReactiveVariant {
    /// Wire name of the variant
    pub fn as_str(self) -> &'static str {
        match self {
            ReactiveVariant::Signal => "signal",
            ReactiveVariant::Store => "store",
        }
    }

    /// Parse a wire name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "signal" => Some(ReactiveVariant::Signal),
            "store" => Some(ReactiveVariant::Store),
            _ => None,
        }
    }
}

/// Identifier of something that reads reactive state (an effect, a view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub u64);

/// Field name used for whole-value reads of a signal.
const WHOLE_VALUE: &str = "";

/// The capability the codec needs from a reactive wrapper.
///
/// Serialization only calls [`unwrap`](Reactive::unwrap); deserialization
/// only calls [`rewrap`](Reactive::rewrap).
pub trait Reactive: Sized {
    /// The plain value underneath, without subscribers
    fn unwrap(&self) -> Value;

    /// The variant to recreate
    fn variant(&self) -> ReactiveVariant;

    /// Wrap a plain value in a fresh container
    fn rewrap(variant: ReactiveVariant, plain: Value) -> Self;
}

struct ReactiveCell {
    variant: ReactiveVariant,
    target: RwLock<Value>,
    subscribers: Mutex<IndexMap<String, IndexSet<ConsumerId>>>,
}

/// Handle to a reactive container.
#[derive(Clone)]
pub struct ReactiveRef {
    cell: Arc<ReactiveCell>,
}

impl ReactiveRef {
    /// Wrap a value as a signal
    pub fn signal(value: Value) -> Self {
        Self::rewrap(ReactiveVariant::Signal, value)
    }

    /// Wrap an object as a store
    pub fn store(value: Value) -> Self {
        Self::rewrap(ReactiveVariant::Store, value)
    }

    /// Read the whole value, subscribing `consumer` to changes
    pub fn get(&self, consumer: ConsumerId) -> Value {
        self.track(consumer, WHOLE_VALUE);
        self.cell.target.read().clone()
    }

    /// Read one field of the wrapped object, subscribing `consumer` to it
    pub fn read_field(&self, consumer: ConsumerId, field: &str) -> Option<Value> {
        self.track(consumer, field);
        self.peek_field(field)
    }

    /// Read one field without subscribing
    pub fn peek_field(&self, field: &str) -> Option<Value> {
        match &*self.cell.target.read() {
            Value::Object(obj) => obj.read().get(field).cloned(),
            Value::Map(map) => map.read().get(&Value::string(field)).cloned(),
            _ => None,
        }
    }

    /// Replace the whole value; returns every consumer to notify
    pub fn set(&self, value: Value) -> Vec<ConsumerId> {
        *self.cell.target.write() = value;
        let subscribers = self.cell.subscribers.lock();
        let mut notify: IndexSet<ConsumerId> = IndexSet::new();
        for consumers in subscribers.values() {
            notify.extend(consumers.iter().copied());
        }
        notify.into_iter().collect()
    }

    /// Write one field of the wrapped object; returns the consumers to notify
    pub fn set_field(&self, field: &str, value: Value) -> Vec<ConsumerId> {
        if let Value::Object(obj) = &*self.cell.target.read() {
            obj.write().set(field, value);
        }
        let subscribers = self.cell.subscribers.lock();
        let mut notify: IndexSet<ConsumerId> = IndexSet::new();
        for key in [field, WHOLE_VALUE] {
            if let Some(consumers) = subscribers.get(key) {
                notify.extend(consumers.iter().copied());
            }
        }
        notify.into_iter().collect()
    }

    /// Consumers subscribed to a field
    pub fn subscribers(&self, field: &str) -> Vec<ConsumerId> {
        self.cell
            .subscribers
            .lock()
            .get(field)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Total number of subscriptions across all fields
    pub fn subscription_count(&self) -> usize {
        self.cell.subscribers.lock().values().map(IndexSet::len).sum()
    }

    /// Whether both handles refer to the same container
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.cell) as *const () as usize
    }

    /// Replace the target without notifying; used while rebuilding a graph
    pub(crate) fn restore(&self, value: Value) {
        *self.cell.target.write() = value;
    }

    fn track(&self, consumer: ConsumerId, field: &str) {
        self.cell
            .subscribers
            .lock()
            .entry(field.to_string())
            .or_default()
            .insert(consumer);
    }
}

impl Reactive for ReactiveRef {
    fn unwrap(&self) -> Value {
        self.cell.target.read().clone()
    }

    fn variant(&self) -> ReactiveVariant {
        self.cell.variant
    }

    fn rewrap(variant: ReactiveVariant, plain: Value) -> Self {
        Self {
            cell: Arc::new(ReactiveCell {
                variant,
                target: RwLock::new(plain),
                subscribers: Mutex::new(IndexMap::new()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectValue;

    #[test]
    fn test_field_reads_are_tracked_per_field() {
        let store = ReactiveRef::store(Value::object(
            ObjectValue::new()
                .with_field("count", Value::Int(0))
                .with_field("label", Value::string("x")),
        ));

        assert_eq!(store.read_field(ConsumerId(1), "count"), Some(Value::Int(0)));
        store.read_field(ConsumerId(2), "label");

        assert_eq!(store.subscribers("count"), vec![ConsumerId(1)]);
        assert_eq!(store.set_field("count", Value::Int(5)), vec![ConsumerId(1)]);
        assert_eq!(store.peek_field("count"), Some(Value::Int(5)));
    }

    #[test]
    fn test_signal_set_notifies_readers() {
        let signal = ReactiveRef::signal(Value::Int(1));
        assert_eq!(signal.get(ConsumerId(7)), Value::Int(1));
        assert_eq!(signal.set(Value::Int(2)), vec![ConsumerId(7)]);
        assert_eq!(signal.unwrap(), Value::Int(2));
    }

    #[test]
    fn test_rewrap_starts_without_subscribers() {
        let signal = ReactiveRef::signal(Value::Int(1));
        signal.get(ConsumerId(1));

        let resumed = ReactiveRef::rewrap(signal.variant(), signal.unwrap());
        assert_eq!(resumed.subscription_count(), 0);
        assert_eq!(resumed.variant(), ReactiveVariant::Signal);
        assert!(!resumed.ptr_eq(&signal));
    }

    #[test]
    fn test_variant_names_round_trip() {
        for variant in [ReactiveVariant::Signal, ReactiveVariant::Store] {
            assert_eq!(ReactiveVariant::from_name(variant.as_str()), Some(variant));
        }
        assert_eq!(ReactiveVariant::from_name("memo"), None);
    }
}
