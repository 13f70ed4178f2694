//! Application-defined value types

use std::any::Any;
use std::sync::Arc;

/// A value type owned by the application.
///
/// Custom values serialize only through a codec registered under their
/// [`type_tag`](CustomValue::type_tag); without one they become
/// unresolvable markers.
pub trait CustomValue: Any + Send + Sync + std::fmt::Debug {
    /// Tag the codec registry dispatches on
    fn type_tag(&self) -> &str;

    /// Downcasting support for codecs
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a custom value.
#[derive(Clone)]
pub struct CustomRef(pub Arc<dyn CustomValue>);

impl CustomRef {
    /// Wrap a custom value
    pub fn new(value: impl CustomValue) -> Self {
        Self(Arc::new(value))
    }

    /// The value's type tag
    pub fn type_tag(&self) -> &str {
        self.0.type_tag()
    }

    /// Downcast to a concrete type
    pub fn downcast_ref<T: CustomValue>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl std::fmt::Debug for CustomRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
