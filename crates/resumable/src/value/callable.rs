//! Host-provided callables

use std::sync::Arc;

use indexmap::IndexMap;

use super::Value;
use crate::locator::Locator;

/// Type alias for native function pointers to reduce complexity
pub type NativeFnPtr = Arc<dyn Fn(&Invocation) -> Result<Value, String> + Send + Sync>;

/// Everything a native function receives when a thunk invokes it.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Values captured when the behavior was paused, in capture order
    pub captured: Vec<Value>,

    /// Arguments supplied at call time
    pub args: Vec<Value>,

    /// Projection results keyed by the locator's query keys
    pub projected: IndexMap<String, Value>,
}

impl Invocation {
    /// Create an invocation with only call-time arguments
    pub fn with_args(args: Vec<Value>) -> Self {
        Self {
            args,
            ..Default::default()
        }
    }

    /// Look up a projected value by key
    pub fn projected(&self, key: &str) -> Option<&Value> {
        self.projected.get(key)
    }
}

struct NativeFnInner {
    name: String,
    func: NativeFnPtr,
    origin: Option<Locator>,
}

/// A native function exported by a module.
///
/// These are Rust closures exposed to resumed state. A function loaded
/// through a locator remembers that locator as its origin so it can be
/// paused again.
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<NativeFnInner>,
}

impl NativeFn {
    /// Wrap a closure
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(NativeFnInner {
                name: name.into(),
                func: Arc::new(func),
                origin: None,
            }),
        }
    }

    /// Copy of this function that records where it was loaded from
    pub fn with_origin(&self, origin: Locator) -> Self {
        Self {
            inner: Arc::new(NativeFnInner {
                name: self.inner.name.clone(),
                func: Arc::clone(&self.inner.func),
                origin: Some(origin),
            }),
        }
    }

    /// Function name (for display/debugging)
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Locator this function was loaded from, if any
    pub fn origin(&self) -> Option<&Locator> {
        self.inner.origin.as_ref()
    }

    /// Call the function
    pub fn call(&self, invocation: &Invocation) -> Result<Value, String> {
        (self.inner.func)(invocation)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFn({})", self.inner.name)
    }
}
