//! Lazy behavior handles
//!
//! A thunk pairs a [`Locator`] with the values it captured when it was
//! paused. Nothing is loaded until the thunk is invoked.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{Invocation, Value};
use crate::error::{type_name, DecodeError, InvokeError, ResolutionError};
use crate::graph::NodeId;
use crate::loader::{Load, Loader};
use crate::locator::Locator;
use crate::resume::GraphHandle;

/// Captured values: either already built, or still ids in a decoded graph.
#[derive(Clone)]
pub(crate) enum Captures {
    Values(Vec<Value>),
    Deferred { ids: Vec<NodeId>, graph: GraphHandle },
}

/// What a behavior sees of the caller when it is invoked.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Root for projection paths that do not start with `$`
    pub scope: Value,
    /// Call-time arguments; `$` is the first one
    pub args: Vec<Value>,
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationContext {
    /// An empty context: undefined scope, no arguments
    pub fn new() -> Self {
        Self {
            scope: Value::Undefined,
            args: Vec::new(),
        }
    }

    /// Set the call arguments
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Set the scope value
    pub fn with_scope(mut self, scope: Value) -> Self {
        self.scope = scope;
        self
    }
}

struct Thunk {
    locator: Locator,
    captures: RwLock<Captures>,
}

/// Shared handle to a deferred behavior.
#[derive(Clone)]
pub struct ThunkRef(Arc<Thunk>);

impl ThunkRef {
    /// A thunk for `locator` closing over `captured`.
    ///
    /// Captured ids on the locator itself are dropped; they only have
    /// meaning inside a serialized graph.
    pub fn new(locator: Locator, captured: Vec<Value>) -> Self {
        let locator = if locator.captured().is_empty() {
            locator
        } else {
            locator.with_captured(Vec::new())
        };
        Self(Arc::new(Thunk {
            locator,
            captures: RwLock::new(Captures::Values(captured)),
        }))
    }

    /// The behavior this thunk names
    pub fn locator(&self) -> &Locator {
        &self.0.locator
    }

    /// Whether captured values have been built
    pub fn is_materialized(&self) -> bool {
        matches!(*self.0.captures.read(), Captures::Values(_))
    }

    /// The captured values, building them from the source graph on first
    /// access after a lazy resume.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the deferred values cannot be built.
    pub fn captured(&self) -> Result<Vec<Value>, DecodeError> {
        let (ids, graph) = match &*self.0.captures.read() {
            Captures::Values(values) => return Ok(values.clone()),
            Captures::Deferred { ids, graph } => (ids.clone(), graph.clone()),
        };
        let values = graph.resolve_all(&ids)?;
        debug!(locator = %self.0.locator, count = values.len(), "materialized captured values");
        *self.0.captures.write() = Captures::Values(values.clone());
        Ok(values)
    }

    pub(crate) fn set_captures(&self, captures: Captures) {
        *self.0.captures.write() = captures;
    }

    /// Start or join loading the behavior.
    pub fn load(&self, loader: &Loader) -> Load {
        loader.load(&self.0.locator)
    }

    /// Load the behavior, waiting if necessary.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError` if the module or export cannot be loaded.
    pub async fn resolve(&self, loader: &Loader) -> Result<Value, ResolutionError> {
        self.load(loader).settle().await
    }

    /// Load the behavior and call it.
    ///
    /// The callee receives the captured values, the call arguments, and
    /// every projection evaluated against `ctx`. A projection that does
    /// not resolve is passed as `Value::Undefined`.
    ///
    /// # Errors
    ///
    /// Returns `InvokeError` if loading fails, the export is not a
    /// function, captured state cannot be built, or the function fails.
    pub async fn invoke(
        &self,
        loader: &Loader,
        ctx: &InvocationContext,
    ) -> Result<Value, InvokeError> {
        let func = match self.resolve(loader).await? {
            Value::Function(func) => func,
            other => {
                return Err(InvokeError::NotCallable {
                    locator: self.0.locator.to_string(),
                    found: type_name(&other),
                })
            }
        };

        let invocation = Invocation {
            captured: self.captured()?,
            args: ctx.args.clone(),
            projected: self.project(ctx),
        };
        debug!(locator = %self.0.locator, function = func.name(), "invoking thunk");
        func.call(&invocation).map_err(|message| InvokeError::Failed {
            name: func.name().to_string(),
            message,
        })
    }

    fn project(&self, ctx: &InvocationContext) -> IndexMap<String, Value> {
        self.0
            .locator
            .projections()
            .iter()
            .map(|projection| {
                let value = projection.path.evaluate(ctx).unwrap_or_else(|err| {
                    debug!(locator = %self.0.locator, error = %err, "projection unresolved");
                    Value::Undefined
                });
                (projection.key.clone(), value)
            })
            .collect()
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl std::fmt::Debug for ThunkRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Thunk({})", self.0.locator)
    }
}
