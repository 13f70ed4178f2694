//! Lazy symbol loading
//!
//! [`Loader::load`] turns a locator into its exported value. Concurrent
//! requests for one symbol share a single in-flight load; once loaded, the
//! value is returned synchronously from the registry.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::error::{ResolutionCause, ResolutionError};
use crate::locator::{ExportName, Locator};
use crate::registry::{ModuleEntry, SharedLoad, SharedModule, SymbolEntry, SymbolRegistry};
use crate::value::Value;

/// The exports of one loaded module.
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    default: Option<Value>,
    named: IndexMap<String, Value>,
}

impl ModuleExports {
    /// A module with no exports
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default export (builder pattern)
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Add a named export (builder pattern)
    pub fn with_export(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    /// Look up an export. A missing default export is `None`; an explicit
    /// `Value::Null` default is `Some(Null)`.
    pub fn get(&self, export: &ExportName) -> Option<&Value> {
        match export {
            ExportName::Default => self.default.as_ref(),
            ExportName::Named(name) => self.named.get(name),
        }
    }
}

/// Why a host could not provide a module.
#[derive(Error, Debug)]
pub enum FetchError {
    /// No module exists at the path
    #[error("module not found")]
    NotFound,

    /// The module exists but failed to load or initialize
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// The environment that actually fetches and evaluates modules.
pub trait ModuleHost: Send + Sync {
    /// Fetch the module at a normalized path.
    fn fetch_module(&self, path: &str) -> BoxFuture<'static, Result<ModuleExports, FetchError>>;
}

/// A host serving modules from an in-memory table.
#[derive(Debug, Default)]
pub struct StaticModules {
    modules: DashMap<String, ModuleExports>,
    fetches: AtomicUsize,
}

impl StaticModules {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module (builder pattern)
    pub fn with_module(self, path: impl Into<String>, exports: ModuleExports) -> Self {
        self.insert(path, exports);
        self
    }

    /// Add or replace a module
    pub fn insert(&self, path: impl Into<String>, exports: ModuleExports) {
        self.modules.insert(path.into(), exports);
    }

    /// How many fetches have been served, hits and misses included
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ModuleHost for StaticModules {
    fn fetch_module(&self, path: &str) -> BoxFuture<'static, Result<ModuleExports, FetchError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let result = self
            .modules
            .get(path)
            .map(|exports| exports.value().clone())
            .ok_or(FetchError::NotFound);
        future::ready(result).boxed()
    }
}

/// Outcome of [`Loader::load`].
pub enum Load {
    /// The value was already cached
    Ready(Value),
    /// A load is in flight; await it for the value
    Pending(PendingLoad),
}

impl Load {
    /// Whether the value was available synchronously
    pub fn is_ready(&self) -> bool {
        matches!(self, Load::Ready(_))
    }

    /// The value, if it was available synchronously
    pub fn ready(self) -> Option<Value> {
        match self {
            Load::Ready(value) => Some(value),
            Load::Pending(_) => None,
        }
    }

    /// Wait for the value.
    ///
    /// # Errors
    ///
    /// Returns the load's `ResolutionError`.
    pub async fn settle(self) -> Result<Value, ResolutionError> {
        match self {
            Load::Ready(value) => Ok(value),
            Load::Pending(pending) => pending.await,
        }
    }
}

impl std::fmt::Debug for Load {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Load::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Load::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A handle on an in-flight load; every clone observes the same result.
#[derive(Clone)]
pub struct PendingLoad(SharedLoad);

impl Future for PendingLoad {
    type Output = Result<Value, ResolutionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

/// Resolves locators through a [`ModuleHost`], caching in a
/// [`SymbolRegistry`].
#[derive(Clone)]
pub struct Loader {
    registry: Arc<SymbolRegistry>,
    host: Arc<dyn ModuleHost>,
}

impl Loader {
    /// Create a loader over a host and a registry
    pub fn new(registry: Arc<SymbolRegistry>, host: Arc<dyn ModuleHost>) -> Self {
        Self { registry, host }
    }

    /// The backing registry
    pub fn registry(&self) -> &Arc<SymbolRegistry> {
        &self.registry
    }

    /// Start or join the load of a locator's symbol.
    ///
    /// Returns [`Load::Ready`] when the registry already holds the value.
    /// Otherwise the returned [`PendingLoad`] is shared with every other
    /// caller asking for the same module path and export, and the host is
    /// asked for the module at most once.
    pub fn load(&self, locator: &Locator) -> Load {
        let key = locator.key();
        if self.registry.is_disposed() {
            let err = ResolutionError {
                locator: key.to_string(),
                cause: ResolutionCause::Disposed,
            };
            return Load::Pending(PendingLoad(future::ready(Err(err)).boxed().shared()));
        }

        match self.registry.lookup(&key) {
            Some(SymbolEntry::Resolved(value)) => {
                trace!(symbol = %key, "symbol cache hit");
                return Load::Ready(value);
            }
            Some(SymbolEntry::Pending(load)) => {
                trace!(symbol = %key, "joining in-flight load");
                return Load::Pending(PendingLoad(load));
            }
            None => {}
        }

        let load = self.symbol_load(locator.clone()).boxed().shared();
        match self.registry.insert_pending(key, load) {
            SymbolEntry::Resolved(value) => Load::Ready(value),
            SymbolEntry::Pending(load) => Load::Pending(PendingLoad(load)),
        }
    }

    /// Load a locator's symbol, waiting if necessary.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError` if the module is missing, fails to
    /// initialize, or lacks the export.
    pub async fn resolve(&self, locator: &Locator) -> Result<Value, ResolutionError> {
        self.load(locator).settle().await
    }

    /// Start loading several locators ahead of use and wait for all of them.
    pub async fn prefetch(&self, locators: &[Locator]) -> Vec<Result<Value, ResolutionError>> {
        debug!(count = locators.len(), "prefetching symbols");
        future::join_all(locators.iter().map(|locator| self.load(locator).settle())).await
    }

    fn symbol_load(
        &self,
        locator: Locator,
    ) -> impl Future<Output = Result<Value, ResolutionError>> + Send + 'static {
        let loader = self.clone();
        async move {
            let key = locator.key();
            let module = loader.module(locator.module_path()).await;
            let result = module
                .and_then(|exports| {
                    exports
                        .get(locator.export())
                        .map(|value| with_origin(value, &locator))
                        .ok_or_else(|| ResolutionCause::SymbolNotFound {
                            module: key.module.clone(),
                            symbol: key.export.as_str().to_string(),
                        })
                })
                .map_err(|cause| ResolutionError {
                    locator: key.to_string(),
                    cause,
                });
            loader.registry.settle(&key, &result);
            result
        }
    }

    fn module(&self, path: &str) -> SharedModule {
        match self.registry.module(path) {
            Some(ModuleEntry::Loaded(exports)) => return future::ready(Ok(exports)).boxed().shared(),
            Some(ModuleEntry::Loading(load)) => return load,
            None => {}
        }

        let host = Arc::clone(&self.host);
        let registry = Arc::clone(&self.registry);
        let module = path.to_string();
        let load = async move {
            debug!(module = %module, "fetching module");
            let result = match host.fetch_module(&module).await {
                Ok(exports) => Ok(Arc::new(exports)),
                Err(FetchError::NotFound) => Err(ResolutionCause::ModuleNotFound(module.clone())),
                Err(FetchError::Failed(reason)) => Err(ResolutionCause::ModuleInit {
                    module: module.clone(),
                    reason: Arc::new(reason),
                }),
            };
            registry.settle_module(&module, &result);
            result
        }
        .boxed()
        .shared();

        match self.registry.insert_module(path, load) {
            ModuleEntry::Loaded(exports) => future::ready(Ok(exports)).boxed().shared(),
            ModuleEntry::Loading(load) => load,
        }
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Functions loaded through a locator remember where they came from, so
/// they can be paused again.
fn with_origin(value: &Value, locator: &Locator) -> Value {
    match value {
        Value::Function(func) if func.origin().is_none() => {
            Value::Function(func.with_origin(locator.unbound()))
        }
        other => other.clone(),
    }
}
