//! Process-wide symbol cache
//!
//! Maps a symbol key (module path + export) to either a loaded value or the
//! single in-flight load for it. Modules are cached the same way so that
//! two symbols from one module share one fetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, trace, warn};

use crate::error::{ResolutionCause, ResolutionError};
use crate::loader::ModuleExports;
use crate::locator::SymbolKey;
use crate::value::Value;

pub(crate) type SharedLoad = Shared<BoxFuture<'static, Result<Value, ResolutionError>>>;
pub(crate) type SharedModule =
    Shared<BoxFuture<'static, Result<Arc<ModuleExports>, ResolutionCause>>>;

#[derive(Clone)]
pub(crate) enum SymbolEntry {
    Resolved(Value),
    Pending(SharedLoad),
}

#[derive(Clone)]
pub(crate) enum ModuleEntry {
    Loaded(Arc<ModuleExports>),
    Loading(SharedModule),
}

/// Observable state of one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolState {
    /// Loaded and cached
    Resolved,
    /// A load is in flight
    Pending,
}

/// Cache of loaded and loading symbols.
///
/// A failed load leaves no entry behind, so the next request retries.
#[derive(Default)]
pub struct SymbolRegistry {
    symbols: DashMap<SymbolKey, SymbolEntry>,
    modules: DashMap<String, ModuleEntry>,
    disposed: AtomicBool,
}

impl SymbolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a symbol, or `None` if it has never loaded (or its load failed)
    pub fn state(&self, key: &SymbolKey) -> Option<SymbolState> {
        self.symbols.get(key).map(|entry| match entry.value() {
            SymbolEntry::Resolved(_) => SymbolState::Resolved,
            SymbolEntry::Pending(_) => SymbolState::Pending,
        })
    }

    /// The cached value of a resolved symbol
    pub fn get(&self, key: &SymbolKey) -> Option<Value> {
        match self.symbols.get(key)?.value() {
            SymbolEntry::Resolved(value) => Some(value.clone()),
            SymbolEntry::Pending(_) => None,
        }
    }

    /// Number of resolved or pending symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Number of modules loaded or loading
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Drop every entry and refuse further loads.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let symbols = self.symbols.len();
        self.symbols.clear();
        self.modules.clear();
        debug!(symbols, "disposed symbol registry");
    }

    /// Whether [`dispose`](Self::dispose) has been called
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn lookup(&self, key: &SymbolKey) -> Option<SymbolEntry> {
        self.symbols.get(key).map(|entry| entry.value().clone())
    }

    /// Insert a pending load unless another caller got there first; returns
    /// whichever entry is now current.
    pub(crate) fn insert_pending(&self, key: SymbolKey, load: SharedLoad) -> SymbolEntry {
        self.symbols
            .entry(key)
            .or_insert(SymbolEntry::Pending(load))
            .value()
            .clone()
    }

    pub(crate) fn settle(&self, key: &SymbolKey, result: &Result<Value, ResolutionError>) {
        if self.is_disposed() {
            return;
        }
        match result {
            Ok(value) => {
                trace!(symbol = %key, "symbol resolved");
                self.symbols
                    .insert(key.clone(), SymbolEntry::Resolved(value.clone()));
            }
            Err(err) => {
                warn!(symbol = %key, error = %err, "symbol load failed; evicting");
                self.symbols.remove(key);
            }
        }
    }

    pub(crate) fn module(&self, path: &str) -> Option<ModuleEntry> {
        self.modules.get(path).map(|entry| entry.value().clone())
    }

    pub(crate) fn insert_module(&self, path: &str, load: SharedModule) -> ModuleEntry {
        self.modules
            .entry(path.to_string())
            .or_insert(ModuleEntry::Loading(load))
            .value()
            .clone()
    }

    pub(crate) fn settle_module(
        &self,
        path: &str,
        result: &Result<Arc<ModuleExports>, ResolutionCause>,
    ) {
        if self.is_disposed() {
            return;
        }
        match result {
            Ok(exports) => {
                self.modules
                    .insert(path.to_string(), ModuleEntry::Loaded(Arc::clone(exports)));
            }
            Err(_) => {
                self.modules.remove(path);
            }
        }
    }
}

impl std::fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolRegistry")
            .field("symbols", &self.symbols.len())
            .field("modules", &self.modules.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
