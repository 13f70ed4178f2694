//! The runtime ties codecs, loading, and scoped storage together

use std::sync::Arc;

use tracing::{debug, info};

use crate::anchor::{DocumentHost, ResumedAnchor};
use crate::codec::CodecRegistry;
use crate::context::RuntimeConfig;
use crate::directory::{AnchorId, ScopedDirectory};
use crate::error::{type_name, AnchorError, DecodeError, InvokeError, LocatorError};
use crate::graph::{Snapshot, Walker, Warning};
use crate::loader::{Loader, ModuleHost};
use crate::locator::Locator;
use crate::registry::SymbolRegistry;
use crate::resume::{deserialize, Resumed};
use crate::value::{Invocation, ThunkRef, Value};

/// Pause and resume application state.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use resumable::{ObjectValue, Runtime, StaticModules, Value};
///
/// let runtime = Runtime::new(Arc::new(StaticModules::new()));
/// let state = Value::object(ObjectValue::new().with_field("count", Value::Int(1)));
///
/// let text = runtime.pause(&[state.clone()]).to_text();
/// let resumed = runtime.resume(&text).unwrap();
/// assert_eq!(resumed.roots[0], state);
/// ```
pub struct Runtime {
    config: RuntimeConfig,
    codecs: Arc<CodecRegistry>,
    loader: Loader,
    directory: ScopedDirectory,
}

impl Runtime {
    /// A runtime with builtin codecs and default configuration
    pub fn new(host: Arc<dyn ModuleHost>) -> Self {
        Self::with_config(host, RuntimeConfig::default())
    }

    /// A runtime with builtin codecs
    pub fn with_config(host: Arc<dyn ModuleHost>, config: RuntimeConfig) -> Self {
        Self::with_codecs(host, CodecRegistry::with_builtins(), config)
    }

    /// A runtime with an application-extended codec registry
    pub fn with_codecs(
        host: Arc<dyn ModuleHost>,
        codecs: CodecRegistry,
        config: RuntimeConfig,
    ) -> Self {
        debug!(
            max_depth = config.max_depth,
            mode = ?config.decode_mode,
            codecs = codecs.tags().count(),
            "runtime created"
        );
        Self {
            config,
            codecs: Arc::new(codecs),
            loader: Loader::new(Arc::new(SymbolRegistry::new()), host),
            directory: ScopedDirectory::new(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Codec registry
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Symbol loader
    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Symbol cache
    pub fn registry(&self) -> &SymbolRegistry {
        self.loader.registry()
    }

    /// Per-anchor storage
    pub fn directory(&self) -> &ScopedDirectory {
        &self.directory
    }

    /// Parse a locator relative to the configured base reference.
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::Malformed` for strings that match no form.
    pub fn locator(&self, raw: &str) -> Result<Locator, LocatorError> {
        Locator::parse(raw, &self.config.base_reference)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Pause / Resume
    // ═══════════════════════════════════════════════════════════════════

    /// Serialize a set of roots.
    pub fn pause(&self, roots: &[Value]) -> Snapshot {
        crate::graph::serialize(&self.codecs, roots, self.config.max_depth)
    }

    /// Rebuild roots from text produced by [`Snapshot::to_text`].
    ///
    /// Locators in the text were normalized when they were first parsed,
    /// so they are read back as written and not against the base reference.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` for malformed text or structurally invalid
    /// graphs.
    pub fn resume(&self, text: &str) -> Result<Resumed, DecodeError> {
        let snapshot = Snapshot::from_text(text, "")?;
        self.resume_snapshot(snapshot)
    }

    /// Rebuild roots from an in-memory snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` for structurally invalid graphs.
    pub fn resume_snapshot(&self, snapshot: Snapshot) -> Result<Resumed, DecodeError> {
        deserialize(Arc::clone(&self.codecs), snapshot, self.config.decode_mode)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Anchors
    // ═══════════════════════════════════════════════════════════════════

    /// Write an anchor's marker and state blob.
    ///
    /// The anchor's `state` becomes the blob's roots; the behavior's
    /// captured values are encoded into the same graph and referenced by id
    /// from the marker.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the behavior was lazily resumed and its
    /// captured values cannot be built.
    pub fn pause_anchor(
        &self,
        document: &dyn DocumentHost,
        anchor: AnchorId,
        behavior: &ThunkRef,
        state: &[Value],
    ) -> Result<Vec<Warning>, DecodeError> {
        let captured = behavior.captured()?;
        let mut walker = Walker::new(&self.codecs, self.config.max_depth);
        let roots = state.iter().map(|v| walker.visit(v)).collect();
        let ids = captured.iter().map(|v| walker.visit(v)).collect();
        let snapshot = walker.finish(roots);

        let marker = behavior.locator().with_captured(ids);
        document.set_marker(anchor, &marker.to_string());
        if !snapshot.nodes.is_empty() {
            document.set_state_blob(anchor, &snapshot.to_text());
        }
        debug!(%anchor, marker = %marker, nodes = snapshot.nodes.len(), "paused anchor");
        Ok(snapshot.warnings)
    }

    /// Read an anchor's marker and state blob back.
    ///
    /// Returns `Ok(None)` for anchors without a marker.
    ///
    /// # Errors
    ///
    /// Returns `AnchorError` if the marker does not parse or the blob does
    /// not decode.
    pub fn resume_anchor(
        &self,
        document: &dyn DocumentHost,
        anchor: AnchorId,
    ) -> Result<Option<ResumedAnchor>, AnchorError> {
        let Some(marker) = document.marker(anchor) else {
            return Ok(None);
        };
        let locator = Locator::parse(&marker, "")?;
        let resumed = match document.state_blob(anchor) {
            Some(blob) => self.resume(&blob)?,
            None => self.resume_snapshot(Snapshot::default())?,
        };
        let behavior = resumed.bind(&locator)?;
        debug!(%anchor, marker = %marker, roots = resumed.roots.len(), "resumed anchor");
        Ok(Some(ResumedAnchor {
            anchor,
            behavior,
            warnings: resumed.warnings.clone(),
            state: resumed.roots,
        }))
    }

    /// Remove an anchor from the document and discard its directory
    /// entries.
    pub fn remove_anchor(&self, document: &dyn DocumentHost, anchor: AnchorId) -> usize {
        document.remove(anchor);
        self.directory.remove_anchor(anchor)
    }

    /// Resolve a locator for an anchor, caching the result in the
    /// directory under `key` on first success.
    ///
    /// # Errors
    ///
    /// Returns `AnchorError::Resolution` if loading fails, or
    /// `AnchorError::Directory` if another resolution stored a different
    /// value under the same key meanwhile.
    pub async fn resolve_at(
        &self,
        anchor: AnchorId,
        key: &str,
        locator: &Locator,
    ) -> Result<Value, AnchorError> {
        if let Some(value) = self.directory.get(anchor, key) {
            return Ok(value);
        }
        let value = self.loader.resolve(locator).await?;
        match self.directory.put(anchor, key, value.clone()) {
            Ok(()) => Ok(value),
            Err(err) => match self.directory.get(anchor, key) {
                Some(existing) if existing.same(&value) || existing == value => Ok(existing),
                _ => Err(err.into()),
            },
        }
    }

    /// Rebuild a typed instance from an object that carries a constructor
    /// locator; other values are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `InvokeError` if the constructor cannot be loaded, is not a
    /// function, or fails.
    pub async fn construct(&self, value: &Value) -> Result<Value, InvokeError> {
        let Some(constructor) = value
            .as_object()
            .and_then(|obj| obj.read().constructor.clone())
        else {
            return Ok(value.clone());
        };
        let func = match self.loader.resolve(&constructor).await? {
            Value::Function(func) => func,
            other => {
                return Err(InvokeError::NotCallable {
                    locator: constructor.to_string(),
                    found: type_name(&other),
                })
            }
        };
        func.call(&Invocation::with_args(vec![value.clone()]))
            .map_err(|message| InvokeError::Failed {
                name: func.name().to_string(),
                message,
            })
    }

    /// Drop every cached symbol and directory entry; later loads fail with
    /// `ResolutionCause::Disposed`.
    pub fn dispose(&self) {
        self.loader.registry().dispose();
        self.directory.clear();
        info!("runtime disposed");
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("codecs", &self.codecs)
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}
