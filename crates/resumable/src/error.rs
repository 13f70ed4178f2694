//! Error types for locator parsing, symbol resolution, and graph decoding

use std::sync::Arc;

use thiserror::Error;

use crate::directory::AnchorId;
use crate::graph::NodeId;
use crate::value::Value;

/// A locator string did not match any accepted grammar form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// The raw string is not an absolute, scheme, root-relative, or relative reference
    #[error("malformed locator `{raw}`: {reason}")]
    Malformed {
        /// The offending input
        raw: String,
        /// What was wrong with it
        reason: String,
    },
}

impl LocatorError {
    pub(crate) fn malformed(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        LocatorError::Malformed {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    /// The raw string that failed to parse.
    pub fn raw(&self) -> &str {
        match self {
            LocatorError::Malformed { raw, .. } => raw,
        }
    }
}

/// Why a symbol could not be resolved.
#[derive(Error, Debug, Clone)]
pub enum ResolutionCause {
    /// The host reported that the module does not exist
    #[error("module `{0}` not found")]
    ModuleNotFound(String),

    /// The module loaded but does not export the symbol
    #[error("module `{module}` has no export `{symbol}`")]
    SymbolNotFound {
        /// Module path
        module: String,
        /// Export that was requested
        symbol: String,
    },

    /// The module failed while initializing
    #[error("module `{module}` failed to initialize: {reason:#}")]
    ModuleInit {
        /// Module path
        module: String,
        /// Host-provided cause
        reason: Arc<anyhow::Error>,
    },

    /// The registry was disposed before the load completed
    #[error("symbol registry has been disposed")]
    Disposed,
}

/// A locator could not be turned into a loaded value.
///
/// Cloneable so that every caller joined on the same in-flight load
/// observes the same failure.
#[derive(Error, Debug, Clone)]
#[error("failed to resolve `{locator}`: {cause}")]
pub struct ResolutionError {
    /// Canonical rendering of the locator that failed
    pub locator: String,

    /// Underlying cause
    pub cause: ResolutionCause,
}

/// A captured projection path did not resolve against the invocation context.
///
/// Recoverable: callers usually treat it as `Value::Undefined`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// A step of the path found nothing
    #[error("unresolved projection `{path}` at step `{step}`")]
    Unresolved {
        /// The full projection path
        path: String,
        /// The step that failed
        step: String,
    },
}

/// Scoped storage directory failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// An entry already exists for this anchor and key
    #[error("duplicate key `{key}` for anchor {anchor}")]
    DuplicateKey {
        /// Anchor the insert targeted
        anchor: AnchorId,
        /// Key that collided
        key: String,
    },
}

/// A codec could not encode or decode a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// No codec is registered for the value's type tag
    #[error("no codec registered for type `{0}`")]
    Unserializable(String),

    /// A codec received a value or node it does not handle
    #[error("codec `{codec}` cannot handle {found}")]
    Mismatch {
        /// Codec tag
        codec: String,
        /// What it was given
        found: String,
    },

    /// A codec-specific failure
    #[error("{0}")]
    Custom(String),
}

/// Failures while parsing or rebuilding a serialized graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The text is not a valid record stream
    #[error("line {line}: {message}")]
    Format {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// A record points at an id that does not exist
    #[error("node {from} references missing node {to}")]
    DanglingReference {
        /// Referencing node
        from: NodeId,
        /// Missing target
        to: NodeId,
    },

    /// A node needs its own value to construct itself
    #[error("node {0} is part of a cycle its codec cannot construct")]
    UnconstructibleCycle(NodeId),

    /// A codec rejected a node
    #[error("node {id}: {source}")]
    Codec {
        /// Node being decoded
        id: NodeId,
        /// Codec failure
        #[source]
        source: CodecError,
    },
}

/// Failures while invoking a thunk.
#[derive(Error, Debug, Clone)]
pub enum InvokeError {
    /// The behavior could not be loaded
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Captured state could not be materialized
    #[error("captured state: {0}")]
    Capture(#[from] DecodeError),

    /// The loaded export is not callable
    #[error("`{locator}` resolved to a non-callable {found}")]
    NotCallable {
        /// Locator that was invoked
        locator: String,
        /// Type of the export
        found: &'static str,
    },

    /// The callable itself reported an error
    #[error("`{name}` failed: {message}")]
    Failed {
        /// Callable name
        name: String,
        /// Its message
        message: String,
    },
}

/// Failures of the anchor-level operations.
#[derive(Error, Debug, Clone)]
pub enum AnchorError {
    /// The marker attribute is not a valid locator
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// The state blob could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The behavior could not be loaded
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The anchor already holds a different value for the key
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Get a human-readable type name for a value.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Set(_) => "set",
        Value::Object(_) => "object",
        Value::Reactive(_) => "reactive",
        Value::Thunk(_) => "thunk",
        Value::Function(_) => "function",
        Value::Custom(_) => "custom",
        Value::Unresolvable(_) => "unresolvable",
    }
}

/// Result type alias for locator parsing.
pub type Result<T> = std::result::Result<T, LocatorError>;
