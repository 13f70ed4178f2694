//! # Resumable
//!
//! Pause application state on one side of a wire and resume it on the other.
//!
//! A paused graph is a flat list of records addressed by pre-order id. Shared
//! values are written once and referenced again by id, so identity and cycles
//! survive the trip. Behavior is never serialized: functions travel as
//! locators (a module path, an export, and optionally captured ids) and are
//! loaded on demand when first invoked.
//!
//! ## Architecture
//!
//! - **Locators**: parse and render `module#export[ids]` references
//! - **Loader**: fetch modules through a host, coalescing concurrent loads
//! - **Graph**: walk live values into records with identity dedup
//! - **Codecs**: per-type encode/decode, extensible by applications
//! - **Resume**: rebuild values from records, eagerly or behind thunks
//! - **Directory**: per-anchor storage of resolved values

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anchor;
pub mod codec;
pub mod context;
pub mod directory;
pub mod error;
pub mod graph;
pub mod loader;
pub mod locator;
pub mod registry;
pub mod resume;
pub mod runtime;
pub mod value;

// Re-export main types
pub use anchor::{AnchorRecord, DocumentHost, MemoryDocument, ResumedAnchor};
pub use codec::{Codec, CodecRegistry};
pub use context::{DecodeMode, RuntimeConfig};
pub use directory::{AnchorId, ScopedDirectory};
pub use error::{
    AnchorError, CodecError, DecodeError, DirectoryError, InvokeError, LocatorError,
    ProjectionError, ResolutionCause, ResolutionError,
};
pub use graph::{Node, NodeId, NodeKind, Snapshot, Walker, Warning, WarningKind};
pub use loader::{FetchError, Load, Loader, ModuleExports, ModuleHost, PendingLoad, StaticModules};
pub use locator::{ExportName, Locator, LocatorKind, SymbolKey};
pub use registry::{SymbolRegistry, SymbolState};
pub use resume::{deserialize, GraphHandle, Resolver, Resumed};
pub use runtime::Runtime;
pub use value::{
    ConsumerId, CustomRef, CustomValue, HashableValue, Invocation, InvocationContext, MapValue,
    NativeFn, NativeFnPtr, ObjectValue, Reactive, ReactiveRef, ReactiveVariant, SetValue, Shared,
    ThunkRef, Value,
};

/// Resumable version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
