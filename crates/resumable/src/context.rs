//! Runtime configuration

use serde::{Deserialize, Serialize};

/// How much of a snapshot to rebuild up front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Build every node in id order
    #[default]
    Eager,
    /// Build only what the roots reach; captured state of a thunk is built
    /// when the thunk is first invoked
    Lazy,
}

/// Configuration for pausing and resuming.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use resumable::{DecodeMode, RuntimeConfig};
///
/// let config = RuntimeConfig::from_json(r#"{ "decode_mode": "lazy" }"#).unwrap();
/// assert_eq!(config.decode_mode, DecodeMode::Lazy);
/// assert_eq!(config.max_depth, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum nesting depth the walker follows before emitting an
    /// unresolvable marker (stack overflow protection)
    pub max_depth: usize,

    /// Eager or lazy rebuilding
    pub decode_mode: DecodeMode,

    /// Location that author-written relative locators are resolved
    /// against; empty keeps them relative. Snapshots and markers are read
    /// back without it.
    pub base_reference: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            decode_mode: DecodeMode::Eager,
            base_reference: String::new(),
        }
    }
}

impl RuntimeConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with a custom depth limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Default::default()
        }
    }

    /// Set the decode mode (builder pattern)
    pub fn decode_mode(mut self, mode: DecodeMode) -> Self {
        self.decode_mode = mode;
        self
    }

    /// Set the base reference (builder pattern)
    pub fn base_reference(mut self, base: impl Into<String>) -> Self {
        self.base_reference = base.into();
        self
    }

    /// Parse a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed documents or unknown
    /// decode modes.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
