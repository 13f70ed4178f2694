//! Anchors in the live document
//!
//! A paused anchor carries a marker attribute (the locator of the behavior
//! bound there, with captured ids) and, when it owns state, a text blob
//! with the encoded graph those ids point into.

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::directory::AnchorId;
use crate::graph::Warning;
use crate::value::{ThunkRef, Value};

/// Access to the marker attributes and state blobs of a document.
pub trait DocumentHost: Send + Sync {
    /// The locator string bound at an anchor
    fn marker(&self, anchor: AnchorId) -> Option<String>;

    /// Bind a locator string at an anchor
    fn set_marker(&self, anchor: AnchorId, locator: &str);

    /// The encoded state owned by an anchor
    fn state_blob(&self, anchor: AnchorId) -> Option<String>;

    /// Store encoded state for an anchor
    fn set_state_blob(&self, anchor: AnchorId, blob: &str);

    /// Remove an anchor and everything attached to it
    fn remove(&self, anchor: AnchorId);
}

/// What an anchor carries in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorRecord {
    /// Marker attribute value
    pub marker: Option<String>,
    /// Adjacent state blob
    pub blob: Option<String>,
}

/// A document kept in memory, for servers rendering into a string and for
/// tests.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    anchors: RwLock<IndexMap<AnchorId, AnchorRecord>>,
}

impl MemoryDocument {
    /// An empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one anchor's record
    pub fn record(&self, anchor: AnchorId) -> Option<AnchorRecord> {
        self.anchors.read().get(&anchor).cloned()
    }

    /// Anchors in the order they were first written
    pub fn anchors(&self) -> Vec<AnchorId> {
        self.anchors.read().keys().copied().collect()
    }
}

impl DocumentHost for MemoryDocument {
    fn marker(&self, anchor: AnchorId) -> Option<String> {
        self.anchors.read().get(&anchor)?.marker.clone()
    }

    fn set_marker(&self, anchor: AnchorId, locator: &str) {
        self.anchors.write().entry(anchor).or_default().marker = Some(locator.to_string());
    }

    fn state_blob(&self, anchor: AnchorId) -> Option<String> {
        self.anchors.read().get(&anchor)?.blob.clone()
    }

    fn set_state_blob(&self, anchor: AnchorId, blob: &str) {
        self.anchors.write().entry(anchor).or_default().blob = Some(blob.to_string());
    }

    fn remove(&self, anchor: AnchorId) {
        self.anchors.write().shift_remove(&anchor);
    }
}

/// An anchor brought back from the document.
#[derive(Debug)]
pub struct ResumedAnchor {
    /// Which anchor
    pub anchor: AnchorId,
    /// The behavior bound at the anchor, closing over its captured state
    pub behavior: ThunkRef,
    /// The anchor's own state roots
    pub state: Vec<Value>,
    /// Markers left while decoding
    pub warnings: Vec<Warning>,
}
