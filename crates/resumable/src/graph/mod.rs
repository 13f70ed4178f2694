//! Serialized object graphs
//!
//! A [`Snapshot`] is a flat list of [`Node`]s in discovery order plus the
//! ids of the roots. Heap values reachable from several parents are emitted
//! once; later encounters become [`Node::BackRef`] records pointing at the
//! first emission, which is also how cycles terminate.

mod text;
mod walker;

pub use text::{decode_text, encode_text};
pub use walker::{serialize, Walker};

use std::sync::Arc;

use crate::locator::Locator;
use crate::value::ReactiveVariant;

/// Position of a node in a snapshot, assigned in first-discovery order.
pub type NodeId = usize;

/// One record of a serialized graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Absent value
    Undefined,
    /// Explicit null
    Null,
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// Text literal
    String(Arc<str>),
    /// Ordered sequence of child ids
    Array(Vec<NodeId>),
    /// Ordered `(key, value)` child id pairs
    Map(Vec<(NodeId, NodeId)>),
    /// Ordered member ids
    Set(Vec<NodeId>),
    /// Plain object: ordered `(field, id)` pairs plus an optional factory
    Object {
        /// Factory that rebuilds a typed instance
        constructor: Option<Locator>,
        /// Fields in insertion order
        fields: Vec<(String, NodeId)>,
    },
    /// Reactive container: variant to recreate and the unwrapped payload
    Reactive {
        /// Variant to rewrap as
        variant: ReactiveVariant,
        /// Id of the plain value
        target: NodeId,
    },
    /// Deferred behavior; captured ids point into this snapshot
    Locator(Locator),
    /// Application type encoded by a registered codec
    Custom {
        /// Codec tag
        tag: String,
        /// Named child ids
        fields: Vec<(String, NodeId)>,
    },
    /// Second or later encounter of an already emitted node
    BackRef(NodeId),
    /// A value that could not be encoded, with a diagnostic
    Unresolvable(String),
}

/// Coarse classification of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Undefined, null, bool, int, float, or string
    Primitive,
    /// Ordered sequence
    Array,
    /// Ordered key/value mapping
    Map,
    /// Set of unique values
    Set,
    /// Plain or custom structured object
    Object,
    /// Reactive container
    Reactive,
    /// Locator handle
    Locator,
    /// Reference to an earlier node
    BackReference,
    /// Diagnostic marker
    Unresolvable,
}

impl Node {
    /// Classify the node
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Undefined
            | Node::Null
            | Node::Bool(_)
            | Node::Int(_)
            | Node::Float(_)
            | Node::String(_) => NodeKind::Primitive,
            Node::Array(_) => NodeKind::Array,
            Node::Map(_) => NodeKind::Map,
            Node::Set(_) => NodeKind::Set,
            Node::Object { .. } | Node::Custom { .. } => NodeKind::Object,
            Node::Reactive { .. } => NodeKind::Reactive,
            Node::Locator(_) => NodeKind::Locator,
            Node::BackRef(_) => NodeKind::BackReference,
            Node::Unresolvable(_) => NodeKind::Unresolvable,
        }
    }

    /// Tag of the codec that decodes this node.
    ///
    /// Back-references are structural and have no codec.
    pub fn codec_tag(&self) -> Option<&str> {
        Some(match self {
            Node::Undefined => "undefined",
            Node::Null => "null",
            Node::Bool(_) => "bool",
            Node::Int(_) => "int",
            Node::Float(_) => "float",
            Node::String(_) => "string",
            Node::Array(_) => "array",
            Node::Map(_) => "map",
            Node::Set(_) => "set",
            Node::Object { .. } => "object",
            Node::Reactive { .. } => "reactive",
            Node::Locator(_) => "thunk",
            Node::Custom { tag, .. } => tag,
            Node::Unresolvable(_) => "unresolvable",
            Node::BackRef(_) => return None,
        })
    }

    /// Ids this node points at, in encoding order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Array(items) | Node::Set(items) => items.clone(),
            Node::Map(entries) => entries.iter().flat_map(|&(k, v)| [k, v]).collect(),
            Node::Object { fields, .. } | Node::Custom { fields, .. } => {
                fields.iter().map(|(_, id)| *id).collect()
            }
            Node::Reactive { target, .. } => vec![*target],
            Node::Locator(locator) => locator.captured().to_vec(),
            Node::BackRef(target) => vec![*target],
            _ => Vec::new(),
        }
    }
}

/// Why a value was flagged during a walk or a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// No codec is registered for the value's type
    UnserializableValue,
    /// A locator string in the encoding did not parse
    MalformedLocator,
    /// The walk exceeded the configured depth
    DepthLimit,
    /// A codec rejected a leaf node while rebuilding
    DecodeFailed,
}

/// A non-fatal problem attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Node that carries the marker
    pub node: NodeId,
    /// Category
    pub kind: WarningKind,
    /// Human-readable detail
    pub message: String,
}

/// The result of a serialization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Nodes in id order
    pub nodes: Vec<Node>,
    /// Root ids, one per serialized root
    pub roots: Vec<NodeId>,
    /// Non-fatal problems found during the walk or decode
    pub warnings: Vec<Warning>,
}

impl Snapshot {
    /// Render the linear text encoding
    pub fn to_text(&self) -> String {
        encode_text(self)
    }

    /// Parse the linear text encoding, resolving relative locators
    /// against `base`.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Format` for text that is not a record stream.
    pub fn from_text(text: &str, base: &str) -> Result<Self, crate::error::DecodeError> {
        decode_text(text, base)
    }

    /// Number of back-reference records
    pub fn back_references(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::BackRef(_)))
            .count()
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }
}
