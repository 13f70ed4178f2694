//! Depth-first reference graph walker

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use super::{Node, NodeId, Snapshot, Warning, WarningKind};
use crate::codec::CodecRegistry;
use crate::value::Value;

/// Walks values depth-first, assigning node ids in discovery order.
///
/// Codecs receive the walker so they can visit children; a child that was
/// already visited comes back as a fresh back-reference record instead of
/// a second copy.
pub struct Walker<'a> {
    codecs: &'a CodecRegistry,
    max_depth: usize,
    depth: usize,
    nodes: Vec<Node>,
    visited: HashMap<usize, NodeId>,
    on_stack: HashSet<usize>,
    warnings: Vec<Warning>,
    cycles: usize,
    // Keeps every visited heap value alive so identities stay unique for the
    // whole walk, even for temporaries a codec creates.
    pinned: Vec<Value>,
}

impl<'a> Walker<'a> {
    /// Create a walker dispatching through `codecs`
    pub fn new(codecs: &'a CodecRegistry, max_depth: usize) -> Self {
        Self {
            codecs,
            max_depth,
            depth: 0,
            nodes: Vec::new(),
            visited: HashMap::new(),
            on_stack: HashSet::new(),
            warnings: Vec::new(),
            cycles: 0,
            pinned: Vec::new(),
        }
    }

    /// Visit a value and return the id of the record that represents it.
    pub fn visit(&mut self, value: &Value) -> NodeId {
        let identity = value.identity();
        if let Some(identity) = identity {
            if let Some(&target) = self.visited.get(&identity) {
                let cycle = self.on_stack.contains(&identity);
                if cycle {
                    self.cycles += 1;
                }
                let id = self.push(Node::BackRef(target));
                trace!(id, target, cycle, "back-reference");
                return id;
            }
        }

        let id = self.push(Node::Undefined);
        if let Some(identity) = identity {
            self.visited.insert(identity, id);
            self.on_stack.insert(identity);
            self.pinned.push(value.clone());
        }

        let node = if self.depth >= self.max_depth {
            let message = format!("walk exceeded maximum depth {}", self.max_depth);
            warn!(id, max_depth = self.max_depth, "depth limit reached");
            self.warn(id, WarningKind::DepthLimit, message.clone());
            Node::Unresolvable(message)
        } else {
            self.depth += 1;
            let node = self.encode(id, value);
            self.depth -= 1;
            node
        };
        trace!(id, kind = ?node.kind(), "emitted node");
        self.nodes[id] = node;

        if let Some(identity) = identity {
            self.on_stack.remove(&identity);
        }
        id
    }

    /// Finish the walk with the given root ids
    pub fn finish(self, roots: Vec<NodeId>) -> Snapshot {
        debug!(
            nodes = self.nodes.len(),
            roots = roots.len(),
            cycles = self.cycles,
            warnings = self.warnings.len(),
            "serialized graph"
        );
        Snapshot {
            nodes: self.nodes,
            roots,
            warnings: self.warnings,
        }
    }

    /// Record a non-fatal problem against a node
    pub fn warn(&mut self, node: NodeId, kind: WarningKind, message: impl Into<String>) {
        self.warnings.push(Warning {
            node,
            kind,
            message: message.into(),
        });
    }

    fn encode(&mut self, id: NodeId, value: &Value) -> Node {
        let tag = value.type_tag().to_string();
        let Some(codec) = self.codecs.get(&tag).cloned() else {
            let message = format!("no codec registered for type `{}`", tag);
            warn!(id, tag = %tag, "unserializable value");
            self.warn(id, WarningKind::UnserializableValue, message.clone());
            return Node::Unresolvable(message);
        };
        match codec.encode(value, self) {
            Ok(node) => node,
            Err(err) => {
                warn!(id, tag = %tag, error = %err, "codec failed to encode value");
                self.discard_after(id);
                self.warn(id, WarningKind::UnserializableValue, err.to_string());
                Node::Unresolvable(err.to_string())
            }
        }
    }

    /// Drop the records a failed codec emitted for its children.
    fn discard_after(&mut self, id: NodeId) {
        if self.nodes.len() <= id + 1 {
            return;
        }
        trace!(id, dropped = self.nodes.len() - id - 1, "discarding orphaned children");
        self.nodes.truncate(id + 1);
        self.visited.retain(|_, &mut target| target <= id);
        self.warnings.retain(|w| w.node <= id);
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

/// Serialize a set of roots into a snapshot.
pub fn serialize(codecs: &CodecRegistry, roots: &[Value], max_depth: usize) -> Snapshot {
    let mut walker = Walker::new(codecs, max_depth);
    let ids = roots.iter().map(|root| walker.visit(root)).collect();
    walker.finish(ids)
}
