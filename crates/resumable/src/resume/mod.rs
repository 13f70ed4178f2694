//! Rebuilding live values from a snapshot
//!
//! Containers are rebuilt in two phases: every container node first gets an
//! empty shell with its final identity, then shells are populated in id
//! order. A back-reference anywhere in the graph therefore resolves to the
//! same shell the first emission produced, cycles included.
//!
//! In [`DecodeMode::Lazy`] only the nodes reachable from the roots are
//! built, and the captured state of a thunk stays in the graph until the
//! thunk is invoked.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::codec::CodecRegistry;
use crate::context::DecodeMode;
use crate::error::{CodecError, DecodeError};
use crate::graph::{Node, NodeId, Snapshot, Warning, WarningKind};
use crate::locator::Locator;
use crate::value::{Captures, ThunkRef, Value};

enum Slot {
    /// Not yet touched
    Empty,
    /// Allocated, fields not yet filled
    Shell(Value),
    /// Being filled; re-entry returns the shell
    Populating(Value),
    /// Being decoded in one step; re-entry is a cycle the codec cannot build
    Building,
    /// Finished
    Built(Value),
    /// Failed; later requests report the same error
    Failed(DecodeError),
}

pub(crate) struct GraphState {
    nodes: Arc<Vec<Node>>,
    slots: Vec<Slot>,
    codecs: Arc<CodecRegistry>,
    mode: DecodeMode,
    warnings: Vec<Warning>,
}

/// Shared handle to a partially or fully rebuilt graph.
///
/// Lazily decoded thunks keep one so they can build their captured values
/// on first use.
#[derive(Clone)]
pub struct GraphHandle(Arc<Mutex<GraphState>>);

impl GraphHandle {
    fn new(snapshot: Snapshot, codecs: Arc<CodecRegistry>, mode: DecodeMode) -> Self {
        let slots = snapshot.nodes.iter().map(|_| Slot::Empty).collect();
        Self(Arc::new(Mutex::new(GraphState {
            nodes: Arc::new(snapshot.nodes),
            slots,
            codecs,
            mode,
            warnings: snapshot.warnings,
        })))
    }

    /// Build (or fetch) the values for `ids`.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if an id is out of range or a codec fails.
    pub fn resolve_all(&self, ids: &[NodeId]) -> Result<Vec<Value>, DecodeError> {
        let handle = self.clone();
        let mut state = self.0.lock();
        Resolver::new(&mut state, handle).resolve_all(ids)
    }

    pub(crate) fn captures(&self, ids: &[NodeId]) -> Result<Captures, DecodeError> {
        let handle = self.clone();
        let mut state = self.0.lock();
        Resolver::new(&mut state, handle).captures(ids)
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.0.lock().nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of nodes built so far
    pub fn built(&self) -> usize {
        self.0
            .lock()
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Built(_)))
            .count()
    }

    /// Warnings collected while parsing and rebuilding
    pub fn warnings(&self) -> Vec<Warning> {
        self.0.lock().warnings.clone()
    }
}

impl std::fmt::Debug for GraphHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_lock() {
            Some(state) => write!(f, "GraphHandle({} nodes)", state.nodes.len()),
            None => f.write_str("GraphHandle(<locked>)"),
        }
    }
}

/// Rebuilds values node by node; codecs call back into it for children.
pub struct Resolver<'a> {
    state: &'a mut GraphState,
    handle: GraphHandle,
    current: NodeId,
}

impl<'a> Resolver<'a> {
    fn new(state: &'a mut GraphState, handle: GraphHandle) -> Self {
        Self {
            state,
            handle,
            current: 0,
        }
    }

    /// The value for node `id`, building it on first request.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::DanglingReference` for ids outside the graph
    /// and `DecodeError::UnconstructibleCycle` when a one-step codec needs
    /// its own result.
    pub fn resolve(&mut self, id: NodeId) -> Result<Value, DecodeError> {
        match self.state.slots.get(id) {
            None => {
                return Err(DecodeError::DanglingReference {
                    from: self.current,
                    to: id,
                })
            }
            Some(Slot::Built(value)) | Some(Slot::Populating(value)) => return Ok(value.clone()),
            Some(Slot::Building) => return Err(DecodeError::UnconstructibleCycle(id)),
            Some(Slot::Failed(err)) => return Err(err.clone()),
            Some(Slot::Shell(_)) | Some(Slot::Empty) => {}
        }
        let parent = std::mem::replace(&mut self.current, id);
        let result = self.materialize(id);
        self.current = parent;
        if let Err(err) = &result {
            // A half-populated shell must not be handed out on a later request
            self.state.slots[id] = Slot::Failed(err.clone());
        }
        result
    }

    /// Resolve several ids in order
    pub fn resolve_all(&mut self, ids: &[NodeId]) -> Result<Vec<Value>, DecodeError> {
        ids.iter().map(|&id| self.resolve(id)).collect()
    }

    /// Id of the node currently being built
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// Attach a codec failure to the current node
    pub fn error(&self, source: CodecError) -> DecodeError {
        DecodeError::Codec {
            id: self.current,
            source,
        }
    }

    /// Record a non-fatal problem against the current node
    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        self.state.warnings.push(Warning {
            node: self.current,
            kind,
            message: message.into(),
        });
    }

    /// Captured values for a thunk: built now when decoding eagerly,
    /// deferred to first use when decoding lazily.
    pub(crate) fn captures(&mut self, ids: &[NodeId]) -> Result<Captures, DecodeError> {
        match self.state.mode {
            DecodeMode::Eager => Ok(Captures::Values(self.resolve_all(ids)?)),
            DecodeMode::Lazy => {
                if let Some(&missing) = ids.iter().find(|&&id| id >= self.state.nodes.len()) {
                    return Err(DecodeError::DanglingReference {
                        from: self.current,
                        to: missing,
                    });
                }
                Ok(Captures::Deferred {
                    ids: ids.to_vec(),
                    graph: self.handle.clone(),
                })
            }
        }
    }

    /// Give every container node its shell, in id order.
    fn allocate_shells(&mut self) {
        let nodes = Arc::clone(&self.state.nodes);
        for (id, node) in nodes.iter().enumerate() {
            let Some(codec) = node.codec_tag().and_then(|tag| self.state.codecs.get(tag)) else {
                continue;
            };
            if let Some(shell) = codec.allocate(node) {
                self.state.slots[id] = Slot::Shell(shell);
            }
        }
    }

    fn materialize(&mut self, id: NodeId) -> Result<Value, DecodeError> {
        let nodes = Arc::clone(&self.state.nodes);
        let node = &nodes[id];

        if let Node::BackRef(target) = *node {
            if target >= id {
                return Err(DecodeError::DanglingReference { from: id, to: target });
            }
            self.state.slots[id] = Slot::Building;
            let value = self.resolve(target)?;
            trace!(id, target, "resolved back-reference");
            return Ok(self.finish(id, value));
        }

        let tag = node.codec_tag().unwrap_or_default();
        let Some(codec) = self.state.codecs.get(tag).cloned() else {
            let message = format!("no codec registered for type `{}`", tag);
            warn!(id, tag, "no codec for node; substituting unresolvable marker");
            self.warn(WarningKind::UnserializableValue, message.clone());
            return Ok(self.finish(id, Value::unresolvable(message)));
        };

        let shell = match std::mem::replace(&mut self.state.slots[id], Slot::Building) {
            Slot::Shell(shell) => Some(shell),
            _ => codec.allocate(node),
        };
        match shell {
            Some(shell) => {
                self.state.slots[id] = Slot::Populating(shell.clone());
                codec.populate(&shell, node, self)?;
                Ok(self.finish(id, shell))
            }
            None => match codec.decode(node, self) {
                Ok(value) => Ok(self.finish(id, value)),
                Err(DecodeError::Codec { id: failed, source }) if failed == id => {
                    warn!(id, tag, error = %source, "codec rejected node; substituting unresolvable marker");
                    self.warn(WarningKind::DecodeFailed, source.to_string());
                    Ok(self.finish(id, Value::unresolvable(source.to_string())))
                }
                Err(err) => Err(err),
            },
        }
    }

    fn finish(&mut self, id: NodeId, value: Value) -> Value {
        self.state.slots[id] = Slot::Built(value.clone());
        value
    }
}

/// Values rebuilt from a snapshot.
#[derive(Debug)]
pub struct Resumed {
    /// One value per snapshot root, in order
    pub roots: Vec<Value>,
    /// Markers left by unresolvable nodes and malformed locators
    pub warnings: Vec<Warning>,
    graph: GraphHandle,
}

impl Resumed {
    /// Root by position
    pub fn root(&self, index: usize) -> Option<&Value> {
        self.roots.get(index)
    }

    /// Bind a locator whose captured ids point into this graph.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if a captured id is out of range or, when
    /// decoding eagerly, a captured value fails to build.
    pub fn bind(&self, locator: &Locator) -> Result<ThunkRef, DecodeError> {
        let captures = self.graph.captures(locator.captured())?;
        let thunk = ThunkRef::new(locator.with_captured(Vec::new()), Vec::new());
        thunk.set_captures(captures);
        Ok(thunk)
    }

    /// The underlying graph
    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }
}

/// Rebuild the roots of a snapshot.
///
/// # Errors
///
/// Returns `DecodeError` for out-of-range ids, forward back-references,
/// and cycles through a codec that cannot allocate a shell. Unknown type
/// tags and rejected leaves are not errors: they become unresolvable
/// markers listed in [`Resumed::warnings`].
pub fn deserialize(
    codecs: Arc<CodecRegistry>,
    snapshot: Snapshot,
    mode: DecodeMode,
) -> Result<Resumed, DecodeError> {
    let roots = snapshot.roots.clone();
    if let Some(&missing) = roots.iter().find(|&&id| id >= snapshot.nodes.len()) {
        return Err(DecodeError::Format {
            line: 1,
            message: format!("root id {} out of range", missing),
        });
    }

    let graph = GraphHandle::new(snapshot, codecs, mode);
    let (roots, warnings) = {
        let mut state = graph.0.lock();
        let mut resolver = Resolver::new(&mut state, graph.clone());
        if mode == DecodeMode::Eager {
            resolver.allocate_shells();
            for id in 0..resolver.state.nodes.len() {
                resolver.resolve(id)?;
            }
        }
        let roots = resolver.resolve_all(&roots)?;
        (roots, state.warnings.clone())
    };
    debug!(
        roots = roots.len(),
        warnings = warnings.len(),
        ?mode,
        "resumed graph"
    );

    Ok(Resumed {
        roots,
        warnings,
        graph,
    })
}
