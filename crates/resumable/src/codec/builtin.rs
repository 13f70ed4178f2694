//! Codecs for the builtin value types

use std::sync::Arc;

use super::Codec;
use crate::error::{CodecError, DecodeError};
use crate::graph::{Node, Walker};
use crate::resume::Resolver;
use crate::value::{
    MapValue, ObjectValue, Reactive, ReactiveRef, SetValue, ThunkRef, Value,
};

fn mismatch(codec: &str, found: &Value) -> CodecError {
    CodecError::Mismatch {
        codec: codec.to_string(),
        found: format!("a {} value", crate::error::type_name(found)),
    }
}

fn node_mismatch(codec: &str, node: &Node) -> CodecError {
    CodecError::Mismatch {
        codec: codec.to_string(),
        found: format!("{:?} node", node.kind()),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Primitives
// ═══════════════════════════════════════════════════════════════════════

/// Undefined, null, bool, int, float, and string literals.
pub struct PrimitiveCodec {
    tag: &'static str,
}

impl PrimitiveCodec {
    /// Codec for one primitive tag
    pub fn new(tag: &'static str) -> Self {
        Self { tag }
    }
}

impl Codec for PrimitiveCodec {
    fn tag(&self) -> &str {
        self.tag
    }

    fn encode(&self, value: &Value, _walker: &mut Walker<'_>) -> Result<Node, CodecError> {
        Ok(match value {
            Value::Undefined => Node::Undefined,
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Int(n) => Node::Int(*n),
            Value::Float(n) => Node::Float(*n),
            Value::String(s) => Node::String(Arc::clone(s)),
            other => return Err(mismatch(self.tag, other)),
        })
    }

    fn decode(&self, node: &Node, resolver: &mut Resolver<'_>) -> Result<Value, DecodeError> {
        Ok(match node {
            Node::Undefined => Value::Undefined,
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Int(n) => Value::Int(*n),
            Node::Float(n) => Value::Float(*n),
            Node::String(s) => Value::String(Arc::clone(s)),
            other => return Err(resolver.error(node_mismatch(self.tag, other))),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Containers
// ═══════════════════════════════════════════════════════════════════════

/// Ordered sequences.
pub struct ArrayCodec;

impl Codec for ArrayCodec {
    fn tag(&self) -> &str {
        "array"
    }

    fn encode(&self, value: &Value, walker: &mut Walker<'_>) -> Result<Node, CodecError> {
        let Value::Array(items) = value else {
            return Err(mismatch(self.tag(), value));
        };
        let items = items.read().clone();
        Ok(Node::Array(items.iter().map(|item| walker.visit(item)).collect()))
    }

    fn allocate(&self, node: &Node) -> Option<Value> {
        match node {
            Node::Array(ids) => Some(Value::array(Vec::with_capacity(ids.len()))),
            _ => None,
        }
    }

    fn populate(
        &self,
        shell: &Value,
        node: &Node,
        resolver: &mut Resolver<'_>,
    ) -> Result<(), DecodeError> {
        let (Value::Array(target), Node::Array(ids)) = (shell, node) else {
            return Err(resolver.error(node_mismatch(self.tag(), node)));
        };
        let items = resolver.resolve_all(ids)?;
        target.write().extend(items);
        Ok(())
    }
}

/// Insertion-ordered maps.
pub struct MapCodec;

impl Codec for MapCodec {
    fn tag(&self) -> &str {
        "map"
    }

    fn encode(&self, value: &Value, walker: &mut Walker<'_>) -> Result<Node, CodecError> {
        let Value::Map(map) = value else {
            return Err(mismatch(self.tag(), value));
        };
        let entries: Vec<(Value, Value)> = map
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Node::Map(
            entries
                .iter()
                .map(|(k, v)| (walker.visit(k), walker.visit(v)))
                .collect(),
        ))
    }

    fn allocate(&self, node: &Node) -> Option<Value> {
        matches!(node, Node::Map(_)).then(|| Value::map(MapValue::new()))
    }

    fn populate(
        &self,
        shell: &Value,
        node: &Node,
        resolver: &mut Resolver<'_>,
    ) -> Result<(), DecodeError> {
        let (Value::Map(target), Node::Map(entries)) = (shell, node) else {
            return Err(resolver.error(node_mismatch(self.tag(), node)));
        };
        let mut resolved = Vec::with_capacity(entries.len());
        for &(key, value) in entries {
            resolved.push((resolver.resolve(key)?, resolver.resolve(value)?));
        }
        let mut map = target.write();
        for (key, value) in resolved {
            map.insert(key, value);
        }
        Ok(())
    }
}

/// Insertion-ordered sets.
pub struct SetCodec;

impl Codec for SetCodec {
    fn tag(&self) -> &str {
        "set"
    }

    fn encode(&self, value: &Value, walker: &mut Walker<'_>) -> Result<Node, CodecError> {
        let Value::Set(set) = value else {
            return Err(mismatch(self.tag(), value));
        };
        let members: Vec<Value> = set.read().iter().cloned().collect();
        Ok(Node::Set(members.iter().map(|m| walker.visit(m)).collect()))
    }

    fn allocate(&self, node: &Node) -> Option<Value> {
        matches!(node, Node::Set(_)).then(|| Value::set(SetValue::new()))
    }

    fn populate(
        &self,
        shell: &Value,
        node: &Node,
        resolver: &mut Resolver<'_>,
    ) -> Result<(), DecodeError> {
        let (Value::Set(target), Node::Set(ids)) = (shell, node) else {
            return Err(resolver.error(node_mismatch(self.tag(), node)));
        };
        let members = resolver.resolve_all(ids)?;
        let mut set = target.write();
        for member in members {
            set.insert(member);
        }
        Ok(())
    }
}

/// Plain objects, with an optional constructor locator.
pub struct ObjectCodec;

impl Codec for ObjectCodec {
    fn tag(&self) -> &str {
        "object"
    }

    fn encode(&self, value: &Value, walker: &mut Walker<'_>) -> Result<Node, CodecError> {
        let Value::Object(obj) = value else {
            return Err(mismatch(self.tag(), value));
        };
        let (constructor, fields) = {
            let obj = obj.read();
            let fields: Vec<(String, Value)> = obj
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (obj.constructor.clone(), fields)
        };
        Ok(Node::Object {
            constructor,
            fields: fields
                .into_iter()
                .map(|(name, v)| (name, walker.visit(&v)))
                .collect(),
        })
    }

    fn allocate(&self, node: &Node) -> Option<Value> {
        match node {
            Node::Object { constructor, .. } => Some(Value::object(ObjectValue {
                constructor: constructor.clone(),
                ..ObjectValue::new()
            })),
            _ => None,
        }
    }

    fn populate(
        &self,
        shell: &Value,
        node: &Node,
        resolver: &mut Resolver<'_>,
    ) -> Result<(), DecodeError> {
        let (Value::Object(target), Node::Object { fields, .. }) = (shell, node) else {
            return Err(resolver.error(node_mismatch(self.tag(), node)));
        };
        let mut resolved = Vec::with_capacity(fields.len());
        for (name, id) in fields {
            resolved.push((name.clone(), resolver.resolve(*id)?));
        }
        let mut obj = target.write();
        for (name, value) in resolved {
            obj.set(name, value);
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Reactive containers and behavior
// ═══════════════════════════════════════════════════════════════════════

/// Reactive containers: encodes the unwrapped value and the variant; the
/// subscriber table is runtime-only and starts empty after a resume.
pub struct ReactiveCodec;

impl Codec for ReactiveCodec {
    fn tag(&self) -> &str {
        "reactive"
    }

    fn encode(&self, value: &Value, walker: &mut Walker<'_>) -> Result<Node, CodecError> {
        let Value::Reactive(reactive) = value else {
            return Err(mismatch(self.tag(), value));
        };
        let plain = reactive.unwrap();
        Ok(Node::Reactive {
            variant: reactive.variant(),
            target: walker.visit(&plain),
        })
    }

    fn allocate(&self, node: &Node) -> Option<Value> {
        match node {
            Node::Reactive { variant, .. } => Some(Value::Reactive(ReactiveRef::rewrap(
                *variant,
                Value::Undefined,
            ))),
            _ => None,
        }
    }

    fn populate(
        &self,
        shell: &Value,
        node: &Node,
        resolver: &mut Resolver<'_>,
    ) -> Result<(), DecodeError> {
        let (Value::Reactive(target), Node::Reactive { target: id, .. }) = (shell, node) else {
            return Err(resolver.error(node_mismatch(self.tag(), node)));
        };
        let plain = resolver.resolve(*id)?;
        target.restore(plain);
        Ok(())
    }
}

/// Thunks: the locator plus the ids of its captured values.
pub struct ThunkCodec;

impl Codec for ThunkCodec {
    fn tag(&self) -> &str {
        "thunk"
    }

    fn encode(&self, value: &Value, walker: &mut Walker<'_>) -> Result<Node, CodecError> {
        let Value::Thunk(thunk) = value else {
            return Err(mismatch(self.tag(), value));
        };
        let captured = thunk
            .captured()
            .map_err(|err| CodecError::Custom(format!("captured state unavailable: {}", err)))?;
        let ids = captured.iter().map(|v| walker.visit(v)).collect();
        Ok(Node::Locator(thunk.locator().with_captured(ids)))
    }

    fn allocate(&self, node: &Node) -> Option<Value> {
        match node {
            Node::Locator(locator) => Some(Value::Thunk(ThunkRef::new(
                locator.with_captured(Vec::new()),
                Vec::new(),
            ))),
            _ => None,
        }
    }

    fn populate(
        &self,
        shell: &Value,
        node: &Node,
        resolver: &mut Resolver<'_>,
    ) -> Result<(), DecodeError> {
        let (Value::Thunk(thunk), Node::Locator(locator)) = (shell, node) else {
            return Err(resolver.error(node_mismatch(self.tag(), node)));
        };
        let captures = resolver.captures(locator.captured())?;
        thunk.set_captures(captures);
        Ok(())
    }
}

/// Native functions. Only functions that remember the locator they were
/// loaded from can be paused; they resume as thunks of that locator.
pub struct FunctionCodec;

impl Codec for FunctionCodec {
    fn tag(&self) -> &str {
        "function"
    }

    fn encode(&self, value: &Value, _walker: &mut Walker<'_>) -> Result<Node, CodecError> {
        let Value::Function(func) = value else {
            return Err(mismatch(self.tag(), value));
        };
        match func.origin() {
            Some(origin) => Ok(Node::Locator(origin.clone())),
            None => Err(CodecError::Unserializable(format!(
                "function `{}` (no origin locator)",
                func.name()
            ))),
        }
    }
}

/// Unresolvable markers survive a round trip unchanged.
pub struct UnresolvableCodec;

impl Codec for UnresolvableCodec {
    fn tag(&self) -> &str {
        "unresolvable"
    }

    fn encode(&self, value: &Value, _walker: &mut Walker<'_>) -> Result<Node, CodecError> {
        match value {
            Value::Unresolvable(diagnostic) => Ok(Node::Unresolvable(diagnostic.to_string())),
            other => Err(mismatch(self.tag(), other)),
        }
    }

    fn decode(&self, node: &Node, resolver: &mut Resolver<'_>) -> Result<Value, DecodeError> {
        match node {
            Node::Unresolvable(diagnostic) => Ok(Value::unresolvable(diagnostic.as_str())),
            other => Err(resolver.error(node_mismatch(self.tag(), other))),
        }
    }
}
