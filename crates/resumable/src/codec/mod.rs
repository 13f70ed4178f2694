//! Type codec registry
//!
//! Every value type, builtin or application-defined, is encoded and decoded
//! by a [`Codec`] registered under a type tag. The walker and the resolver
//! only ever dispatch through the registry.

mod builtin;

pub use builtin::{
    ArrayCodec, FunctionCodec, MapCodec, ObjectCodec, PrimitiveCodec, ReactiveCodec, SetCodec,
    ThunkCodec, UnresolvableCodec,
};

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{CodecError, DecodeError};
use crate::graph::{Node, Walker};
use crate::resume::Resolver;
use crate::value::Value;

/// Encodes one type of value into a [`Node`] and rebuilds it.
///
/// Codecs for container types implement [`allocate`](Codec::allocate) and
/// [`populate`](Codec::populate): the resolver hands out the allocated
/// shell before populating it, so cycles through the container resolve to
/// the same identity. Codecs for leaf or immutable types implement
/// [`decode`](Codec::decode) instead.
pub trait Codec: Send + Sync {
    /// Type tag this codec handles
    fn tag(&self) -> &str;

    /// Encode `value`, visiting children through `walker`
    fn encode(&self, value: &Value, walker: &mut Walker<'_>) -> Result<Node, CodecError>;

    /// Allocate an empty shell with its final identity, if this codec
    /// supports two-phase construction.
    fn allocate(&self, node: &Node) -> Option<Value> {
        let _ = node;
        None
    }

    /// Fill a shell returned by [`allocate`](Codec::allocate).
    fn populate(
        &self,
        shell: &Value,
        node: &Node,
        resolver: &mut Resolver<'_>,
    ) -> Result<(), DecodeError> {
        let _ = (shell, node, resolver);
        Ok(())
    }

    /// Build a value in one step.
    fn decode(&self, node: &Node, resolver: &mut Resolver<'_>) -> Result<Value, DecodeError> {
        Err(resolver.error(CodecError::Mismatch {
            codec: self.tag().to_string(),
            found: format!("{:?} node", node.kind()),
        }))
    }
}

/// Tag-keyed codec table.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: IndexMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with codecs for every builtin value type
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tag in ["undefined", "null", "bool", "int", "float", "string"] {
            registry.insert(Arc::new(PrimitiveCodec::new(tag)));
        }
        registry.insert(Arc::new(ArrayCodec));
        registry.insert(Arc::new(MapCodec));
        registry.insert(Arc::new(SetCodec));
        registry.insert(Arc::new(ObjectCodec));
        registry.insert(Arc::new(ReactiveCodec));
        registry.insert(Arc::new(ThunkCodec));
        registry.insert(Arc::new(FunctionCodec));
        registry.insert(Arc::new(UnresolvableCodec));
        registry
    }

    /// Register an application codec.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Custom` if a codec is already registered under
    /// the same tag.
    pub fn register(&mut self, codec: impl Codec + 'static) -> Result<(), CodecError> {
        let tag = codec.tag().to_string();
        if self.codecs.contains_key(&tag) {
            return Err(CodecError::Custom(format!(
                "a codec is already registered for `{}`",
                tag
            )));
        }
        debug!(tag = %tag, "registered codec");
        self.insert(Arc::new(codec));
        Ok(())
    }

    /// Look up the codec for a tag
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn Codec>> {
        self.codecs.get(tag)
    }

    /// Whether a tag has a codec
    pub fn contains(&self, tag: &str) -> bool {
        self.codecs.contains_key(tag)
    }

    /// Registered tags in registration order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }

    fn insert(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.tag().to_string(), codec);
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.codecs.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_cover_every_value_type() {
        let registry = CodecRegistry::with_builtins();
        for tag in [
            "undefined",
            "null",
            "bool",
            "int",
            "float",
            "string",
            "array",
            "map",
            "set",
            "object",
            "reactive",
            "thunk",
            "function",
            "unresolvable",
        ] {
            assert!(registry.contains(tag), "missing codec for {}", tag);
        }
        assert!(!registry.contains("custom"));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = CodecRegistry::with_builtins();
        let err = registry.register(ArrayCodec).unwrap_err();
        assert!(err.to_string().contains("array"));
    }
}
