//! Node types for the authored program graph.
//!
//! A [`Node`] couples an identity and an optional containing span
//! (`parentId`) with a kind-specific payload ([`NodeKind`]). Layout fields
//! (`position`, `size`) belong to the editor and are carried through
//! untouched; the compiler never reads them.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// A node in the authored graph.
///
/// The wire form is flat: `{"id": 3, "kind": "call", "name": "+", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable identity. Symbols in the generated program derive from it.
    pub id: NodeId,
    /// Kind tag plus kind-specific payload.
    #[serde(flatten)]
    pub kind: NodeKind,
    /// The span that directly contains this node, if any.
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Editor placement. Relative to the parent span when `parent_id` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Editor dimensions, mostly set on span nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
}

impl Node {
    /// Creates a node with no parent and no layout.
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Node {
            id,
            kind,
            parent_id: None,
            position: None,
            size: None,
        }
    }

    /// Builder-style setter for the containing span.
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Builder-style setter for the editor position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    /// Returns `true` if this node is a span container.
    pub fn is_span(&self) -> bool {
        matches!(self.kind, NodeKind::Span(_))
    }

    /// Returns the span payload, if this node is a span.
    pub fn as_span(&self) -> Option<&SpanNode> {
        match &self.kind {
            NodeKind::Span(span) => Some(span),
            _ => None,
        }
    }

    /// Returns `true` for `if` and `cond` nodes.
    pub fn is_conditional(&self) -> bool {
        matches!(self.kind, NodeKind::If | NodeKind::Cond)
    }
}

/// Kind-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKind {
    /// A constant value.
    Literal { value: ConstValue },
    /// A procedure call.
    Call(CallNode),
    /// Two-way conditional: one `cond` input, `then`/`else` branches.
    If,
    /// Multi-way conditional over `test-N`/`action-N` clause pairs.
    Cond,
    /// A tracing region wrapping other nodes.
    Span(SpanNode),
}

impl NodeKind {
    /// Short lowercase name of the kind, as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Literal { .. } => "literal",
            NodeKind::Call(_) => "call",
            NodeKind::If => "if",
            NodeKind::Cond => "cond",
            NodeKind::Span(_) => "span",
        }
    }
}

/// Payload of a `call` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallNode {
    /// Procedure name, emitted verbatim.
    pub name: String,
    /// Declared input arity. `None` means variadic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_args: Option<u32>,
    /// Whether the call produces a value other nodes may consume.
    #[serde(rename = "hasOutput", default = "default_has_output")]
    pub has_output: bool,
}

fn default_has_output() -> bool {
    true
}

impl CallNode {
    /// A value-producing call with a fixed arity.
    pub fn new(name: impl Into<String>, n_args: u32) -> Self {
        CallNode {
            name: name.into(),
            n_args: Some(n_args),
            has_output: true,
        }
    }

    /// A value-producing variadic call.
    pub fn variadic(name: impl Into<String>) -> Self {
        CallNode {
            name: name.into(),
            n_args: None,
            has_output: true,
        }
    }

    /// Marks the call as effect-only.
    pub fn without_output(mut self) -> Self {
        self.has_output = false;
        self
    }
}

/// Payload of a `span` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanNode {
    /// Display name passed to the tracing start call.
    pub name: String,
    /// Every non-span node this span contains, directly or through child
    /// spans. Must agree with the `parentId` chains of those nodes.
    #[serde(rename = "wrappedNodeIds", default)]
    pub wrapped_node_ids: IndexSet<NodeId>,
}

/// Constant values carried by literal nodes.
///
/// Untagged on the wire: `true`, `42`, `1.5`, `"text"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Editor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Editor dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}
