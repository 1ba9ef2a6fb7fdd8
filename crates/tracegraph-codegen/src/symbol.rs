//! Hygienic variable names.
//!
//! A [`Symbol`] is a (prefix, node id) pair and is only turned into text by
//! the renderer. Because ids are unique within a graph and each prefix has a
//! single role, two symbols collide only if they denote the same thing.

use std::fmt;

use tracegraph_core::NodeId;

/// The role a symbol plays in the generated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolPrefix {
    /// A shared node value (`p-<id>`).
    Value,
    /// A span's runtime context handle (`cx-<span>`).
    Context,
    /// The value a span region produced (`ret-<span>`).
    Return,
}

impl SymbolPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolPrefix::Value => "p",
            SymbolPrefix::Context => "cx",
            SymbolPrefix::Return => "ret",
        }
    }
}

/// A variable in the generated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub prefix: SymbolPrefix,
    pub id: NodeId,
}

impl Symbol {
    /// The symbol naming `node`'s value.
    pub fn value(node: NodeId) -> Self {
        Symbol {
            prefix: SymbolPrefix::Value,
            id: node,
        }
    }

    /// The context handle of `span`.
    pub fn context(span: NodeId) -> Self {
        Symbol {
            prefix: SymbolPrefix::Context,
            id: span,
        }
    }

    /// The saved result of `span`'s region.
    pub fn ret(span: NodeId) -> Self {
        Symbol {
            prefix: SymbolPrefix::Return,
            id: span,
        }
    }

    /// Returns `true` for symbols introduced by span instrumentation.
    pub fn is_span_bookkeeping(&self) -> bool {
        matches!(self.prefix, SymbolPrefix::Context | SymbolPrefix::Return)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix.as_str(), self.id)
    }
}
