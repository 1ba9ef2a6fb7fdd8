//! Graph model for traced dataflow programs.
//!
//! The editor authors a directed graph of literal, call, conditional and span
//! nodes. This crate holds the value types for that graph, validates their
//! structural invariants, and maintains the span-containment forest when a new
//! span is carved out of the graph.

pub mod containment;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;

// Re-export commonly used types
pub use containment::{apply_new_span, NewSpan, SpanForest, SpanRecord};
pub use edge::{Edge, EdgeKind, Handle};
pub use error::CoreError;
pub use graph::{GraphDocument, ProgramGraph};
pub use id::{EdgeId, NodeId};
pub use node::{CallNode, ConstValue, Node, NodeKind, Position, Size, SpanNode};
