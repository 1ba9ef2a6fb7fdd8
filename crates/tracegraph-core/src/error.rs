//! Core error types for tracegraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! all anticipated failure modes in the graph model and span containment.

use crate::id::{EdgeId, NodeId};
use thiserror::Error;

/// Core errors produced by the tracegraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two nodes share the same id.
    #[error("duplicate node id: {id}")]
    DuplicateNode { id: NodeId },

    /// Two edges share the same id.
    #[error("duplicate edge id: {id}")]
    DuplicateEdge { id: EdgeId },

    /// A node id was not found in the graph.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// A `parentId` or span reference names a node that does not exist.
    #[error("span {id} referenced by node {child} does not exist")]
    SpanNotFound { id: NodeId, child: NodeId },

    /// A node that is not a span was used as a span.
    #[error("node {id} is not a span")]
    NotASpan { id: NodeId },

    /// An edge failed validation.
    #[error("invalid edge {id}: {reason}")]
    InvalidEdge { id: EdgeId, reason: String },

    /// A span declaration is unusable (empty, wraps a span, ...).
    #[error("invalid span {id}: {reason}")]
    InvalidSpan { id: NodeId, reason: String },

    /// Span containment or wrapped-node bookkeeping is inconsistent.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },

    /// The data/flow/control edges contain a cycle through this node.
    #[error("dependency cycle through node {node}")]
    Cycle { node: NodeId },

    /// A serialized graph document could not be decoded.
    #[error("malformed graph document: {0}")]
    Malformed(#[from] serde_json::Error),
}
