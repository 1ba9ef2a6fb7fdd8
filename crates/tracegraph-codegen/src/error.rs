//! Codegen error types covering all compilation failure modes.

use tracegraph_core::{CoreError, NodeId};

/// Errors that can occur while lowering and rendering a program graph.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// The graph model rejected the input (malformed document, dangling
    /// references, inconsistent spans, dependency cycle).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Graph structure issue preventing compilation.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A span region hands more than one value to nodes outside it.
    #[error("span {span} produces {} values consumed outside it ({outputs:?}); at most one is supported", .outputs.len())]
    SpanOutputs { span: NodeId, outputs: Vec<NodeId> },

    /// Collapsing spans and branch chains into units produced a cycle,
    /// typically a span whose region is not contiguous in the dependency order.
    #[error("dependency cycle between lowering units {units:?}")]
    UnitCycle { units: Vec<NodeId> },

    /// No template is configured for a span operation.
    #[error("no template configured for '{op}'")]
    MissingTemplate { op: String },

    /// A template names a field the operation does not have.
    #[error("template for '{op}' uses unknown field '{field}'")]
    UnknownTemplateField { op: String, field: String },

    /// A template could not be parsed.
    #[error("malformed template for '{op}': {reason}")]
    MalformedTemplate { op: String, reason: String },

    /// Filesystem I/O error while loading options.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Options file is not valid JSON for [`CompileOptions`](crate::CompileOptions).
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),
}
