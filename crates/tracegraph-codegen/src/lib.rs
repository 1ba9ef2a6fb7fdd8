//! Compiler from traced dataflow graphs to s-expression programs.
//!
//! This crate lowers a [`tracegraph_core::ProgramGraph`] into one nested
//! program in a parenthesized, lexically scoped target language, inserting
//! tracing start/end calls around every span region.
//!
//! # Modules
//!
//! - [`schedule`] -- Consumers-first ordering of lowering units
//! - [`lower`] -- IR builder (value lowering, sharing, sequencing)
//! - [`control`] -- `if`/`cond` lowering and branch chains
//! - [`bindings`] -- `let`/`let*` binding groups
//! - [`span`] -- Span instrumentation and the span state machine
//! - [`render`] -- Code generator
//! - [`templates`] -- Configurable span-call templates

pub mod bindings;
pub mod compiler;
pub mod control;
pub mod error;
pub mod ir;
pub mod lower;
pub mod render;
pub mod schedule;
pub mod scope;
pub mod span;
pub mod symbol;
pub mod templates;

pub use compiler::{compile, compile_document, compile_to_ir};
pub use error::CodegenError;
pub use ir::{Binding, Clause, Expr, LetKind};
pub use symbol::{Symbol, SymbolPrefix};
pub use templates::{SpanOp, SpanTemplates};

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Options controlling code generation.
///
/// Missing fields take their defaults when deserialized, so an options file
/// only needs the settings it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Templates for the span start/end calls.
    pub span_templates: SpanTemplates,

    /// Rendered as the parent context of spans that have no parent.
    pub no_context: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            span_templates: SpanTemplates::default(),
            no_context: "#f".to_string(),
        }
    }
}

impl CompileOptions {
    /// Parses options from JSON.
    pub fn from_json(json: &str) -> Result<Self, CodegenError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CodegenError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
