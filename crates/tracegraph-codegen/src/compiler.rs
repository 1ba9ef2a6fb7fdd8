//! Top-level compilation pipeline:
//! acyclicity check -> lowering to IR -> rendering.
//!
//! [`compile`] is the main entry point and returns program text.
//! [`compile_to_ir`] stops before rendering, useful for testing and for
//! inspecting how a graph was scheduled.

use std::time::Instant;

use tracegraph_core::{Edge, Node, ProgramGraph};

use crate::error::CodegenError;
use crate::ir::Expr;
use crate::lower::Lowerer;
use crate::render::Renderer;
use crate::CompileOptions;

/// Compiles a program graph to program text.
///
/// An empty graph compiles to the empty string.
pub fn compile(graph: &ProgramGraph, options: &CompileOptions) -> Result<String, CodegenError> {
    let Some(ir) = compile_to_ir(graph)? else {
        return Ok(String::new());
    };

    let start = Instant::now();
    let text = Renderer::new(&options.span_templates, &options.no_context).render(&ir)?;
    tracing::debug!(
        bytes = text.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "rendered program"
    );
    Ok(text)
}

/// Lowers a program graph to IR without rendering it.
///
/// Rejects dependency cycles before scheduling anything.
pub fn compile_to_ir(graph: &ProgramGraph) -> Result<Option<Expr>, CodegenError> {
    let start = Instant::now();
    graph.check_acyclic()?;
    tracing::debug!(
        nodes = graph.node_count(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "dependency graph is acyclic"
    );

    let start = Instant::now();
    let ir = Lowerer::new(graph).lower_program()?;
    tracing::debug!(
        elapsed_us = start.elapsed().as_micros() as u64,
        "lowered graph to IR"
    );
    Ok(ir)
}

/// Compiles raw node and edge lists, validating them first.
pub fn compile_document(
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    options: &CompileOptions,
) -> Result<String, CodegenError> {
    let graph = ProgramGraph::from_parts(nodes, edges)?;
    compile(&graph, options)
}
