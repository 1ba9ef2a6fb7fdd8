//! Span instrumentation.
//!
//! A closed span's region is wrapped as
//!
//! ```text
//! (let* ((cx-S (start-span "name" parent))
//!        (ret-S <region>))
//!   (begin (end-span cx-S) ret-S))
//! ```
//!
//! When the region is exactly a child span's block, the two blocks share
//! one `let*`: start calls run outer to inner, end calls inner to outer, and
//! the innermost result is returned last.
//!
//! [`SpanTracker`] follows each span through open, accumulating and closed
//! as the lowering visits its wrapped nodes.

use std::collections::HashMap;

use tracegraph_core::{NodeId, ProgramGraph};

use crate::error::CodegenError;
use crate::ir::{Binding, Expr, LetKind};
use crate::symbol::{Symbol, SymbolPrefix};

/// Wraps `region` in start/end calls for span `id`.
///
/// Only a region that is exactly one directly nested child block is merged
/// into this span's `let*`. Sibling child spans stay separate blocks
/// sequenced by the region's `begin`, each closing before the parent's
/// end call.
pub fn instrument(id: NodeId, name: &str, parent: Option<Symbol>, region: Expr) -> Expr {
    let cx = Symbol::context(id);
    let start = Binding::new(
        cx,
        Expr::StartSpan {
            name: name.to_string(),
            parent,
        },
    );

    match split_child_block(region, cx) {
        Ok((inner_bindings, mut inner_tail)) => {
            // inner_tail is [end-span ..., ret]; close this span right before ret
            let ret = inner_tail.pop();
            inner_tail.push(Expr::EndSpan { context: cx });
            inner_tail.extend(ret);

            let mut bindings = Vec::with_capacity(inner_bindings.len() + 1);
            bindings.push(start);
            bindings.extend(inner_bindings);
            Expr::Let {
                kind: LetKind::Sequential,
                bindings,
                body: Box::new(Expr::Begin(inner_tail)),
            }
        }
        Err(region) => {
            let ret = Symbol::ret(id);
            Expr::Let {
                kind: LetKind::Sequential,
                bindings: vec![start, Binding::new(ret, region)],
                body: Box::new(Expr::Begin(vec![
                    Expr::EndSpan { context: cx },
                    Expr::var(ret),
                ])),
            }
        }
    }
}

/// Splits a direct child span block (one whose first start call takes
/// `parent` as its parent context) into its bindings and its closing
/// sequence. Anything else is handed back untouched.
fn split_child_block(region: Expr, parent: Symbol) -> Result<(Vec<Binding>, Vec<Expr>), Expr> {
    let is_child_block = match &region {
        Expr::Let {
            kind: LetKind::Sequential,
            bindings,
            body,
        } => {
            let opens_child = bindings.first().is_some_and(|b| {
                b.symbol.prefix == SymbolPrefix::Context
                    && matches!(&b.value, Expr::StartSpan { parent: Some(p), .. } if *p == parent)
            });
            let closes = match body.as_ref() {
                Expr::Begin(items) => matches!(
                    items.last(),
                    Some(Expr::Var(s)) if s.prefix == SymbolPrefix::Return
                ),
                _ => false,
            };
            opens_child && closes
        }
        _ => false,
    };
    if !is_child_block {
        return Err(region);
    }
    match region {
        Expr::Let { bindings, body, .. } => match *body {
            Expr::Begin(items) => Ok((bindings, items)),
            other => Err(Expr::Let {
                kind: LetKind::Sequential,
                bindings,
                body: Box::new(other),
            }),
        },
        other => Err(other),
    }
}

// ---------------------------------------------------------------------------
// Span state machine
// ---------------------------------------------------------------------------

/// Lifecycle of a span during one compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanState {
    /// None of its wrapped nodes has been visited yet.
    Open,
    /// Some, but not all, wrapped nodes have been visited.
    Accumulating { visited: usize, total: usize },
    /// Every wrapped node was visited and the region is finalized.
    Closed,
}

#[derive(Debug)]
struct Progress {
    visited: usize,
    total: usize,
    closed: bool,
}

/// Tracks every span of a graph through its lifecycle.
#[derive(Debug)]
pub struct SpanTracker {
    spans: HashMap<NodeId, Progress>,
}

impl SpanTracker {
    pub fn new(graph: &ProgramGraph) -> Self {
        let spans = graph
            .spans()
            .map(|(node, span)| {
                (
                    node.id,
                    Progress {
                        visited: 0,
                        total: span.wrapped_node_ids.len(),
                        closed: false,
                    },
                )
            })
            .collect();
        SpanTracker { spans }
    }

    /// Records a visit to a node contained in each of `ancestors`.
    pub fn visit(&mut self, node: NodeId, ancestors: &[NodeId]) -> Result<(), CodegenError> {
        for span in ancestors {
            let progress = self.spans.get_mut(span).ok_or_else(|| {
                CodegenError::InvalidGraph(format!("node {} names unknown span {}", node, span))
            })?;
            if progress.closed {
                return Err(CodegenError::InvalidGraph(format!(
                    "node {} visited after span {} closed",
                    node, span
                )));
            }
            progress.visited += 1;
            tracing::trace!(span = %span, node = %node, visited = progress.visited, total = progress.total, "span accumulating");
        }
        Ok(())
    }

    pub fn state(&self, span: NodeId) -> Option<SpanState> {
        self.spans.get(&span).map(|p| {
            if p.closed {
                SpanState::Closed
            } else if p.visited == 0 {
                SpanState::Open
            } else {
                SpanState::Accumulating {
                    visited: p.visited,
                    total: p.total,
                }
            }
        })
    }

    /// Finalizes `span`. Fails unless every wrapped node was visited.
    pub fn close(&mut self, span: NodeId) -> Result<(), CodegenError> {
        let progress = self
            .spans
            .get_mut(&span)
            .ok_or_else(|| CodegenError::InvalidGraph(format!("unknown span {}", span)))?;
        if progress.closed || progress.visited != progress.total {
            return Err(CodegenError::InvalidGraph(format!(
                "span {} closed after visiting {} of {} wrapped nodes",
                span, progress.visited, progress.total
            )));
        }
        progress.closed = true;
        tracing::trace!(span = %span, "span closed");
        Ok(())
    }

    /// Spans that never closed, sorted by id.
    pub fn unclosed(&self) -> Vec<NodeId> {
        let mut open: Vec<NodeId> = self
            .spans
            .iter()
            .filter(|(_, p)| !p.closed)
            .map(|(&id, _)| id)
            .collect();
        open.sort();
        open
    }
}
