//! IR builder: lowers a program graph to a single [`Expr`].
//!
//! Each scope is scheduled consumers-first and folded into an accumulator
//! holding everything already lowered downstream. How a unit joins the
//! accumulator depends on how many in-scope consumers read its value:
//!
//! - none: it runs for effect, ahead of the accumulator in a `begin`
//!   (unused literals are dropped);
//! - one: its expression replaces the single placeholder its consumer left,
//!   unless a flow edge orders it before another unit or it is a call read
//!   by a span it does not belong to; those are bound instead;
//! - several: it is bound once in a `let`/`let*` around the accumulator.
//!
//! Spans are lowered as one unit of their enclosing scope and instrumented
//! when their region is complete. Conditional slots are lowered as their own
//! scopes, see [`crate::control`].

use std::collections::{BTreeMap, HashMap};

use tracegraph_core::{CallNode, EdgeKind, Handle, Node, NodeId, NodeKind, ProgramGraph, SpanNode};

use crate::bindings;
use crate::control::{self, Slots};
use crate::error::CodegenError;
use crate::ir::{Binding, Expr};
use crate::schedule::schedule;
use crate::scope::Scope;
use crate::span::{self, SpanTracker};
use crate::symbol::Symbol;

/// Lowers one graph. Holds the per-compile span bookkeeping.
pub struct Lowerer<'g> {
    graph: &'g ProgramGraph,
    spans: SpanTracker,
}

impl<'g> Lowerer<'g> {
    pub fn new(graph: &'g ProgramGraph) -> Self {
        Lowerer {
            graph,
            spans: SpanTracker::new(graph),
        }
    }

    /// Lowers the whole graph. `None` for a graph with no nodes.
    ///
    /// The graph must be acyclic; see [`ProgramGraph::check_acyclic`].
    pub fn lower_program(mut self) -> Result<Option<Expr>, CodegenError> {
        let root = Scope::level(self.graph, None);
        let program = self.lower_scope(&root, None)?;

        let unclosed = self.spans.unclosed();
        if !unclosed.is_empty() {
            return Err(CodegenError::InvalidGraph(format!(
                "spans never closed: {:?}",
                unclosed
            )));
        }
        Ok(program)
    }

    /// Lowers the units of `scope`. When `exit` is set, the result evaluates
    /// to that unit's value.
    fn lower_scope(
        &mut self,
        scope: &Scope<'g>,
        exit: Option<NodeId>,
    ) -> Result<Option<Expr>, CodegenError> {
        let slots = control::carve_slots(scope, exit);
        let units: Vec<NodeId> = scope
            .units()
            .iter()
            .copied()
            .filter(|&u| slots.owner_of(u).is_none())
            .collect();

        // Dependencies between units, with slot chains folded into their owner
        let mut deps = Vec::new();
        let mut usage: HashMap<NodeId, Usage> = HashMap::new();
        for &unit in &units {
            let entry = usage.entry(unit).or_default();
            for (edge, target) in scope.outgoing(unit) {
                let Some(target) = target.map(|t| slots.owner_of(t).unwrap_or(t)) else {
                    continue;
                };
                if target == unit {
                    continue;
                }
                deps.push((unit, target));
                if edge.kind.carries_value() {
                    entry.consumers += 1;
                    if self.graph.node(target).is_some_and(|n| n.is_span()) {
                        entry.feeds_span = true;
                    }
                } else {
                    entry.ordered = true;
                }
            }
        }
        if let Some(exit) = exit {
            usage.entry(exit).or_default().consumers += 1;
        }

        let order = schedule(&units, &deps, |u| scope.rank(u))?;

        let mut acc = match exit {
            Some(exit) => Some(Expr::var(self.value_symbol(exit)?)),
            None => None,
        };
        for unit in order {
            let mut used = usage.get(&unit).copied().unwrap_or_default();
            used.droppable = matches!(
                self.graph.node(unit).map(|n| &n.kind),
                Some(NodeKind::Literal { .. })
            );
            tracing::trace!(unit = %unit, consumers = used.consumers, "lowering unit");

            let expr = self.lower_unit(scope, &slots, unit)?;
            let symbol = self.value_symbol(unit)?;
            acc = fold(acc, symbol, expr, used)?;
        }
        Ok(acc)
    }

    fn lower_unit(
        &mut self,
        scope: &Scope<'g>,
        slots: &Slots,
        unit: NodeId,
    ) -> Result<Expr, CodegenError> {
        let graph = self.graph;
        let node = graph.require(unit)?;
        if !node.is_span() {
            self.spans.visit(unit, &graph.ancestors(unit))?;
        }

        match &node.kind {
            NodeKind::Literal { value } => {
                if graph.incoming(unit).iter().any(|e| e.kind.carries_value()) {
                    return Err(CodegenError::InvalidGraph(format!(
                        "literal node {} takes no inputs",
                        unit
                    )));
                }
                Ok(Expr::Literal(value.clone()))
            }
            NodeKind::Call(call) => self.lower_call(node, call),
            NodeKind::If => {
                let inputs = self.lower_slots(scope, slots, unit)?;
                control::lower_if(unit, inputs)
            }
            NodeKind::Cond => {
                let inputs = self.lower_slots(scope, slots, unit)?;
                control::lower_cond(unit, inputs)
            }
            NodeKind::Span(span) => self.lower_span(node, span),
        }
    }

    fn lower_call(&self, node: &Node, call: &CallNode) -> Result<Expr, CodegenError> {
        let mut args = BTreeMap::new();
        for edge in self.graph.incoming(node.id) {
            match (edge.kind, edge.target_handle) {
                (EdgeKind::Flow, _) => {}
                (EdgeKind::Data, Handle::Arg(index)) => {
                    if args
                        .insert(index, Expr::var(Symbol::value(edge.source)))
                        .is_some()
                    {
                        return Err(CodegenError::InvalidGraph(format!(
                            "argument {} of call node {} is fed by more than one edge",
                            index, node.id
                        )));
                    }
                }
                (_, handle) => {
                    return Err(CodegenError::InvalidGraph(format!(
                        "call node {} has no input {}",
                        node.id, handle
                    )))
                }
            }
        }

        if !call.has_output
            && self
                .graph
                .outgoing(node.id)
                .iter()
                .any(|e| e.kind == EdgeKind::Data)
        {
            return Err(CodegenError::InvalidGraph(format!(
                "call node {} ({}) has no output but its value is used",
                node.id, call.name
            )));
        }

        Ok(Expr::call(call.name.clone(), args.into_values().collect()))
    }

    /// Lowers every input of a conditional. Slots with a chain are lowered
    /// as their own scope; everything else is a placeholder.
    fn lower_slots(
        &mut self,
        scope: &Scope<'g>,
        slots: &Slots,
        owner: NodeId,
    ) -> Result<BTreeMap<Handle, Expr>, CodegenError> {
        let graph = self.graph;
        let edges = control::slot_edges(owner, graph.incoming(owner))?;
        let mut inputs = BTreeMap::new();
        for (handle, edge) in edges {
            let placeholder = Expr::var(Symbol::value(edge.source));
            let expr = match slots.chain(owner, handle) {
                Some(chain) => {
                    let sub = scope.restrict(&chain.units);
                    tracing::trace!(owner = %owner, slot = %handle, units = chain.units.len(), "lowering slot chain");
                    self.lower_scope(&sub, Some(chain.source))?
                        .unwrap_or(placeholder)
                }
                None => placeholder,
            };
            inputs.insert(handle, expr);
        }
        Ok(inputs)
    }

    fn lower_span(&mut self, node: &Node, span: &SpanNode) -> Result<Expr, CodegenError> {
        let id = node.id;
        let scope = Scope::level(self.graph, Some(id));
        let exit = self.span_exit(id, span)?.and_then(|e| scope.lift(e));
        tracing::trace!(span = %id, name = %span.name, "lowering span region");

        let region = self
            .lower_scope(&scope, exit)?
            .unwrap_or_else(|| Expr::Begin(Vec::new()));
        self.spans.close(id)?;

        Ok(span::instrument(
            id,
            &span.name,
            node.parent_id.map(Symbol::context),
            region,
        ))
    }

    /// The node inside `span` whose value is consumed outside it, if any.
    fn span_exit(&self, id: NodeId, span: &SpanNode) -> Result<Option<NodeId>, CodegenError> {
        let outputs: Vec<NodeId> = span
            .wrapped_node_ids
            .iter()
            .copied()
            .filter(|&member| {
                self.graph.outgoing(member).iter().any(|e| {
                    e.kind.carries_value() && !span.wrapped_node_ids.contains(&e.target)
                })
            })
            .collect();
        match outputs.as_slice() {
            [] => Ok(None),
            [exit] => Ok(Some(*exit)),
            _ => Err(CodegenError::SpanOutputs { span: id, outputs }),
        }
    }

    /// The symbol a unit's value is referenced by: the node itself, or a
    /// span's exit node.
    fn value_symbol(&self, unit: NodeId) -> Result<Symbol, CodegenError> {
        let node = self.graph.require(unit)?;
        match node.as_span() {
            Some(span) => Ok(Symbol::value(self.span_exit(unit, span)?.unwrap_or(unit))),
            None => Ok(Symbol::value(unit)),
        }
    }
}

/// How a unit's value is used inside its scope.
#[derive(Debug, Clone, Copy, Default)]
struct Usage {
    /// Value-carrying edges to other units, plus one if it is the scope's exit.
    consumers: usize,
    /// A flow edge orders it before another unit.
    ordered: bool,
    /// A span unit reads its value.
    feeds_span: bool,
    /// Literals: nothing is lost if the value goes unused.
    droppable: bool,
}

impl Usage {
    /// Whether a single-use value may move into its consumer.
    ///
    /// Flow-ordered units must run ahead of everything already lowered, and
    /// effects of a node outside a span must not run inside the span's block.
    fn inlinable(&self) -> bool {
        !self.ordered && (self.droppable || !self.feeds_span)
    }
}

/// Adds one lowered unit to the accumulator.
fn fold(
    acc: Option<Expr>,
    symbol: Symbol,
    expr: Expr,
    usage: Usage,
) -> Result<Option<Expr>, CodegenError> {
    if usage.consumers == 0 && usage.droppable {
        return Ok(acc);
    }
    let Some(mut acc) = acc else {
        if usage.consumers > 0 {
            return Err(CodegenError::InvalidGraph(format!(
                "value {} has consumers that were never lowered",
                symbol
            )));
        }
        return Ok(Some(expr));
    };

    let folded = match usage.consumers {
        0 => sequence(expr, acc),
        1 if usage.inlinable() && acc.count_free(&symbol) == 1 => {
            acc.substitute(&symbol, &expr);
            acc
        }
        _ => bindings::bind(acc, Binding::new(symbol, expr)),
    };
    Ok(Some(folded))
}

/// Runs `first` for effect before `rest`.
fn sequence(first: Expr, rest: Expr) -> Expr {
    match rest {
        Expr::Begin(mut items) => {
            items.insert(0, first);
            Expr::Begin(items)
        }
        other => Expr::Begin(vec![first, other]),
    }
}
