//! Lowering scopes and unit lifting.
//!
//! A scope is a set of sibling *units* under one container (the top level
//! or a span). A unit is either a plain node or a whole nested span, so a
//! span's region is scheduled as one block. Any node is *lifted* to the
//! unit of the scope that contains it, if there is one.

use std::collections::HashSet;

use tracegraph_core::{Edge, NodeId, ProgramGraph};

/// A set of sibling units that are scheduled together.
#[derive(Debug, Clone)]
pub struct Scope<'g> {
    graph: &'g ProgramGraph,
    container: Option<NodeId>,
    units: Vec<NodeId>,
    members: HashSet<NodeId>,
}

impl<'g> Scope<'g> {
    /// All direct children of `container` (`None` is the top level).
    pub fn level(graph: &'g ProgramGraph, container: Option<NodeId>) -> Self {
        let units = graph.children(container);
        let members = units.iter().copied().collect();
        Scope {
            graph,
            container,
            units,
            members,
        }
    }

    /// A sub-scope over some of this scope's units.
    pub fn restrict(&self, units: &[NodeId]) -> Self {
        let members: HashSet<NodeId> = units
            .iter()
            .copied()
            .filter(|u| self.members.contains(u))
            .collect();
        let units = self
            .units
            .iter()
            .copied()
            .filter(|u| members.contains(u))
            .collect();
        Scope {
            graph: self.graph,
            container: self.container,
            units,
            members,
        }
    }

    pub fn graph(&self) -> &'g ProgramGraph {
        self.graph
    }

    pub fn container(&self) -> Option<NodeId> {
        self.container
    }

    /// Units in document order.
    pub fn units(&self) -> &[NodeId] {
        &self.units
    }

    pub fn contains(&self, unit: NodeId) -> bool {
        self.members.contains(&unit)
    }

    /// Document position, used to break scheduling ties.
    pub fn rank(&self, unit: NodeId) -> usize {
        self.graph.position(unit).unwrap_or(usize::MAX)
    }

    /// The unit of this scope containing `node`.
    pub fn lift(&self, node: NodeId) -> Option<NodeId> {
        let mut current = node;
        loop {
            let parent = self.graph.parent(current);
            if parent == self.container {
                return self.members.contains(&current).then_some(current);
            }
            current = parent?;
        }
    }

    /// Non-span nodes making up `unit`.
    pub fn nodes_of(&self, unit: NodeId) -> Vec<NodeId> {
        match self.graph.node(unit).and_then(|n| n.as_span()) {
            Some(span) => span.wrapped_node_ids.iter().copied().collect(),
            None => vec![unit],
        }
    }

    /// Edges leaving `unit`, each with the unit of this scope it enters.
    ///
    /// Edges internal to a span unit are skipped. A `None` target means the
    /// edge leaves the scope.
    pub fn outgoing(&self, unit: NodeId) -> Vec<(&'g Edge, Option<NodeId>)> {
        let graph = self.graph;
        let mut out = Vec::new();
        for node in self.nodes_of(unit) {
            for edge in graph.outgoing(node) {
                let target = self.lift(edge.target);
                if target != Some(unit) {
                    out.push((edge, target));
                }
            }
        }
        out
    }
}
