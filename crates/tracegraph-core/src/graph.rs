//! ProgramGraph: the validated, read-only view of an authored graph.
//!
//! [`ProgramGraph`] is the single entry point the compiler reads from. It is
//! built once from a node list and an edge list (the [`GraphDocument`] wire
//! form), checks the structural invariants of the model, and then answers
//! adjacency and containment queries.
//!
//! # Structure
//!
//! Nodes and edges live in a `StableGraph`. Span nodes are ordinary graph
//! nodes with no edges: containment is expressed through `parentId`
//! pointers, and every span's `wrappedNodeIds` must equal the set of non-span
//! nodes beneath it.
//!
//! Node-list order is preserved and exposed through [`ProgramGraph::position`];
//! it is the tie-breaker wherever the compiler must choose between otherwise
//! equivalent nodes.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId};
use crate::node::{Node, SpanNode};

/// Serialized form of a graph, as exchanged with the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphDocument {
    /// Decodes a JSON graph document.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encodes the document as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A validated program graph.
#[derive(Debug, Clone)]
pub struct ProgramGraph {
    graph: StableGraph<Node, Edge, Directed, u32>,
    /// NodeId -> graph index
    indices: HashMap<NodeId, NodeIndex<u32>>,
    /// Node ids in document order
    order: Vec<NodeId>,
    /// NodeId -> position in `order`
    positions: HashMap<NodeId, usize>,
}

impl ProgramGraph {
    /// Builds and validates a graph from node and edge lists.
    ///
    /// Fails on duplicate ids, dangling edge endpoints, edges touching span
    /// nodes, handle/kind mismatches, broken `parentId` references, cyclic
    /// containment, and spans whose `wrappedNodeIds` disagree with the
    /// containment pointers. Dependency cycles are checked separately by
    /// [`ProgramGraph::check_acyclic`].
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, CoreError> {
        let mut graph = StableGraph::<Node, Edge, Directed, u32>::with_capacity(
            nodes.len(),
            edges.len(),
        );
        let mut indices = HashMap::with_capacity(nodes.len());
        let mut order = Vec::with_capacity(nodes.len());
        let mut positions = HashMap::with_capacity(nodes.len());

        for node in nodes {
            let id = node.id;
            if indices.contains_key(&id) {
                return Err(CoreError::DuplicateNode { id });
            }
            positions.insert(id, order.len());
            order.push(id);
            indices.insert(id, graph.add_node(node));
        }

        let mut edge_ids: HashSet<EdgeId> = HashSet::with_capacity(edges.len());
        for edge in edges {
            if !edge_ids.insert(edge.id) {
                return Err(CoreError::DuplicateEdge { id: edge.id });
            }
            let source = *indices
                .get(&edge.source)
                .ok_or(CoreError::NodeNotFound { id: edge.source })?;
            let target = *indices
                .get(&edge.target)
                .ok_or(CoreError::NodeNotFound { id: edge.target })?;
            if graph[source].is_span() || graph[target].is_span() {
                return Err(CoreError::InvalidEdge {
                    id: edge.id,
                    reason: "span nodes are containers and cannot be connected".into(),
                });
            }
            edge.check_handles()
                .map_err(|reason| CoreError::InvalidEdge { id: edge.id, reason })?;
            graph.add_edge(source, target, edge);
        }

        let program = ProgramGraph {
            graph,
            indices,
            order,
            positions,
        };
        program.validate_containment()?;
        Ok(program)
    }

    /// Builds a graph from its serialized document.
    pub fn from_document(doc: GraphDocument) -> Result<Self, CoreError> {
        Self::from_parts(doc.nodes, doc.edges)
    }

    /// Decodes and validates a JSON graph document.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Self::from_document(GraphDocument::from_json(json)?)
    }

    /// Returns the graph as a document, nodes and edges in their original order.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes().cloned().collect(),
            edges: self.edges().cloned().collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// Number of nodes, spans included.
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Looks up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.indices.get(&id).map(|&idx| &self.graph[idx])
    }

    /// Looks up a node by id, failing with [`CoreError::NodeNotFound`].
    pub fn require(&self, id: NodeId) -> Result<&Node, CoreError> {
        self.node(id).ok_or(CoreError::NodeNotFound { id })
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().map(move |id| &self.graph[self.indices[id]])
    }

    /// Position of a node in the document's node list.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// All edges in document order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        let mut indices: Vec<EdgeIndex<u32>> = self.graph.edge_indices().collect();
        indices.sort();
        indices.into_iter().map(move |idx| &self.graph[idx])
    }

    /// Edges entering `id`, in document order.
    pub fn incoming(&self, id: NodeId) -> Vec<&Edge> {
        self.adjacent(id, Direction::Incoming)
    }

    /// Edges leaving `id`, in document order.
    pub fn outgoing(&self, id: NodeId) -> Vec<&Edge> {
        self.adjacent(id, Direction::Outgoing)
    }

    fn adjacent(&self, id: NodeId, direction: Direction) -> Vec<&Edge> {
        let Some(&idx) = self.indices.get(&id) else {
            return Vec::new();
        };
        let mut refs: Vec<_> = self.graph.edges_directed(idx, direction).collect();
        refs.sort_by_key(|e| e.id());
        refs.into_iter().map(|e| e.weight()).collect()
    }

    // -----------------------------------------------------------------------
    // Containment queries
    // -----------------------------------------------------------------------

    /// The span directly containing `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent_id)
    }

    /// Enclosing spans of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(span) = current {
            chain.push(span);
            current = self.parent(span);
        }
        chain
    }

    /// Returns `true` if `id` lies inside `span`, at any depth.
    pub fn is_within(&self, id: NodeId, span: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == span {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Direct members of a container (`None` is the top level), in document order.
    pub fn children(&self, container: Option<NodeId>) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| n.parent_id == container)
            .map(|n| n.id)
            .collect()
    }

    /// All span nodes with their payloads, in document order.
    pub fn spans(&self) -> impl Iterator<Item = (&Node, &SpanNode)> + '_ {
        self.nodes().filter_map(|n| n.as_span().map(|s| (n, s)))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Rejects dependency cycles over data, flow and control edges.
    pub fn check_acyclic(&self) -> Result<(), CoreError> {
        petgraph::algo::toposort(&self.graph, None)
            .map(|_| ())
            .map_err(|cycle| CoreError::Cycle {
                node: self.graph[cycle.node_id()].id,
            })
    }

    fn validate_containment(&self) -> Result<(), CoreError> {
        for node in self.nodes() {
            if let Some(parent) = node.parent_id {
                let span = self.node(parent).ok_or(CoreError::SpanNotFound {
                    id: parent,
                    child: node.id,
                })?;
                if !span.is_span() {
                    return Err(CoreError::NotASpan { id: parent });
                }
            }
            // A chain longer than the node count must revisit a node.
            let mut depth = 0;
            let mut current = node.parent_id;
            while let Some(p) = current {
                depth += 1;
                if depth > self.order.len() {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("containment cycle through node {}", node.id),
                    });
                }
                current = self.parent(p);
            }
        }

        for (span_node, span) in self.spans() {
            for &wrapped in &span.wrapped_node_ids {
                let node = self.require(wrapped)?;
                if node.is_span() {
                    return Err(CoreError::InvalidSpan {
                        id: span_node.id,
                        reason: format!("wrappedNodeIds lists span {}", wrapped),
                    });
                }
            }
            let beneath: IndexSet<NodeId> = self
                .nodes()
                .filter(|n| !n.is_span() && self.is_within(n.id, span_node.id))
                .map(|n| n.id)
                .collect();
            let declared: HashSet<NodeId> = span.wrapped_node_ids.iter().copied().collect();
            let actual: HashSet<NodeId> = beneath.iter().copied().collect();
            if declared != actual {
                let mut missing: Vec<NodeId> = actual.difference(&declared).copied().collect();
                let mut stray: Vec<NodeId> = declared.difference(&actual).copied().collect();
                missing.sort();
                stray.sort();
                return Err(CoreError::GraphInconsistency {
                    reason: format!(
                        "span {} wrappedNodeIds disagree with parentId pointers \
                         (unlisted: {:?}, not contained: {:?})",
                        span_node.id, missing, stray
                    ),
                });
            }
        }
        Ok(())
    }
}
