//! Span containment forest and the new-span maintenance algorithm.
//!
//! [`SpanForest`] is an arena of [`SpanRecord`]s keyed by span id. Parent
//! links are stored on the records; children, roots and ancestry are derived
//! by index, so reparenting a span is a single field rewrite.
//!
//! [`apply_new_span`] runs each time the author carves a new span out of the
//! graph. It picks the tightest enclosing span as the parent, adopts the
//! spans and nodes that now sit directly under the new span, and leaves
//! anything owned by an unrelated span alone. The returned node list always
//! passes [`ProgramGraph`](crate::graph::ProgramGraph) validation.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::{Node, NodeKind, Position, Size, SpanNode};

/// Padding between a new span's border and the items it adopts.
pub const SPAN_PADDING: f64 = 20.0;

/// Size assumed for adopted items that carry no explicit size.
pub const DEFAULT_NODE_SIZE: Size = Size {
    width: 150.0,
    height: 40.0,
};

/// One span in the containment forest.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    /// Non-span nodes contained at any depth.
    pub wrapped: IndexSet<NodeId>,
}

/// Arena of span records in document order.
#[derive(Debug, Clone, Default)]
pub struct SpanForest {
    spans: IndexMap<NodeId, SpanRecord>,
}

impl SpanForest {
    /// Collects every span node of `nodes` into a forest.
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let spans = nodes
            .iter()
            .filter_map(|node| {
                node.as_span().map(|span| {
                    (
                        node.id,
                        SpanRecord {
                            id: node.id,
                            name: span.name.clone(),
                            parent: node.parent_id,
                            wrapped: span.wrapped_node_ids.clone(),
                        },
                    )
                })
            })
            .collect();
        SpanForest { spans }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&SpanRecord> {
        self.spans.get(&id)
    }

    /// Records in document order.
    pub fn iter(&self) -> impl Iterator<Item = &SpanRecord> + '_ {
        self.spans.values()
    }

    /// Spans whose parent is `parent` (`None` for roots), in document order.
    pub fn children(&self, parent: Option<NodeId>) -> Vec<NodeId> {
        self.spans
            .values()
            .filter(|s| s.parent == parent)
            .map(|s| s.id)
            .collect()
    }

    /// Spans with no enclosing span.
    pub fn roots(&self) -> Vec<NodeId> {
        self.children(None)
    }

    /// Enclosing spans of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.spans.get(&id).and_then(|s| s.parent);
        while let Some(p) = current {
            if chain.contains(&p) {
                break;
            }
            chain.push(p);
            current = self.spans.get(&p).and_then(|s| s.parent);
        }
        chain
    }

    /// The span with the fewest wrapped nodes among those wrapping a strict
    /// superset of `wrapped`. Ties go to the span listed first.
    pub fn tightest_enclosing(&self, wrapped: &IndexSet<NodeId>) -> Option<NodeId> {
        self.spans
            .values()
            .filter(|s| s.wrapped.len() > wrapped.len() && wrapped.is_subset(&s.wrapped))
            .min_by_key(|s| s.wrapped.len())
            .map(|s| s.id)
    }

    /// Rewrites a span's parent pointer.
    pub fn reparent(&mut self, id: NodeId, parent: Option<NodeId>) {
        if let Some(record) = self.spans.get_mut(&id) {
            record.parent = parent;
        }
    }
}

/// A span the author is about to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSpan {
    pub id: NodeId,
    pub name: String,
    /// The nodes the author selected.
    pub wrapped: IndexSet<NodeId>,
}

/// Inserts a new span over `new_span.wrapped` and returns the updated nodes.
///
/// 1. The parent is the tightest existing span wrapping a strict superset of
///    the selection; with none the new span is a root.
/// 2. Existing spans wrapped entirely by the selection whose parent is that
///    same parent move under the new span.
/// 3. Selected nodes move under the new span only if they had no span or
///    had exactly the chosen parent. Nodes owned by an unrelated span stay
///    put and are dropped from the new span's wrapped set.
/// 4. The new span is sized to the bounding box of what it adopted, and the
///    adopted items' positions become relative to it.
pub fn apply_new_span(nodes: &[Node], new_span: NewSpan) -> Result<Vec<Node>, CoreError> {
    let by_id: HashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();

    if by_id.contains_key(&new_span.id) {
        return Err(CoreError::DuplicateNode { id: new_span.id });
    }
    if new_span.wrapped.is_empty() {
        return Err(CoreError::InvalidSpan {
            id: new_span.id,
            reason: "a span must wrap at least one node".into(),
        });
    }
    for &id in &new_span.wrapped {
        let idx = *by_id.get(&id).ok_or(CoreError::NodeNotFound { id })?;
        if nodes[idx].is_span() {
            return Err(CoreError::InvalidSpan {
                id: new_span.id,
                reason: format!("node {} is a span; select the nodes it wraps instead", id),
            });
        }
    }

    let mut forest = SpanForest::from_nodes(nodes);
    let parent = forest.tightest_enclosing(&new_span.wrapped);

    // Step 2: adopt the maximal spans inside the selection.
    let adopted_spans: Vec<NodeId> = forest
        .iter()
        .filter(|s| s.parent == parent && s.wrapped.is_subset(&new_span.wrapped))
        .map(|s| s.id)
        .collect();
    for &span in &adopted_spans {
        forest.reparent(span, Some(new_span.id));
    }

    // Step 3: adopt unowned nodes and nodes owned by the chosen parent.
    let adopted_nodes: Vec<NodeId> = new_span
        .wrapped
        .iter()
        .copied()
        .filter(|id| nodes[by_id[id]].parent_id == parent)
        .collect();

    let mut updated: Vec<Node> = nodes.to_vec();
    let adopted: HashSet<NodeId> = adopted_spans.iter().chain(&adopted_nodes).copied().collect();
    for node in updated.iter_mut().filter(|n| adopted.contains(&n.id)) {
        node.parent_id = Some(new_span.id);
    }

    // Nodes whose new ancestry does not reach the span stay outside it.
    let parent_of: HashMap<NodeId, Option<NodeId>> =
        updated.iter().map(|n| (n.id, n.parent_id)).collect();
    let reaches_new_span = |id: NodeId| {
        let mut current = parent_of.get(&id).copied().flatten();
        let mut steps = 0;
        while let Some(p) = current {
            if p == new_span.id {
                return true;
            }
            steps += 1;
            if steps > parent_of.len() {
                return false;
            }
            current = parent_of.get(&p).copied().flatten();
        }
        false
    };
    let wrapped: IndexSet<NodeId> = new_span
        .wrapped
        .iter()
        .copied()
        .filter(|&id| reaches_new_span(id))
        .collect();
    if wrapped.is_empty() {
        return Err(CoreError::InvalidSpan {
            id: new_span.id,
            reason: "every selected node belongs to an unrelated span".into(),
        });
    }

    // Step 4: layout.
    let (position, size) = layout_over(&mut updated, &adopted);

    let mut span_node = Node::new(
        new_span.id,
        NodeKind::Span(SpanNode {
            name: new_span.name,
            wrapped_node_ids: wrapped,
        }),
    );
    span_node.parent_id = parent;
    span_node.position = position;
    span_node.size = size;

    // Parents precede their children in the node list.
    let insert_at = updated
        .iter()
        .position(|n| adopted.contains(&n.id))
        .unwrap_or(updated.len());
    updated.insert(insert_at, span_node);
    Ok(updated)
}

/// Computes the padded bounding box of the adopted items and rebases their
/// positions onto it. Items without a position are ignored; if none has
/// one, the span gets no layout.
fn layout_over(nodes: &mut [Node], adopted: &HashSet<NodeId>) -> (Option<Position>, Option<Size>) {
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    for node in nodes.iter().filter(|n| adopted.contains(&n.id)) {
        let Some(pos) = node.position else { continue };
        let size = node.size.unwrap_or(DEFAULT_NODE_SIZE);
        let (x1, y1) = (pos.x + size.width, pos.y + size.height);
        bounds = Some(match bounds {
            None => (pos.x, pos.y, x1, y1),
            Some((a, b, c, d)) => (a.min(pos.x), b.min(pos.y), c.max(x1), d.max(y1)),
        });
    }

    let Some((min_x, min_y, max_x, max_y)) = bounds else {
        return (None, None);
    };
    let origin = Position {
        x: min_x - SPAN_PADDING,
        y: min_y - SPAN_PADDING,
    };
    for node in nodes.iter_mut().filter(|n| adopted.contains(&n.id)) {
        if let Some(pos) = node.position.as_mut() {
            pos.x -= origin.x;
            pos.y -= origin.y;
        }
    }
    let size = Size {
        width: max_x - min_x + 2.0 * SPAN_PADDING,
        height: max_y - min_y + 2.0 * SPAN_PADDING,
    };
    (Some(origin), Some(size))
}
