//! Dependency scheduling of lowering units.
//!
//! The program is built back to front: a unit is lowered only after every
//! unit that consumes it, so its expression can be placed into the
//! already-built consumers. This is Kahn's algorithm run over the reversed
//! dependency graph.

use std::collections::{BinaryHeap, HashMap};

use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use tracegraph_core::NodeId;

use crate::error::CodegenError;

/// Orders `units` consumers-first.
///
/// `edges` are `(producer, consumer)` pairs between units; pairs naming a
/// unit outside `units` are ignored. Among simultaneously eligible units the
/// one with the highest `rank` goes first, which puts independent units in
/// ascending rank order once the program is assembled front to back.
///
/// Units left over when no unit is eligible form a cycle and are reported
/// as [`CodegenError::UnitCycle`].
pub fn schedule(
    units: &[NodeId],
    edges: &[(NodeId, NodeId)],
    rank: impl Fn(NodeId) -> usize,
) -> Result<Vec<NodeId>, CodegenError> {
    let mut deps: DiGraphMap<NodeId, ()> = DiGraphMap::with_capacity(units.len(), edges.len());
    for &unit in units {
        deps.add_node(unit);
    }
    for &(producer, consumer) in edges {
        if producer != consumer && deps.contains_node(producer) && deps.contains_node(consumer) {
            deps.add_edge(producer, consumer, ());
        }
    }

    // Pending consumers per unit
    let mut pending: HashMap<NodeId, usize> = units
        .iter()
        .map(|&u| (u, deps.neighbors_directed(u, Direction::Outgoing).count()))
        .collect();

    let mut ready: BinaryHeap<(usize, NodeId)> = pending
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&u, _)| (rank(u), u))
        .collect();

    let mut order = Vec::with_capacity(units.len());
    while let Some((_, unit)) = ready.pop() {
        order.push(unit);
        for producer in deps.neighbors_directed(unit, Direction::Incoming) {
            if let Some(count) = pending.get_mut(&producer) {
                *count -= 1;
                if *count == 0 {
                    ready.push((rank(producer), producer));
                }
            }
        }
    }

    if order.len() != pending.len() {
        let mut stuck: Vec<NodeId> = units
            .iter()
            .copied()
            .filter(|u| !order.contains(u))
            .collect();
        stuck.sort_by_key(|&u| rank(u));
        stuck.dedup();
        return Err(CodegenError::UnitCycle { units: stuck });
    }

    Ok(order)
}
