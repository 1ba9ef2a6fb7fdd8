// Property-based tests for span containment.
//
// Random sequences of span creations over a fixed set of call nodes. After
// every accepted creation the containment forest must still validate, the
// new span must sit under the tightest enclosing span, and nothing outside
// the selection may move.
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use std::collections::HashMap;

use indexmap::IndexSet;
use proptest::prelude::*;

use tracegraph_core::{
    apply_new_span, CallNode, NewSpan, Node, NodeId, NodeKind, ProgramGraph, SpanForest,
};

// ── Generators ──────────────────────────────────────────────────────────────

fn arb_session() -> impl Strategy<Value = (usize, Vec<Vec<bool>>)> {
    (2usize..9).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec(prop::collection::vec(prop::bool::ANY, n), 1..6),
        )
    })
}

fn calls(n: usize) -> Vec<Node> {
    (0..n as u32)
        .map(|i| Node::new(NodeId(i), NodeKind::Call(CallNode::variadic(format!("f{}", i)))))
        .collect()
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn containment_stays_a_consistent_forest((n, selections) in arb_session()) {
        let mut nodes = calls(n);
        let mut next_span = 100u32;

        for picks in selections {
            let wrapped: IndexSet<NodeId> = picks
                .iter()
                .enumerate()
                .filter(|(_, &picked)| picked)
                .map(|(i, _)| NodeId(i as u32))
                .collect();
            let id = NodeId(next_span);
            let expected_parent = SpanForest::from_nodes(&nodes).tightest_enclosing(&wrapped);
            let before: HashMap<NodeId, Node> = nodes.iter().map(|n| (n.id, n.clone())).collect();

            let request = NewSpan { id, name: format!("s{}", id), wrapped: wrapped.clone() };
            let Ok(updated) = apply_new_span(&nodes, request) else {
                continue;
            };
            next_span += 1;

            // The forest still validates as a whole.
            prop_assert!(ProgramGraph::from_parts(updated.clone(), vec![]).is_ok());
            prop_assert_eq!(updated.len(), nodes.len() + 1);

            let created = updated.iter().find(|n| n.id == id).unwrap();
            prop_assert_eq!(created.parent_id, expected_parent);
            let span = created.as_span().unwrap();
            prop_assert!(!span.wrapped_node_ids.is_empty());
            prop_assert!(span.wrapped_node_ids.iter().all(|w| wrapped.contains(w)));

            for node in &updated {
                if node.id == id {
                    continue;
                }
                let old = &before[&node.id];
                // Only adoption by the new span changes a parent.
                if node.parent_id != old.parent_id {
                    prop_assert_eq!(node.parent_id, Some(id));
                    prop_assert_eq!(old.parent_id, expected_parent);
                }
                // Existing spans keep their wrapped sets.
                prop_assert_eq!(node.as_span(), old.as_span());
            }

            nodes = updated;
        }
    }

    #[test]
    fn selecting_an_existing_span_subset_nests_inside_it((n, picks) in (3usize..9).prop_flat_map(|n| (Just(n), prop::collection::vec(prop::bool::ANY, n)))) {
        // A root span over everything, then a strict, non-empty subset.
        let all: IndexSet<NodeId> = (0..n as u32).map(NodeId).collect();
        let nodes = apply_new_span(
            &calls(n),
            NewSpan { id: NodeId(100), name: "all".into(), wrapped: all },
        )
        .unwrap();

        let subset: IndexSet<NodeId> = picks
            .iter()
            .enumerate()
            .filter(|(_, &picked)| picked)
            .map(|(i, _)| NodeId(i as u32))
            .collect();
        prop_assume!(!subset.is_empty() && subset.len() < n);

        let updated = apply_new_span(
            &nodes,
            NewSpan { id: NodeId(200), name: "part".into(), wrapped: subset.clone() },
        )
        .unwrap();
        let created = updated.iter().find(|n| n.id == NodeId(200)).unwrap();
        prop_assert_eq!(created.parent_id, Some(NodeId(100)));
        prop_assert_eq!(&created.as_span().unwrap().wrapped_node_ids, &subset);
    }
}
