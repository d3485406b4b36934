//! Property-based tests for graph invariants.

use dagrefly_graph::{DependencyGraph, EdgeKind, NodeId};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn node(i: usize) -> NodeId {
    format!("model.pkg.n{:02}", i)
}

/// Random graph: node count plus (from, to, is_test_edge) triples
fn arb_graph() -> impl Strategy<Value = DependencyGraph> {
    (1usize..14).prop_flat_map(|n| {
        vec((0..n, 0..n, prop::bool::weighted(0.2)), 0..n * 3).prop_map(move |edges| {
            let mut graph = DependencyGraph::new();
            for i in 0..n {
                graph.add_node(node(i));
            }
            for (from, to, test_only) in edges {
                let kind = if test_only { EdgeKind::ParentTest } else { EdgeKind::Dependency };
                graph.add_edge(&node(from), &node(to), kind).expect("endpoints exist");
            }
            graph
        })
    })
}

/// Random graph that is acyclic by construction (edges go low -> high)
fn arb_dag() -> impl Strategy<Value = DependencyGraph> {
    (2usize..16).prop_flat_map(|n| {
        vec((0..n, 0..n), 0..n * 3).prop_map(move |pairs| {
            let mut graph = DependencyGraph::new();
            for i in 0..n {
                graph.add_node(node(i));
            }
            for (a, b) in pairs {
                if a < b {
                    graph
                        .add_edge(&node(a), &node(b), EdgeKind::Dependency)
                        .expect("endpoints exist");
                }
            }
            graph
        })
    })
}

proptest! {
    /// find_cycle is None exactly when the grouped sort succeeds and covers every node once.
    #[test]
    fn cycle_iff_sort_fails(graph in arb_graph()) {
        let cycle = graph.find_cycle();
        match graph.topological_sort_grouped() {
            Ok(batches) => {
                prop_assert!(cycle.is_none());
                let flat: Vec<NodeId> = batches.into_iter().flatten().collect();
                let unique: BTreeSet<&NodeId> = flat.iter().collect();
                prop_assert_eq!(flat.len(), unique.len());
                prop_assert_eq!(flat.len(), graph.node_count());
            }
            Err(_) => prop_assert!(cycle.is_some()),
        }
    }

    /// A reported cycle is a real closed walk in the graph.
    #[test]
    fn reported_cycle_is_closed(graph in arb_graph()) {
        if let Some(cycle) = graph.find_cycle() {
            prop_assert!(!cycle.is_empty());
            for (i, from) in cycle.iter().enumerate() {
                let to = &cycle[(i + 1) % cycle.len()];
                prop_assert!(graph.edge_kind(from, to).is_some());
            }
        }
    }

    /// Batches respect every edge: a dependency is always emitted earlier.
    #[test]
    fn batches_respect_edges(graph in arb_dag()) {
        let batches = graph.topological_sort_grouped().expect("acyclic");
        let position = |id: &str| batches.iter().position(|b| b.iter().any(|n| n == id));
        for (from, to, _) in graph.edges() {
            prop_assert!(position(from.as_str()) < position(to.as_str()));
        }
    }

    /// Depth-bounded descendants grow monotonically toward the unbounded set.
    #[test]
    fn descendants_are_monotone_in_depth(graph in arb_graph(), k in 0usize..6) {
        for id in graph.nodes() {
            let shallow = graph.descendants(id, Some(k)).expect("known node");
            let deeper = graph.descendants(id, Some(k + 1)).expect("known node");
            let all = graph.descendants(id, None).expect("known node");
            prop_assert!(shallow.is_subset(&deeper));
            prop_assert!(deeper.is_subset(&all));
        }
    }

    /// The subset graph preserves reachability between subset members.
    #[test]
    fn subset_graph_preserves_reachability(graph in arb_graph(), mask in vec(any::<bool>(), 14)) {
        let subset: Vec<NodeId> = graph
            .nodes()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| mask[*i])
            .map(|(_, id)| id.clone())
            .collect();
        let reduced = graph.get_subset_graph(&subset);

        for u in &subset {
            let full: BTreeSet<NodeId> = graph
                .descendants(u, None)
                .expect("known node")
                .into_iter()
                .filter(|v| subset.contains(v))
                .collect();
            let sub = reduced.descendants(u, None).expect("known node");
            prop_assert_eq!(full, sub);
        }
    }

    /// Selection equals the union of per-node descendants.
    #[test]
    fn select_children_is_union_of_descendants(
        graph in arb_graph(),
        picks in vec(0usize..14, 0..5),
        depth in prop::option::of(1usize..4),
    ) {
        let selected: Vec<NodeId> = picks.iter().map(|i| node(*i)).collect();
        let mut expected = BTreeSet::new();
        for id in &selected {
            if let Ok(desc) = graph.descendants(id, depth) {
                expected.extend(desc);
            }
        }
        prop_assert_eq!(graph.select_children(&selected, depth), expected);
    }
}
