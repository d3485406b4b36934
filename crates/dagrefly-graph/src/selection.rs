//! Selection expansion over the dependency graph
//!
//! Selections come from external selectors, so unknown ids are skipped
//! rather than reported.

use std::collections::{BTreeSet, HashMap, VecDeque};
use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;
use crate::graph::{DependencyGraph, NodeId};

impl DependencyGraph {
    /// Union of `descendants(s, max_depth)` over every selected node
    ///
    /// A selected node is part of the result only when another selected
    /// node reaches it.
    pub fn select_children<I>(&self, selected: I, max_depth: Option<usize>) -> BTreeSet<NodeId>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.select_related(selected, Direction::Outgoing, max_depth)
    }

    /// Union of `ancestors(s, max_depth)` over every selected node
    pub fn select_parents<I>(&self, selected: I, max_depth: Option<usize>) -> BTreeSet<NodeId>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.select_related(selected, Direction::Incoming, max_depth)
    }

    /// Two-sided expansion (`@` selector): children plus all their parents
    pub fn select_childrens_parents<I>(&self, selected: I) -> BTreeSet<NodeId>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let selected: Vec<NodeId> = selected
            .into_iter()
            .filter(|id| self.contains(id.as_ref()))
            .map(|id| id.as_ref().to_string())
            .collect();

        let mut ancestors_for = self.select_children(&selected, None);
        ancestors_for.extend(selected);

        let mut result = self.select_parents(&ancestors_for, None);
        result.extend(ancestors_for);
        result
    }

    /// Union of direct successors (all edge kinds)
    pub fn select_successors<I>(&self, selected: I) -> BTreeSet<NodeId>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        selected
            .into_iter()
            .filter_map(|id| self.successors(id.as_ref()).ok())
            .flatten()
            .cloned()
            .collect()
    }

    /// Multi-source BFS that keeps the two nearest distinct origins per node.
    ///
    /// Labels arrive in nondecreasing distance, so two are enough to know the
    /// nearest origin other than the node itself. Total work is linear in the
    /// size of the graph.
    fn select_related<I>(
        &self,
        selected: I,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> BTreeSet<NodeId>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut origins: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        let mut queue = VecDeque::new();

        for id in selected {
            if let Some(idx) = self.lookup(id.as_ref()) {
                let labels = origins.entry(idx).or_default();
                if !labels.contains(&idx) {
                    labels.push(idx);
                    queue.push_back((idx, idx, 0usize));
                }
            }
        }

        while let Some((node, origin, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }

            for next in self.traversable_neighbors(node, direction) {
                let labels = origins.entry(next).or_default();
                if labels.len() < 2 && !labels.contains(&origin) {
                    labels.push(origin);
                    queue.push_back((next, origin, depth + 1));
                }
            }
        }

        origins
            .into_iter()
            .filter(|(node, labels)| labels.iter().any(|origin| origin != node))
            .map(|(node, _)| self.id_of(node).clone())
            .collect()
    }
}
