//! Dependency graph (DAG) storage and traversal
//!
//! Nodes are artifact identities stored in a `StableDiGraph` arena with an
//! identity -> index table. Edges point from a dependency to its dependent.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// Node identifier (`<resource_type>.<package>.<name>`)
pub type NodeId = String;

/// Edge tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Regular dependency edge
    #[default]
    #[serde(rename = "")]
    Dependency,

    /// Orders a test before a downstream node; invisible to traversals
    #[serde(rename = "parent_test")]
    ParentTest,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dependency => "",
            Self::ParentTest => "parent_test",
        }
    }

    /// Whether ancestor/descendant traversals follow this edge
    pub fn is_traversable(&self) -> bool {
        matches!(self, Self::Dependency)
    }
}

/// Graph error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Dependency cycle detected: {}", format_cycle(.0))]
    Cycle(Vec<NodeId>),
}

fn format_cycle(cycle: &[NodeId]) -> String {
    match cycle.first() {
        Some(first) => format!("{} --> {}", cycle.join(" --> "), first),
        None => "<unknown>".to_string(),
    }
}

/// Directed dependency graph over artifact identities
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: StableDiGraph<NodeId, EdgeKind>,
    indices: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(from, to)` dependency pairs, creating nodes as needed
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut graph = Self::new();
        for (from, to) in edges {
            let a = graph.ensure_node(from);
            let b = graph.ensure_node(to);
            graph.upsert_edge(a, b, EdgeKind::Dependency);
        }
        graph
    }

    /// Add a node; returns false if it was already present
    pub fn add_node(&mut self, id: impl Into<NodeId>) -> bool {
        let id = id.into();
        if self.indices.contains_key(&id) {
            return false;
        }
        let idx = self.graph.add_node(id.clone());
        self.indices.insert(id, idx);
        true
    }

    /// Remove a node and all its incident edges; returns false if absent
    pub fn remove_node(&mut self, id: &str) -> bool {
        match self.indices.remove(id) {
            Some(idx) => {
                self.graph.remove_node(idx);
                true
            }
            None => false,
        }
    }

    /// Add an edge `from -> to`, replacing the kind of an existing one
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> Result<(), GraphError> {
        let a = self.index(from)?;
        let b = self.index(to)?;
        self.upsert_edge(a, b, kind);
        Ok(())
    }

    /// Remove the edge `from -> to`; returns false if there was none
    pub fn remove_edge(&mut self, from: &str, to: &str) -> Result<bool, GraphError> {
        let a = self.index(from)?;
        let b = self.index(to)?;
        Ok(match self.graph.find_edge(a, b) {
            Some(edge) => self.graph.remove_edge(edge).is_some(),
            None => false,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.indices.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All nodes, sorted by identity
    pub fn nodes(&self) -> Vec<&NodeId> {
        let mut nodes: Vec<&NodeId> = self.indices.keys().collect();
        nodes.sort();
        nodes
    }

    /// All edges as sorted `(from, to, kind)` triples
    pub fn edges(&self) -> Vec<(&NodeId, &NodeId, EdgeKind)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()], *e.weight()))
            .collect();
        edges.sort();
        edges
    }

    pub fn edge_kind(&self, from: &str, to: &str) -> Option<EdgeKind> {
        let a = *self.indices.get(from)?;
        let b = *self.indices.get(to)?;
        self.graph
            .find_edge(a, b)
            .and_then(|e| self.graph.edge_weight(e))
            .copied()
    }

    /// Direct dependents of a node (all edge kinds), sorted
    pub fn successors(&self, id: &str) -> Result<Vec<&NodeId>, GraphError> {
        let idx = self.index(id)?;
        Ok(self.sorted_neighbors(idx, Direction::Outgoing)
            .into_iter()
            .map(|n| &self.graph[n])
            .collect())
    }

    /// Direct dependencies of a node (all edge kinds), sorted
    pub fn predecessors(&self, id: &str) -> Result<Vec<&NodeId>, GraphError> {
        let idx = self.index(id)?;
        Ok(self.sorted_neighbors(idx, Direction::Incoming)
            .into_iter()
            .map(|n| &self.graph[n])
            .collect())
    }

    pub fn in_degree(&self, id: &str) -> Result<usize, GraphError> {
        let idx = self.index(id)?;
        Ok(self.graph.edges_directed(idx, Direction::Incoming).count())
    }

    pub fn out_degree(&self, id: &str) -> Result<usize, GraphError> {
        let idx = self.index(id)?;
        Ok(self.graph.edges_directed(idx, Direction::Outgoing).count())
    }

    /// Find one cycle, if any
    ///
    /// Depth-first search that explores roots and neighbors in identity
    /// order, so the same graph always yields the same cycle. All edge kinds
    /// count. A self-loop is reported as a single-element cycle.
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Active,
            Done,
        }

        let mut marks: HashMap<NodeIndex, Mark> = HashMap::new();

        for root in self.sorted_indices() {
            if marks.contains_key(&root) {
                continue;
            }

            marks.insert(root, Mark::Active);
            let mut stack = vec![(root, self.pending_neighbors(root))];

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                match top.1.pop() {
                    Some(next) => match marks.get(&next) {
                        Some(Mark::Active) => {
                            let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                            return Some(
                                stack[start..]
                                    .iter()
                                    .map(|(n, _)| self.graph[*n].clone())
                                    .collect(),
                            );
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(next, Mark::Active);
                            stack.push((next, self.pending_neighbors(next)));
                        }
                    },
                    None => {
                        marks.insert(node, Mark::Done);
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    /// Nodes upstream of `id`, up to `max_depth` hops (1 = direct parents)
    pub fn ancestors(
        &self,
        id: &str,
        max_depth: Option<usize>,
    ) -> Result<BTreeSet<NodeId>, GraphError> {
        let idx = self.index(id)?;
        Ok(self.bfs(idx, Direction::Incoming, max_depth))
    }

    /// Nodes downstream of `id`, up to `max_depth` hops (1 = direct children)
    ///
    /// This is the "blast radius" - everything affected if this node changes.
    pub fn descendants(
        &self,
        id: &str,
        max_depth: Option<usize>,
    ) -> Result<BTreeSet<NodeId>, GraphError> {
        let idx = self.index(id)?;
        Ok(self.bfs(idx, Direction::Outgoing, max_depth))
    }

    /// Check if there's a traversable path from `source` to `target`
    pub fn has_path(&self, source: &str, target: &str) -> Result<bool, GraphError> {
        self.index(target)?;
        Ok(self.descendants(source, None)?.contains(target))
    }

    /// Topological batches for parallel execution
    ///
    /// Each batch holds every node whose predecessors were all emitted in
    /// earlier batches; batches are sorted by identity. All edge kinds count.
    pub fn topological_sort_grouped(&self) -> Result<Vec<Vec<NodeId>>, GraphError> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.graph.edges_directed(idx, Direction::Incoming).count()))
            .collect();

        let mut current: Vec<NodeIndex> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| *idx)
            .collect();

        let mut batches = Vec::new();
        let mut emitted = 0;

        while !current.is_empty() {
            self.sort_by_id(&mut current);

            let mut next = Vec::new();
            for &node in &current {
                for succ in self.graph.neighbors_directed(node, Direction::Outgoing) {
                    if let Some(degree) = in_degree.get_mut(&succ) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(succ);
                        }
                    }
                }
            }

            emitted += current.len();
            batches.push(current.iter().map(|idx| self.graph[*idx].clone()).collect());
            current = next;
        }

        if emitted != self.graph.node_count() {
            return Err(GraphError::Cycle(self.find_cycle().unwrap_or_default()));
        }

        Ok(batches)
    }

    /// Graph induced on `subset`, plus synthesized edges preserving reachability
    ///
    /// An edge `(u, v)` is added whenever the full graph has a path from `u`
    /// to `v` whose inner nodes all lie outside the subset. The edge is a
    /// `Dependency` when such a path uses only dependency edges, otherwise
    /// `ParentTest`. Unknown ids in `subset` are ignored.
    pub fn get_subset_graph<I>(&self, subset: I) -> DependencyGraph
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let members = self.member_indices(subset);
        let mut ordered: Vec<NodeIndex> = members.iter().copied().collect();
        self.sort_by_id(&mut ordered);

        let mut result = DependencyGraph::new();
        for &idx in &ordered {
            result.add_node(self.graph[idx].clone());
        }

        for &u in &ordered {
            let via_dependencies = self.reachable_members(u, &members, true);
            let via_any = self.reachable_members(u, &members, false);

            for v in via_any {
                let kind = if via_dependencies.contains(&v) {
                    EdgeKind::Dependency
                } else {
                    EdgeKind::ParentTest
                };
                let a = result.indices[&self.graph[u]];
                let b = result.indices[&self.graph[v]];
                result.upsert_edge(a, b, kind);
            }
        }

        tracing::debug!(
            "Subset graph: {} nodes, {} edges (from {} nodes)",
            result.node_count(),
            result.edge_count(),
            self.node_count()
        );

        result
    }

    /// Plain induced subgraph: nodes in `subset` and the edges between them
    pub fn subgraph<I>(&self, subset: I) -> DependencyGraph
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let members = self.member_indices(subset);
        let mut ordered: Vec<NodeIndex> = members.iter().copied().collect();
        self.sort_by_id(&mut ordered);

        let mut result = DependencyGraph::new();
        for &idx in &ordered {
            result.add_node(self.graph[idx].clone());
        }

        for edge in self.graph.edge_references() {
            if members.contains(&edge.source()) && members.contains(&edge.target()) {
                let a = result.indices[&self.graph[edge.source()]];
                let b = result.indices[&self.graph[edge.target()]];
                result.upsert_edge(a, b, *edge.weight());
            }
        }

        result
    }

    pub(crate) fn index(&self, id: &str) -> Result<NodeIndex, GraphError> {
        self.indices
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    pub(crate) fn lookup(&self, id: &str) -> Option<NodeIndex> {
        self.indices.get(id).copied()
    }

    pub(crate) fn id_of(&self, idx: NodeIndex) -> &NodeId {
        &self.graph[idx]
    }

    /// Neighbors reachable over traversable edges in `direction`
    pub(crate) fn traversable_neighbors(
        &self,
        idx: NodeIndex,
        direction: Direction,
    ) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .edges_directed(idx, direction)
            .filter(|e| e.weight().is_traversable())
            .map(move |e| match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
    }

    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.indices.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.indices.insert(id.to_string(), idx);
        idx
    }

    fn upsert_edge(&mut self, a: NodeIndex, b: NodeIndex, kind: EdgeKind) {
        match self.graph.find_edge(a, b) {
            Some(edge) => {
                if let Some(weight) = self.graph.edge_weight_mut(edge) {
                    *weight = kind;
                }
            }
            None => {
                self.graph.add_edge(a, b, kind);
            }
        }
    }

    fn sort_by_id(&self, indices: &mut [NodeIndex]) {
        indices.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
    }

    fn sorted_indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        self.sort_by_id(&mut indices);
        indices
    }

    fn sorted_neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
        self.sort_by_id(&mut neighbors);
        neighbors
    }

    /// Successors in reverse identity order, so popping yields the lowest first
    fn pending_neighbors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut neighbors = self.sorted_neighbors(idx, Direction::Outgoing);
        neighbors.reverse();
        neighbors
    }

    fn member_indices<I>(&self, subset: I) -> HashSet<NodeIndex>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        subset
            .into_iter()
            .filter_map(|id| self.lookup(id.as_ref()))
            .collect()
    }

    fn bfs(
        &self,
        start: NodeIndex,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> BTreeSet<NodeId> {
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut result = BTreeSet::new();

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }

            for next in self.traversable_neighbors(current, direction) {
                if visited.insert(next) {
                    result.insert(self.graph[next].clone());
                    queue.push_back((next, depth + 1));
                }
            }
        }

        result
    }

    /// Subset members reachable from `start` through non-members only
    fn reachable_members(
        &self,
        start: NodeIndex,
        members: &HashSet<NodeIndex>,
        dependencies_only: bool,
    ) -> HashSet<NodeIndex> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        let mut reached = HashSet::new();

        while let Some(current) = queue.pop_front() {
            for edge in self.graph.edges_directed(current, Direction::Outgoing) {
                if dependencies_only && !edge.weight().is_traversable() {
                    continue;
                }
                let next = edge.target();
                if members.contains(&next) {
                    reached.insert(next);
                } else if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        reached
    }
}

impl PartialEq for DependencyGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes() == other.nodes() && self.edges() == other.edges()
    }
}

impl Eq for DependencyGraph {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(items: &[&str]) -> BTreeSet<NodeId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn diamond() -> DependencyGraph {
        // a -> b -> d, a -> c -> d
        DependencyGraph::from_edges([("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")])
    }

    #[test]
    fn add_and_remove_nodes() {
        let mut graph = DependencyGraph::new();
        assert!(graph.add_node("model.shop.orders"));
        assert!(!graph.add_node("model.shop.orders"));
        assert_eq!(graph.node_count(), 1);

        assert!(graph.remove_node("model.shop.orders"));
        assert!(!graph.remove_node("model.shop.orders"));
        assert!(graph.is_empty());
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut graph = diamond();
        assert_eq!(graph.edge_count(), 4);

        graph.remove_node("b");
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.successors("a").unwrap(), vec!["c"]);
    }

    #[test]
    fn add_edge_requires_both_endpoints() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a");

        let err = graph.add_edge("a", "missing", EdgeKind::Dependency).unwrap_err();
        assert_eq!(err, GraphError::UnknownNode("missing".to_string()));
        let err = graph.add_edge("missing", "a", EdgeKind::Dependency).unwrap_err();
        assert_eq!(err, GraphError::UnknownNode("missing".to_string()));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn repeated_edge_replaces_kind() {
        let mut graph = DependencyGraph::from_edges([("a", "b")]);
        graph.add_edge("a", "b", EdgeKind::ParentTest).unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_kind("a", "b"), Some(EdgeKind::ParentTest));
    }

    #[test]
    fn degrees_and_neighbors() {
        let graph = diamond();
        assert_eq!(graph.in_degree("d").unwrap(), 2);
        assert_eq!(graph.out_degree("a").unwrap(), 2);
        assert_eq!(graph.predecessors("d").unwrap(), vec!["b", "c"]);
        assert!(matches!(graph.in_degree("zzz"), Err(GraphError::UnknownNode(_))));
    }

    #[test]
    fn no_cycle_in_dag() {
        assert_eq!(diamond().find_cycle(), None);
    }

    #[test]
    fn detects_self_loop() {
        let graph = DependencyGraph::from_edges([("a", "a")]);
        assert_eq!(graph.find_cycle(), Some(vec!["a".to_string()]));
    }

    #[test]
    fn detects_multi_node_cycle_deterministically() {
        let graph = DependencyGraph::from_edges([("x", "a"), ("a", "b"), ("b", "c"), ("c", "a")]);
        let cycle = graph.find_cycle();
        assert_eq!(cycle, Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]));

        // Same structure, different insertion order
        let graph = DependencyGraph::from_edges([("c", "a"), ("b", "c"), ("a", "b"), ("x", "a")]);
        assert_eq!(graph.find_cycle(), cycle);
    }

    #[test]
    fn bounded_traversal() {
        let graph = DependencyGraph::from_edges([("a", "b"), ("b", "c"), ("c", "d")]);

        assert_eq!(graph.descendants("a", Some(1)).unwrap(), ids(&["b"]));
        assert_eq!(graph.descendants("a", Some(2)).unwrap(), ids(&["b", "c"]));
        assert_eq!(graph.descendants("a", None).unwrap(), ids(&["b", "c", "d"]));
        assert_eq!(graph.ancestors("d", Some(1)).unwrap(), ids(&["c"]));
        assert_eq!(graph.ancestors("d", None).unwrap(), ids(&["a", "b", "c"]));
        assert_eq!(graph.descendants("a", Some(0)).unwrap(), ids(&[]));
    }

    #[test]
    fn traversal_excludes_start_and_terminates_on_cycles() {
        let graph = DependencyGraph::from_edges([("a", "b"), ("b", "a")]);
        assert_eq!(graph.descendants("a", None).unwrap(), ids(&["b"]));
        assert_eq!(graph.ancestors("a", None).unwrap(), ids(&["b"]));
    }

    #[test]
    fn traversal_skips_parent_test_edges() {
        let mut graph =
            DependencyGraph::from_edges([("model.a", "test.t"), ("model.a", "model.b")]);
        graph.add_edge("test.t", "model.b", EdgeKind::ParentTest).unwrap();

        assert_eq!(graph.descendants("test.t", None).unwrap(), ids(&[]));
        assert_eq!(graph.ancestors("model.b", None).unwrap(), ids(&["model.a"]));
        assert!(!graph.has_path("test.t", "model.b").unwrap());
    }

    #[test]
    fn traversal_of_unknown_node_fails() {
        let graph = diamond();
        assert!(matches!(graph.ancestors("nope", None), Err(GraphError::UnknownNode(_))));
        assert!(matches!(graph.descendants("nope", Some(1)), Err(GraphError::UnknownNode(_))));
    }

    #[test]
    fn grouped_topological_sort() {
        let batches = diamond().topological_sort_grouped().unwrap();
        assert_eq!(
            batches,
            vec![
                vec!["a".to_string()],
                vec!["b".to_string(), "c".to_string()],
                vec!["d".to_string()],
            ]
        );
    }

    #[test]
    fn grouped_sort_respects_parent_test_edges() {
        let mut graph = DependencyGraph::from_edges([("a", "t"), ("a", "b")]);
        graph.add_edge("t", "b", EdgeKind::ParentTest).unwrap();

        let batches = graph.topological_sort_grouped().unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1], vec!["t".to_string()]);
    }

    #[test]
    fn grouped_sort_fails_on_cycle() {
        let graph = DependencyGraph::from_edges([("a", "b"), ("b", "a"), ("root", "a")]);
        let err = graph.topological_sort_grouped().unwrap_err();
        assert_eq!(err, GraphError::Cycle(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(err.to_string(), "Dependency cycle detected: a --> b --> a");
    }

    #[test]
    fn empty_graph_sorts_to_nothing() {
        let graph = DependencyGraph::new();
        assert_eq!(graph.topological_sort_grouped().unwrap(), Vec::<Vec<NodeId>>::new());
        assert_eq!(graph.find_cycle(), None);
    }

    #[test]
    fn subset_graph_synthesizes_transitive_edges() {
        let graph = DependencyGraph::from_edges([("a", "b"), ("b", "c"), ("c", "d")]);
        let subset = graph.get_subset_graph(["a", "d"]);

        assert_eq!(subset.node_count(), 2);
        assert_eq!(subset.edge_kind("a", "d"), Some(EdgeKind::Dependency));
        assert_eq!(subset.descendants("a", None).unwrap(), ids(&["d"]));
    }

    #[test]
    fn subset_graph_does_not_shortcut_through_members() {
        let graph = DependencyGraph::from_edges([("a", "b"), ("b", "c")]);
        let subset = graph.get_subset_graph(["a", "b", "c"]);

        assert_eq!(subset.edge_count(), 2);
        assert_eq!(subset.edge_kind("a", "c"), None);
    }

    #[test]
    fn subset_graph_marks_test_only_paths() {
        let mut graph = DependencyGraph::from_edges([("a", "t")]);
        graph.add_node("b");
        graph.add_edge("t", "b", EdgeKind::ParentTest).unwrap();

        let subset = graph.get_subset_graph(["a", "b"]);
        assert_eq!(subset.edge_kind("a", "b"), Some(EdgeKind::ParentTest));
        assert_eq!(subset.descendants("a", None).unwrap(), ids(&[]));
        assert_eq!(subset.topological_sort_grouped().unwrap().len(), 2);
    }

    #[test]
    fn edges_are_sorted_triples() {
        let mut graph = DependencyGraph::from_edges([("b", "c"), ("a", "b")]);
        graph.add_node("t");
        graph.add_edge("t", "c", EdgeKind::ParentTest).unwrap();

        let edges: Vec<(&str, &str, EdgeKind)> = graph
            .edges()
            .into_iter()
            .map(|(from, to, kind)| (from.as_str(), to.as_str(), kind))
            .collect();
        assert_eq!(
            edges,
            vec![
                ("a", "b", EdgeKind::Dependency),
                ("b", "c", EdgeKind::Dependency),
                ("t", "c", EdgeKind::ParentTest),
            ]
        );
    }

    #[test]
    fn plain_subgraph_loses_transitive_order() {
        let graph = DependencyGraph::from_edges([("a", "b"), ("b", "c")]);
        let induced = graph.subgraph(["a", "c", "unknown"]);

        assert_eq!(induced.node_count(), 2);
        assert_eq!(induced.edge_count(), 0);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let first = DependencyGraph::from_edges([("a", "b"), ("b", "c")]);
        let mut second = DependencyGraph::new();
        for id in ["c", "b", "a"] {
            second.add_node(id);
        }
        second.add_edge("b", "c", EdgeKind::Dependency).unwrap();
        second.add_edge("a", "b", EdgeKind::Dependency).unwrap();

        assert_eq!(first, second);
        second.add_edge("a", "b", EdgeKind::ParentTest).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn edge_kind_serialization() {
        assert_eq!(serde_json::to_string(&EdgeKind::ParentTest).unwrap(), "\"parent_test\"");
        assert_eq!(serde_json::to_string(&EdgeKind::Dependency).unwrap(), "\"\"");
    }
}
