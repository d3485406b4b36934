//! Dependency graph construction from a manifest
//!
//! Edges point from a dependency to its dependent. A dependency on an
//! identity the manifest does not hold fails fast with
//! [`GraphError::UnknownNode`].

use std::collections::{BTreeMap, BTreeSet};
use dagrefly_graph::{DependencyGraph, EdgeKind, GraphError, NodeId};
use crate::manifest::{Manifest, ManifestError};
use crate::resource::ResourceType;

/// How a graph is assembled from a manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStrategy {
    /// All nodes first, then all edges
    #[default]
    Bulk,

    /// One artifact at a time, as a partial re-parse would
    Incremental,
}

/// Builds dependency graphs; the strategy is fixed at construction
#[derive(Debug, Clone, Copy, Default)]
pub struct Linker {
    strategy: LinkStrategy,
}

impl Linker {
    pub fn new(strategy: LinkStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> LinkStrategy {
        self.strategy
    }

    /// Build the dependency graph of `manifest` with this linker's strategy
    pub fn link(&self, manifest: &Manifest) -> Result<DependencyGraph, ManifestError> {
        let graph = match self.strategy {
            LinkStrategy::Bulk => Self::link_bulk(manifest)?,
            LinkStrategy::Incremental => Self::link_incremental(manifest)?,
        };

        tracing::debug!(
            "Linked dependency graph ({:?}): {} nodes, {} edges",
            self.strategy,
            graph.node_count(),
            graph.edge_count()
        );

        Ok(graph)
    }

    pub fn link_bulk(manifest: &Manifest) -> Result<DependencyGraph, ManifestError> {
        Self::link_members(manifest, false)
    }

    /// Bulk link that leaves out dependencies the manifest does not hold
    ///
    /// For callers that report dangling dependencies instead of failing on
    /// them.
    pub fn link_known(manifest: &Manifest) -> Result<DependencyGraph, ManifestError> {
        Self::link_members(manifest, true)
    }

    fn link_members(
        manifest: &Manifest,
        skip_dangling: bool,
    ) -> Result<DependencyGraph, ManifestError> {
        let members = manifest.graph_members();
        let mut graph = DependencyGraph::new();

        for (id, _, _) in &members {
            graph.add_node((*id).clone());
        }

        for (id, _, deps) in &members {
            for dep in deps.iter() {
                if skip_dangling && !graph.contains(dep) {
                    tracing::debug!("Skipping dangling dependency {} of {}", dep, id);
                    continue;
                }
                graph.add_edge(dep, id, EdgeKind::Dependency)?;
            }
        }

        Ok(graph)
    }

    /// Same graph as [`link_bulk`](Self::link_bulk), built by attaching one
    /// artifact at a time in manifest order
    pub fn link_incremental(manifest: &Manifest) -> Result<DependencyGraph, ManifestError> {
        let parent_map = manifest.build_parent_map();
        let child_map = manifest.build_child_map();
        let mut graph = DependencyGraph::new();

        for (id, _, _) in manifest.graph_members() {
            attach(&mut graph, id, &parent_map, &child_map)?;
        }

        Ok(graph)
    }

    /// Re-sync one artifact after a partial re-parse
    ///
    /// Drops the node's edges and re-attaches it from its current manifest
    /// definition, or removes it when the manifest no longer holds it.
    /// Test-ordering edges touching the node are dropped too; re-run
    /// [`add_test_edges`](Self::add_test_edges) afterwards.
    pub fn relink(
        graph: &mut DependencyGraph,
        manifest: &Manifest,
        unique_id: &str,
    ) -> Result<(), ManifestError> {
        let parent_map = manifest.build_parent_map();
        if !parent_map.contains_key(unique_id) {
            graph.remove_node(unique_id);
            return Ok(());
        }

        let child_map = manifest.build_child_map();
        attach(graph, unique_id, &parent_map, &child_map)?;
        Ok(())
    }

    /// Add `ParentTest` edges so tests run before the nodes downstream of
    /// what they test
    ///
    /// For every non-test node `n`, each test attached to an ancestor of `n`
    /// whose dependencies are all ancestors of `n` gets an edge `test -> n`.
    /// Returns the number of edges added.
    pub fn add_test_edges(
        manifest: &Manifest,
        graph: &mut DependencyGraph,
    ) -> Result<usize, ManifestError> {
        let is_test = |id: &str| {
            manifest
                .get_node(id)
                .is_some_and(|node| node.resource_type == ResourceType::Test)
        };

        let mut new_edges: Vec<(NodeId, NodeId)> = Vec::new();

        for id in manifest.nodes.keys() {
            if is_test(id) || !graph.contains(id) {
                continue;
            }

            let upstream = graph.ancestors(id, None)?;
            let mut tests = BTreeSet::new();
            for parent in &upstream {
                for child in graph.successors(parent)? {
                    if is_test(child) && !upstream.contains(child.as_str()) {
                        tests.insert(child.clone());
                    }
                }
            }

            for test in tests {
                let covered = manifest.get_node(&test).is_some_and(|node| {
                    !node.depends_on.nodes.is_empty()
                        && node.depends_on.nodes.iter().all(|dep| upstream.contains(dep))
                });
                if covered {
                    new_edges.push((test, id.clone()));
                }
            }
        }

        for (test, node) in &new_edges {
            graph.add_edge(test, node, EdgeKind::ParentTest)?;
        }

        tracing::debug!("Added {} test ordering edges", new_edges.len());
        Ok(new_edges.len())
    }
}

/// (Re-)insert `id` with edges to every neighbor already in the graph
fn attach(
    graph: &mut DependencyGraph,
    id: &str,
    parent_map: &BTreeMap<NodeId, Vec<NodeId>>,
    child_map: &BTreeMap<NodeId, Vec<NodeId>>,
) -> Result<(), GraphError> {
    graph.remove_node(id);
    graph.add_node(id);

    for dep in parent_map.get(id).into_iter().flatten() {
        if graph.contains(dep) {
            graph.add_edge(dep, id, EdgeKind::Dependency)?;
        } else if !parent_map.contains_key(dep) {
            return Err(GraphError::UnknownNode(dep.clone()));
        }
    }

    for child in child_map.get(id).into_iter().flatten() {
        if graph.contains(child) {
            graph.add_edge(id, child, EdgeKind::Dependency)?;
        }
    }

    Ok(())
}
