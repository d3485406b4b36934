//! Name resolution for `ref()`, `source()`, `doc()` and semantic-layer names
//!
//! Without an explicit package, candidates are ranked by package:
//! the referencing node's own package, then the root project, then a
//! single candidate anywhere else. Anything left over is ambiguous and is
//! reported, never guessed.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use dagrefly_core::{Diagnostic, DiagnosticCode, Severity};
use dagrefly_graph::NodeId;
use crate::manifest::{normalize_version, Manifest, ManifestNode};

/// Outcome of a name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(NodeId),
    NotFound,
    /// Several equal-priority candidates, sorted by identity
    Ambiguous(Vec<NodeId>),
}

impl Resolution {
    /// The resolved identity; `None` when not found or ambiguous
    pub fn unique_id(&self) -> Option<&str> {
        match self {
            Self::Found(id) => Some(id),
            Self::NotFound | Self::Ambiguous(_) => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }

    /// Surface ambiguity as an error; not-found stays `Ok(None)`
    pub fn into_result(self, kind: LookupKind, name: &str) -> Result<Option<NodeId>, ResolveError> {
        match self {
            Self::Found(id) => Ok(Some(id)),
            Self::NotFound => Ok(None),
            Self::Ambiguous(candidates) => Err(ResolveError::Ambiguous {
                kind,
                name: name.to_string(),
                candidates,
            }),
        }
    }
}

/// What a lookup was searching for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Ref,
    Source,
    Doc,
    Macro,
}

impl LookupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ref => "ref",
            Self::Source => "source",
            Self::Doc => "doc",
            Self::Macro => "macro",
        }
    }

    /// Code reported when several equal-priority candidates match
    pub fn ambiguous_code(&self) -> DiagnosticCode {
        match self {
            Self::Ref | Self::Source => DiagnosticCode::RefAmbiguous,
            Self::Doc => DiagnosticCode::DocAmbiguous,
            Self::Macro => DiagnosticCode::MacroAmbiguous,
        }
    }

    /// Code reported when nothing matches, for kinds where that is a defect
    pub fn not_found_code(&self) -> Option<DiagnosticCode> {
        match self {
            Self::Ref => Some(DiagnosticCode::RefNotFound),
            Self::Macro => Some(DiagnosticCode::MacroNotFound),
            Self::Source | Self::Doc => None,
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolution error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("{kind} '{name}' is ambiguous; candidates: {}", candidates.join(", "))]
    Ambiguous {
        kind: LookupKind,
        name: String,
        candidates: Vec<NodeId>,
    },
}

impl ResolveError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::Ambiguous { kind, .. } => kind.ambiguous_code(),
        }
    }

    /// The error as an error-level diagnostic listing the candidates
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Ambiguous { candidates, .. } => {
                Diagnostic::new(self.code(), Severity::Error, self.to_string())
                    .with_related(candidates.clone())
            }
        }
    }
}

/// Resolves textual references against a manifest
#[derive(Debug, Clone, Copy)]
pub struct NameResolver<'a> {
    manifest: &'a Manifest,
}

impl<'a> NameResolver<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        Self { manifest }
    }

    /// Resolve `ref(name)` / `ref(package, name)` / `ref(name, v=version)`
    ///
    /// `source_node` is the referencing artifact, used for diagnostics only.
    pub fn resolve_ref(
        &self,
        source_node: Option<&str>,
        name: &str,
        package: Option<&str>,
        version: Option<&str>,
        current_project: &str,
        node_package: &str,
    ) -> Resolution {
        let version = version.map(normalize_version);
        let matching: Vec<&ManifestNode> = self
            .manifest
            .nodes
            .values()
            .filter(|node| node.resource_type.is_refable() && node.name == name)
            .filter(|node| match &version {
                Some(v) => node.version_str().as_ref() == Some(v),
                None => true,
            })
            .collect();

        let candidates: Vec<(&str, &str)> = if version.is_some() {
            matching
                .iter()
                .map(|node| (node.unique_id.as_str(), node.package_name.as_str()))
                .collect()
        } else {
            collapse_versions(matching)
        };

        let resolution = rank(candidates, package, current_project, node_package);
        if let Resolution::Ambiguous(candidates) = &resolution {
            tracing::warn!(
                "ref('{}') from {} is ambiguous: {}",
                name,
                source_node.unwrap_or("<unknown>"),
                candidates.join(", ")
            );
        }
        resolution
    }

    /// Resolve `source(source_name, table_name)`
    ///
    /// The pair is expected to be globally unique. Duplicates resolve to the
    /// first candidate by package priority then identity, and are reported
    /// by validation.
    pub fn resolve_source(
        &self,
        source_name: &str,
        table_name: &str,
        current_project: &str,
        node_package: &str,
    ) -> Resolution {
        let mut candidates: Vec<(u8, &str)> = self
            .manifest
            .sources
            .values()
            .filter(|source| source.source_name == source_name && source.name == table_name)
            .map(|source| {
                let priority = if source.package_name == current_project {
                    0
                } else if source.package_name == node_package {
                    1
                } else {
                    2
                };
                (priority, source.unique_id.as_str())
            })
            .collect();

        candidates.sort();

        if candidates.len() > 1 {
            tracing::warn!(
                "source('{}', '{}') matches {} sources; using {}",
                source_name,
                table_name,
                candidates.len(),
                candidates[0].1
            );
        }

        match candidates.first() {
            Some((_, id)) => Resolution::Found(id.to_string()),
            None => Resolution::NotFound,
        }
    }

    /// Resolve `doc(name)` / `doc(package, name)`
    pub fn resolve_doc(
        &self,
        name: &str,
        package: Option<&str>,
        current_project: &str,
        node_package: &str,
    ) -> Resolution {
        let candidates = self
            .manifest
            .docs
            .values()
            .filter(|doc| doc.name == name)
            .map(|doc| (doc.unique_id.as_str(), doc.package_name.as_str()))
            .collect();

        rank(candidates, package, current_project, node_package)
    }

    pub fn resolve_metric(
        &self,
        name: &str,
        package: Option<&str>,
        current_project: &str,
        node_package: &str,
    ) -> Resolution {
        self.resolve_resource(&self.manifest.metrics, name, package, current_project, node_package)
    }

    pub fn resolve_semantic_model(
        &self,
        name: &str,
        package: Option<&str>,
        current_project: &str,
        node_package: &str,
    ) -> Resolution {
        let models = &self.manifest.semantic_models;
        self.resolve_resource(models, name, package, current_project, node_package)
    }

    pub fn resolve_saved_query(
        &self,
        name: &str,
        package: Option<&str>,
        current_project: &str,
        node_package: &str,
    ) -> Resolution {
        let queries = &self.manifest.saved_queries;
        self.resolve_resource(queries, name, package, current_project, node_package)
    }

    fn resolve_resource(
        &self,
        collection: &'a BTreeMap<NodeId, crate::manifest::ManifestResource>,
        name: &str,
        package: Option<&str>,
        current_project: &str,
        node_package: &str,
    ) -> Resolution {
        let candidates = collection
            .values()
            .filter(|resource| resource.name == name)
            .map(|resource| (resource.unique_id.as_str(), resource.package_name.as_str()))
            .collect();

        rank(candidates, package, current_project, node_package)
    }
}

/// Apply the package-priority ladder to `(unique_id, package)` candidates
fn rank(
    candidates: Vec<(&str, &str)>,
    package: Option<&str>,
    current_project: &str,
    node_package: &str,
) -> Resolution {
    if let Some(package) = package {
        return pick(candidates.into_iter().filter(|(_, p)| *p == package).collect());
    }

    for preferred in [node_package, current_project] {
        let in_package: Vec<_> = candidates
            .iter()
            .copied()
            .filter(|(_, p)| *p == preferred)
            .collect();
        if !in_package.is_empty() {
            return pick(in_package);
        }
    }

    pick(candidates)
}

fn pick(candidates: Vec<(&str, &str)>) -> Resolution {
    match candidates.as_slice() {
        [] => Resolution::NotFound,
        [(id, _)] => Resolution::Found(id.to_string()),
        _ => {
            let mut ids: Vec<NodeId> = candidates.iter().map(|(id, _)| id.to_string()).collect();
            ids.sort();
            Resolution::Ambiguous(ids)
        }
    }
}

/// Reduce several versions of one model per package to the one to use:
/// the declared latest version, otherwise the highest version
fn collapse_versions(nodes: Vec<&ManifestNode>) -> Vec<(&str, &str)> {
    let mut by_package: BTreeMap<&str, Vec<&ManifestNode>> = BTreeMap::new();
    for node in nodes {
        by_package.entry(node.package_name.as_str()).or_default().push(node);
    }

    let mut candidates = Vec::new();
    for (package, versions) in by_package {
        let versioned = versions.len() > 1 && versions.iter().all(|n| n.version.is_some());
        if !versioned {
            candidates.extend(versions.iter().copied().map(|n| (n.unique_id.as_str(), package)));
            continue;
        }

        let latest = versions
            .iter()
            .copied()
            .find(|n| n.latest_version_str().is_some() && n.version_str() == n.latest_version_str())
            .or_else(|| versions.iter().copied().max_by(|a, b| compare_versions(a, b)));

        if let Some(node) = latest {
            candidates.push((node.unique_id.as_str(), package));
        }
    }
    candidates
}

/// Numeric when both versions parse as numbers, lexical otherwise
fn compare_versions(a: &ManifestNode, b: &ManifestNode) -> Ordering {
    let (va, vb) = (a.version_str().unwrap_or_default(), b.version_str().unwrap_or_default());
    match (va.parse::<f64>(), vb.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => va.cmp(&vb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestDoc, ManifestResource, ManifestSource};
    use crate::resource::ResourceType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn model(package: &str, name: &str) -> ManifestNode {
        ManifestNode::new(ResourceType::Model, package, name)
    }

    fn manifest_with(nodes: Vec<ManifestNode>) -> Manifest {
        let mut manifest = Manifest::new("pkg_a", "postgres");
        for node in nodes {
            manifest.add_node(node).unwrap();
        }
        manifest
    }

    #[test]
    fn ref_prefers_node_package_then_root_project() {
        let manifest = manifest_with(vec![model("pkg_a", "x"), model("pkg_b", "x")]);
        let resolver = NameResolver::new(&manifest);

        let found = resolver.resolve_ref(None, "x", None, None, "pkg_a", "pkg_a");
        assert_eq!(found, Resolution::Found("model.pkg_a.x".to_string()));

        let found = resolver.resolve_ref(None, "x", None, None, "pkg_a", "pkg_c");
        assert_eq!(found, Resolution::Found("model.pkg_a.x".to_string()));

        let found = resolver.resolve_ref(None, "x", None, None, "pkg_a", "pkg_b");
        assert_eq!(found, Resolution::Found("model.pkg_b.x".to_string()));
    }

    #[test]
    fn ref_outside_preferred_packages_is_ambiguous() {
        let manifest = manifest_with(vec![model("pkg_a", "x"), model("pkg_b", "x")]);
        let resolver = NameResolver::new(&manifest);

        let resolution =
            resolver.resolve_ref(Some("model.root.y"), "x", None, None, "root", "pkg_c");
        assert_eq!(
            resolution,
            Resolution::Ambiguous(vec!["model.pkg_a.x".to_string(), "model.pkg_b.x".to_string()])
        );
        assert_eq!(resolution.unique_id(), None);

        let err = resolution.into_result(LookupKind::Ref, "x").unwrap_err();
        assert!(err.to_string().contains("model.pkg_b.x"));
        assert_eq!(err.code(), DiagnosticCode::RefAmbiguous);
    }

    #[test]
    fn ref_single_candidate_elsewhere_wins() {
        let manifest = manifest_with(vec![model("dep", "x")]);
        let resolver = NameResolver::new(&manifest);

        assert_eq!(
            resolver.resolve_ref(None, "x", None, None, "root", "root").unique_id(),
            Some("model.dep.x")
        );
    }

    #[test]
    fn ref_explicit_package_filters() {
        let manifest = manifest_with(vec![model("pkg_a", "x"), model("pkg_b", "x")]);
        let resolver = NameResolver::new(&manifest);

        assert_eq!(
            resolver.resolve_ref(None, "x", Some("pkg_b"), None, "pkg_a", "pkg_a").unique_id(),
            Some("model.pkg_b.x")
        );
        assert_eq!(
            resolver.resolve_ref(None, "x", Some("pkg_c"), None, "pkg_a", "pkg_a"),
            Resolution::NotFound
        );
    }

    #[test]
    fn ref_ignores_non_refable_nodes() {
        let manifest = manifest_with(vec![ManifestNode::new(ResourceType::Test, "pkg_a", "x")]);
        let resolver = NameResolver::new(&manifest);
        assert_eq!(
            resolver.resolve_ref(None, "x", None, None, "pkg_a", "pkg_a"),
            Resolution::NotFound
        );
    }

    #[test]
    fn ref_versions() {
        let mut v1 = model("pkg_a", "dim").with_version(1);
        let mut v2 = model("pkg_a", "dim").with_version("2");
        let v3 = model("pkg_a", "dim").with_version(3);
        v1.latest_version = Some(json!(2));
        v2.latest_version = Some(json!(2));
        let manifest = manifest_with(vec![v1, v2, v3]);
        let resolver = NameResolver::new(&manifest);

        // latest_version wins over the highest version
        assert_eq!(
            resolver.resolve_ref(None, "dim", None, None, "pkg_a", "pkg_a").unique_id(),
            Some("model.pkg_a.dim.v2")
        );
        assert_eq!(
            resolver.resolve_ref(None, "dim", None, Some("1"), "pkg_a", "pkg_a").unique_id(),
            Some("model.pkg_a.dim.v1")
        );
        assert_eq!(
            resolver.resolve_ref(None, "dim", None, Some("9"), "pkg_a", "pkg_a"),
            Resolution::NotFound
        );
    }

    #[test]
    fn ref_version_matches_integral_forms() {
        let manifest = manifest_with(vec![
            model("pkg_a", "orders").with_version(1),
            model("pkg_a", "orders").with_version(2),
            model("pkg_a", "orders").with_version("2.5"),
        ]);
        let resolver = NameResolver::new(&manifest);

        for requested in ["2", "2.0", " 2 "] {
            assert_eq!(
                resolver
                    .resolve_ref(None, "orders", Some("pkg_a"), Some(requested), "pkg_a", "pkg_a")
                    .unique_id(),
                Some("model.pkg_a.orders.v2"),
                "version {:?}",
                requested
            );
        }
        assert_eq!(
            resolver
                .resolve_ref(None, "orders", None, Some("2.5"), "pkg_a", "pkg_a")
                .unique_id(),
            Some("model.pkg_a.orders.v2.5")
        );
        assert_eq!(
            resolver.resolve_ref(None, "orders", None, Some("2.50"), "pkg_a", "pkg_a"),
            Resolution::NotFound
        );
    }

    #[test]
    fn ref_without_latest_version_takes_highest() {
        let manifest = manifest_with(vec![
            model("pkg_a", "dim").with_version(2),
            model("pkg_a", "dim").with_version(10),
        ]);
        let resolver = NameResolver::new(&manifest);
        assert_eq!(
            resolver.resolve_ref(None, "dim", None, None, "pkg_a", "pkg_a").unique_id(),
            Some("model.pkg_a.dim.v10")
        );
    }

    #[test]
    fn source_prefers_root_project_then_identity() {
        let mut manifest = Manifest::new("root", "postgres");
        manifest.add_source(ManifestSource::new("dep", "raw", "orders"));
        manifest.add_source(ManifestSource::new("root", "raw", "orders"));
        manifest.add_source(ManifestSource::new("other", "raw", "customers"));
        let resolver = NameResolver::new(&manifest);

        assert_eq!(
            resolver.resolve_source("raw", "orders", "root", "dep").unique_id(),
            Some("source.root.raw.orders")
        );
        assert_eq!(
            resolver.resolve_source("raw", "orders", "elsewhere", "dep").unique_id(),
            Some("source.dep.raw.orders")
        );
        assert_eq!(
            resolver.resolve_source("raw", "customers", "root", "root").unique_id(),
            Some("source.other.raw.customers")
        );
        assert_eq!(resolver.resolve_source("raw", "missing", "root", "root"), Resolution::NotFound);
    }

    #[test]
    fn doc_uses_package_ladder() {
        let mut manifest = Manifest::new("root", "postgres");
        manifest.add_doc(ManifestDoc::new("root", "overview"));
        manifest.add_doc(ManifestDoc::new("dbt", "overview"));
        let resolver = NameResolver::new(&manifest);

        assert_eq!(
            resolver.resolve_doc("overview", None, "root", "root").unique_id(),
            Some("doc.root.overview")
        );
        assert_eq!(
            resolver.resolve_doc("overview", Some("dbt"), "root", "root").unique_id(),
            Some("doc.dbt.overview")
        );
        assert!(resolver.resolve_doc("overview", None, "x", "y").is_ambiguous());
    }

    #[test]
    fn ambiguous_doc_becomes_doc_diagnostic() {
        let mut manifest = Manifest::new("root", "postgres");
        manifest.add_doc(ManifestDoc::new("dep_a", "overview"));
        manifest.add_doc(ManifestDoc::new("dep_b", "overview"));
        let resolver = NameResolver::new(&manifest);

        let err = resolver
            .resolve_doc("overview", None, "root", "root")
            .into_result(LookupKind::Doc, "overview")
            .unwrap_err();
        let diagnostic = err.to_diagnostic();

        assert_eq!(diagnostic.code, DiagnosticCode::DocAmbiguous);
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.related, vec!["doc.dep_a.overview", "doc.dep_b.overview"]);
        assert!(diagnostic.message.starts_with("doc 'overview' is ambiguous"));
    }

    #[test]
    fn lookup_kind_codes() {
        assert_eq!(LookupKind::Macro.ambiguous_code(), DiagnosticCode::MacroAmbiguous);
        assert_eq!(LookupKind::Ref.not_found_code(), Some(DiagnosticCode::RefNotFound));
        assert_eq!(LookupKind::Doc.not_found_code(), None);
    }

    #[test]
    fn semantic_layer_names() {
        let mut manifest = Manifest::new("root", "postgres");
        manifest
            .add_resource(ManifestResource::new(ResourceType::Metric, "root", "revenue"))
            .unwrap();
        manifest
            .add_resource(ManifestResource::new(ResourceType::SemanticModel, "root", "orders"))
            .unwrap();
        manifest
            .add_resource(ManifestResource::new(ResourceType::SavedQuery, "root", "weekly"))
            .unwrap();
        let resolver = NameResolver::new(&manifest);

        assert_eq!(
            resolver.resolve_metric("revenue", None, "root", "root").unique_id(),
            Some("metric.root.revenue")
        );
        assert_eq!(
            resolver.resolve_semantic_model("orders", None, "root", "root").unique_id(),
            Some("semantic_model.root.orders")
        );
        assert_eq!(
            resolver.resolve_saved_query("weekly", Some("other"), "root", "root"),
            Resolution::NotFound
        );
    }
}
