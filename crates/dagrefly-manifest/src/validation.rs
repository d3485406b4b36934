//! Manifest consistency checks
//!
//! The engine tolerates some data defects (a resolver picks a deterministic
//! winner among duplicate sources, for instance). The validator is where
//! those defects are surfaced as diagnostics.

use std::collections::{BTreeMap, BTreeSet};
use dagrefly_core::{
    AdapterRegistry, Config, Diagnostic, DiagnosticCode, Location, Report, ResolutionConfig,
    Severity, DEFAULT_ADAPTER_TYPE,
};
use dagrefly_graph::{DependencyGraph, NodeId};
use crate::linker::Linker;
use crate::macros::MacroResolver;
use crate::manifest::{Manifest, ManifestError, ManifestNode};
use crate::resolver::{NameResolver, Resolution, ResolveError};

/// Runs every consistency check over a manifest
pub struct Validator<'a> {
    manifest: &'a Manifest,
    config: &'a Config,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Validator<'a> {
    /// Validate `manifest`, applying the severity overrides of `config`
    pub fn validate(manifest: &'a Manifest, config: &'a Config) -> Result<Report, ManifestError> {
        let mut validator = Self {
            manifest,
            config,
            diagnostics: Vec::new(),
        };

        validator.check_dangling_dependencies();
        let graph = validator.check_cycles()?;
        validator.check_duplicate_sources();
        validator.check_duplicate_refs();
        validator.check_declared_refs();
        validator.check_macro_dependencies();
        validator.check_macro_ambiguity();

        tracing::debug!("Validation produced {} diagnostics", validator.diagnostics.len());

        Ok(Report::from_diagnostics(validator.diagnostics)
            .with_graph_size(graph.node_count(), graph.edge_count())
            .with_project(manifest.project_name(), manifest.adapter_type()))
    }

    fn emit(
        &mut self,
        code: DiagnosticCode,
        default: Severity,
        message: String,
        location: Location,
    ) {
        self.emit_related(code, default, message, location, Vec::new());
    }

    fn emit_related(
        &mut self,
        code: DiagnosticCode,
        default: Severity,
        message: String,
        location: Location,
        related: Vec<NodeId>,
    ) {
        let severity = self.config.severity.get_severity(code, default);
        self.diagnostics.push(
            Diagnostic::new(code, severity, message)
                .with_location(location)
                .with_related(related),
        );
    }

    fn check_dangling_dependencies(&mut self) {
        let parent_map = self.manifest.build_parent_map();

        for (id, parents) in &parent_map {
            for parent in parents {
                if parent_map.contains_key(parent) {
                    continue;
                }
                let message = format!(
                    "{} depends on '{}', which is not in the manifest",
                    id, parent
                );
                self.emit(
                    DiagnosticCode::GraphDanglingDependency,
                    Severity::Error,
                    message,
                    self.location_of(id),
                );
            }
        }
    }

    /// Link every known dependency and report the first cycle found
    ///
    /// Dangling dependencies were already reported, so the graph leaves them
    /// out instead of failing the link.
    fn check_cycles(&mut self) -> Result<DependencyGraph, ManifestError> {
        let graph = Linker::link_known(self.manifest)?;

        if let Some(cycle) = graph.find_cycle() {
            let mut path: Vec<&str> = cycle.iter().map(String::as_str).collect();
            path.extend(cycle.first().map(String::as_str));
            let message = format!("Dependency cycle detected: {}", path.join(" --> "));
            let location = self.location_of(&cycle[0]);
            self.emit_related(
                DiagnosticCode::GraphCycle,
                Severity::Error,
                message,
                location,
                cycle,
            );
        }

        Ok(graph)
    }

    fn check_duplicate_sources(&mut self) {
        let mut by_pair: BTreeMap<(&str, &str), Vec<&NodeId>> = BTreeMap::new();
        for (id, source) in &self.manifest.sources {
            by_pair
                .entry((source.source_name.as_str(), source.name.as_str()))
                .or_default()
                .push(id);
        }

        let duplicates: Vec<((String, String), Vec<NodeId>)> = by_pair
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|((source, table), ids)| {
                let ids = ids.into_iter().cloned().collect();
                ((source.to_string(), table.to_string()), ids)
            })
            .collect();

        for ((source, table), ids) in duplicates {
            let message = format!(
                "source('{}', '{}') is defined {} times: {}",
                source,
                table,
                ids.len(),
                ids.join(", ")
            );
            self.push_duplicates(DiagnosticCode::SourceDuplicate, message, ids);
        }
    }

    fn check_duplicate_refs(&mut self) {
        let mut by_key: BTreeMap<(&str, &str, Option<String>), Vec<&NodeId>> = BTreeMap::new();
        for (id, node) in self.refable_nodes() {
            by_key
                .entry((node.package_name.as_str(), node.name.as_str(), node.version_str()))
                .or_default()
                .push(id);
        }

        let duplicates: Vec<(String, Vec<NodeId>)> = by_key
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|((package, name, version), ids)| {
                let label = match version {
                    Some(v) => format!("{}.{} (v{})", package, name, v),
                    None => format!("{}.{}", package, name),
                };
                (label, ids.into_iter().cloned().collect())
            })
            .collect();

        for (label, ids) in duplicates {
            let message = format!(
                "ref target {} is defined by several nodes: {}",
                label,
                ids.join(", ")
            );
            self.push_duplicates(DiagnosticCode::RefDuplicateInPackage, message, ids);
        }
    }

    /// Resolve every recorded `ref()` call from the calling node's package
    fn check_declared_refs(&mut self) {
        let manifest = self.manifest;
        let resolver = NameResolver::new(manifest);

        for (id, node) in &manifest.nodes {
            let project = self.current_project().unwrap_or(node.package_name.as_str());

            for declared in node.declared_refs() {
                let resolution = resolver.resolve_ref(
                    Some(id),
                    &declared.name,
                    declared.package.as_deref(),
                    declared.version.as_deref(),
                    project,
                    &node.package_name,
                );

                match resolution {
                    Resolution::Found(_) => {}
                    Resolution::NotFound => {
                        let message = format!("{} calls {}, which matches no node", id, declared);
                        self.emit(
                            DiagnosticCode::RefNotFound,
                            Severity::Error,
                            message,
                            self.location_of(id),
                        );
                    }
                    Resolution::Ambiguous(candidates) => {
                        let message = format!(
                            "{} calls {}, which matches several nodes: {}",
                            id,
                            declared,
                            candidates.join(", ")
                        );
                        self.emit_related(
                            DiagnosticCode::RefAmbiguous,
                            Severity::Error,
                            message,
                            self.location_of(id),
                            candidates,
                        );
                    }
                }
            }
        }
    }

    fn check_macro_dependencies(&mut self) {
        let node_calls = self
            .manifest
            .nodes
            .iter()
            .flat_map(|(id, node)| node.depends_on.macros.iter().map(move |m| (id, m)));
        let macro_calls = self
            .manifest
            .macros
            .iter()
            .flat_map(|(id, macro_def)| macro_def.depends_on.macros.iter().map(move |m| (id, m)));

        let missing: Vec<(NodeId, NodeId)> = node_calls
            .chain(macro_calls)
            .filter(|(_, macro_id)| !self.manifest.macros.contains_key(macro_id.as_str()))
            .map(|(id, macro_id)| (id.clone(), macro_id.clone()))
            .collect();

        for (id, macro_id) in missing {
            let message = format!(
                "{} calls macro '{}', which is not in the manifest",
                id, macro_id
            );
            let location = self.location_of(&id);
            self.emit(DiagnosticCode::MacroNotFound, Severity::Warn, message, location);
        }
    }

    /// Report macro names that two imported packages define at the same priority
    ///
    /// Under the lenient policy the lookup still picks a winner, so the
    /// finding defaults to a warning there.
    fn check_macro_ambiguity(&mut self) {
        let (manifest, config) = (self.manifest, self.config);
        let registry = match AdapterRegistry::from_config(config) {
            Ok(registry) => registry,
            Err(e) => {
                let message = format!("Macro ambiguity not checked: {}", e);
                self.diagnostics
                    .push(Diagnostic::new(DiagnosticCode::Warning, Severity::Warn, message));
                return;
            }
        };

        let adapter_type = config
            .adapter_type_or(manifest.adapter_type())
            .unwrap_or(DEFAULT_ADAPTER_TYPE);
        let policy = ResolutionConfig {
            strict_macro_ambiguity: true,
            ..config.resolution.clone()
        };
        let resolver = MacroResolver::new(
            manifest,
            self.current_project().unwrap_or_default(),
            adapter_type,
            &registry,
            policy,
        );

        let default = if config.resolution.strict_macro_ambiguity {
            Severity::Error
        } else {
            Severity::Warn
        };

        let names: BTreeSet<&str> = manifest.macros.values().map(|m| m.name.as_str()).collect();
        for name in names {
            let lookup = resolver.find_macro_by_name(name, None);
            if let Err(ResolveError::Ambiguous { candidates, .. }) = lookup {
                let message = format!(
                    "macro '{}' is defined by several packages of the same priority: {}",
                    name,
                    candidates.join(", ")
                );
                let location = self.location_of(&candidates[0]);
                self.emit_related(
                    DiagnosticCode::MacroAmbiguous,
                    default,
                    message,
                    location,
                    candidates,
                );
            }
        }
    }

    /// `ids` holds at least two duplicates
    fn push_duplicates(&mut self, code: DiagnosticCode, message: String, ids: Vec<NodeId>) {
        let location = self.location_of(&ids[0]);
        self.emit_related(code, Severity::Error, message, location, ids);
    }

    fn current_project(&self) -> Option<&'a str> {
        self.config.project_name_or(self.manifest.project_name())
    }

    fn refable_nodes(&self) -> impl Iterator<Item = (&'a NodeId, &'a ManifestNode)> {
        self.manifest
            .nodes
            .iter()
            .filter(|(_, node)| node.resource_type.is_refable())
    }

    /// Location of an artifact, with its file when the manifest records one
    fn location_of(&self, unique_id: &str) -> Location {
        let file = self
            .manifest
            .get_node(unique_id)
            .map(|node| &node.extra)
            .or_else(|| self.manifest.get_source(unique_id).map(|source| &source.extra))
            .or_else(|| self.manifest.get_macro(unique_id).map(|macro_def| &macro_def.extra))
            .or_else(|| self.manifest.get_resource(unique_id).map(|resource| &resource.extra))
            .and_then(|extra| extra.get("original_file_path"))
            .and_then(|path| path.as_str());

        match file {
            Some(file) => Location::with_file(unique_id, file),
            None => Location::node(unique_id),
        }
    }
}
