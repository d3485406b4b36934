//! Macro lookup with package priority and adapter inheritance
//!
//! Packages fall into three tiers, most specific first: the root project,
//! imported packages, and internal packages shipped by the adapter chain
//! (ending with the `dbt` fallback package).

use std::collections::BTreeMap;
use dagrefly_core::{AdapterRegistry, ResolutionConfig};
use dagrefly_graph::NodeId;
use crate::manifest::Manifest;
use crate::resolver::{LookupKind, ResolveError};

/// Priority tier of the package that defines a macro
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Locality {
    Core,
    Imported,
    Root,
}

/// One macro matching a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroCandidate {
    pub unique_id: NodeId,
    pub package_name: String,
    pub locality: Locality,
}

/// Name of the macro implementing `materialization` for `adapter_type`
pub fn materialization_macro_name(materialization: &str, adapter_type: &str) -> String {
    format!("materialization_{}_{}", materialization, adapter_type)
}

/// Resolves macro names for one project and adapter
#[derive(Debug, Clone)]
pub struct MacroResolver<'a> {
    manifest: &'a Manifest,
    root_project: String,
    /// Adapter types, most specific first, ending with `default`
    type_chain: Vec<String>,
    /// Internal packages in lookup order
    internal_packages: Vec<String>,
    policy: ResolutionConfig,
    /// Macro name -> macro ids
    by_name: BTreeMap<&'a str, Vec<&'a NodeId>>,
}

impl<'a> MacroResolver<'a> {
    pub fn new(
        manifest: &'a Manifest,
        root_project: &str,
        adapter_type: &str,
        registry: &AdapterRegistry,
        policy: ResolutionConfig,
    ) -> Self {
        let mut by_name: BTreeMap<&'a str, Vec<&'a NodeId>> = BTreeMap::new();
        for (id, macro_def) in &manifest.macros {
            by_name.entry(macro_def.name.as_str()).or_default().push(id);
        }

        Self {
            manifest,
            root_project: root_project.to_string(),
            type_chain: registry.type_chain(adapter_type),
            internal_packages: registry.internal_packages(adapter_type),
            policy,
            by_name,
        }
    }

    pub fn type_chain(&self) -> &[String] {
        &self.type_chain
    }

    pub fn internal_packages(&self) -> &[String] {
        &self.internal_packages
    }

    pub fn locality(&self, package: &str) -> Locality {
        if package == self.root_project {
            Locality::Root
        } else if self.internal_packages.iter().any(|p| p == package) {
            Locality::Core
        } else {
            Locality::Imported
        }
    }

    /// Every macro called `name`, most specific first
    pub fn find_macros_by_name(&self, name: &str) -> Vec<MacroCandidate> {
        let mut candidates: Vec<MacroCandidate> = self
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.manifest.get_macro(id))
            .map(|macro_def| MacroCandidate {
                unique_id: macro_def.unique_id.clone(),
                package_name: macro_def.package_name.clone(),
                locality: self.locality(&macro_def.package_name),
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.locality
                .cmp(&a.locality)
                .then_with(|| {
                    self.internal_rank(&a.package_name)
                        .cmp(&self.internal_rank(&b.package_name))
                })
                .then_with(|| a.package_name.cmp(&b.package_name))
        });
        candidates
    }

    /// Find a macro by name, searching only `package` when given
    ///
    /// Two imported packages defining the same name is an error under the
    /// strict policy; otherwise the lowest package name wins with a warning.
    pub fn find_macro_by_name(
        &self,
        name: &str,
        package: Option<&str>,
    ) -> Result<Option<NodeId>, ResolveError> {
        let candidates = self.find_macros_by_name(name);

        if let Some(package) = package {
            return Ok(candidates
                .into_iter()
                .find(|c| c.package_name == package)
                .map(|c| c.unique_id));
        }

        self.pick(name, candidates)
    }

    /// Find the materialization macro for `materialization` on this adapter
    ///
    /// Adapter types are tried from most specific to `default`; the first
    /// type with any usable candidate wins. Within a type the root project
    /// beats imported packages, which beat internal ones. When package
    /// overrides are disallowed and an internal implementation exists,
    /// imported implementations are ignored.
    pub fn find_materialization_macro_by_name(
        &self,
        materialization: &str,
    ) -> Result<Option<NodeId>, ResolveError> {
        let per_type: Vec<(String, Vec<MacroCandidate>)> = self
            .type_chain
            .iter()
            .map(|adapter| {
                let name = materialization_macro_name(materialization, adapter);
                let candidates = self.find_macros_by_name(&name);
                (name, candidates)
            })
            .collect();

        let has_core = per_type
            .iter()
            .flat_map(|(_, candidates)| candidates)
            .any(|c| c.locality == Locality::Core);
        let skip_imported = !self.policy.allow_package_override && has_core;

        for (name, mut candidates) in per_type {
            if skip_imported {
                candidates.retain(|c| {
                    if c.locality == Locality::Imported {
                        tracing::debug!("Ignoring package override {} for {}", c.unique_id, name);
                        false
                    } else {
                        true
                    }
                });
            }

            if !candidates.is_empty() {
                return self.pick(&name, candidates);
            }
        }

        Ok(None)
    }

    /// Find `generate_<component>_name`, e.g. `generate_schema_name`
    ///
    /// The root project wins, then `imported_package` (the package of the
    /// node being configured), then internal packages in lookup order.
    pub fn find_generate_macro_by_name(
        &self,
        component: &str,
        imported_package: Option<&str>,
    ) -> Option<NodeId> {
        let name = format!("generate_{}_name", component);
        let candidates = self.find_macros_by_name(&name);

        let in_package = |package: &str| candidates.iter().find(|c| c.package_name == package);

        in_package(&self.root_project)
            .or_else(|| imported_package.and_then(in_package))
            .or_else(|| candidates.iter().find(|c| c.locality == Locality::Core))
            .map(|c| c.unique_id.clone())
    }

    /// Pick the best of sorted candidates, flagging same-tier imports
    fn pick(
        &self,
        name: &str,
        candidates: Vec<MacroCandidate>,
    ) -> Result<Option<NodeId>, ResolveError> {
        let Some(best) = candidates.first() else {
            return Ok(None);
        };

        if best.locality == Locality::Imported {
            let tied: Vec<NodeId> = candidates
                .iter()
                .filter(|c| c.locality == Locality::Imported)
                .map(|c| c.unique_id.clone())
                .collect();

            if tied.len() > 1 {
                if self.policy.strict_macro_ambiguity {
                    return Err(ResolveError::Ambiguous {
                        kind: LookupKind::Macro,
                        name: name.to_string(),
                        candidates: tied,
                    });
                }
                tracing::warn!(
                    "Macro '{}' is defined by several packages; using {}",
                    name,
                    best.unique_id
                );
            }
        }

        Ok(Some(best.unique_id.clone()))
    }

    fn internal_rank(&self, package: &str) -> usize {
        self.internal_packages
            .iter()
            .position(|p| p == package)
            .unwrap_or(usize::MAX)
    }
}
