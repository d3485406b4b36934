//! dbt manifest.json store
//!
//! Every artifact collection is keyed by unique identity. Fields the engine
//! does not model are kept in flattened `extra` maps, so [`Manifest::write`]
//! is the exact inverse of [`Manifest::from_file`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use dagrefly_graph::{GraphError, NodeId};
use crate::resource::ResourceType;

/// Unmodelled fields, preserved verbatim
pub type Extra = BTreeMap<String, Value>;

/// Manifest metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbt_schema_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbt_version: Option<String>,

    /// Root project name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Adapter type used for macro and materialization lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Declared dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    /// Identities of artifacts this one depends on
    #[serde(default)]
    pub nodes: Vec<NodeId>,

    /// Identities of macros this one calls
    #[serde(default)]
    pub macros: Vec<NodeId>,
}

/// Artifact configuration (only the keys the engine reads are typed)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materialized: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl NodeConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// A node in the manifest (model, seed, snapshot, test, analysis, operation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.jaffle_shop.orders")
    pub unique_id: NodeId,

    /// Node name (e.g., "orders")
    pub name: String,

    pub resource_type: ResourceType,

    pub package_name: String,

    /// Model version; integers and strings compare equal (`2` == `"2"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default)]
    pub config: NodeConfig,

    #[serde(default)]
    pub depends_on: DependsOn,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ManifestNode {
    pub fn new(resource_type: ResourceType, package_name: &str, name: &str) -> Self {
        Self {
            unique_id: format!("{}.{}.{}", resource_type, package_name, name),
            name: name.to_string(),
            resource_type,
            package_name: package_name.to_string(),
            version: None,
            latest_version: None,
            group: None,
            config: NodeConfig::default(),
            depends_on: DependsOn::default(),
            extra: Extra::new(),
        }
    }

    /// Add node dependencies
    pub fn with_depends_on<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.depends_on.nodes.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Set the group in `config.group`
    pub fn with_group(mut self, group: &str) -> Self {
        self.config.group = Some(group.to_string());
        self
    }

    /// Set the version; the identity gains a `.v<version>` suffix
    pub fn with_version(mut self, version: impl Into<Value>) -> Self {
        let version = version.into();
        if let Some(v) = version_string(&version) {
            self.unique_id = format!("{}.v{}", self.unique_id, v);
        }
        self.version = Some(version);
        self
    }

    pub fn version_str(&self) -> Option<String> {
        self.version.as_ref().and_then(version_string)
    }

    pub fn latest_version_str(&self) -> Option<String> {
        self.latest_version.as_ref().and_then(version_string)
    }

    /// Group from `config.group`, falling back to the top-level field
    pub fn group_name(&self) -> Option<&str> {
        non_empty(self.config.group.as_deref()).or_else(|| non_empty(self.group.as_deref()))
    }

    /// `ref()` calls recorded in the node's `refs` field
    ///
    /// Both the object form (`{"name", "package", "version"}`) and the older
    /// list form (`["name"]`, `["package", "name"]`) are read. Entries in
    /// neither shape are skipped.
    pub fn declared_refs(&self) -> Vec<DeclaredRef> {
        match self.extra.get("refs") {
            Some(Value::Array(refs)) => refs.iter().filter_map(DeclaredRef::from_value).collect(),
            _ => Vec::new(),
        }
    }
}

/// One recorded `ref()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredRef {
    pub name: String,
    pub package: Option<String>,
    pub version: Option<String>,
}

impl DeclaredRef {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self {
                name: fields.get("name")?.as_str()?.to_string(),
                package: fields.get("package").and_then(Value::as_str).map(str::to_string),
                version: fields.get("version").and_then(version_string),
            }),
            Value::Array(parts) => {
                let parts: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
                match parts.as_slice() {
                    [name] => Some(Self {
                        name: name.to_string(),
                        package: None,
                        version: None,
                    }),
                    [package, name] => Some(Self {
                        name: name.to_string(),
                        package: Some(package.to_string()),
                        version: None,
                    }),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for DeclaredRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.package {
            Some(package) => write!(f, "ref('{}', '{}'", package, self.name)?,
            None => write!(f, "ref('{}'", self.name)?,
        }
        if let Some(version) = &self.version {
            write!(f, ", v={}", version)?;
        }
        write!(f, ")")
    }
}

/// Version as a comparable string (`2`, `2.0` and `"2"` normalize alike)
pub(crate) fn version_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(normalize_version(s)),
        Value::Number(n) => Some(normalize_version(&n.to_string())),
        _ => None,
    }
}

/// Integral versions collapse to their integer form; anything else is kept
pub(crate) fn normalize_version(version: &str) -> String {
    let version = version.trim();
    match version.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => version.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// A source table in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSource {
    /// Unique identifier (e.g., "source.jaffle_shop.ecom.raw_items")
    pub unique_id: NodeId,

    /// Source name (e.g., "ecom")
    pub source_name: String,

    /// Table name (e.g., "raw_items")
    pub name: String,

    pub resource_type: ResourceType,

    pub package_name: String,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ManifestSource {
    pub fn new(package_name: &str, source_name: &str, name: &str) -> Self {
        Self {
            unique_id: format!("source.{}.{}.{}", package_name, source_name, name),
            source_name: source_name.to_string(),
            name: name.to_string(),
            resource_type: ResourceType::Source,
            package_name: package_name.to_string(),
            extra: Extra::new(),
        }
    }
}

/// A macro definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMacro {
    pub unique_id: NodeId,
    pub name: String,
    pub resource_type: ResourceType,
    pub package_name: String,

    #[serde(default)]
    pub depends_on: DependsOn,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ManifestMacro {
    pub fn new(package_name: &str, name: &str) -> Self {
        Self {
            unique_id: format!("macro.{}.{}", package_name, name),
            name: name.to_string(),
            resource_type: ResourceType::Macro,
            package_name: package_name.to_string(),
            depends_on: DependsOn::default(),
            extra: Extra::new(),
        }
    }
}

/// A documentation block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDoc {
    pub unique_id: NodeId,
    pub name: String,
    pub resource_type: ResourceType,
    pub package_name: String,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ManifestDoc {
    pub fn new(package_name: &str, name: &str) -> Self {
        Self {
            unique_id: format!("doc.{}.{}", package_name, name),
            name: name.to_string(),
            resource_type: ResourceType::Doc,
            package_name: package_name.to_string(),
            extra: Extra::new(),
        }
    }
}

/// A group definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestGroup {
    pub unique_id: NodeId,
    pub name: String,
    pub resource_type: ResourceType,
    pub package_name: String,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ManifestGroup {
    pub fn new(package_name: &str, name: &str) -> Self {
        Self {
            unique_id: format!("group.{}.{}", package_name, name),
            name: name.to_string(),
            resource_type: ResourceType::Group,
            package_name: package_name.to_string(),
            extra: Extra::new(),
        }
    }
}

/// Exposure, metric, semantic model, saved query or unit test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestResource {
    pub unique_id: NodeId,
    pub name: String,
    pub resource_type: ResourceType,
    pub package_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default)]
    pub config: NodeConfig,

    #[serde(default)]
    pub depends_on: DependsOn,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ManifestResource {
    pub fn new(resource_type: ResourceType, package_name: &str, name: &str) -> Self {
        Self {
            unique_id: format!("{}.{}.{}", resource_type, package_name, name),
            name: name.to_string(),
            resource_type,
            package_name: package_name.to_string(),
            group: None,
            config: NodeConfig::default(),
            depends_on: DependsOn::default(),
            extra: Extra::new(),
        }
    }

    /// Add node dependencies
    pub fn with_depends_on<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.depends_on.nodes.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Group from `config.group`, falling back to the top-level field
    pub fn group_name(&self) -> Option<&str> {
        non_empty(self.config.group.as_deref()).or_else(|| non_empty(self.group.as_deref()))
    }

    /// `ref()` calls recorded in the node's `refs` field
    ///
    /// Both the object form (`{"name", "package", "version"}`) and the older
    /// list form (`["name"]`, `["package", "name"]`) are read. Entries in
    /// neither shape are skipped.
    pub fn declared_refs(&self) -> Vec<DeclaredRef> {
        match self.extra.get("refs") {
            Some(Value::Array(refs)) => refs.iter().filter_map(DeclaredRef::from_value).collect(),
            _ => Vec::new(),
        }
    }
}

/// dbt manifest.json structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub metadata: ManifestMetadata,

    /// Models, seeds, snapshots, tests, analyses and operations
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, ManifestNode>,

    #[serde(default)]
    pub sources: BTreeMap<NodeId, ManifestSource>,

    #[serde(default)]
    pub macros: BTreeMap<NodeId, ManifestMacro>,

    #[serde(default)]
    pub docs: BTreeMap<NodeId, ManifestDoc>,

    #[serde(default)]
    pub exposures: BTreeMap<NodeId, ManifestResource>,

    #[serde(default)]
    pub metrics: BTreeMap<NodeId, ManifestResource>,

    #[serde(default)]
    pub groups: BTreeMap<NodeId, ManifestGroup>,

    #[serde(default)]
    pub selectors: BTreeMap<String, Value>,

    /// Disabled definitions, several per identity
    #[serde(default)]
    pub disabled: BTreeMap<NodeId, Vec<Value>>,

    #[serde(default)]
    pub semantic_models: BTreeMap<NodeId, ManifestResource>,

    #[serde(default)]
    pub unit_tests: BTreeMap<NodeId, ManifestResource>,

    #[serde(default)]
    pub saved_queries: BTreeMap<NodeId, ManifestResource>,

    /// Everything else (persisted parent/child maps, semantic layer extras)
    #[serde(flatten)]
    pub extra: Extra,
}

impl Manifest {
    /// Empty manifest for the given project and adapter
    pub fn new(project_name: &str, adapter_type: &str) -> Self {
        Self {
            metadata: ManifestMetadata {
                project_name: Some(project_name.to_string()),
                adapter_type: Some(adapter_type.to_string()),
                ..ManifestMetadata::default()
            },
            ..Self::default()
        }
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse manifest from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))?;

        tracing::debug!(
            "Loaded manifest: {} nodes, {} sources, {} macros",
            manifest.nodes.len(),
            manifest.sources.len(),
            manifest.macros.len()
        );

        Ok(manifest)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(|e| ManifestError::SerializeError(e.to_string()))
    }

    /// Write the full manifest state to `path`
    pub fn write(&self, path: &Path) -> Result<(), ManifestError> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))
    }

    pub fn project_name(&self) -> Option<&str> {
        self.metadata.project_name.as_deref()
    }

    pub fn adapter_type(&self) -> Option<&str> {
        self.metadata.adapter_type.as_deref()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn macro_count(&self) -> usize {
        self.macros.len()
    }

    /// Add (or replace) a node; only node resource types are accepted
    pub fn add_node(&mut self, node: ManifestNode) -> Result<(), ManifestError> {
        if !node.resource_type.is_node() {
            return Err(ManifestError::UnexpectedResourceType {
                unique_id: node.unique_id,
                resource_type: node.resource_type,
            });
        }
        self.nodes.insert(node.unique_id.clone(), node);
        Ok(())
    }

    pub fn add_source(&mut self, source: ManifestSource) {
        self.sources.insert(source.unique_id.clone(), source);
    }

    pub fn add_macro(&mut self, macro_def: ManifestMacro) {
        self.macros.insert(macro_def.unique_id.clone(), macro_def);
    }

    pub fn add_doc(&mut self, doc: ManifestDoc) {
        self.docs.insert(doc.unique_id.clone(), doc);
    }

    pub fn add_group(&mut self, group: ManifestGroup) {
        self.groups.insert(group.unique_id.clone(), group);
    }

    /// Add an exposure, metric, semantic model, saved query or unit test
    pub fn add_resource(&mut self, resource: ManifestResource) -> Result<(), ManifestError> {
        let collection = match resource.resource_type {
            ResourceType::Exposure => &mut self.exposures,
            ResourceType::Metric => &mut self.metrics,
            ResourceType::SemanticModel => &mut self.semantic_models,
            ResourceType::SavedQuery => &mut self.saved_queries,
            ResourceType::UnitTest => &mut self.unit_tests,
            other => {
                return Err(ManifestError::UnexpectedResourceType {
                    unique_id: resource.unique_id,
                    resource_type: other,
                })
            }
        };
        collection.insert(resource.unique_id.clone(), resource);
        Ok(())
    }

    /// Remove an artifact from whichever collection holds it
    pub fn remove(&mut self, unique_id: &str) -> Option<ResourceType> {
        if let Some(node) = self.nodes.remove(unique_id) {
            return Some(node.resource_type);
        }
        if self.sources.remove(unique_id).is_some() {
            return Some(ResourceType::Source);
        }
        if self.macros.remove(unique_id).is_some() {
            return Some(ResourceType::Macro);
        }
        if self.docs.remove(unique_id).is_some() {
            return Some(ResourceType::Doc);
        }
        if self.groups.remove(unique_id).is_some() {
            return Some(ResourceType::Group);
        }
        if self.selectors.remove(unique_id).is_some() {
            return Some(ResourceType::Selector);
        }
        for collection in [
            &mut self.exposures,
            &mut self.metrics,
            &mut self.semantic_models,
            &mut self.saved_queries,
            &mut self.unit_tests,
        ] {
            if let Some(resource) = collection.remove(unique_id) {
                return Some(resource.resource_type);
            }
        }
        None
    }

    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }

    pub fn get_source(&self, unique_id: &str) -> Option<&ManifestSource> {
        self.sources.get(unique_id)
    }

    pub fn get_macro(&self, unique_id: &str) -> Option<&ManifestMacro> {
        self.macros.get(unique_id)
    }

    pub fn get_doc(&self, unique_id: &str) -> Option<&ManifestDoc> {
        self.docs.get(unique_id)
    }

    /// Exposure, metric, semantic model, saved query or unit test by identity
    pub fn get_resource(&self, unique_id: &str) -> Option<&ManifestResource> {
        self.resource_collections()
            .into_iter()
            .find_map(|collection| collection.get(unique_id))
    }

    /// Disabled definitions recorded under `unique_id`
    pub fn disabled_lookup(&self, unique_id: &str) -> Option<&Vec<Value>> {
        self.disabled.get(unique_id)
    }

    /// Resource type of any artifact in the manifest
    pub fn resource_type_of(&self, unique_id: &str) -> Option<ResourceType> {
        if let Some(node) = self.nodes.get(unique_id) {
            return Some(node.resource_type);
        }
        if self.sources.contains_key(unique_id) {
            return Some(ResourceType::Source);
        }
        if self.macros.contains_key(unique_id) {
            return Some(ResourceType::Macro);
        }
        if self.docs.contains_key(unique_id) {
            return Some(ResourceType::Doc);
        }
        if self.groups.contains_key(unique_id) {
            return Some(ResourceType::Group);
        }
        if self.selectors.contains_key(unique_id) {
            return Some(ResourceType::Selector);
        }
        self.get_resource(unique_id).map(|r| r.resource_type)
    }

    pub fn filter_nodes_by_resource_type(&self, resource_type: ResourceType) -> Vec<&ManifestNode> {
        self.nodes
            .values()
            .filter(|node| node.resource_type == resource_type)
            .collect()
    }

    pub fn filter_nodes_by_package(&self, package_name: &str) -> Vec<&ManifestNode> {
        self.nodes
            .values()
            .filter(|node| node.package_name == package_name)
            .collect()
    }

    /// Every dependency-bearing artifact with its declared dependencies,
    /// collection by collection in identity order
    pub fn graph_members(&self) -> Vec<(&NodeId, ResourceType, &[NodeId])> {
        let mut members: Vec<(&NodeId, ResourceType, &[NodeId])> = Vec::new();

        for (id, node) in &self.nodes {
            members.push((id, node.resource_type, &node.depends_on.nodes));
        }
        for id in self.sources.keys() {
            members.push((id, ResourceType::Source, &[]));
        }
        for collection in self.resource_collections() {
            for (id, resource) in collection {
                members.push((id, resource.resource_type, &resource.depends_on.nodes));
            }
        }

        // a deserialized collection can hold entries of the wrong type
        members.retain(|(_, resource_type, _)| resource_type.has_dependencies());
        members
    }

    /// Map each dependency-bearing artifact to its deduplicated dependencies
    pub fn build_parent_map(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        self.graph_members()
            .into_iter()
            .map(|(id, _, deps)| {
                let mut seen = BTreeSet::new();
                let parents = deps
                    .iter()
                    .filter(|dep| seen.insert(dep.as_str()))
                    .cloned()
                    .collect();
                (id.clone(), parents)
            })
            .collect()
    }

    /// Exact inverse of [`build_parent_map`](Self::build_parent_map)
    ///
    /// Every identity that appears as a parent gets a key, even when it is
    /// not itself a manifest artifact.
    pub fn build_child_map(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        let parent_map = self.build_parent_map();
        let mut child_map: BTreeMap<NodeId, Vec<NodeId>> = parent_map
            .keys()
            .map(|id| (id.clone(), Vec::new()))
            .collect();

        for (child, parents) in &parent_map {
            for parent in parents {
                child_map.entry(parent.clone()).or_default().push(child.clone());
            }
        }

        child_map
    }

    /// Map each group name to its members, sorted by identity
    pub fn build_group_map(&self) -> BTreeMap<String, Vec<NodeId>> {
        let mut group_map: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();

        let nodes = self
            .nodes
            .iter()
            .filter(|(_, node)| node.resource_type.participates_in_groups())
            .filter_map(|(id, node)| node.group_name().map(|group| (id, group)));

        let resources = [&self.metrics, &self.semantic_models, &self.saved_queries]
            .into_iter()
            .flat_map(|collection| collection.iter())
            .filter_map(|(id, resource)| resource.group_name().map(|group| (id, group)));

        for (id, group) in nodes.chain(resources) {
            group_map.entry(group.to_string()).or_default().push(id.clone());
        }

        for members in group_map.values_mut() {
            members.sort();
        }

        group_map
    }

    fn resource_collections(&self) -> [&BTreeMap<NodeId, ManifestResource>; 5] {
        [
            &self.exposures,
            &self.metrics,
            &self.semantic_models,
            &self.saved_queries,
            &self.unit_tests,
        ]
    }
}

/// Manifest error types
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),

    #[error("Failed to serialize manifest: {0}")]
    SerializeError(String),

    #[error(
        "{unique_id} has resource type '{resource_type}', which does not belong in this collection"
    )]
    UnexpectedResourceType {
        unique_id: NodeId,
        resource_type: ResourceType,
    },

    #[error("Failed to link dependency graph: {0}")]
    Graph(#[from] GraphError),
}
