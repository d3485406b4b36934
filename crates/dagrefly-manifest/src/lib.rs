//! dbt-style manifest store and name resolution
//!
//! Holds every artifact keyed by identity, links them into a
//! [`DependencyGraph`](dagrefly_graph::DependencyGraph), and resolves
//! `ref`/`source`/`doc`/macro references with package-priority rules.

pub mod linker;
pub mod macros;
pub mod manifest;
pub mod resolver;
pub mod resource;
pub mod validation;

pub use linker::{LinkStrategy, Linker};
pub use macros::{materialization_macro_name, Locality, MacroCandidate, MacroResolver};
pub use manifest::{
    DeclaredRef, DependsOn, Manifest, ManifestDoc, ManifestError, ManifestGroup, ManifestMacro,
    ManifestMetadata, ManifestNode, ManifestResource, ManifestSource, NodeConfig,
};
pub use resolver::{LookupKind, NameResolver, Resolution, ResolveError};
pub use resource::ResourceType;
pub use validation::Validator;
