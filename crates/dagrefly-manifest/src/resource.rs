//! Resource types and their capabilities

use serde::{Deserialize, Serialize};

/// Kind of artifact, as written in `resource_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Model,
    Analysis,
    Test,
    Snapshot,
    Operation,
    Seed,
    SqlOperation,
    Doc,
    Source,
    Macro,
    Exposure,
    Metric,
    Group,
    Selector,
    SemanticModel,
    UnitTest,
    SavedQuery,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Analysis => "analysis",
            Self::Test => "test",
            Self::Snapshot => "snapshot",
            Self::Operation => "operation",
            Self::Seed => "seed",
            Self::SqlOperation => "sql_operation",
            Self::Doc => "doc",
            Self::Source => "source",
            Self::Macro => "macro",
            Self::Exposure => "exposure",
            Self::Metric => "metric",
            Self::Group => "group",
            Self::Selector => "selector",
            Self::SemanticModel => "semantic_model",
            Self::UnitTest => "unit_test",
            Self::SavedQuery => "saved_query",
        }
    }

    /// Stored in the `nodes` collection
    pub fn is_node(&self) -> bool {
        matches!(
            self,
            Self::Model
                | Self::Analysis
                | Self::Test
                | Self::Snapshot
                | Self::Operation
                | Self::Seed
                | Self::SqlOperation
        )
    }

    /// Participates in the dependency graph and the parent/child maps
    pub fn has_dependencies(&self) -> bool {
        self.is_node()
            || matches!(
                self,
                Self::Source
                    | Self::Exposure
                    | Self::Metric
                    | Self::SemanticModel
                    | Self::UnitTest
                    | Self::SavedQuery
            )
    }

    /// Can declare membership in a group
    pub fn participates_in_groups(&self) -> bool {
        match self {
            Self::Operation => false,
            other if other.is_node() => true,
            Self::Metric | Self::SemanticModel | Self::SavedQuery => true,
            _ => false,
        }
    }

    /// Target of `ref()`
    pub fn is_refable(&self) -> bool {
        matches!(self, Self::Model | Self::Seed | Self::Snapshot)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
