//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Graph structure (1xxx)
    /// The dependency graph contains a cycle
    GraphCycle,

    /// A declared dependency points at an identity that does not exist
    GraphDanglingDependency,

    // Reference resolution (2xxx)
    /// A ref matched several equal-priority candidates
    RefAmbiguous,

    /// A ref matched no candidate
    RefNotFound,

    /// Two refable nodes share package, name and version
    RefDuplicateInPackage,

    /// Two sources share the same (source_name, table_name) pair
    SourceDuplicate,

    /// A doc reference matched several equal-priority candidates
    DocAmbiguous,

    // Macro lookup (3xxx)
    /// A macro name is defined by several packages in the same priority tier
    MacroAmbiguous,

    /// A macro dependency points at a macro that does not exist
    MacroNotFound,

    // General warnings (9xxx)
    /// General informational message
    Info,

    /// General warning message
    Warning,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GraphCycle => "GRAPH_CYCLE",
            Self::GraphDanglingDependency => "GRAPH_DANGLING_DEPENDENCY",
            Self::RefAmbiguous => "REF_AMBIGUOUS",
            Self::RefNotFound => "REF_NOT_FOUND",
            Self::RefDuplicateInPackage => "REF_DUPLICATE_IN_PACKAGE",
            Self::SourceDuplicate => "SOURCE_DUPLICATE",
            Self::DocAmbiguous => "DOC_AMBIGUOUS",
            Self::MacroAmbiguous => "MACRO_AMBIGUOUS",
            Self::MacroNotFound => "MACRO_NOT_FOUND",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue that should fail CI
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Where a finding originates: an artifact and, when known, its file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Unique identity of the artifact
    pub unique_id: String,

    /// File path relative to project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Location {
    /// Location pointing at an artifact only
    pub fn node(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            file: None,
        }
    }

    /// Location pointing at an artifact defined in `file`
    pub fn with_file(unique_id: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            file: Some(file.into()),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Identities involved in the finding (cycle members, candidates, duplicates)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            related: Vec::new(),
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the related identities
    pub fn with_related(mut self, related: Vec<String>) -> Self {
        self.related = related;
        self
    }
}
