//! DagRefly Core
//!
//! Shared domain types for the dagrefly workspace: configuration, the
//! adapter registry, diagnostics and reports.
//! Never rename diagnostic codes - they are part of the public API.

pub mod adapter;
pub mod config;
pub mod diagnostic;
pub mod report;

pub use adapter::{AdapterPlugin, AdapterRegistry, DEFAULT_ADAPTER_TYPE, FALLBACK_PACKAGE};
pub use config::{AdapterConfig, Config, ConfigError, ResolutionConfig, SeverityThreshold};
pub use diagnostic::{Diagnostic, DiagnosticCode, Location, Severity};
pub use report::{Report, ReportSummary, ReportVersion};
