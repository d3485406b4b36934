//! Configuration schema (dagrefly.toml)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use crate::diagnostic::{DiagnosticCode, Severity};

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Package-priority policy for name resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Allow imported (non-root) packages to override built-in materializations
    #[serde(default = "default_true")]
    pub allow_package_override: bool,

    /// Treat a macro name defined by two packages of the same tier as an error.
    /// When false, the lowest package name wins and a warning is logged.
    #[serde(default = "default_true")]
    pub strict_macro_ambiguity: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            allow_package_override: true,
            strict_macro_ambiguity: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Extra adapter plugin declared in `[adapters.<type>]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Package that ships the adapter's macros (e.g. `dbt_trino`)
    pub package: String,

    /// Adapter type this one inherits from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root project name (defaults to the manifest's metadata)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Adapter type override (defaults to the manifest's metadata)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_type: Option<String>,

    /// Resolution policy
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,

    /// Additional adapter plugins, merged over the built-in registry
    #[serde(default)]
    pub adapters: BTreeMap<String, AdapterConfig>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: std::path::PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_name: None,
            adapter_type: None,
            resolution: ResolutionConfig::default(),
            severity: SeverityThreshold::default(),
            adapters: BTreeMap::new(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.display().to_string(), e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(path.display().to_string(), e.to_string()))?;

        Ok(())
    }

    /// Root project name, preferring the configured one over `fallback`
    pub fn project_name_or<'a>(&'a self, fallback: Option<&'a str>) -> Option<&'a str> {
        self.project_name.as_deref().or(fallback)
    }

    /// Adapter type, preferring the configured one over `fallback`
    pub fn adapter_type_or<'a>(&'a self, fallback: Option<&'a str>) -> Option<&'a str> {
        self.adapter_type.as_deref().or(fallback)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {0}: {1}")]
    IoError(String, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Adapter '{adapter}' declares unknown parent adapter '{parent}'")]
    UnknownAdapter { adapter: String, parent: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.resolution.allow_package_override);
        assert!(config.resolution.strict_macro_ambiguity);
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn severity_override() {
        let mut threshold = SeverityThreshold::default();
        threshold.set_override(DiagnosticCode::MacroNotFound, Severity::Error);

        assert_eq!(
            threshold.get_severity(DiagnosticCode::MacroNotFound, Severity::Warn),
            Severity::Error
        );
        assert_eq!(
            threshold.get_severity(DiagnosticCode::GraphCycle, Severity::Error),
            Severity::Error
        );
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            project_name = "jaffle_shop"
            adapter_type = "trino"

            [resolution]
            allow_package_override = false

            [severity.overrides]
            SOURCE_DUPLICATE = "warn"

            [adapters.trino]
            package = "dbt_trino"
            parent = "postgres"
            "#,
        )
        .unwrap();

        assert_eq!(config.project_name.as_deref(), Some("jaffle_shop"));
        assert!(!config.resolution.allow_package_override);
        assert!(config.resolution.strict_macro_ambiguity);
        assert_eq!(
            config.severity.get_severity(DiagnosticCode::SourceDuplicate, Severity::Error),
            Severity::Warn
        );
        assert_eq!(config.adapters["trino"].parent.as_deref(), Some("postgres"));
    }

    #[test]
    fn fallbacks_prefer_configured_values() {
        let mut config = Config::default();
        assert_eq!(config.project_name_or(Some("from_manifest")), Some("from_manifest"));

        config.project_name = Some("configured".to_string());
        assert_eq!(config.project_name_or(Some("from_manifest")), Some("configured"));
        assert_eq!(config.adapter_type_or(None), None);
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dagrefly.toml");

        let mut config = Config::default();
        config.adapter_type = Some("snowflake".to_string());
        config.resolution.strict_macro_ambiguity = false;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.adapter_type, config.adapter_type);
        assert_eq!(loaded.resolution, config.resolution);
        assert_eq!(loaded.project_root, dir.path());
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::path::Path::new("/nonexistent/dagrefly.toml");
        let err = Config::from_file(path).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));
    }
}
