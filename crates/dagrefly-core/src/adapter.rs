//! Adapter registry
//!
//! Adapter types form an inheritance tree (`redshift` extends `postgres`,
//! `databricks` extends `spark`). Macro lookup walks that tree to decide
//! which packages count as internal and in which order they are searched.

use std::collections::{HashMap, HashSet};
use crate::config::{Config, ConfigError};

/// Terminal adapter type every inheritance chain ends with
pub const DEFAULT_ADAPTER_TYPE: &str = "default";

/// Virtual package holding the global fallback macros
pub const FALLBACK_PACKAGE: &str = "dbt";

/// One adapter implementation and the package that ships its macros
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterPlugin {
    pub adapter_type: String,
    pub package_name: String,
    pub parent: Option<String>,
}

impl AdapterPlugin {
    pub fn new(adapter_type: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            adapter_type: adapter_type.into(),
            package_name: package_name.into(),
            parent: None,
        }
    }

    /// Declare the adapter type this plugin inherits from
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// Lookup table from adapter type to plugin
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    plugins: HashMap<String, AdapterPlugin>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AdapterRegistry {
    /// Registry with no adapters at all
    pub fn empty() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// Registry with the built-in adapters
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(AdapterPlugin::new("postgres", "dbt_postgres"));
        registry.register(AdapterPlugin::new("redshift", "dbt_redshift").with_parent("postgres"));
        registry.register(AdapterPlugin::new("snowflake", "dbt_snowflake"));
        registry.register(AdapterPlugin::new("bigquery", "dbt_bigquery"));
        registry.register(AdapterPlugin::new("duckdb", "dbt_duckdb"));
        registry.register(AdapterPlugin::new("spark", "dbt_spark"));
        registry.register(AdapterPlugin::new("databricks", "dbt_databricks").with_parent("spark"));
        registry
    }

    /// Built-in registry with the `[adapters.*]` entries of `config` merged in
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin();
        for (adapter_type, adapter) in &config.adapters {
            let mut plugin = AdapterPlugin::new(adapter_type, &adapter.package);
            plugin.parent = adapter.parent.clone();
            registry.register(plugin);
        }

        for plugin in registry.plugins.values() {
            if let Some(parent) = &plugin.parent {
                if parent != DEFAULT_ADAPTER_TYPE && !registry.plugins.contains_key(parent) {
                    return Err(ConfigError::UnknownAdapter {
                        adapter: plugin.adapter_type.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        Ok(registry)
    }

    /// Add or replace a plugin
    pub fn register(&mut self, plugin: AdapterPlugin) {
        self.plugins.insert(plugin.adapter_type.clone(), plugin);
    }

    pub fn get(&self, adapter_type: &str) -> Option<&AdapterPlugin> {
        self.plugins.get(adapter_type)
    }

    /// Adapter types from `adapter_type` up to the terminal `default`
    pub fn type_chain(&self, adapter_type: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(adapter_type.to_string());

        while let Some(adapter) = current {
            if adapter == DEFAULT_ADAPTER_TYPE || !seen.insert(adapter.clone()) {
                if adapter != DEFAULT_ADAPTER_TYPE {
                    tracing::warn!("Adapter inheritance cycle at '{}', chain cut", adapter);
                }
                break;
            }
            current = self.plugins.get(&adapter).and_then(|p| p.parent.clone());
            chain.push(adapter);
        }

        chain.push(DEFAULT_ADAPTER_TYPE.to_string());
        chain
    }

    /// Internal packages for `adapter_type`, most specific first, ending with
    /// the fallback package
    pub fn internal_packages(&self, adapter_type: &str) -> Vec<String> {
        let mut packages: Vec<String> = self
            .type_chain(adapter_type)
            .iter()
            .filter_map(|t| self.plugins.get(t))
            .map(|p| p.package_name.clone())
            .collect();
        packages.push(FALLBACK_PACKAGE.to_string());
        packages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdapterConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn chain_follows_parents() {
        let registry = AdapterRegistry::builtin();
        assert_eq!(registry.type_chain("redshift"), vec!["redshift", "postgres", "default"]);
        assert_eq!(registry.type_chain("snowflake"), vec!["snowflake", "default"]);
    }

    #[test]
    fn unknown_adapter_chain() {
        let registry = AdapterRegistry::builtin();
        assert_eq!(registry.type_chain("oracle"), vec!["oracle", "default"]);
        assert_eq!(registry.internal_packages("oracle"), vec!["dbt"]);
    }

    #[test]
    fn internal_packages_in_inheritance_order() {
        let registry = AdapterRegistry::builtin();
        assert_eq!(
            registry.internal_packages("databricks"),
            vec!["dbt_databricks", "dbt_spark", "dbt"]
        );
    }

    #[test]
    fn inheritance_cycle_is_cut() {
        let mut registry = AdapterRegistry::empty();
        registry.register(AdapterPlugin::new("a", "pkg_a").with_parent("b"));
        registry.register(AdapterPlugin::new("b", "pkg_b").with_parent("a"));

        assert_eq!(registry.type_chain("a"), vec!["a", "b", "default"]);
    }

    #[test]
    fn config_adapters_are_merged() {
        let mut config = Config::default();
        config.adapters.insert(
            "trino".to_string(),
            AdapterConfig {
                package: "dbt_trino".to_string(),
                parent: Some("postgres".to_string()),
            },
        );

        let registry = AdapterRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.internal_packages("trino"),
            vec!["dbt_trino", "dbt_postgres", "dbt"]
        );
    }

    #[test]
    fn config_adapter_with_unknown_parent_is_rejected() {
        let mut config = Config::default();
        config.adapters.insert(
            "trino".to_string(),
            AdapterConfig {
                package: "dbt_trino".to_string(),
                parent: Some("presto".to_string()),
            },
        );

        let err = AdapterRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAdapter { .. }));
    }
}
