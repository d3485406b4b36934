//! Shared fixtures for manifest integration tests
//!
//! `jaffle_shop.json` is a trimmed dbt manifest for the jaffle_shop demo
//! project on postgres. It has:
//! - seeds, a source, staging models and marts (one of them versioned)
//! - a `jaffle_utils` dependency package that shadows some names
//! - generic tests, an exposure, a semantic model, a metric and two groups
//! - materialization macros in the root, imported and internal tiers

use std::path::PathBuf;
use dagrefly_manifest::{Manifest, ManifestNode, ResourceType};

pub const ROOT_PROJECT: &str = "jaffle_shop";
pub const UTILS_PACKAGE: &str = "jaffle_utils";

pub fn jaffle_shop_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("jaffle_shop.json")
}

pub fn jaffle_shop() -> Manifest {
    Manifest::from_file(&jaffle_shop_path()).unwrap()
}

/// Three models, two in `analytics` and one in `finance`
pub fn grouped_models() -> Manifest {
    let mut manifest = Manifest::new("shop", "postgres");
    let models = [("revenue", "analytics"), ("sessions", "analytics"), ("ledger", "finance")];
    for (name, group) in models {
        manifest
            .add_node(ManifestNode::new(ResourceType::Model, "shop", name).with_group(group))
            .unwrap();
    }
    manifest
}
