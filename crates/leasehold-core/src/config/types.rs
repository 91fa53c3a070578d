//! Configuration structure definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resource::{Category, Metadata};

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub publishers: Vec<ResourceSpec>,
    pub environments: Vec<ResourceSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// Mirror every ledger entry into the store
    pub persist_history: bool,
}

/// One catalog entry as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Config {
    /// Catalog entries for one category, in configuration order.
    #[must_use]
    pub fn resources(&self, category: Category) -> &[ResourceSpec] {
        match category {
            Category::Publisher => &self.publishers,
            Category::Environment => &self.environments,
        }
    }
}

/// A configuration file layer. Absent keys leave the lower layer untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigLayer {
    pub store: Option<StoreLayer>,
    pub publishers: Option<Vec<ResourceSpec>>,
    pub environments: Option<Vec<ResourceSpec>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StoreLayer {
    pub path: Option<PathBuf>,
    pub persist_history: Option<bool>,
}
