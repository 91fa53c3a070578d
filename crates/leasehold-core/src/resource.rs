//! Catalog entries: publishers and staging environments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tokio::sync::Mutex;

use crate::lease::{Lease, LeaseStatus};

/// Opaque descriptive data attached to a resource.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Kind of leasable resource.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// QA publisher account
    #[strum(to_string = "Publisher", serialize = "publisher", serialize = "publishers", serialize = "pub")]
    Publisher,
    /// Staging environment
    #[strum(
        to_string = "Environment",
        serialize = "environment",
        serialize = "environments",
        serialize = "env"
    )]
    Environment,
}

impl Category {
    /// Storage key used in the durable store.
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Environment => "environment",
        }
    }

    /// Plural label used in aggregate reports.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Publisher => "publishers",
            Self::Environment => "environments",
        }
    }
}

/// A leasable resource: fixed identity plus its lease.
#[derive(Debug)]
pub struct Resource {
    id: String,
    display_name: String,
    category: Category,
    metadata: Metadata,
    pub(crate) lease: Mutex<Lease>,
}

impl Resource {
    #[must_use]
    pub fn new(
        category: Category,
        id: impl Into<String>,
        display_name: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            category,
            metadata,
            lease: Mutex::new(Lease::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Whether `metadata[key]` equals `value`, comparing strings without
    /// their JSON quoting.
    #[must_use]
    pub fn metadata_matches(&self, key: &str, value: &str) -> bool {
        self.metadata.get(key).is_some_and(|v| match v {
            serde_json::Value::String(s) => s == value,
            other => other.to_string() == value,
        })
    }

    pub async fn status(&self) -> LeaseStatus {
        self.lease.lock().await.snapshot()
    }

    pub async fn info(&self) -> ResourceInfo {
        let status = self.status().await;
        self.info_with(status)
    }

    pub(crate) fn info_with(&self, status: LeaseStatus) -> ResourceInfo {
        ResourceInfo {
            id: self.id.clone(),
            name: self.display_name.clone(),
            category: self.category,
            status,
            metadata: self.metadata.clone(),
        }
    }
}

/// Full description of a resource for listing and `info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub name: String,
    pub category: Category,
    #[serde(flatten)]
    pub status: LeaseStatus,
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_category_parses_aliases() {
        assert_eq!(Category::from_str("publisher").ok(), Some(Category::Publisher));
        assert_eq!(Category::from_str("Publishers").ok(), Some(Category::Publisher));
        assert_eq!(Category::from_str("env").ok(), Some(Category::Environment));
        assert_eq!(Category::from_str("ENVIRONMENTS").ok(), Some(Category::Environment));
        assert!(Category::from_str("database").is_err());
    }

    #[test]
    fn test_category_display_and_keys() {
        assert_eq!(Category::Publisher.to_string(), "Publisher");
        assert_eq!(Category::Environment.as_key(), "environment");
        assert_eq!(Category::Publisher.plural(), "publishers");
    }

    #[test]
    fn test_metadata_matches_strings_and_scalars() {
        let metadata: Metadata = [
            ("type".to_string(), json!("smb")),
            ("instance".to_string(), json!(2)),
        ]
        .into_iter()
        .collect();
        let resource = Resource::new(Category::Publisher, "1689467", "SMB", metadata);

        assert!(resource.metadata_matches("type", "smb"));
        assert!(!resource.metadata_matches("type", "ios"));
        assert!(resource.metadata_matches("instance", "2"));
        assert!(!resource.metadata_matches("platform", "smb"));
    }

    #[tokio::test]
    async fn test_info_flattens_status() -> Result<(), serde_json::Error> {
        let resource = Resource::new(Category::Environment, "prime-staging", "Prime", Metadata::new());
        let info = resource.info().await;
        assert_eq!(info.name, "Prime");
        assert!(!info.status.is_taken);

        let json = serde_json::to_value(&info)?;
        assert_eq!(json["is_taken"], false);
        assert_eq!(json["category"], "environment");
        Ok(())
    }
}
