//! Configuration validation

use std::collections::HashSet;

use strum::IntoEnumIterator;

use super::types::Config;
use crate::{resource::Category, Error, Result};

impl Config {
    /// Reject catalogs the registry cannot index unambiguously.
    pub fn validate(&self) -> Result<()> {
        if self.store.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("store.path cannot be empty".into()));
        }

        Category::iter().try_for_each(|category| {
            let mut seen = HashSet::new();
            self.resources(category).iter().try_for_each(|spec| {
                if spec.id.trim().is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "{category} id cannot be empty"
                    )));
                }
                if spec.id.trim() != spec.id {
                    return Err(Error::InvalidConfig(format!(
                        "{category} id '{}' has surrounding whitespace",
                        spec.id
                    )));
                }
                if spec.name.trim().is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "{category} '{}' has an empty name",
                        spec.id
                    )));
                }
                if !seen.insert(spec.id.as_str()) {
                    return Err(Error::InvalidConfig(format!(
                        "Duplicate {category} id: {}",
                        spec.id
                    )));
                }
                Ok(())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(toml: &str) -> bool {
        matches!(Config::from_toml_str(toml), Err(Error::InvalidConfig(_)))
    }

    #[test]
    fn test_duplicate_id_rejected() {
        assert!(invalid(
            r#"
            [[publishers]]
            id = "1"
            name = "A"
            [[publishers]]
            id = "1"
            name = "B"
            "#
        ));
    }

    #[test]
    fn test_same_id_in_different_categories_allowed() -> Result<()> {
        let config = Config::from_toml_str(
            r#"
            [[publishers]]
            id = "shared"
            name = "A"
            [[environments]]
            id = "shared"
            name = "B"
            "#,
        )?;
        assert_eq!(config.publishers[0].id, config.environments[0].id);
        Ok(())
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(invalid(
            r#"
            [[environments]]
            id = "  "
            name = "Blank"
            "#
        ));
    }

    #[test]
    fn test_padded_id_rejected() {
        assert!(invalid(
            r#"
            [[environments]]
            id = " prime "
            name = "Prime"
            "#
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(invalid(
            r#"
            [[environments]]
            id = "prime"
            name = ""
            "#
        ));
    }

    #[test]
    fn test_empty_store_path_rejected() {
        assert!(invalid(
            r#"
            [store]
            path = ""
            "#
        ));
    }

    #[test]
    fn test_empty_catalog_is_valid() -> Result<()> {
        let config = Config::from_toml_str("publishers = []\nenvironments = []")?;
        assert!(config.publishers.is_empty());
        assert!(config.environments.is_empty());
        Ok(())
    }
}
