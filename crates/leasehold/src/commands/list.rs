//! List resources of one category.

use anyhow::Result;
use leasehold_core::{Category, ResourceInfo, ResourceRegistry};

use super::{describe, Reply};

/// Narrowing applied to `list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub available_only: bool,
    /// `(key, value)` that metadata must match
    pub metadata: Option<(String, String)>,
    /// Publisher `type` or `platform`
    pub kind: Option<String>,
}

pub async fn run(
    registry: &ResourceRegistry,
    category: Category,
    filter: &ListFilter,
) -> Result<Reply> {
    let infos = match (&filter.metadata, &filter.kind) {
        (_, Some(kind)) => {
            if category != Category::Publisher {
                anyhow::bail!("--kind only applies to publishers");
            }
            registry.by_kind(kind).await
        }
        (Some((key, value)), None) => registry.matching(category, key, value).await,
        (None, None) if filter.available_only => registry.available(category).await,
        (None, None) => registry.list(category).await,
    };

    let infos: Vec<ResourceInfo> = infos
        .into_iter()
        .filter(|info| !filter.available_only || !info.status.is_taken)
        .collect();

    Reply::ok(render(category, &infos), &infos)
}

fn render(category: Category, infos: &[ResourceInfo]) -> String {
    if infos.is_empty() {
        return format!("No matching {}", category.plural());
    }

    let width = infos.iter().map(|i| i.id.len()).max().unwrap_or(0);
    let header = format!("{} ({}):", capitalized(category.plural()), infos.len());
    std::iter::once(header)
        .chain(infos.iter().map(|info| {
            format!(
                "  {:<width$}  {}  [{}]",
                info.id,
                info.name,
                describe(&info.status)
            )
        }))
        .collect::<Vec<_>>()
        .join("\n")
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use leasehold_core::{LeaseStatus, Metadata};

    use super::*;

    fn info(id: &str, name: &str, holder: Option<&str>) -> ResourceInfo {
        ResourceInfo {
            id: id.to_string(),
            name: name.to_string(),
            category: Category::Environment,
            status: LeaseStatus {
                is_taken: holder.is_some(),
                holder: holder.map(str::to_string),
                held_since: None,
            },
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_render_aligns_ids() {
        let text = render(
            Category::Environment,
            &[
                info("prime-staging", "Prime", Some("alice")),
                info("jade-pubs-2-staging", "Jade Pubs 2", None),
            ],
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Environments (2):");
        assert!(lines[1].starts_with("  prime-staging        Prime"));
        assert!(lines[1].ends_with("[taken by alice]"));
        assert!(lines[2].ends_with("[available]"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(Category::Publisher, &[]), "No matching publishers");
    }
}
