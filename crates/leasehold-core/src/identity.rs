//! Holder identity: who is asking for a resource.

use crate::{Error, Result};

/// Environment variable naming the holder explicitly.
pub const ENV_HOLDER: &str = "LEASEHOLD_HOLDER";

/// Identity used when nothing else is available.
pub const FALLBACK_HOLDER: &str = "unknown";

/// Resolve the caller's identity from the process environment.
#[must_use]
pub fn resolve_holder() -> String {
    resolve_holder_with(|key| std::env::var(key).ok())
}

/// Resolve the caller's identity with an injected lookup.
///
/// Tries `LEASEHOLD_HOLDER`, then `USER`, then `USERNAME`; blank values are
/// skipped.
pub fn resolve_holder_with<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    [ENV_HOLDER, "USER", "USERNAME"]
        .into_iter()
        .filter_map(&lookup)
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| FALLBACK_HOLDER.to_string())
}

/// Normalize a caller-supplied holder name.
///
/// Returns the trimmed name, or [`Error::InvalidHolder`] if nothing is left.
pub fn validate_holder(holder: &str) -> Result<String> {
    let trimmed = holder.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidHolder(
            "Holder name cannot be empty or whitespace-only".into(),
        ));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::InvalidHolder(format!(
            "Holder name '{}' contains control characters",
            trimmed.escape_default()
        )));
    }
    Ok(trimmed.to_string())
}
