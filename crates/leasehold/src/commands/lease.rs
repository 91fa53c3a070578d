//! take, steal and release.

use anyhow::Result;
use leasehold_core::{
    Category, LeaseOutcome, PersistenceHealth, ResourceRegistry, StealOutcome,
};
use serde::Serialize;

use super::Reply;

#[derive(Serialize)]
struct ActionResponse<'a, T: Serialize> {
    message: &'a str,
    #[serde(flatten)]
    outcome: &'a T,
    /// Present only when the change did not reach the store
    #[serde(skip_serializing_if = "Option::is_none")]
    persistence: Option<&'a PersistenceHealth>,
}

/// Health to report alongside a change, if the change went unsaved.
async fn unsaved(registry: &ResourceRegistry, changed: bool) -> Option<PersistenceHealth> {
    if !changed {
        return None;
    }
    Some(registry.persistence_health().await).filter(|health| health.degraded)
}

fn reply<T: Serialize>(
    success: bool,
    message: String,
    outcome: &T,
    unsaved: Option<&PersistenceHealth>,
) -> Result<Reply> {
    let message = match unsaved {
        Some(health) => format!(
            "{message} (not saved: {})",
            health.last_error.as_deref().unwrap_or("unknown error")
        ),
        None => message,
    };
    let body = ActionResponse {
        message: &message,
        outcome,
        persistence: unsaved,
    };
    Ok(Reply::new(success, message.clone(), &body)?.with_degraded(unsaved.is_some()))
}

pub async fn take(
    registry: &ResourceRegistry,
    category: Category,
    id: &str,
    holder: &str,
) -> Result<Reply> {
    let outcome = registry.take(category, id, holder).await?;
    let unsaved = unsaved(registry, outcome.success).await;
    reply(
        outcome.success,
        take_message(category, id, holder, &outcome),
        &outcome,
        unsaved.as_ref(),
    )
}

pub async fn steal(
    registry: &ResourceRegistry,
    category: Category,
    id: &str,
    holder: &str,
) -> Result<Reply> {
    let outcome = registry.steal(category, id, holder).await?;
    let unsaved = unsaved(registry, true).await;
    reply(
        true,
        steal_message(category, id, holder, &outcome),
        &outcome,
        unsaved.as_ref(),
    )
}

pub async fn release(
    registry: &ResourceRegistry,
    category: Category,
    id: &str,
    holder: Option<&str>,
) -> Result<Reply> {
    let outcome = registry.release(category, id, holder).await?;
    let unsaved = unsaved(registry, outcome.success).await;
    reply(
        outcome.success,
        release_message(category, id, holder, &outcome),
        &outcome,
        unsaved.as_ref(),
    )
}

fn take_message(category: Category, id: &str, holder: &str, outcome: &LeaseOutcome) -> String {
    if outcome.success {
        format!("{category} {id} successfully taken by {holder}")
    } else {
        let current = outcome.status.holder.as_deref().unwrap_or("unknown");
        format!("{category} {id} is already taken by {current}")
    }
}

fn steal_message(category: Category, id: &str, holder: &str, outcome: &StealOutcome) -> String {
    match &outcome.displaced.previous_holder {
        Some(previous) => format!("{category} {id} stolen by {holder} from {previous}"),
        None => format!("{category} {id} stolen by {holder}"),
    }
}

fn release_message(
    category: Category,
    id: &str,
    requested: Option<&str>,
    outcome: &LeaseOutcome,
) -> String {
    if outcome.success {
        return format!("{category} {id} successfully released");
    }
    match (&outcome.status.holder, requested) {
        (Some(current), Some(requested)) => {
            format!("{category} {id} is held by {current}, not {requested}")
        }
        _ => format!("{category} {id} was not taken"),
    }
}
