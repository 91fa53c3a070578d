//! Resource registry: the fixed catalog plus coordination with the store.
//!
//! # Lifecycle
//!
//! 1. [`ResourceRegistry::open`] builds the catalog from configuration,
//!    connects the store and rehydrates holder state (and history).
//! 2. Callers route take/steal/release/query through the registry.
//! 3. [`ResourceRegistry::shutdown`] saves every category with changes the
//!    store has not seen and closes the store. A registry that only read
//!    never writes.
//!
//! # Locking
//!
//! Each resource's lease sits behind its own mutex; every
//! read-decide-write-append sequence runs while holding it. Saves for a
//! category are serialized by that category's write gate, and the snapshot
//! is taken while holding the gate. A lease mutex is never held while
//! waiting for the gate.

use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    lease::{Displaced, Lease, LeaseState, LeaseStatus},
    ledger::UsageRecord,
    resource::{Category, Metadata, Resource, ResourceInfo},
    store::LeaseStore,
    Error, Result,
};

/// Result of a take or release.
///
/// `success == false` is an ordinary outcome (already held, not the holder,
/// nothing to release), not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseOutcome {
    pub success: bool,
    pub status: LeaseStatus,
}

/// Result of a steal. Always successful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StealOutcome {
    pub success: bool,
    #[serde(flatten)]
    pub displaced: Displaced,
    pub status: LeaseStatus,
}

/// Holder state of every resource, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStatus {
    pub publishers: BTreeMap<String, LeaseStatus>,
    pub environments: BTreeMap<String, LeaseStatus>,
}

/// Whether the durable mirror is keeping up with memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceHealth {
    /// A store is attached
    pub enabled: bool,
    /// The most recent save failed; memory is ahead of the store
    pub degraded: bool,
    pub consecutive_failures: u64,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

/// What startup rehydration applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydrateReport {
    /// Rows applied to a catalog resource
    pub restored: usize,
    /// Of those, rows that left the resource held
    pub held: usize,
    /// Rows whose id is not in the catalog
    pub ignored: usize,
    /// Rows with a holder but no usable timestamp
    pub skipped: usize,
    /// History entries replayed into ledgers
    pub history_entries: usize,
}

/// One category's resources.
#[derive(Debug)]
struct Catalog {
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
    /// Write gate. Holds, per resource, how many ledger entries are already
    /// in the store.
    persisted_history: Mutex<Vec<usize>>,
    /// Memory holds changes the store has not confirmed
    dirty: AtomicBool,
}

impl Catalog {
    fn build(category: Category, config: &Config) -> Self {
        let resources: Vec<Resource> = config
            .resources(category)
            .iter()
            .map(|spec| Resource::new(category, &spec.id, &spec.name, spec.metadata.clone()))
            .collect();
        let index = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id().to_string(), i))
            .collect();
        let persisted_history = Mutex::new(vec![0; resources.len()]);
        Self {
            resources,
            index,
            persisted_history,
            dirty: AtomicBool::new(false),
        }
    }

    fn get(&self, id: &str) -> Option<&Resource> {
        self.index.get(id).and_then(|&i| self.resources.get(i))
    }
}

/// The fixed catalog of leasable resources.
#[derive(Debug)]
pub struct ResourceRegistry {
    publishers: Catalog,
    environments: Catalog,
    store: Option<LeaseStore>,
    persist_history: bool,
    health: RwLock<PersistenceHealth>,
}

impl ResourceRegistry {
    /// Build the catalog with no durable store.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            publishers: Catalog::build(Category::Publisher, config),
            environments: Catalog::build(Category::Environment, config),
            store: None,
            persist_history: false,
            health: RwLock::new(PersistenceHealth::default()),
        }
    }

    /// Attach a store. Call [`ResourceRegistry::hydrate`] afterwards.
    #[must_use]
    pub fn with_store(mut self, store: LeaseStore, persist_history: bool) -> Self {
        self.store = Some(store);
        self.persist_history = persist_history;
        self.health = RwLock::new(PersistenceHealth {
            enabled: true,
            ..PersistenceHealth::default()
        });
        self
    }

    /// Init phase: build the catalog, open the configured store, rehydrate.
    ///
    /// A store that cannot be read is an error rather than a silent fresh
    /// start, so the next save cannot overwrite state it never loaded.
    pub async fn open(config: &Config) -> Result<Self> {
        let store = LeaseStore::open(&config.store.path).await?;
        let registry = Self::from_config(config).with_store(store, config.store.persist_history);
        registry.hydrate().await?;
        Ok(registry)
    }

    /// Teardown phase: save categories with unsaved changes and close the
    /// store.
    pub async fn shutdown(self) -> Result<()> {
        let flushed = self.flush_dirty().await;
        if let Some(store) = &self.store {
            store.close().await;
        }
        flushed
    }

    const fn catalog(&self, category: Category) -> &Catalog {
        match category {
            Category::Publisher => &self.publishers,
            Category::Environment => &self.environments,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LOOKUP AND FILTERS
    // ═══════════════════════════════════════════════════════════════════════

    /// Look up one resource.
    pub fn get(&self, category: Category, id: &str) -> Result<&Resource> {
        self.catalog(category)
            .get(id)
            .ok_or_else(|| Error::not_found(category, id))
    }

    /// Resources of a category in catalog order.
    pub fn resources(&self, category: Category) -> impl Iterator<Item = &Resource> {
        self.catalog(category).resources.iter()
    }

    /// Every resource of a category.
    pub async fn list(&self, category: Category) -> Vec<ResourceInfo> {
        self.collect_infos(category, |_, _| true).await
    }

    /// Resources of a category nobody holds.
    pub async fn available(&self, category: Category) -> Vec<ResourceInfo> {
        self.collect_infos(category, |_, status| !status.is_taken)
            .await
    }

    /// Resources whose metadata satisfies `predicate`.
    pub async fn filter<F>(&self, category: Category, predicate: F) -> Vec<ResourceInfo>
    where
        F: Fn(&Metadata) -> bool,
    {
        self.collect_infos(category, |resource, _| predicate(resource.metadata()))
            .await
    }

    /// Resources with `metadata[key] == value`.
    pub async fn matching(&self, category: Category, key: &str, value: &str) -> Vec<ResourceInfo> {
        self.collect_infos(category, |resource, _| resource.metadata_matches(key, value))
            .await
    }

    /// Publishers of a kind, matched against either `type` or `platform`.
    pub async fn by_kind(&self, kind: &str) -> Vec<ResourceInfo> {
        self.collect_infos(Category::Publisher, |resource, _| {
            resource.metadata_matches("type", kind) || resource.metadata_matches("platform", kind)
        })
        .await
    }

    async fn collect_infos<F>(&self, category: Category, keep: F) -> Vec<ResourceInfo>
    where
        F: Fn(&Resource, &LeaseStatus) -> bool,
    {
        let mut infos = Vec::new();
        for resource in self.resources(category) {
            let status = resource.status().await;
            if keep(resource, &status) {
                infos.push(resource.info_with(status));
            }
        }
        infos
    }

    /// Holder state of every resource in every category.
    pub async fn status_all(&self) -> AggregateStatus {
        let mut aggregate = AggregateStatus::default();
        for category in Category::iter() {
            let mut statuses = BTreeMap::new();
            for resource in self.resources(category) {
                statuses.insert(resource.id().to_string(), resource.status().await);
            }
            match category {
                Category::Publisher => aggregate.publishers = statuses,
                Category::Environment => aggregate.environments = statuses,
            }
        }
        aggregate
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PER-RESOURCE QUERIES
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn info(&self, category: Category, id: &str) -> Result<ResourceInfo> {
        Ok(self.get(category, id)?.info().await)
    }

    pub async fn status(&self, category: Category, id: &str) -> Result<LeaseStatus> {
        Ok(self.get(category, id)?.status().await)
    }

    /// Past holder intervals, newest-first. `Some(0)` yields nothing.
    pub async fn history(
        &self,
        category: Category,
        id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<UsageRecord>> {
        Ok(self.get(category, id)?.lease.lock().await.history(limit))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Take a free resource.
    pub async fn take(&self, category: Category, id: &str, holder: &str) -> Result<LeaseOutcome> {
        let (success, status) = self
            .mutate(category, id, |lease| {
                let ok = lease.try_acquire(holder);
                (ok, ok)
            })
            .await?;
        Ok(LeaseOutcome { success, status })
    }

    /// Reassign a resource regardless of who holds it.
    pub async fn steal(&self, category: Category, id: &str, holder: &str) -> Result<StealOutcome> {
        let (displaced, status) = self
            .mutate(category, id, |lease| (true, lease.steal(holder)))
            .await?;
        Ok(StealOutcome {
            success: true,
            displaced,
            status,
        })
    }

    /// Release a resource, optionally only if `holder` holds it.
    pub async fn release(
        &self,
        category: Category,
        id: &str,
        holder: Option<&str>,
    ) -> Result<LeaseOutcome> {
        let (success, status) = self
            .mutate(category, id, |lease| {
                let ok = lease.release(holder);
                (ok, ok)
            })
            .await?;
        Ok(LeaseOutcome { success, status })
    }

    /// Release a resource without checking the holder.
    pub async fn force_release(&self, category: Category, id: &str) -> Result<LeaseOutcome> {
        let (success, status) = self
            .mutate(category, id, |lease| {
                let ok = lease.force_release();
                (ok, ok)
            })
            .await?;
        Ok(LeaseOutcome { success, status })
    }

    /// Run `op` inside the resource's critical section and, if it changed
    /// anything, save the category.
    async fn mutate<T, F>(&self, category: Category, id: &str, op: F) -> Result<(T, LeaseStatus)>
    where
        F: FnOnce(&mut Lease) -> (bool, T),
    {
        let resource = self.get(category, id)?;

        let (changed, output, status) = {
            let mut lease = resource.lease.lock().await;
            let (changed, output) = op(&mut lease);
            (changed, output, lease.snapshot())
        };

        if changed {
            debug!(
                %category,
                id,
                holder = status.holder.as_deref().unwrap_or("-"),
                "Lease changed"
            );
            self.catalog(category).dirty.store(true, Ordering::SeqCst);
            // record_save has already logged and recorded any failure.
            let _ = self.save(category).await;
        }

        Ok((output, status))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PERSISTENCE
    // ═══════════════════════════════════════════════════════════════════════

    /// Write every resource of `category` (and any history not yet stored).
    ///
    /// Failures are logged and reflected in [`PersistenceHealth`] before being
    /// returned. Without a store this is a no-op returning 0.
    pub async fn save(&self, category: Category) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let catalog = self.catalog(category);
        let mut persisted = catalog.persisted_history.lock().await;
        // Cleared before the snapshot so a change racing this save stays dirty.
        catalog.dirty.store(false, Ordering::SeqCst);

        let mut states = Vec::with_capacity(catalog.resources.len());
        let mut pending = Vec::new();
        for (idx, resource) in catalog.resources.iter().enumerate() {
            let lease = resource.lease.lock().await;
            states.push((resource.id().to_string(), lease.state().clone()));
            if self.persist_history {
                let from = persisted.get(idx).copied().unwrap_or(0);
                let unsaved = lease.ledger().since(from);
                if !unsaved.is_empty() {
                    pending.push((idx, unsaved.to_vec()));
                }
            }
        }

        let result = write_category(store, category, catalog, &states, pending, &mut persisted).await;
        if result.is_err() {
            catalog.dirty.store(true, Ordering::SeqCst);
        }
        drop(persisted);

        self.record_save(category, &result).await;
        result
    }

    /// Whether `category` has changes the store has not confirmed.
    pub fn has_unsaved_changes(&self, category: Category) -> bool {
        self.catalog(category).dirty.load(Ordering::SeqCst)
    }

    /// Save every category, returning the first failure.
    pub async fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for category in Category::iter() {
            if let Err(e) = self.save(category).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Save only the categories with unsaved changes, returning the first
    /// failure.
    pub async fn flush_dirty(&self) -> Result<()> {
        let mut first_error = None;
        for category in Category::iter().filter(|c| self.has_unsaved_changes(*c)) {
            if let Err(e) = self.save(category).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Apply stored state to the catalog. Unknown ids are ignored.
    pub async fn hydrate(&self) -> Result<HydrateReport> {
        let Some(store) = &self.store else {
            return Ok(HydrateReport::default());
        };

        let mut report = HydrateReport::default();
        for category in Category::iter() {
            let catalog = self.catalog(category);
            let mut persisted = catalog.persisted_history.lock().await;

            for record in store.load(category).await? {
                let Some(resource) = catalog.get(&record.resource_id) else {
                    debug!(%category, id = record.resource_id, "Ignoring stored state for unknown resource");
                    report.ignored += 1;
                    continue;
                };
                match record.lease_state() {
                    Some(state) => {
                        if state.is_held() {
                            report.held += 1;
                        }
                        resource.lease.lock().await.restore(state);
                        report.restored += 1;
                    }
                    None => {
                        warn!(
                            %category,
                            id = record.resource_id,
                            "Stored holder has no usable timestamp; leaving resource free"
                        );
                        report.skipped += 1;
                    }
                }
            }

            if self.persist_history {
                let grouped = store
                    .load_history(category)
                    .await?
                    .into_iter()
                    .into_group_map();
                for (id, records) in grouped {
                    let Some(&idx) = catalog.index.get(&id) else {
                        debug!(%category, id, "Ignoring stored history for unknown resource");
                        continue;
                    };
                    let count = records.len();
                    if let Some(resource) = catalog.resources.get(idx) {
                        resource
                            .lease
                            .lock()
                            .await
                            .restore_history(records.into_iter().collect());
                    }
                    if let Some(slot) = persisted.get_mut(idx) {
                        *slot = count;
                    }
                    report.history_entries += count;
                }
            }
        }

        info!(
            restored = report.restored,
            held = report.held,
            ignored = report.ignored,
            skipped = report.skipped,
            history = report.history_entries,
            "Loaded resource state"
        );
        Ok(report)
    }

    /// Discard all durable state. In-memory leases are untouched.
    pub async fn clear_store(&self) -> Result<()> {
        match &self.store {
            Some(store) => {
                store.clear().await?;
                info!("Cleared persisted resource state");
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub async fn persistence_health(&self) -> PersistenceHealth {
        self.health.read().await.clone()
    }

    /// Test that the store still accepts writes, without changing it, and
    /// report the resulting health.
    pub async fn check_persistence(&self) -> PersistenceHealth {
        if let Some(store) = &self.store {
            let result = store.check_writable().await;
            self.record_outcome("write check", &result).await;
        }
        self.persistence_health().await
    }

    async fn record_save(&self, category: Category, result: &Result<usize>) {
        self.record_outcome(category.as_key(), result).await;
    }

    async fn record_outcome<T>(&self, scope: &str, result: &Result<T>) {
        let mut health = self.health.write().await;
        match result {
            Ok(_) => {
                if health.degraded {
                    info!(scope, "Persistence recovered");
                }
                health.degraded = false;
                health.consecutive_failures = 0;
                health.last_error = None;
                health.last_success = Some(Utc::now());
            }
            Err(e) => {
                warn!(scope, error = %e, "Failed to save resource state");
                health.degraded = true;
                health.consecutive_failures += 1;
                health.last_error = Some(e.to_string());
            }
        }
    }
}

/// Append unsaved history, then upsert the category's rows. History cursors
/// advance per written entry so a failure part-way is retried next save.
async fn write_category(
    store: &LeaseStore,
    category: Category,
    catalog: &Catalog,
    states: &[(String, LeaseState)],
    pending: Vec<(usize, Vec<UsageRecord>)>,
    persisted: &mut [usize],
) -> Result<usize> {
    for (idx, records) in pending {
        let Some(resource) = catalog.resources.get(idx) else {
            continue;
        };
        for record in &records {
            store.append_history(category, resource.id(), record).await?;
            if let Some(slot) = persisted.get_mut(idx) {
                *slot += 1;
            }
        }
    }
    store.save(category, states).await
}
