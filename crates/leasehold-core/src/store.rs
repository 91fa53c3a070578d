//! Durable lease state backed by `SQLite`.
//!
//! One database holds every category. `resource_state` carries exactly one
//! row per `(category, resource_id)`, rewritten in full on every save.
//! `usage_history` mirrors ledger appends when durable history is enabled.

use std::{path::Path, str::FromStr};

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    lease::LeaseState,
    ledger::UsageRecord,
    resource::Category,
    Error, Result,
};

const CURRENT_SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY CHECK(version = 1)
);

CREATE TABLE IF NOT EXISTS resource_state (
    category TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    holder TEXT,
    held_since TEXT,
    last_updated TEXT NOT NULL,
    PRIMARY KEY (category, resource_id)
);

CREATE TABLE IF NOT EXISTS usage_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    holder TEXT NOT NULL,
    acquired_at TEXT NOT NULL,
    released_at TEXT NOT NULL,
    stolen_by TEXT
);

CREATE INDEX IF NOT EXISTS idx_usage_history_resource
    ON usage_history(category, resource_id);
";

/// A stored holder row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRecord {
    pub category: Category,
    pub resource_id: String,
    pub holder: Option<String>,
    /// `None` when absent or unparseable
    pub held_since: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl PersistedRecord {
    /// The lease state this row describes, or `None` if holder and
    /// timestamp disagree.
    #[must_use]
    pub fn lease_state(&self) -> Option<LeaseState> {
        LeaseState::from_parts(self.holder.clone(), self.held_since)
    }
}

/// Durable mirror of lease state.
#[derive(Debug, Clone)]
pub struct LeaseStore {
    pool: SqlitePool,
}

impl LeaseStore {
    /// Open or create the database at `path` and ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::IoError(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::DatabaseError(format!(
                    "Failed to open database {}: {e}",
                    path.display()
                ))
            })?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Private in-memory database. Lives as long as the store.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Get the database pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(format!("Failed to initialize schema: {e}")))?;

        sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
            .bind(CURRENT_SCHEMA_VERSION)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(format!("Failed to set schema version: {e}")))?;

        Ok(())
    }

    /// Upsert one row per resource of `category`.
    ///
    /// Runs in a single transaction: either every row is written with the
    /// same `last_updated`, or none is.
    pub async fn save(&self, category: Category, snapshot: &[(String, LeaseState)]) -> Result<usize> {
        let now = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        for (resource_id, state) in snapshot {
            sqlx::query(
                "INSERT INTO resource_state (category, resource_id, holder, held_since, last_updated)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(category, resource_id) DO UPDATE SET
                     holder = excluded.holder,
                     held_since = excluded.held_since,
                     last_updated = excluded.last_updated",
            )
            .bind(category.as_key())
            .bind(resource_id)
            .bind(state.holder())
            .bind(state.held_since().map(|t| t.to_rfc3339()))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(snapshot.len())
    }

    /// All stored rows for `category`, ordered by id. Rows with an
    /// unparseable `last_updated` are skipped.
    pub async fn load(&self, category: Category) -> Result<Vec<PersistedRecord>> {
        let rows: Vec<(String, Option<String>, Option<String>, String)> = sqlx::query_as(
            "SELECT resource_id, holder, held_since, last_updated
             FROM resource_state
             WHERE category = ?
             ORDER BY resource_id ASC",
        )
        .bind(category.as_key())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let records = rows
            .into_iter()
            .filter_map(|(resource_id, holder, held_since, last_updated)| {
                let last_updated = parse_timestamp(&last_updated)
                    .map_err(|e| {
                        tracing::warn!(%category, %resource_id, "Skipping row: {e}");
                    })
                    .ok()?;
                let held_since = held_since.and_then(|raw| {
                    parse_timestamp(&raw)
                        .map_err(|e| {
                            tracing::warn!(%category, %resource_id, "Unparseable held_since {raw:?}: {e}");
                        })
                        .ok()
                });
                Some(PersistedRecord {
                    category,
                    resource_id,
                    holder,
                    held_since,
                    last_updated,
                })
            })
            .collect();
        Ok(records)
    }

    /// Record one closed holder interval.
    pub async fn append_history(
        &self,
        category: Category,
        resource_id: &str,
        record: &UsageRecord,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_history
                 (category, resource_id, holder, acquired_at, released_at, stolen_by)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(category.as_key())
        .bind(resource_id)
        .bind(&record.holder)
        .bind(record.acquired_at.to_rfc3339())
        .bind(record.released_at.to_rfc3339())
        .bind(record.stolen_by())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Stored history for `category` as `(resource_id, record)`, oldest-first.
    /// Entries with an unparseable timestamp are skipped.
    pub async fn load_history(&self, category: Category) -> Result<Vec<(String, UsageRecord)>> {
        let rows: Vec<(String, String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT resource_id, holder, acquired_at, released_at, stolen_by
             FROM usage_history
             WHERE category = ?
             ORDER BY id ASC",
        )
        .bind(category.as_key())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let history = rows
            .into_iter()
            .filter_map(|(resource_id, holder, acquired, released, stolen_by)| {
                let interval = parse_timestamp(&acquired).and_then(|acquired_at| {
                    parse_timestamp(&released).map(|released_at| (acquired_at, released_at))
                });
                let (acquired_at, released_at) = interval
                    .map_err(|e| {
                        tracing::warn!(%category, %resource_id, "Skipping history entry: {e}");
                    })
                    .ok()?;
                let record = match stolen_by {
                    Some(by) => UsageRecord::stolen(holder, acquired_at, released_at, by),
                    None => UsageRecord::released(holder, acquired_at, released_at),
                };
                Some((resource_id, record))
            })
            .collect();
        Ok(history)
    }

    /// Confirm the database accepts writes to both tables. Nothing is kept:
    /// the transaction is rolled back.
    pub async fn check_writable(&self) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO resource_state (category, resource_id, holder, held_since, last_updated)
             VALUES ('_check', '_check', NULL, NULL, ?)",
        )
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO usage_history
                 (category, resource_id, holder, acquired_at, released_at, stolen_by)
             VALUES ('_check', '_check', '_check', ?, ?, NULL)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        tx.rollback()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))
    }

    /// Discard all durable state.
    pub async fn clear(&self) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM resource_state")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM usage_history")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::ParseError(format!("Invalid timestamp '{raw}': {e}")))
}
