//! The storage abstractions implemented by `migration-store` and consumed
//! by `migration-engine` and `migration-controller`.
//!
//! `backup`/`record` take an explicit `&mut Transaction` so the DDL
//! Executor can fold a backup and a journal write into the same
//! transaction as the `ALTER TABLE` statement it issues, as part of its
//! "open transaction -> backup -> DDL -> journal -> commit" envelope.
//! Every other method manages its own transaction internally, since it
//! is not part of that envelope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{BackupType, FieldDataBackup, FieldMigration};
use crate::error::Result;

/// filter applied when listing a form's migration history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryFilter {
    #[default]
    Any,
    OnlySuccess,
    OnlyFailed,
}

/// — backs up and restores column data around destructive DDL.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Snapshot every `(row_id, value)` pair in `table.column`, inside
    /// the caller-supplied `tx`, and set `retention_until` from the
    /// configured retention window. Fails with `TableMissing`/
    /// `ColumnMissing` if either does not exist.
    async fn backup(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        form_id: Uuid,
        table: &str,
        column: &str,
        backup_type: BackupType,
        actor: &str,
    ) -> Result<Uuid>;

    /// Write every captured value back into `table.column` by row id,
    /// skipping rows whose primary key no longer exists. Returns the
    /// number of rows actually restored. Fails with `BackupNotFound`/
    /// `BackupExpired`. Manages its own transaction and holds a
    /// row-level lock on the backup for its duration.
    async fn restore(&self, backup_id: Uuid, actor: &str) -> Result<u64>;

    /// Fetch a single backup by id, regardless of expiry.
    async fn get(&self, backup_id: Uuid) -> Result<Option<FieldDataBackup>>;

    /// List every backup captured for a form, most-recent-first.
    async fn list_for_form(&self, form_id: Uuid) -> Result<Vec<FieldDataBackup>>;

    /// Permanently delete every backup whose `retention_until` is at or
    /// before `cutoff`. Idempotent; safe to run concurrently with
    /// `restore`.
    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Read-only companion to `sweep_expired`, for cleanup previews.
    async fn count_expired(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// — the append-only, auditable migration history.
#[async_trait]
pub trait MigrationJournal: Send + Sync {
    /// Insert one entry inside the caller-supplied `tx`, as part of a
    /// successful migration's envelope.
    async fn record(&self, tx: &mut Transaction<'_, Postgres>, entry: FieldMigration) -> Result<Uuid>;

    /// Insert one entry outside of any enclosing transaction — used on
    /// the failure path, after the envelope transaction has already
    /// rolled back ("write journal entry with success=false
    /// outside that transaction").
    async fn record_standalone(&self, entry: FieldMigration) -> Result<Uuid>;

    /// Most-recent-first page of a form's history, optionally filtered.
    async fn by_form(
        &self,
        form_id: Uuid,
        filter: HistoryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<FieldMigration>, i64)>;

    /// Fetch a single entry by id.
    async fn get(&self, migration_id: Uuid) -> Result<Option<FieldMigration>>;

    /// Permanently delete successful journal entries older than `cutoff`.
    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
