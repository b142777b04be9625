//! The Migration Controller: the façade `migration-server` and
//! `migration-cli` both sit on top of, composing the DDL Executor, the
//! storage traits, and the per-form queue.

use std::sync::Arc;

use chrono::Utc;
use migration_core::{
    BackupStore, Field, FieldDataBackup, FieldMigration, Form, HistoryFilter, MigrationJournal,
    MigrationType,
};
use migration_engine::{detect, DdlExecutor, PreviewedChange, SchemaOperation};
use migration_queue::{Job, JobAction, JobPayload, JobStore, QueueScheduler, DEFAULT_MAX_ATTEMPTS};
use migration_store::RetentionConfig;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Read-only summary returned by `cleanup` (`DELETE /migrations/cleanup`).
#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub expired_backups: u64,
    pub deleted_backups: u64,
    pub deleted_journal_entries: u64,
    pub dry_run: bool,
    pub days: i64,
    pub cutoff: chrono::DateTime<Utc>,
}

pub struct MigrationController {
    pool: PgPool,
    executor: Arc<DdlExecutor>,
    backups: Arc<dyn BackupStore>,
    journal: Arc<dyn MigrationJournal>,
    queue: Arc<QueueScheduler>,
    jobs: Arc<JobStore>,
}

impl MigrationController {
    pub fn new(pool: PgPool, backups: Arc<dyn BackupStore>, journal: Arc<dyn MigrationJournal>) -> Self {
        let executor = Arc::new(DdlExecutor::new(pool.clone(), backups.clone(), journal.clone()));
        let jobs = Arc::new(JobStore::new(pool.clone()));
        let queue = Arc::new(QueueScheduler::new(
            jobs.clone(),
            executor.clone(),
            backups.clone(),
            journal.clone(),
        ));
        Self {
            pool,
            executor,
            backups,
            journal,
            queue,
            jobs,
        }
    }

    /// `previewPlan`: detect the delta and preview every
    /// resulting operation. Touches no tables.
    pub fn preview_plan(&self, form: &Form, old_fields: &[Field], new_fields: &[Field]) -> Vec<PreviewedChange> {
        detect(form, old_fields, new_fields)
            .iter()
            .map(|op| self.executor.preview(op))
            .collect()
    }

    /// `updateFormFields`: detect the delta and enqueue every
    /// resulting operation on the form's queue, preserving detection
    /// order (rename before change-type on the same field).
    pub async fn update_form_fields(
        &self,
        form: &Form,
        old_fields: &[Field],
        new_fields: &[Field],
        actor: &str,
    ) -> Result<Vec<Uuid>> {
        let ops = detect(form, old_fields, new_fields);
        self.execute_plan(form.id, ops, actor).await
    }

    /// Previews an already-decided plan directly, without a field diff —
    /// the shape the HTTP `POST /migrations/preview` contract accepts
    /// (`changes[]`, not an old/new field pair).
    pub fn preview_operations(&self, ops: &[SchemaOperation]) -> Vec<PreviewedChange> {
        ops.iter().map(|op| self.executor.preview(op)).collect()
    }

    /// `executePlan`: enqueue an already-computed plan. Used
    /// directly when a caller has already previewed a plan and wants to
    /// commit to it without re-detecting.
    pub async fn execute_plan(&self, form_id: Uuid, ops: Vec<SchemaOperation>, actor: &str) -> Result<Vec<Uuid>> {
        let mut job_ids = Vec::with_capacity(ops.len());
        for op in ops {
            let payload = JobPayload {
                action: JobAction::Migrate(op),
                requested_by: actor.to_string(),
            };
            job_ids.push(self.queue.enqueue(form_id, payload, DEFAULT_MAX_ATTEMPTS).await?);
        }
        Ok(job_ids)
    }

    /// `rollback`: re-applies a successful entry's inverse SQL
    /// directly (rollback is an explicit, synchronous operator action,
    /// not queued), and appends a new journal entry recording it.
    pub async fn rollback(&self, migration_id: Uuid, form: &Form, actor: &str) -> Result<Uuid> {
        let entry = self
            .journal
            .get(migration_id)
            .await?
            .ok_or(migration_core::Error::MigrationNotFound(migration_id))?;

        if let (false, reason) = can_rollback(&entry, form) {
            return Err(Error::NotRollbackable(migration_id, reason.unwrap_or("not reversible")));
        }
        let rollback_sql = entry
            .rollback_sql
            .clone()
            .expect("can_rollback guarantees rollback_sql is present");

        let mut tx = self.pool.begin().await?;
        sqlx::query(&rollback_sql).execute(&mut *tx).await?;

        let reverted = FieldMigration {
            id: Uuid::new_v4(),
            field_id: entry.field_id,
            form_id: entry.form_id,
            migration_type: entry.migration_type,
            table_name: entry.table_name.clone(),
            column_name: entry.column_name.clone(),
            old_value: entry.new_value.clone(),
            new_value: entry.old_value.clone(),
            rollback_sql: None,
            backup_id: None,
            executed_by: actor.to_string(),
            executed_at: Utc::now(),
            success: true,
            error_message: None,
        };
        let new_id = self.journal.record(&mut tx, reverted).await?;
        tx.commit().await?;
        Ok(new_id)
    }

    /// `restore`: enqueues a RESTORE job on the same per-form queue as
    /// any other migration, so it strictly follows whatever is already
    /// waiting for that form.
    pub async fn restore(&self, backup_id: Uuid, form_id: Uuid, actor: &str) -> Result<Uuid> {
        let payload = JobPayload {
            action: JobAction::Restore { backup_id },
            requested_by: actor.to_string(),
        };
        Ok(self.queue.enqueue(form_id, payload, DEFAULT_MAX_ATTEMPTS).await?)
    }

    /// `listHistory`.
    pub async fn list_history(
        &self,
        form_id: Uuid,
        filter: HistoryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<FieldMigration>, i64)> {
        Ok(self.journal.by_form(form_id, filter, limit, offset).await?)
    }

    /// `listBackups`.
    pub async fn list_backups(&self, form_id: Uuid) -> Result<Vec<FieldDataBackup>> {
        Ok(self.backups.list_for_form(form_id).await?)
    }

    /// `queueStatus`.
    pub async fn queue_status(&self, form_id: Uuid) -> Result<Vec<Job>> {
        Ok(self.jobs.status_for_form(form_id).await?)
    }

    /// `cancelJob`: cancel a job that is still waiting on its
    /// form's queue. Fails if the job has already been claimed or
    /// finished.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<()> {
        Ok(self.jobs.cancel_waiting(job_id).await?)
    }

    /// `drainQueue`: remove completed and failed jobs for `form_id`
    /// last updated at or before `older_than`, returning
    /// `(completed_removed, failed_removed)`.
    pub async fn drain_queue(
        &self,
        form_id: Uuid,
        older_than: chrono::DateTime<Utc>,
    ) -> Result<(u64, u64)> {
        let completed = self.jobs.drain_completed(form_id, older_than).await?;
        let failed = self.jobs.drain_failed(form_id, older_than).await?;
        Ok((completed, failed))
    }

    /// `cleanup`: sweep entries older than `days` (bound to the same
    /// `[MIN_DAYS, MAX_DAYS]` window as the Backup Store's retention
    /// config). `dry_run` reports what would be deleted without deleting
    /// anything.
    pub async fn cleanup(&self, days: i64, dry_run: bool) -> Result<CleanupReport> {
        if days < RetentionConfig::MIN_DAYS || days > RetentionConfig::MAX_DAYS {
            return Err(Error::InvalidCleanupDays(days));
        }
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let expired_backups = self.backups.count_expired(cutoff).await?;
        let (deleted_backups, deleted_journal_entries) = if dry_run {
            (0, 0)
        } else {
            let deleted_backups = self.backups.sweep_expired(cutoff).await?;
            let deleted_journal_entries = self.journal.sweep_expired(cutoff).await?;
            (deleted_backups, deleted_journal_entries)
        };
        Ok(CleanupReport {
            expired_backups,
            deleted_backups,
            deleted_journal_entries,
            dry_run,
            days,
            cutoff,
        })
    }
}

/// `can_rollback`: true only for a successful, reversible
/// entry; for ADD_COLUMN, additionally only once the field is no longer
/// present in the form's current field list (otherwise dropping the
/// column it added would desync the form from its own table).
fn can_rollback(entry: &FieldMigration, form: &Form) -> (bool, Option<&'static str>) {
    if !entry.is_reversible() {
        return (false, Some("migration was not successful or has no rollback SQL"));
    }
    if entry.migration_type == MigrationType::AddColumn {
        let still_present = entry
            .field_id
            .map(|id| form.fields.iter().any(|f| f.id == id))
            .unwrap_or(false);
        if still_present {
            return (false, Some("field is still present on the form"));
        }
    }
    (true, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration_core::FieldDataType;

    fn form_with_field(field_id: Uuid) -> Form {
        Form {
            id: Uuid::new_v4(),
            table_name: "form_orders".into(),
            fields: vec![Field {
                id: field_id,
                form_id: Uuid::new_v4(),
                column_name: "amount".into(),
                data_type: FieldDataType::Number,
                sub_form_id: None,
            }],
        }
    }

    fn base_entry(migration_type: MigrationType, field_id: Option<Uuid>) -> FieldMigration {
        FieldMigration {
            id: Uuid::new_v4(),
            field_id,
            form_id: Uuid::new_v4(),
            migration_type,
            table_name: "form_orders".into(),
            column_name: "amount".into(),
            old_value: None,
            new_value: None,
            rollback_sql: Some("ALTER TABLE form_orders DROP COLUMN amount".into()),
            backup_id: None,
            executed_by: "tester".into(),
            executed_at: Utc::now(),
            success: true,
            error_message: None,
        }
    }

    #[test]
    fn add_column_is_not_rollbackable_while_the_field_still_exists() {
        let field_id = Uuid::new_v4();
        let form = form_with_field(field_id);
        let entry = base_entry(MigrationType::AddColumn, Some(field_id));
        let (ok, _) = can_rollback(&entry, &form);
        assert!(!ok);
    }

    #[test]
    fn add_column_is_rollbackable_once_the_field_is_gone() {
        let form = form_with_field(Uuid::new_v4());
        let entry = base_entry(MigrationType::AddColumn, Some(Uuid::new_v4()));
        let (ok, _) = can_rollback(&entry, &form);
        assert!(ok);
    }

    #[test]
    fn failed_migrations_are_never_rollbackable() {
        let form = form_with_field(Uuid::new_v4());
        let mut entry = base_entry(MigrationType::DropColumn, Some(Uuid::new_v4()));
        entry.success = false;
        let (ok, _) = can_rollback(&entry, &form);
        assert!(!ok);
    }

    #[test]
    fn rename_column_ignores_field_presence() {
        let field_id = Uuid::new_v4();
        let form = form_with_field(field_id);
        let entry = base_entry(MigrationType::RenameColumn, Some(field_id));
        let (ok, _) = can_rollback(&entry, &form);
        assert!(ok);
    }
}
