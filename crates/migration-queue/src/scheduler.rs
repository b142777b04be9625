//! The per-form worker scheduler: one cooperative worker task per form,
//! spawned on demand and retired when its form has no pending work,
//! driven by a `tokio::select!` loop over a wake channel and an idle
//! timer, with workers tracked in a concurrent map keyed by form id.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use dashmap::DashMap;
use migration_core::{BackupStore, FieldMigration, MigrationJournal, MigrationType};
use migration_engine::DdlExecutor;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::job::{backoff_for_attempt, Job, JobAction, JobPayload};
use crate::store::JobStore;

/// How long a form's worker waits for new work before checking whether
/// it should retire.
const IDLE_TIMEOUT: StdDuration = StdDuration::from_secs(30);

struct WorkerHandle {
    wake: mpsc::UnboundedSender<()>,
}

/// Owns the live worker-per-form registry and the shared job store and
/// DDL executor every worker draws from.
pub struct QueueScheduler {
    store: Arc<JobStore>,
    executor: Arc<DdlExecutor>,
    backups: Arc<dyn BackupStore>,
    journal: Arc<dyn MigrationJournal>,
    workers: Arc<DashMap<Uuid, WorkerHandle>>,
}

impl QueueScheduler {
    pub fn new(
        store: Arc<JobStore>,
        executor: Arc<DdlExecutor>,
        backups: Arc<dyn BackupStore>,
        journal: Arc<dyn MigrationJournal>,
    ) -> Self {
        Self {
            store,
            executor,
            backups,
            journal,
            workers: Arc::new(DashMap::new()),
        }
    }

    /// `enqueue`: persists the job and ensures a worker is
    /// running (or about to run) for its form.
    pub async fn enqueue(
        &self,
        form_id: Uuid,
        payload: JobPayload,
        max_attempts: i32,
    ) -> crate::error::Result<Uuid> {
        let job_id = self.store.enqueue(form_id, payload, max_attempts).await?;
        self.ensure_worker(form_id);
        Ok(job_id)
    }

    fn ensure_worker(&self, form_id: Uuid) {
        if let Some(handle) = self.workers.get(&form_id) {
            // A worker is already live (or just about to retire); waking
            // it is harmless even if it is mid-retirement, since the
            // retirement check re-reads `has_pending_work`.
            let _ = handle.wake.send(());
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.workers.insert(form_id, WorkerHandle { wake: tx });

        let store = self.store.clone();
        let executor = self.executor.clone();
        let backups = self.backups.clone();
        let journal = self.journal.clone();
        let workers = self.workers.clone();
        tokio::spawn(run_worker(form_id, store, executor, backups, journal, rx, workers));
    }
}

async fn run_worker(
    form_id: Uuid,
    store: Arc<JobStore>,
    executor: Arc<DdlExecutor>,
    backups: Arc<dyn BackupStore>,
    journal: Arc<dyn MigrationJournal>,
    mut wake: mpsc::UnboundedReceiver<()>,
    workers: Arc<DashMap<Uuid, WorkerHandle>>,
) {
    tracing::info!(form_id = %form_id, "migration worker started");
    loop {
        match store.claim_next(form_id).await {
            Ok(Some(job)) => {
                process_job(&store, &executor, &backups, &journal, job).await;
                continue;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(form_id = %form_id, error = %err, "failed to claim next job");
                tokio::time::sleep(StdDuration::from_secs(1)).await;
                continue;
            }
        }

        tokio::select! {
            Some(()) = wake.recv() => continue,
            _ = tokio::time::sleep(IDLE_TIMEOUT) => {
                match store.has_pending_work(form_id).await {
                    Ok(false) => {
                        workers.remove(&form_id);
                        tracing::info!(form_id = %form_id, "migration worker retired (idle)");
                        return;
                    }
                    _ => continue,
                }
            }
        }
    }
}

async fn process_job(
    store: &JobStore,
    executor: &DdlExecutor,
    backups: &Arc<dyn BackupStore>,
    journal: &Arc<dyn MigrationJournal>,
    job: Job,
) {
    tracing::info!(job_id = %job.id, form_id = %job.form_id, "executing queued job");
    let outcome = match &job.action {
        JobAction::Migrate(op) => executor
            .execute(job.form_id, op.clone(), &job.requested_by)
            .await
            .map(|outcome| outcome.migration_id)
            .map_err(|err| (err.to_string(), is_transient_engine(&err))),
        JobAction::Restore { backup_id } => {
            restore_and_record(backups, journal, *backup_id, &job.requested_by)
                .await
                .map_err(|err| (err.to_string(), is_transient_core(&err)))
        }
    };

    match outcome {
        Ok(id) => {
            tracing::info!(job_id = %job.id, result_id = %id, "migration job completed");
            if let Err(err) = store.mark_completed(job.id).await {
                tracing::error!(job_id = %job.id, error = %err, "failed to mark job completed");
            }
        }
        Err((message, transient)) => {
            let attempts_after = job.attempts + 1;
            let terminal = !transient || attempts_after >= job.max_attempts;
            let next_run_at = Utc::now() + backoff_for_attempt(job.attempts);
            tracing::warn!(
                job_id = %job.id,
                attempts = attempts_after,
                terminal,
                error = %message,
                "migration job attempt failed"
            );
            if let Err(store_err) = store
                .mark_attempt_failed(job.id, &message, next_run_at, terminal)
                .await
            {
                tracing::error!(job_id = %job.id, error = %store_err, "failed to record job failure");
            }
        }
    }
}

/// A RESTORE is itself a migration: once the backup's data is written
/// back, a new `FieldMigration` row of type RESTORE is appended to the
/// journal, referencing the backup it consumed.
async fn restore_and_record(
    backups: &Arc<dyn BackupStore>,
    journal: &Arc<dyn MigrationJournal>,
    backup_id: Uuid,
    actor: &str,
) -> migration_core::Result<Uuid> {
    let backup = backups
        .get(backup_id)
        .await?
        .ok_or(migration_core::Error::BackupNotFound(backup_id))?;
    backups.restore(backup_id, actor).await?;

    let entry = FieldMigration {
        id: Uuid::new_v4(),
        field_id: None,
        form_id: backup.form_id,
        migration_type: MigrationType::Restore,
        table_name: backup.table_name,
        column_name: backup.column_name,
        old_value: None,
        new_value: None,
        rollback_sql: None,
        backup_id: Some(backup_id),
        executed_by: actor.to_string(),
        executed_at: Utc::now(),
        success: true,
        error_message: None,
    };
    journal.record_standalone(entry).await
}

/// transient infrastructure errors are retried; structural
/// (logic/input/state) errors are terminal on first failure.
fn is_transient_engine(err: &migration_engine::Error) -> bool {
    matches!(
        err,
        migration_engine::Error::Database(_) | migration_engine::Error::Timeout(_)
    )
}

fn is_transient_core(err: &migration_core::Error) -> bool {
    matches!(err, migration_core::Error::Database(_))
}
