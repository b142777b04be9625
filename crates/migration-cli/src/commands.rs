//! Subcommands mirroring `MigrationController`'s operations one-to-one.
//! Calls the controller directly against Postgres rather than going
//! through an HTTP client (see DESIGN.md for the rationale).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;
use migration_core::{Form, HistoryFilter};
use migration_controller::MigrationController;
use migration_engine::SchemaOperation;
use uuid::Uuid;

use crate::error::{CliError, Result};
use crate::output;

#[derive(Subcommand)]
pub enum Command {
    /// Initialize the config file.
    Init {
        #[arg(long)]
        database_url: String,
        #[arg(long)]
        force: bool,
    },
    /// Print the resolved config.
    Config,
    /// Preview a plan of schema operations without touching the database.
    Preview {
        /// JSON file containing an array of SchemaOperation objects.
        #[arg(long)]
        changes: PathBuf,
    },
    /// Enqueue a plan of schema operations for a form.
    Execute {
        #[arg(long)]
        form_id: Uuid,
        #[arg(long)]
        changes: PathBuf,
        #[arg(long, default_value = "operator")]
        requested_by: String,
    },
    /// Roll back a previously executed, reversible migration.
    Rollback {
        #[arg(long)]
        migration_id: Uuid,
        /// JSON file containing the form's current Field list.
        #[arg(long)]
        form: PathBuf,
        #[arg(long, default_value = "operator")]
        requested_by: String,
    },
    /// Restore a data backup, enqueued behind the form's other jobs.
    Restore {
        #[arg(long)]
        backup_id: Uuid,
        #[arg(long)]
        form_id: Uuid,
        #[arg(long, default_value = "operator")]
        requested_by: String,
    },
    /// List a form's migration history.
    History {
        #[arg(long)]
        form_id: Uuid,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, value_parser = ["any", "success", "failed"], default_value = "any")]
        status: String,
    },
    /// List a form's data backups.
    Backups {
        #[arg(long)]
        form_id: Uuid,
        #[arg(long)]
        include_expired: bool,
    },
    /// Show a form's queue counts.
    QueueStatus {
        #[arg(long)]
        form_id: Uuid,
    },
    /// Sweep entries older than `days` and their orphaned journal entries.
    Cleanup {
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value_t = migration_store::RetentionConfig::DEFAULT_DAYS)]
        days: i64,
    },
    /// Cancel a job that is still waiting on its form's queue.
    CancelJob {
        #[arg(long)]
        job_id: Uuid,
    },
    /// Remove a form's completed/failed jobs older than `older_than_days`.
    DrainQueue {
        #[arg(long)]
        form_id: Uuid,
        #[arg(long, default_value_t = 7)]
        older_than_days: i64,
    },
}

fn load_operations(path: &PathBuf) -> Result<Vec<SchemaOperation>> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::InvalidInput(format!("invalid changes file: {e}")))
}

fn load_form(path: &PathBuf) -> Result<Form> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::InvalidInput(format!("invalid form file: {e}")))
}

pub async fn run(command: Command, controller: Arc<MigrationController>) -> Result<()> {
    match command {
        Command::Init { .. } | Command::Config => {
            unreachable!("Init and Config are handled in main.rs before a database connection is opened")
        }
        Command::Preview { changes } => {
            let ops = load_operations(&changes)?;
            let previewed = controller.preview_operations(&ops);
            let rows = previewed
                .iter()
                .map(|p| {
                    vec![
                        p.statement.clone(),
                        p.requires_backup.to_string(),
                        p.warnings.join("; "),
                    ]
                })
                .collect();
            output::print_table(vec!["statement", "requires_backup", "warnings"], rows);
        }
        Command::Execute {
            form_id,
            changes,
            requested_by,
        } => {
            let ops = load_operations(&changes)?;
            let job_ids = controller.execute_plan(form_id, ops, &requested_by).await?;
            output::print_success(&format!("queued {} job(s)", job_ids.len()));
            for id in job_ids {
                println!("  {id}");
            }
        }
        Command::Rollback {
            migration_id,
            form,
            requested_by,
        } => {
            let form = load_form(&form)?;
            let new_id = controller.rollback(migration_id, &form, &requested_by).await?;
            output::print_success(&format!("rolled back {migration_id}, recorded as {new_id}"));
        }
        Command::Restore {
            backup_id,
            form_id,
            requested_by,
        } => {
            let job_id = controller.restore(backup_id, form_id, &requested_by).await?;
            output::print_success(&format!("restore enqueued as job {job_id}"));
        }
        Command::History {
            form_id,
            limit,
            offset,
            status,
        } => {
            let filter = match status.as_str() {
                "success" => HistoryFilter::OnlySuccess,
                "failed" => HistoryFilter::OnlyFailed,
                _ => HistoryFilter::Any,
            };
            let (entries, total) = controller.list_history(form_id, filter, limit, offset).await?;
            output::print_info(&format!("{total} total entries"));
            let rows = entries
                .iter()
                .map(|m| {
                    vec![
                        m.id.to_string(),
                        format!("{:?}", m.migration_type),
                        m.column_name.clone(),
                        m.success.to_string(),
                        m.executed_at.to_rfc3339(),
                    ]
                })
                .collect();
            output::print_table(vec!["id", "type", "column", "success", "executed_at"], rows);
        }
        Command::Backups { form_id, include_expired } => {
            let all = controller.list_backups(form_id).await?;
            let now = Utc::now();
            let rows = all
                .iter()
                .filter(|b| include_expired || !b.is_expired_at(now))
                .map(|b| {
                    vec![
                        b.id.to_string(),
                        b.column_name.clone(),
                        format!("{:?}", b.backup_type),
                        b.data_snapshot.len().to_string(),
                        b.retention_until.to_rfc3339(),
                    ]
                })
                .collect();
            output::print_table(vec!["id", "column", "type", "rows", "retention_until"], rows);
        }
        Command::QueueStatus { form_id } => {
            let jobs = controller.queue_status(form_id).await?;
            let mut waiting = 0;
            let mut active = 0;
            let mut completed = 0;
            let mut failed = 0;
            for job in &jobs {
                match job.status {
                    migration_queue::JobStatus::Waiting => waiting += 1,
                    migration_queue::JobStatus::Active => active += 1,
                    migration_queue::JobStatus::Completed => completed += 1,
                    migration_queue::JobStatus::Failed => failed += 1,
                }
            }
            output::print_table(
                vec!["waiting", "active", "completed", "failed"],
                vec![vec![
                    waiting.to_string(),
                    active.to_string(),
                    completed.to_string(),
                    failed.to_string(),
                ]],
            );
        }
        Command::Cleanup { dry_run, days } => {
            let report = controller.cleanup(days, dry_run).await?;
            if report.dry_run {
                output::print_warning(&format!("would delete {} expired backup(s)", report.expired_backups));
            } else {
                output::print_success(&format!(
                    "deleted {} backup(s), {} journal entries",
                    report.deleted_backups, report.deleted_journal_entries
                ));
            }
        }
        Command::CancelJob { job_id } => {
            controller.cancel_job(job_id).await?;
            output::print_success(&format!("job {job_id} cancelled"));
        }
        Command::DrainQueue { form_id, older_than_days } => {
            let older_than = Utc::now() - chrono::Duration::days(older_than_days);
            let (completed, failed) = controller.drain_queue(form_id, older_than).await?;
            output::print_success(&format!("removed {completed} completed job(s), {failed} failed job(s)"));
        }
    }
    Ok(())
}
