//! Request/response shapes for the `/migrations/*` surface, kept
//! separate from the domain types so the wire contract can evolve
//! independently of the internal model.

use chrono::{DateTime, Utc};
use migration_core::{FieldDataBackup, FieldDataType, FieldMigration, HistoryFilter};
use migration_engine::{PreviewedChange, SchemaOperation};
use migration_queue::{Job, JobAction, JobStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the `changes[]` array accepted by `preview`/`execute`.
/// `type` and `fieldId` are always present; the rest are interpreted per
/// `change_type`, mirroring `SchemaOperation`'s tagged-variant shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRequest {
    #[serde(rename = "type")]
    pub change_type: String,
    pub field_id: Uuid,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub old_column: Option<String>,
    #[serde(default)]
    pub new_column: Option<String>,
    #[serde(default)]
    pub data_type: Option<FieldDataType>,
    #[serde(default)]
    pub old_type: Option<FieldDataType>,
    #[serde(default)]
    pub new_type: Option<FieldDataType>,
}

/// Turns one wire-level `ChangeRequest` into a `SchemaOperation`, the way
/// `migration_engine::detect` would have produced it, for callers that
/// submit an already-decided plan instead of an (old, new) field diff.
pub fn change_to_operation(change: &ChangeRequest) -> Result<SchemaOperation, String> {
    let table = change
        .table
        .clone()
        .ok_or_else(|| "missing 'table'".to_string())?;
    match change.change_type.as_str() {
        "ADD_COLUMN" => Ok(SchemaOperation::AddColumn {
            field_id: change.field_id,
            table,
            column: change.column.clone().ok_or("missing 'column'")?,
            data_type: change.data_type.ok_or("missing 'dataType'")?,
        }),
        "DROP_COLUMN" => Ok(SchemaOperation::DropColumn {
            field_id: change.field_id,
            table,
            column: change.column.clone().ok_or("missing 'column'")?,
            data_type: change.data_type.ok_or("missing 'dataType'")?,
        }),
        "RENAME_COLUMN" => Ok(SchemaOperation::RenameColumn {
            field_id: change.field_id,
            table,
            old_column: change.old_column.clone().ok_or("missing 'oldColumn'")?,
            new_column: change.new_column.clone().ok_or("missing 'newColumn'")?,
        }),
        "MODIFY_COLUMN_TYPE" | "CHANGE_TYPE" => Ok(SchemaOperation::ModifyColumnType {
            field_id: change.field_id,
            table,
            column: change.column.clone().ok_or("missing 'column'")?,
            old_type: change.old_type.ok_or("missing 'oldType'")?,
            new_type: change.new_type.ok_or("missing 'newType'")?,
        }),
        other => Err(format!("unknown change type '{other}'")),
    }
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub form_id: Uuid,
    pub changes: Vec<ChangeRequest>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub preview: Vec<PreviewedChangeDto>,
    pub summary: PreviewSummary,
}

#[derive(Debug, Serialize)]
pub struct PreviewedChangeDto {
    pub statement: String,
    pub rollback_sql: Option<String>,
    pub requires_backup: bool,
    pub valid: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PreviewSummary {
    pub total_changes: usize,
    pub valid_changes: usize,
    pub invalid_changes: usize,
    pub requires_backup: bool,
}

impl From<&PreviewedChange> for PreviewedChangeDto {
    fn from(p: &PreviewedChange) -> Self {
        Self {
            statement: p.statement.clone(),
            rollback_sql: p.rollback_sql.clone(),
            requires_backup: p.requires_backup,
            valid: true,
            warnings: p.warnings.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub form_id: Uuid,
    pub changes: Vec<ChangeRequest>,
    #[serde(default = "default_actor")]
    pub requested_by: String,
}

fn default_actor() -> String {
    "system".to_string()
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub queued_jobs: Vec<QueuedJobDto>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct QueuedJobDto {
    pub job_id: Uuid,
    #[serde(rename = "type")]
    pub job_type: &'static str,
    pub column_name: String,
    pub status: &'static str,
    pub queue_position: usize,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub status: Option<String>,
}

fn default_limit() -> i64 {
    50
}

pub const MAX_HISTORY_LIMIT: i64 = 500;

pub fn parse_history_filter(status: Option<&str>) -> HistoryFilter {
    match status {
        Some("success") => HistoryFilter::OnlySuccess,
        Some("failed") => HistoryFilter::OnlyFailed,
        _ => HistoryFilter::Any,
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub migrations: Vec<FieldMigrationDto>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct FieldMigrationDto {
    pub id: Uuid,
    pub field_id: Option<Uuid>,
    pub form_id: Uuid,
    pub migration_type: String,
    pub table_name: String,
    pub column_name: String,
    pub rollback_sql: Option<String>,
    pub backup_id: Option<Uuid>,
    pub executed_by: String,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl From<&FieldMigration> for FieldMigrationDto {
    fn from(m: &FieldMigration) -> Self {
        Self {
            id: m.id,
            field_id: m.field_id,
            form_id: m.form_id,
            migration_type: format!("{:?}", m.migration_type),
            table_name: m.table_name.clone(),
            column_name: m.column_name.clone(),
            rollback_sql: m.rollback_sql.clone(),
            backup_id: m.backup_id,
            executed_by: m.executed_by.clone(),
            executed_at: m.executed_at,
            success: m.success,
            error_message: m.error_message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RollbackResponse {
    pub migration_id: Uuid,
    pub rollback_migration_id: Uuid,
    pub description: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct BackupsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub include_expired: bool,
}

#[derive(Debug, Serialize)]
pub struct BackupsResponse {
    pub backups: Vec<FieldDataBackupDto>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct FieldDataBackupDto {
    pub id: Uuid,
    pub form_id: Uuid,
    pub table_name: String,
    pub column_name: String,
    pub backup_type: String,
    pub row_count: usize,
    pub retention_until: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<&FieldDataBackup> for FieldDataBackupDto {
    fn from(b: &FieldDataBackup) -> Self {
        Self {
            id: b.id,
            form_id: b.form_id,
            table_name: b.table_name.clone(),
            column_name: b.column_name.clone(),
            backup_type: format!("{:?}", b.backup_type),
            row_count: b.data_snapshot.len(),
            retention_until: b.retention_until,
            created_by: b.created_by.clone(),
            created_at: b.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub form_id: Uuid,
    #[serde(default = "default_actor")]
    pub requested_by: String,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub backup_id: Uuid,
    pub job_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct QueueStatusQuery {
    pub form_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Default)]
pub struct QueueCounts {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub delayed: usize,
}

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub queue: QueueCounts,
    pub form_id: Option<Uuid>,
}

pub fn summarize_jobs(jobs: &[Job]) -> QueueCounts {
    let mut counts = QueueCounts::default();
    let now = Utc::now();
    for job in jobs {
        match job.status {
            JobStatus::Waiting if job.next_run_at > now => counts.delayed += 1,
            JobStatus::Waiting => counts.waiting += 1,
            JobStatus::Active => counts.active += 1,
            JobStatus::Completed => counts.completed += 1,
            JobStatus::Failed => counts.failed += 1,
        }
    }
    counts
}

fn default_cleanup_days() -> i64 {
    migration_store::RetentionConfig::DEFAULT_DAYS
}

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_cleanup_days")]
    pub days: i64,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted_count: Option<u64>,
    pub would_delete_count: Option<u64>,
    pub days: i64,
    pub cutoff_date: DateTime<Utc>,
    pub message: String,
}

pub fn job_action_label(action: &JobAction) -> &'static str {
    match action {
        JobAction::Migrate(op) => match op {
            SchemaOperation::AddColumn { .. } => "ADD_COLUMN",
            SchemaOperation::DropColumn { .. } => "DROP_COLUMN",
            SchemaOperation::RenameColumn { .. } => "RENAME_COLUMN",
            SchemaOperation::ModifyColumnType { .. } => "MODIFY_COLUMN_TYPE",
        },
        JobAction::Restore { .. } => "RESTORE",
    }
}

pub fn job_action_column(action: &JobAction) -> String {
    match action {
        JobAction::Migrate(SchemaOperation::AddColumn { column, .. })
        | JobAction::Migrate(SchemaOperation::DropColumn { column, .. })
        | JobAction::Migrate(SchemaOperation::ModifyColumnType { column, .. }) => column.clone(),
        JobAction::Migrate(SchemaOperation::RenameColumn { new_column, .. }) => new_column.clone(),
        JobAction::Restore { backup_id } => backup_id.to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}
