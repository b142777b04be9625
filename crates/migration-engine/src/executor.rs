//! The DDL Executor: turns a [`SchemaOperation`] into a transactional,
//! backup-before-destructive-change, journaled database effect. Generic
//! over the `migration-core` storage traits so it can run against a
//! real `sqlx::PgPool` or a test double.

use std::sync::Arc;

use chrono::Utc;
use migration_core::{
    BackupStore, BackupType, DataValue, FieldDataType, FieldMigration, FieldSnapshot,
    MigrationJournal, MigrationType,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::operation::SchemaOperation;
use crate::sql::{self, GeneratedSql};
use crate::validator;

/// The outcome of a single executed operation.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub migration_id: Uuid,
    pub backup_id: Option<Uuid>,
    pub rollback_sql: Option<String>,
}

/// The result of `preview_migration` for one operation: no table is
/// touched to produce this.
#[derive(Debug, Clone)]
pub struct PreviewedChange {
    pub operation: SchemaOperation,
    pub statement: String,
    pub rollback_sql: Option<String>,
    pub requires_backup: bool,
    pub warnings: Vec<String>,
}

/// Executes primitive schema operations against Postgres, one at a time,
/// each inside its own transaction.
pub struct DdlExecutor {
    pool: PgPool,
    backups: Arc<dyn BackupStore>,
    journal: Arc<dyn MigrationJournal>,
}

impl DdlExecutor {
    pub fn new(pool: PgPool, backups: Arc<dyn BackupStore>, journal: Arc<dyn MigrationJournal>) -> Self {
        Self {
            pool,
            backups,
            journal,
        }
    }

    /// `previewMigration`: pure with respect to side effects on
    /// the target tables (the type-conversion validator may need to read
    /// existing values, but never writes).
    pub fn preview(&self, op: &SchemaOperation) -> PreviewedChange {
        let GeneratedSql { statement, rollback } = sql::generate(op);
        let mut warnings = Vec::new();
        if matches!(op, SchemaOperation::DropColumn { .. }) {
            warnings.push("this operation permanently removes the column; a backup will be taken first".to_string());
        }
        PreviewedChange {
            operation: op.clone(),
            statement,
            rollback_sql: if rollback.trim().is_empty() {
                None
            } else {
                Some(rollback)
            },
            requires_backup: op.is_destructive(),
            warnings,
        }
    }

    /// shared envelope: open a transaction, back up if
    /// destructive, run the sanitized DDL, write the journal entry, and
    /// commit. On any failure the transaction rolls back and a
    /// `success=false` entry is written standalone.
    #[tracing::instrument(skip(self), fields(table = op.table()))]
    pub async fn execute(&self, form_id: Uuid, op: SchemaOperation, actor: &str) -> Result<ExecutionOutcome> {
        match self.execute_inner(form_id, &op, actor).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let entry = failed_entry(form_id, &op, actor, &err);
                // Best-effort: a failure to record the failure itself is
                // logged but does not shadow the original error.
                if let Err(record_err) = self.journal.record_standalone(entry).await {
                    tracing::error!(error = %record_err, "failed to record failed migration entry");
                }
                Err(err)
            }
        }
    }

    async fn execute_inner(&self, form_id: Uuid, op: &SchemaOperation, actor: &str) -> Result<ExecutionOutcome> {
        if let SchemaOperation::ModifyColumnType {
            table,
            column,
            old_type,
            new_type,
            ..
        } = op
        {
            let existing = fetch_existing_values(&self.pool, table, column, *old_type).await?;
            validator::validate_conversion(column, *old_type, *new_type, &existing)?;
        }

        let GeneratedSql { statement, rollback } = sql::generate(op);
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let backup_id = if op.is_destructive() {
            let (column, backup_type) = match op {
                SchemaOperation::DropColumn { column, .. } => (column.as_str(), BackupType::PreDelete),
                SchemaOperation::ModifyColumnType { column, .. } => {
                    (column.as_str(), BackupType::PreTypeChange)
                }
                _ => unreachable!("is_destructive() only true for DropColumn/ModifyColumnType"),
            };
            Some(
                self.backups
                    .backup(&mut tx, form_id, op.table(), column, backup_type, actor)
                    .await
                    .map_err(Error::Core)?,
            )
        } else {
            None
        };

        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let rollback_sql = if rollback.trim().is_empty() {
            None
        } else {
            Some(rollback)
        };

        let entry = FieldMigration {
            id: Uuid::new_v4(),
            field_id: Some(op.field_id()),
            form_id,
            migration_type: migration_type_for(op),
            table_name: op.table().to_string(),
            column_name: column_name_for(op).to_string(),
            old_value: old_snapshot(op),
            new_value: new_snapshot(op),
            rollback_sql: rollback_sql.clone(),
            backup_id,
            executed_by: actor.to_string(),
            executed_at: Utc::now(),
            success: true,
            error_message: None,
        };
        let migration_id = self
            .journal
            .record(&mut tx, entry)
            .await
            .map_err(Error::Core)?;

        tx.commit().await.map_err(Error::Database)?;

        Ok(ExecutionOutcome {
            migration_id,
            backup_id,
            rollback_sql,
        })
    }
}

/// Reads every non-null value currently stored in `table.column`, cast to
/// text, so [`validator::validate_conversion`] can check them against a
/// proposed type change before any backup or DDL runs. Numeric-family
/// source types parse the text back into a `DataValue::Number` so the
/// validator's narrowing check sees actual numbers rather than strings.
async fn fetch_existing_values(
    pool: &PgPool,
    table: &str,
    column: &str,
    old_type: FieldDataType,
) -> Result<Vec<DataValue>> {
    let rows: Vec<(Option<String>,)> =
        sqlx::query_as(&format!(r#"SELECT "{column}"::text FROM "{table}""#))
            .fetch_all(pool)
            .await
            .map_err(Error::Database)?;

    let numeric = matches!(
        old_type,
        FieldDataType::Number | FieldDataType::Rating | FieldDataType::Slider
    );

    Ok(rows
        .into_iter()
        .filter_map(|(value,)| value)
        .map(|value| {
            if numeric {
                value
                    .parse::<f64>()
                    .map(DataValue::Number)
                    .unwrap_or(DataValue::Text(value))
            } else {
                DataValue::Text(value)
            }
        })
        .collect())
}

fn migration_type_for(op: &SchemaOperation) -> MigrationType {
    match op {
        SchemaOperation::AddColumn { .. } => MigrationType::AddColumn,
        SchemaOperation::DropColumn { .. } => MigrationType::DropColumn,
        SchemaOperation::RenameColumn { .. } => MigrationType::RenameColumn,
        SchemaOperation::ModifyColumnType { .. } => MigrationType::ModifyColumn,
    }
}

fn column_name_for(op: &SchemaOperation) -> &str {
    match op {
        SchemaOperation::AddColumn { column, .. }
        | SchemaOperation::DropColumn { column, .. }
        | SchemaOperation::ModifyColumnType { column, .. } => column,
        SchemaOperation::RenameColumn { new_column, .. } => new_column,
    }
}

fn old_snapshot(op: &SchemaOperation) -> Option<FieldSnapshot> {
    match op {
        SchemaOperation::RenameColumn { old_column, .. } => Some(FieldSnapshot {
            column_name: Some(old_column.clone()),
            data_type: None,
        }),
        SchemaOperation::ModifyColumnType { old_type, .. } => Some(FieldSnapshot {
            column_name: None,
            data_type: Some(*old_type),
        }),
        SchemaOperation::DropColumn { column, .. } => Some(FieldSnapshot {
            column_name: Some(column.clone()),
            data_type: None,
        }),
        SchemaOperation::AddColumn { .. } => None,
    }
}

fn new_snapshot(op: &SchemaOperation) -> Option<FieldSnapshot> {
    match op {
        SchemaOperation::AddColumn { column, data_type, .. } => Some(FieldSnapshot {
            column_name: Some(column.clone()),
            data_type: Some(*data_type),
        }),
        SchemaOperation::RenameColumn { new_column, .. } => Some(FieldSnapshot {
            column_name: Some(new_column.clone()),
            data_type: None,
        }),
        SchemaOperation::ModifyColumnType { new_type, .. } => Some(FieldSnapshot {
            column_name: None,
            data_type: Some(*new_type),
        }),
        SchemaOperation::DropColumn { .. } => None,
    }
}

fn failed_entry(form_id: Uuid, op: &SchemaOperation, actor: &str, err: &Error) -> FieldMigration {
    FieldMigration {
        id: Uuid::new_v4(),
        field_id: Some(op.field_id()),
        form_id,
        migration_type: migration_type_for(op),
        table_name: op.table().to_string(),
        column_name: column_name_for(op).to_string(),
        old_value: old_snapshot(op),
        new_value: new_snapshot(op),
        rollback_sql: None,
        backup_id: None,
        executed_by: actor.to_string(),
        executed_at: Utc::now(),
        success: false,
        error_message: Some(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration_core::FieldDataType;

    fn executor_with_no_pool() -> DdlExecutor {
        // `preview` never touches `pool`/`backups`/`journal`, so a
        // not-yet-connected pool is fine for these tests.
        DdlExecutor {
            pool: PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool"),
            backups: Arc::new(NullBackupStore),
            journal: Arc::new(NullBackupStore),
        }
    }

    struct NullBackupStore;

    #[async_trait::async_trait]
    impl BackupStore for NullBackupStore {
        async fn backup(
            &self,
            _tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
            _form_id: Uuid,
            _table: &str,
            _column: &str,
            _backup_type: BackupType,
            _actor: &str,
        ) -> migration_core::Result<Uuid> {
            unimplemented!("not exercised by preview tests")
        }
        async fn restore(&self, _backup_id: Uuid, _actor: &str) -> migration_core::Result<u64> {
            unimplemented!()
        }
        async fn get(&self, _backup_id: Uuid) -> migration_core::Result<Option<migration_core::FieldDataBackup>> {
            unimplemented!()
        }
        async fn list_for_form(&self, _form_id: Uuid) -> migration_core::Result<Vec<migration_core::FieldDataBackup>> {
            unimplemented!()
        }
        async fn sweep_expired(&self, _cutoff: chrono::DateTime<Utc>) -> migration_core::Result<u64> {
            unimplemented!()
        }
        async fn count_expired(&self, _cutoff: chrono::DateTime<Utc>) -> migration_core::Result<u64> {
            unimplemented!()
        }
    }

    #[async_trait::async_trait]
    impl MigrationJournal for NullBackupStore {
        async fn record(
            &self,
            _tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
            _entry: FieldMigration,
        ) -> migration_core::Result<Uuid> {
            unimplemented!()
        }
        async fn record_standalone(&self, _entry: FieldMigration) -> migration_core::Result<Uuid> {
            unimplemented!()
        }
        async fn by_form(
            &self,
            _form_id: Uuid,
            _filter: migration_core::HistoryFilter,
            _limit: i64,
            _offset: i64,
        ) -> migration_core::Result<(Vec<FieldMigration>, i64)> {
            unimplemented!()
        }
        async fn get(&self, _migration_id: Uuid) -> migration_core::Result<Option<FieldMigration>> {
            unimplemented!()
        }
        async fn sweep_expired(&self, _cutoff: chrono::DateTime<Utc>) -> migration_core::Result<u64> {
            unimplemented!()
        }
    }

    #[test]
    fn preview_drop_column_requires_backup_and_warns() {
        let executor = executor_with_no_pool();
        let op = SchemaOperation::DropColumn {
            field_id: Uuid::new_v4(),
            table: "form_orders".into(),
            column: "legacy".into(),
            data_type: FieldDataType::ShortText,
        };
        let preview = executor.preview(&op);
        assert!(preview.requires_backup);
        assert!(!preview.warnings.is_empty());
        let rollback = preview.rollback_sql.expect("drop column rollback re-adds the column");
        assert!(rollback.contains(r#"ADD COLUMN "legacy" varchar(255)"#));
    }

    #[test]
    fn preview_add_column_does_not_require_backup() {
        let executor = executor_with_no_pool();
        let op = SchemaOperation::AddColumn {
            field_id: Uuid::new_v4(),
            table: "form_orders".into(),
            column: "new_field".into(),
            data_type: FieldDataType::ShortText,
        };
        let preview = executor.preview(&op);
        assert!(!preview.requires_backup);
        assert!(preview.rollback_sql.is_some());
    }
}
