//! Postgres-backed `MigrationJournal`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migration_core::{
    Error as CoreError, FieldMigration, FieldSnapshot, HistoryFilter, MigrationJournal,
    MigrationType, Result as CoreResult,
};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

pub struct PostgresMigrationJournal {
    pool: PgPool,
}

impl PostgresMigrationJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn migration_type_str(t: MigrationType) -> &'static str {
    match t {
        MigrationType::AddColumn => "ADD_COLUMN",
        MigrationType::DropColumn => "DROP_COLUMN",
        MigrationType::RenameColumn => "RENAME_COLUMN",
        MigrationType::ModifyColumn => "MODIFY_COLUMN",
        MigrationType::Restore => "RESTORE",
    }
}

fn parse_migration_type(s: &str) -> MigrationType {
    match s {
        "DROP_COLUMN" => MigrationType::DropColumn,
        "RENAME_COLUMN" => MigrationType::RenameColumn,
        "MODIFY_COLUMN" => MigrationType::ModifyColumn,
        "RESTORE" => MigrationType::Restore,
        _ => MigrationType::AddColumn,
    }
}

async fn insert<'e, E>(executor: E, entry: &FieldMigration) -> CoreResult<Uuid>
where
    E: sqlx::PgExecutor<'e>,
{
    let old_value = entry
        .old_value
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(CoreError::Serialization)?;
    let new_value = entry
        .new_value
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(CoreError::Serialization)?;

    sqlx::query(
        r#"INSERT INTO field_migrations
           (id, field_id, form_id, migration_type, table_name, column_name, old_value, new_value,
            rollback_sql, backup_id, executed_by, executed_at, success, error_message)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
    )
    .bind(entry.id)
    .bind(entry.field_id)
    .bind(entry.form_id)
    .bind(migration_type_str(entry.migration_type))
    .bind(&entry.table_name)
    .bind(&entry.column_name)
    .bind(old_value)
    .bind(new_value)
    .bind(&entry.rollback_sql)
    .bind(entry.backup_id)
    .bind(&entry.executed_by)
    .bind(entry.executed_at)
    .bind(entry.success)
    .bind(&entry.error_message)
    .execute(executor)
    .await
    .map_err(CoreError::Database)?;

    Ok(entry.id)
}

#[async_trait]
impl MigrationJournal for PostgresMigrationJournal {
    async fn record(&self, tx: &mut Transaction<'_, Postgres>, entry: FieldMigration) -> CoreResult<Uuid> {
        insert(&mut **tx, &entry).await
    }

    async fn record_standalone(&self, entry: FieldMigration) -> CoreResult<Uuid> {
        insert(&self.pool, &entry).await
    }

    async fn by_form(
        &self,
        form_id: Uuid,
        filter: HistoryFilter,
        limit: i64,
        offset: i64,
    ) -> CoreResult<(Vec<FieldMigration>, i64)> {
        let success_clause = match filter {
            HistoryFilter::Any => "",
            HistoryFilter::OnlySuccess => "AND success = true",
            HistoryFilter::OnlyFailed => "AND success = false",
        };

        let query = format!(
            r#"SELECT id, field_id, form_id, migration_type, table_name, column_name, old_value,
                      new_value, rollback_sql, backup_id, executed_by, executed_at, success, error_message
               FROM field_migrations
               WHERE form_id = $1 {success_clause}
               ORDER BY executed_at DESC
               LIMIT $2 OFFSET $3"#
        );
        let rows = sqlx::query(&query)
            .bind(form_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(CoreError::Database)?;

        let count_query = format!(
            "SELECT COUNT(*) FROM field_migrations WHERE form_id = $1 {success_clause}"
        );
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(form_id)
            .fetch_one(&self.pool)
            .await
            .map_err(CoreError::Database)?;

        let entries = rows.into_iter().map(row_to_entry).collect::<CoreResult<Vec<_>>>()?;
        Ok((entries, total))
    }

    async fn get(&self, migration_id: Uuid) -> CoreResult<Option<FieldMigration>> {
        let row = sqlx::query(
            r#"SELECT id, field_id, form_id, migration_type, table_name, column_name, old_value,
                      new_value, rollback_sql, backup_id, executed_by, executed_at, success, error_message
               FROM field_migrations WHERE id = $1"#,
        )
        .bind(migration_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::Database)?;
        row.map(row_to_entry).transpose()
    }

    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let mut tx = self.pool.begin().await.map_err(CoreError::Database)?;
        let result = sqlx::query(
            r#"DELETE FROM field_migrations
               WHERE success = true AND executed_at <= $1
                 AND (backup_id IS NULL OR backup_id NOT IN (SELECT id FROM field_data_backups))"#,
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::Database)?;
        tx.commit().await.map_err(CoreError::Database)?;
        Ok(result.rows_affected())
    }
}

fn row_to_entry(row: sqlx::postgres::PgRow) -> CoreResult<FieldMigration> {
    let migration_type_raw: String = row.try_get("migration_type").map_err(CoreError::Database)?;
    let old_value_json: Option<serde_json::Value> = row.try_get("old_value").map_err(CoreError::Database)?;
    let new_value_json: Option<serde_json::Value> = row.try_get("new_value").map_err(CoreError::Database)?;
    let old_value: Option<FieldSnapshot> = old_value_json
        .map(serde_json::from_value)
        .transpose()
        .map_err(CoreError::Serialization)?;
    let new_value: Option<FieldSnapshot> = new_value_json
        .map(serde_json::from_value)
        .transpose()
        .map_err(CoreError::Serialization)?;

    Ok(FieldMigration {
        id: row.try_get("id").map_err(CoreError::Database)?,
        field_id: row.try_get("field_id").map_err(CoreError::Database)?,
        form_id: row.try_get("form_id").map_err(CoreError::Database)?,
        migration_type: parse_migration_type(&migration_type_raw),
        table_name: row.try_get("table_name").map_err(CoreError::Database)?,
        column_name: row.try_get("column_name").map_err(CoreError::Database)?,
        old_value,
        new_value,
        rollback_sql: row.try_get("rollback_sql").map_err(CoreError::Database)?,
        backup_id: row.try_get("backup_id").map_err(CoreError::Database)?,
        executed_by: row.try_get("executed_by").map_err(CoreError::Database)?,
        executed_at: row.try_get("executed_at").map_err(CoreError::Database)?,
        success: row.try_get("success").map_err(CoreError::Database)?,
        error_message: row.try_get("error_message").map_err(CoreError::Database)?,
    })
}
