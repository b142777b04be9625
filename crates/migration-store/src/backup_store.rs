//! Postgres-backed `BackupStore`: captures column data before a
//! destructive change, restores it on demand, and sweeps rows past their
//! retention window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migration_core::{
    BackupStore, BackupType, DataValue, Error as CoreError, FieldDataBackup, FieldValue,
    Result as CoreResult,
};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::retention::RetentionConfig;

pub struct PostgresBackupStore {
    pool: PgPool,
    retention: RetentionConfig,
}

impl PostgresBackupStore {
    pub fn new(pool: PgPool, retention: RetentionConfig) -> Self {
        Self { pool, retention }
    }
}

fn backup_type_str(t: BackupType) -> &'static str {
    match t {
        BackupType::PreDelete => "PRE_DELETE",
        BackupType::PreTypeChange => "PRE_TYPE_CHANGE",
        BackupType::Manual => "MANUAL",
        BackupType::AutoDelete => "AUTO_DELETE",
    }
}

fn parse_backup_type(s: &str) -> BackupType {
    match s {
        "PRE_TYPE_CHANGE" => BackupType::PreTypeChange,
        "MANUAL" => BackupType::Manual,
        "AUTO_DELETE" => BackupType::AutoDelete,
        _ => BackupType::PreDelete,
    }
}

#[async_trait]
impl BackupStore for PostgresBackupStore {
    async fn backup(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        form_id: Uuid,
        table: &str,
        column: &str,
        backup_type: BackupType,
        actor: &str,
    ) -> CoreResult<Uuid> {
        let column_type: Option<String> = sqlx::query_scalar(
            "SELECT data_type FROM information_schema.columns WHERE table_name = $1 AND column_name = $2",
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&mut **tx)
        .await
        .map_err(CoreError::Database)?;
        let Some(column_type) = column_type else {
            return Err(CoreError::ColumnMissing(column.to_string(), table.to_string()));
        };

        let quoted_table = format!("\"{table}\"");
        let quoted_column = format!("\"{column}\"");
        let rows = sqlx::query(&format!(
            "SELECT id, {quoted_column}::text AS value FROM {quoted_table}"
        ))
        .fetch_all(&mut **tx)
        .await
        .map_err(CoreError::Database)?;

        let snapshot: Vec<FieldValue> = rows
            .into_iter()
            .map(|row| {
                let row_id: Uuid = row.try_get("id").unwrap_or_else(|_| Uuid::nil());
                let value: Option<String> = row.try_get("value").unwrap_or(None);
                FieldValue {
                    row_id,
                    value: value.map(DataValue::Text).unwrap_or(DataValue::Null),
                }
            })
            .collect();

        let id = Uuid::new_v4();
        let retention_until = Utc::now() + self.retention.window();
        let now = Utc::now();
        let snapshot_json = serde_json::to_value(&snapshot).map_err(CoreError::Serialization)?;

        sqlx::query(
            r#"INSERT INTO field_data_backups
               (id, form_id, table_name, column_name, column_type, backup_type, data_snapshot, retention_until, created_by, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(id)
        .bind(form_id)
        .bind(table)
        .bind(column)
        .bind(&column_type)
        .bind(backup_type_str(backup_type))
        .bind(snapshot_json)
        .bind(retention_until)
        .bind(actor)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(CoreError::Database)?;

        Ok(id)
    }

    async fn restore(&self, backup_id: Uuid, actor: &str) -> CoreResult<u64> {
        let row = sqlx::query(
            r#"SELECT table_name, column_name, column_type, data_snapshot, retention_until
               FROM field_data_backups WHERE id = $1 FOR UPDATE"#,
        )
        .bind(backup_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::Database)?;

        let Some(row) = row else {
            return Err(CoreError::BackupNotFound(backup_id));
        };

        let retention_until: DateTime<Utc> = row.try_get("retention_until").map_err(CoreError::Database)?;
        if Utc::now() >= retention_until {
            return Err(CoreError::BackupExpired(backup_id));
        }

        let table: String = row.try_get("table_name").map_err(CoreError::Database)?;
        let column: String = row.try_get("column_name").map_err(CoreError::Database)?;
        let column_type: String = row.try_get("column_type").map_err(CoreError::Database)?;
        let snapshot_json: serde_json::Value = row.try_get("data_snapshot").map_err(CoreError::Database)?;
        let snapshot: Vec<FieldValue> =
            serde_json::from_value(snapshot_json).map_err(CoreError::Serialization)?;

        let quoted_table = format!("\"{table}\"");
        let quoted_column = format!("\"{column}\"");

        let column_exists: Option<String> = sqlx::query_scalar(
            "SELECT data_type FROM information_schema.columns WHERE table_name = $1 AND column_name = $2",
        )
        .bind(&table)
        .bind(&column)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::Database)?;
        if column_exists.is_none() {
            sqlx::query(&format!(
                "ALTER TABLE {quoted_table} ADD COLUMN {quoted_column} {column_type}"
            ))
            .execute(&self.pool)
            .await
            .map_err(CoreError::Database)?;
        }

        let mut restored = 0u64;
        for entry in &snapshot {
            let text_value = match &entry.value {
                DataValue::Text(s) => Some(s.clone()),
                DataValue::Null => None,
                other => Some(format!("{other:?}")),
            };
            let result = sqlx::query(&format!(
                "UPDATE {quoted_table} SET {quoted_column} = $1 WHERE id = $2"
            ))
            .bind(text_value)
            .bind(entry.row_id)
            .execute(&self.pool)
            .await
            .map_err(CoreError::Database)?;
            restored += result.rows_affected();
        }

        tracing::info!(backup_id = %backup_id, actor, restored, "restored field data backup");
        Ok(restored)
    }

    async fn get(&self, backup_id: Uuid) -> CoreResult<Option<FieldDataBackup>> {
        let row = sqlx::query(
            r#"SELECT id, form_id, table_name, column_name, column_type, backup_type, data_snapshot,
                      retention_until, created_by, created_at
               FROM field_data_backups WHERE id = $1"#,
        )
        .bind(backup_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::Database)?;
        row.map(row_to_backup).transpose()
    }

    async fn list_for_form(&self, form_id: Uuid) -> CoreResult<Vec<FieldDataBackup>> {
        let rows = sqlx::query(
            r#"SELECT id, form_id, table_name, column_name, column_type, backup_type, data_snapshot,
                      retention_until, created_by, created_at
               FROM field_data_backups WHERE form_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::Database)?;
        rows.into_iter().map(row_to_backup).collect()
    }

    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let mut tx = self.pool.begin().await.map_err(CoreError::Database)?;
        let result = sqlx::query("DELETE FROM field_data_backups WHERE retention_until <= $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::Database)?;
        tx.commit().await.map_err(CoreError::Database)?;
        Ok(result.rows_affected())
    }

    async fn count_expired(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM field_data_backups WHERE retention_until <= $1",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::Database)?;
        Ok(count as u64)
    }
}

fn row_to_backup(row: sqlx::postgres::PgRow) -> CoreResult<FieldDataBackup> {
    let backup_type_raw: String = row.try_get("backup_type").map_err(CoreError::Database)?;
    let snapshot_json: serde_json::Value = row.try_get("data_snapshot").map_err(CoreError::Database)?;
    let data_snapshot: Vec<FieldValue> =
        serde_json::from_value(snapshot_json).map_err(CoreError::Serialization)?;
    Ok(FieldDataBackup {
        id: row.try_get("id").map_err(CoreError::Database)?,
        form_id: row.try_get("form_id").map_err(CoreError::Database)?,
        table_name: row.try_get("table_name").map_err(CoreError::Database)?,
        column_name: row.try_get("column_name").map_err(CoreError::Database)?,
        column_type: row.try_get("column_type").map_err(CoreError::Database)?,
        backup_type: parse_backup_type(&backup_type_raw),
        data_snapshot,
        retention_until: row.try_get("retention_until").map_err(CoreError::Database)?,
        created_by: row.try_get("created_by").map_err(CoreError::Database)?,
        created_at: row.try_get("created_at").map_err(CoreError::Database)?,
    })
}
