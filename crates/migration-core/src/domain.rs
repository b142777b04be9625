//! The Form/Field collaborator types and the owned migration-history types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A logical field type as understood by the form builder. The Schema
/// Catalog maps each of these onto a fixed Postgres physical type; this
/// crate does not interpret the values beyond that mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDataType {
    ShortText,
    LongText,
    Email,
    Phone,
    Number,
    Url,
    Date,
    Time,
    DateTime,
    Boolean,
    Choice,
    Rating,
    Slider,
    GeoPoint,
    FileRef,
}

impl FieldDataType {
    /// Whether this logical type is one the DDL Executor refuses to
    /// convert to or from anything but text.
    pub fn is_opaque(self) -> bool {
        matches!(self, FieldDataType::GeoPoint | FieldDataType::FileRef)
    }
}

/// A form field, owned by the form builder. Read-only from the migration
/// core's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: Uuid,
    pub form_id: Uuid,
    pub column_name: String,
    pub data_type: FieldDataType,
    pub sub_form_id: Option<Uuid>,
}

/// A form, owned by the form builder. Read-only from the migration core's
/// perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    pub table_name: String,
    pub fields: Vec<Field>,
}

/// The kind of primitive schema operation a `FieldMigration` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationType {
    AddColumn,
    DropColumn,
    RenameColumn,
    ModifyColumn,
    Restore,
}

/// A structured "before"/"after" record attached to a `FieldMigration`.
/// What is populated depends on `migration_type`: a RENAME records only
/// the column names, a MODIFY_COLUMN records only the data type, an
/// ADD/DROP records the full field shape being introduced or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub column_name: Option<String>,
    pub data_type: Option<FieldDataType>,
}

/// One entry in the append-only migration history for a form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMigration {
    pub id: Uuid,
    pub field_id: Option<Uuid>,
    pub form_id: Uuid,
    pub migration_type: MigrationType,
    pub table_name: String,
    pub column_name: String,
    pub old_value: Option<FieldSnapshot>,
    pub new_value: Option<FieldSnapshot>,
    pub rollback_sql: Option<String>,
    pub backup_id: Option<Uuid>,
    pub executed_by: String,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl FieldMigration {
    /// `can_rollback`: true only for a successful, reversible
    /// entry. Callers additionally check, for ADD_COLUMN, that the field
    /// is no longer present in the form's current field list.
    pub fn is_reversible(&self) -> bool {
        self.success && self.rollback_sql.is_some()
    }
}

/// Why a `FieldDataBackup` snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupType {
    PreDelete,
    PreTypeChange,
    Manual,
    AutoDelete,
}

/// A single stored value, tagged by the physical representation it was
/// captured under. Distinct from `FieldDataType` because a backup stores
/// the *physical* column value, not the logical field type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Null,
}

/// One captured `(row_id, value)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub row_id: Uuid,
    pub value: DataValue,
}

/// An immutable snapshot of one column's data, taken before a destructive
/// change, restorable until `retention_until`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDataBackup {
    pub id: Uuid,
    pub form_id: Uuid,
    pub table_name: String,
    pub column_name: String,
    /// The physical Postgres type the column had at backup time, so a
    /// restore can re-add the column if it was since dropped.
    pub column_type: String,
    pub backup_type: BackupType,
    pub data_snapshot: Vec<FieldValue>,
    pub retention_until: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl FieldDataBackup {
    /// Whether `at` falls past this backup's retention window.
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.retention_until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_types_reject_non_text_conversion() {
        assert!(FieldDataType::GeoPoint.is_opaque());
        assert!(FieldDataType::FileRef.is_opaque());
        assert!(!FieldDataType::Number.is_opaque());
    }

    #[test]
    fn reversible_requires_success_and_rollback_sql() {
        let base = FieldMigration {
            id: Uuid::new_v4(),
            field_id: Some(Uuid::new_v4()),
            form_id: Uuid::new_v4(),
            migration_type: MigrationType::AddColumn,
            table_name: "t".into(),
            column_name: "c".into(),
            old_value: None,
            new_value: None,
            rollback_sql: Some("ALTER TABLE t DROP COLUMN c".into()),
            backup_id: None,
            executed_by: "tester".into(),
            executed_at: Utc::now(),
            success: true,
            error_message: None,
        };
        assert!(base.is_reversible());

        let mut failed = base.clone();
        failed.success = false;
        assert!(!failed.is_reversible());

        let mut no_sql = base;
        no_sql.rollback_sql = None;
        assert!(!no_sql.is_reversible());
    }

    #[test]
    fn backup_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let backup = FieldDataBackup {
            id: Uuid::new_v4(),
            form_id: Uuid::new_v4(),
            table_name: "t".into(),
            column_name: "c".into(),
            column_type: "text".into(),
            backup_type: BackupType::PreDelete,
            data_snapshot: vec![],
            retention_until: now,
            created_by: "tester".into(),
            created_at: now,
        };
        assert!(backup.is_expired_at(now));
        assert!(!backup.is_expired_at(now - chrono::Duration::seconds(1)));
    }
}
