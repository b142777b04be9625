//! The tagged-variant representation of a primitive schema operation:
//! the unit of work the Change Detector emits and the DDL Executor
//! consumes.

use migration_core::FieldDataType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One primitive schema operation against a single dynamic table, as
/// produced by [`crate::detect`] and consumed by [`crate::DdlExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaOperation {
    AddColumn {
        field_id: Uuid,
        table: String,
        column: String,
        data_type: FieldDataType,
    },
    DropColumn {
        field_id: Uuid,
        table: String,
        column: String,
        data_type: FieldDataType,
    },
    RenameColumn {
        field_id: Uuid,
        table: String,
        old_column: String,
        new_column: String,
    },
    ModifyColumnType {
        field_id: Uuid,
        table: String,
        column: String,
        old_type: FieldDataType,
        new_type: FieldDataType,
    },
}

impl SchemaOperation {
    pub fn field_id(&self) -> Uuid {
        match self {
            SchemaOperation::AddColumn { field_id, .. }
            | SchemaOperation::DropColumn { field_id, .. }
            | SchemaOperation::RenameColumn { field_id, .. }
            | SchemaOperation::ModifyColumnType { field_id, .. } => *field_id,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            SchemaOperation::AddColumn { table, .. }
            | SchemaOperation::DropColumn { table, .. }
            | SchemaOperation::RenameColumn { table, .. }
            | SchemaOperation::ModifyColumnType { table, .. } => table,
        }
    }

    /// Whether executing this operation requires a pre-change data backup
    /// (DROP_COLUMN and MODIFY_COLUMN_TYPE are destructive;
    /// ADD_COLUMN and RENAME_COLUMN are not).
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            SchemaOperation::DropColumn { .. } | SchemaOperation::ModifyColumnType { .. }
        )
    }
}
