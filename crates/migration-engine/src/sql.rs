//! DDL statement and rollback-SQL generation for a single
//! [`SchemaOperation`].

use indoc::formatdoc;
use migration_core::catalog::column_type_for;

use crate::operation::SchemaOperation;

/// A generated statement paired with the SQL that reverses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSql {
    pub statement: String,
    pub rollback: String,
}

/// Build the `ALTER TABLE` statement (and its rollback) for one
/// operation. Identifiers embedded here have already been through
/// [`migration_core::catalog::sanitize_identifier`] by the caller, so
/// they are double-quoted but not re-validated.
pub fn generate(op: &SchemaOperation) -> GeneratedSql {
    match op {
        SchemaOperation::AddColumn {
            table,
            column,
            data_type,
            ..
        } => {
            let pg_type = column_type_for(*data_type);
            GeneratedSql {
                statement: formatdoc! {r#"
                    ALTER TABLE "{table}" ADD COLUMN "{column}" {pg_type};
                "#},
                rollback: formatdoc! {r#"
                    ALTER TABLE "{table}" DROP COLUMN "{column}";
                "#},
            }
        }
        SchemaOperation::DropColumn {
            table,
            column,
            data_type,
            ..
        } => {
            let pg_type = column_type_for(*data_type);
            GeneratedSql {
                statement: formatdoc! {r#"
                    ALTER TABLE "{table}" DROP COLUMN "{column}";
                "#},
                // Restores the column's shape; the data itself comes back
                // only through a backup restore.
                rollback: formatdoc! {r#"
                    ALTER TABLE "{table}" ADD COLUMN "{column}" {pg_type};
                "#},
            }
        }
        SchemaOperation::RenameColumn {
            table,
            old_column,
            new_column,
            ..
        } => GeneratedSql {
            statement: formatdoc! {r#"
                ALTER TABLE "{table}" RENAME COLUMN "{old_column}" TO "{new_column}";
            "#},
            rollback: formatdoc! {r#"
                ALTER TABLE "{table}" RENAME COLUMN "{new_column}" TO "{old_column}";
            "#},
        },
        SchemaOperation::ModifyColumnType {
            table,
            column,
            old_type,
            new_type,
            ..
        } => {
            let new_pg_type = column_type_for(*new_type);
            let old_pg_type = column_type_for(*old_type);
            GeneratedSql {
                statement: formatdoc! {r#"
                    ALTER TABLE "{table}" ALTER COLUMN "{column}" TYPE {new_pg_type} USING "{column}"::{new_pg_type};
                "#},
                rollback: formatdoc! {r#"
                    ALTER TABLE "{table}" ALTER COLUMN "{column}" TYPE {old_pg_type} USING "{column}"::{old_pg_type};
                "#},
            }
        }
    }
}
