//! The Change Detector: a pure function comparing an old and a new field
//! list for one form and producing an ordered list of primitive schema
//! operations.

use migration_core::catalog::resolve_table_for_field;
use migration_core::{Field, Form};

use crate::operation::SchemaOperation;

/// Compare `old_fields` against `new_fields` (both belonging to `form`,
/// matched by `field.id`) and return the ordered operations needed to
/// bring the dynamic table(s) in line with `new_fields`.
///
/// Derivation rules:
/// - a field id present only in `new_fields` ⇒ `ADD_COLUMN`
/// - a field id present only in `old_fields` ⇒ `DROP_COLUMN`
/// - a field id present in both with a different `column_name` ⇒
///   `RENAME_COLUMN`
/// - a field id present in both with a different `data_type` ⇒
///   `MODIFY_COLUMN_TYPE`
///
/// When the same field id is both renamed and retyped, the rename is
/// ordered before the type change (the table is renamed to its new name,
/// then the column at that name has its type altered). Table resolution
/// for every operation goes through the Schema Catalog, never
/// cached across the call. `detect(fields, fields) == []` for any input.
pub fn detect(form: &Form, old_fields: &[Field], new_fields: &[Field]) -> Vec<SchemaOperation> {
    let mut ops = Vec::new();

    for new_field in new_fields {
        let Some(old_field) = old_fields.iter().find(|f| f.id == new_field.id) else {
            let table = resolve_table_for_field(form, new_field);
            ops.push(SchemaOperation::AddColumn {
                field_id: new_field.id,
                table: table.as_str().to_string(),
                column: new_field.column_name.clone(),
                data_type: new_field.data_type,
            });
            continue;
        };

        if old_field.column_name != new_field.column_name {
            let table = resolve_table_for_field(form, new_field);
            ops.push(SchemaOperation::RenameColumn {
                field_id: new_field.id,
                table: table.as_str().to_string(),
                old_column: old_field.column_name.clone(),
                new_column: new_field.column_name.clone(),
            });
        }

        if old_field.data_type != new_field.data_type {
            let table = resolve_table_for_field(form, new_field);
            ops.push(SchemaOperation::ModifyColumnType {
                field_id: new_field.id,
                table: table.as_str().to_string(),
                column: new_field.column_name.clone(),
                old_type: old_field.data_type,
                new_type: new_field.data_type,
            });
        }
    }

    for old_field in old_fields {
        if !new_fields.iter().any(|f| f.id == old_field.id) {
            let table = resolve_table_for_field(form, old_field);
            ops.push(SchemaOperation::DropColumn {
                field_id: old_field.id,
                table: table.as_str().to_string(),
                column: old_field.column_name.clone(),
                data_type: old_field.data_type,
            });
        }
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration_core::FieldDataType;
    use uuid::Uuid;

    fn form_with(fields: Vec<Field>) -> (Form, Vec<Field>) {
        let form_id = Uuid::new_v4();
        let fields: Vec<Field> = fields
            .into_iter()
            .map(|mut f| {
                f.form_id = form_id;
                f
            })
            .collect();
        (
            Form {
                id: form_id,
                table_name: "form_t".into(),
                fields: fields.clone(),
            },
            fields,
        )
    }

    fn field(id: Uuid, name: &str, ty: FieldDataType) -> Field {
        Field {
            id,
            form_id: Uuid::nil(),
            column_name: name.into(),
            data_type: ty,
            sub_form_id: None,
        }
    }

    #[test]
    fn detect_is_empty_for_identical_field_lists() {
        let id = Uuid::new_v4();
        let (form, fields) = form_with(vec![field(id, "name", FieldDataType::ShortText)]);
        assert!(detect(&form, &fields, &fields).is_empty());
    }

    #[test]
    fn new_field_produces_add_column() {
        let id = Uuid::new_v4();
        let (form, new_fields) = form_with(vec![field(id, "name", FieldDataType::ShortText)]);
        let ops = detect(&form, &[], &new_fields);
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], SchemaOperation::AddColumn { .. }));
    }

    #[test]
    fn removed_field_produces_drop_column() {
        let id = Uuid::new_v4();
        let (form, old_fields) = form_with(vec![field(id, "name", FieldDataType::ShortText)]);
        let ops = detect(&form, &old_fields, &[]);
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], SchemaOperation::DropColumn { .. }));
    }

    #[test]
    fn rename_is_ordered_before_change_type_on_the_same_field() {
        let id = Uuid::new_v4();
        let (form, old_fields) = form_with(vec![field(id, "old_name", FieldDataType::ShortText)]);
        let new_fields = vec![field(id, "new_name", FieldDataType::LongText)];
        let ops = detect(&form, &old_fields, &new_fields);
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], SchemaOperation::RenameColumn { .. }));
        assert!(matches!(ops[1], SchemaOperation::ModifyColumnType { .. }));
    }

    #[test]
    fn unrelated_rename_and_add_and_drop_compose() {
        let renamed_id = Uuid::new_v4();
        let added_id = Uuid::new_v4();
        let dropped_id = Uuid::new_v4();
        let (form, old_fields) = form_with(vec![
            field(renamed_id, "old", FieldDataType::ShortText),
            field(dropped_id, "gone", FieldDataType::Boolean),
        ]);
        let new_fields = vec![
            field(renamed_id, "renamed", FieldDataType::ShortText),
            field(added_id, "fresh", FieldDataType::Number),
        ];
        let ops = detect(&form, &old_fields, &new_fields);
        assert_eq!(ops.len(), 3);
        assert!(ops.iter().any(|o| matches!(o, SchemaOperation::AddColumn { field_id, .. } if *field_id == added_id)));
        assert!(ops.iter().any(|o| matches!(o, SchemaOperation::DropColumn { field_id, .. } if *field_id == dropped_id)));
        assert!(ops.iter().any(|o| matches!(o, SchemaOperation::RenameColumn { field_id, .. } if *field_id == renamed_id)));
    }
}
