//! Property-based tests for invariants that hold across the whole input
//! space rather than a handful of fixed scenarios. These generalize the
//! crate-local unit tests already living next to `detect()` and
//! `sanitize_identifier()` — randomized inputs instead of a handful of
//! fixed cases.

use chrono::Utc;
use migration_core::catalog::sanitize_identifier;
use migration_core::{Field, FieldDataType, Form};
use migration_engine::detect;
use migration_store::RetentionConfig;
use proptest::prelude::*;
use uuid::Uuid;

fn arb_field_data_type() -> impl Strategy<Value = FieldDataType> {
    prop_oneof![
        Just(FieldDataType::ShortText),
        Just(FieldDataType::LongText),
        Just(FieldDataType::Email),
        Just(FieldDataType::Phone),
        Just(FieldDataType::Number),
        Just(FieldDataType::Url),
        Just(FieldDataType::Date),
        Just(FieldDataType::Time),
        Just(FieldDataType::DateTime),
        Just(FieldDataType::Boolean),
        Just(FieldDataType::Choice),
        Just(FieldDataType::Rating),
        Just(FieldDataType::Slider),
        Just(FieldDataType::GeoPoint),
        Just(FieldDataType::FileRef),
    ]
}

fn arb_fields(form_id: Uuid) -> impl Strategy<Value = Vec<Field>> {
    proptest::collection::vec(("[a-z][a-z0-9_]{0,20}", arb_field_data_type()), 0..8).prop_map(
        move |pairs| {
            pairs
                .into_iter()
                .map(|(name, data_type)| Field {
                    id: Uuid::new_v4(),
                    form_id,
                    column_name: name,
                    data_type,
                    sub_form_id: None,
                })
                .collect()
        },
    )
}

proptest! {
    /// `detect(fields, fields) == []` for any field list —
    /// comparing a field list against an identical clone never yields an
    /// operation, no matter how many fields or what they contain.
    #[test]
    fn detect_is_empty_when_nothing_changed(fields in arb_fields(Uuid::nil())) {
        let form = Form { id: Uuid::nil(), table_name: "form_prop".to_string(), fields: vec![] };
        let ops = detect(&form, &fields, &fields);
        prop_assert!(ops.is_empty());
    }

    /// When the same field id is both renamed and retyped in
    /// one diff, the emitted `RENAME_COLUMN` always precedes the
    /// `MODIFY_COLUMN_TYPE` for that field, regardless of the specific
    /// names/types chosen.
    #[test]
    fn rename_is_always_ordered_before_retype(
        old_name in "[a-z][a-z0-9_]{0,15}",
        new_name in "[a-z][a-z0-9_]{0,15}",
        old_type in arb_field_data_type(),
        new_type in arb_field_data_type(),
    ) {
        prop_assume!(old_name != new_name);
        prop_assume!(old_type != new_type);
        prop_assume!(!old_type.is_opaque() && !new_type.is_opaque());

        let form_id = Uuid::new_v4();
        let field_id = Uuid::new_v4();
        let form = Form { id: form_id, table_name: "form_prop".to_string(), fields: vec![] };
        let old_field = Field { id: field_id, form_id, column_name: old_name, data_type: old_type, sub_form_id: None };
        let new_field = Field { id: field_id, form_id, column_name: new_name, data_type: new_type, sub_form_id: None };

        let ops = detect(&form, std::slice::from_ref(&old_field), std::slice::from_ref(&new_field));
        prop_assert_eq!(ops.len(), 2);

        let rename_index = ops.iter().position(|op| matches!(op, migration_engine::SchemaOperation::RenameColumn { .. }));
        let retype_index = ops.iter().position(|op| matches!(op, migration_engine::SchemaOperation::ModifyColumnType { .. }));
        prop_assert!(rename_index.is_some());
        prop_assert!(retype_index.is_some());
        prop_assert!(rename_index.unwrap() < retype_index.unwrap());
    }

    /// Identifiers sanitize consistently at the 63/64-byte
    /// boundary — any all-lowercase-letter identifier of length <= 63
    /// survives, any of length > 63 is rejected, regardless of its exact
    /// content.
    #[test]
    fn identifier_boundary_is_63_bytes(len in 1usize..100, ch in "[a-z]") {
        let candidate = ch.repeat(len);
        let result = sanitize_identifier(&candidate);
        if len <= 63 {
            prop_assert!(result.is_ok(), "{len}-byte identifier should be accepted");
        } else {
            prop_assert!(result.is_err(), "{len}-byte identifier should be rejected");
        }
    }

    /// An empty identifier is always rejected, never dependent
    /// on surrounding state.
    #[test]
    fn empty_identifier_is_always_rejected(_unit in Just(())) {
        prop_assert!(sanitize_identifier("").is_err());
    }

    /// Retention day counts outside `[MIN_DAYS, MAX_DAYS]` are always
    /// rejected, and every count inside that range is always accepted
    /// with the exact value preserved, no matter what the value is.
    #[test]
    fn retention_days_outside_30_365_are_rejected(days in -100i64..1000) {
        let result = RetentionConfig::new(days, false);
        if (RetentionConfig::MIN_DAYS..=RetentionConfig::MAX_DAYS).contains(&days) {
            prop_assert_eq!(result.unwrap().days(), days);
        } else {
            prop_assert!(result.is_err());
        }
    }

    /// For any accepted day count, the retention window's duration always
    /// equals that day count, and adding it to `now` always lands
    /// strictly in the future.
    #[test]
    fn retention_window_matches_accepted_days(days in RetentionConfig::MIN_DAYS..=RetentionConfig::MAX_DAYS) {
        let cfg = RetentionConfig::new(days, false).unwrap();
        prop_assert_eq!(cfg.window().num_days(), cfg.days());
        prop_assert!(Utc::now() + cfg.window() > Utc::now());
    }
}
