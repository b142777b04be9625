//! The Schema Catalog: table resolution, identifier sanitization, and the
//! logical-to-physical type map.

use crate::domain::{Field, FieldDataType, Form};
use crate::error::{Error, Result};

/// A validated, lower-cased Postgres identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved dynamic table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// sub-form id present ⇒ the sub-form's table; else the
/// owning form's table. Never cached across a migration — callers must
/// re-resolve on every operation so a field moved between forms/sub-forms
/// is always routed correctly.
pub fn resolve_table_for_field(form: &Form, field: &Field) -> TableName {
    match field.sub_form_id {
        Some(sub_form_id) => TableName(format!("subform_{sub_form_id}")),
        None => TableName(form.table_name.clone()),
    }
}

/// `sanitize_identifier`: empty, >63 bytes, leading-digit, or
/// characters outside `[A-Za-z0-9_]` all fail. The result is lower-cased
/// and checked against the pinned reserved-keyword list.
pub fn sanitize_identifier(proposed: &str) -> Result<Identifier> {
    if proposed.is_empty() {
        return Err(Error::EmptyIdentifier(proposed.to_string()));
    }
    if proposed.len() > 63 {
        return Err(Error::IdentifierTooLong(proposed.to_string()));
    }
    let mut chars = proposed.chars();
    let first = chars.next().expect("checked non-empty above");
    if first.is_ascii_digit() {
        return Err(Error::IdentifierLeadingDigit(proposed.to_string()));
    }
    if !proposed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::IdentifierInvalidChars(proposed.to_string()));
    }

    let lowered = proposed.to_ascii_lowercase();
    if reserved::is_reserved(&lowered) {
        return Err(Error::ReservedKeyword(proposed.to_string()));
    }
    Ok(Identifier(lowered))
}

/// `column_type_for`: a fixed mapping table, never introspected from a
/// live database catalog.
pub fn column_type_for(data_type: FieldDataType) -> &'static str {
    match data_type {
        FieldDataType::ShortText => "varchar(255)",
        FieldDataType::LongText => "text",
        FieldDataType::Email => "varchar(320)",
        FieldDataType::Phone => "varchar(32)",
        FieldDataType::Number => "numeric",
        FieldDataType::Url => "text",
        FieldDataType::Date => "date",
        FieldDataType::Time => "time",
        FieldDataType::DateTime => "timestamptz",
        FieldDataType::Boolean => "boolean",
        FieldDataType::Choice => "varchar(255)",
        FieldDataType::Rating => "smallint",
        FieldDataType::Slider => "numeric",
        FieldDataType::GeoPoint => "point",
        FieldDataType::FileRef => "uuid",
    }
}

/// The pinned reserved-word list, resolved to the PostgreSQL 16 reserved
/// keyword set. Kept as a sorted slice so lookups are a binary search
/// rather than a hash allocation.
pub mod reserved {
    /// PostgreSQL 16 keywords classified as "reserved" or "reserved
    /// (can be function or type name)" in the upstream `keywords.c`
    /// table, lower-cased and sorted for binary search.
    pub(crate) const RESERVED_WORDS: &[&str] = &[
        "all", "analyse", "analyze", "and", "any", "array", "as", "asc",
        "asymmetric", "both", "case", "cast", "check", "collate", "column",
        "constraint", "create", "current_catalog", "current_date",
        "current_role", "current_time", "current_timestamp", "current_user",
        "default", "deferrable", "desc", "distinct", "do", "else", "end",
        "except", "false", "fetch", "for", "foreign", "from", "grant",
        "group", "having", "in", "initially", "intersect", "into",
        "lateral", "leading", "limit", "localtime", "localtimestamp",
        "not", "null", "offset", "on", "only", "or", "order", "placing",
        "primary", "references", "returning", "select", "session_user",
        "some", "symmetric", "table", "then", "to", "trailing", "true",
        "union", "unique", "user", "using", "variadic", "when", "where",
        "window", "with",
    ];

    /// `true` iff `lowered` (already lower-cased) is a reserved keyword.
    pub fn is_reserved(lowered: &str) -> bool {
        RESERVED_WORDS.binary_search(&lowered).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_list_is_sorted() {
        let mut sorted = reserved::RESERVED_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, reserved::RESERVED_WORDS);
    }

    #[test]
    fn rejects_empty_identifier() {
        assert!(matches!(
            sanitize_identifier(""),
            Err(Error::EmptyIdentifier(_))
        ));
    }

    #[test]
    fn rejects_identifier_over_63_bytes() {
        let long = "a".repeat(64);
        assert!(matches!(
            sanitize_identifier(&long),
            Err(Error::IdentifierTooLong(_))
        ));
        let boundary = "a".repeat(63);
        assert!(sanitize_identifier(&boundary).is_ok());
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(matches!(
            sanitize_identifier("1field"),
            Err(Error::IdentifierLeadingDigit(_))
        ));
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(matches!(
            sanitize_identifier("field-name"),
            Err(Error::IdentifierInvalidChars(_))
        ));
        assert!(matches!(
            sanitize_identifier("field name"),
            Err(Error::IdentifierInvalidChars(_))
        ));
    }

    #[test]
    fn rejects_reserved_keyword_case_insensitively() {
        assert!(matches!(
            sanitize_identifier("SELECT"),
            Err(Error::ReservedKeyword(_))
        ));
        assert!(matches!(
            sanitize_identifier("table"),
            Err(Error::ReservedKeyword(_))
        ));
    }

    #[test]
    fn accepts_and_lowercases_a_valid_identifier() {
        let id = sanitize_identifier("Customer_Name").unwrap();
        assert_eq!(id.as_str(), "customer_name");
    }

    #[test]
    fn resolves_subform_table_over_owning_form() {
        let sub_form_id = uuid::Uuid::new_v4();
        let form = Form {
            id: uuid::Uuid::new_v4(),
            table_name: "form_orders".into(),
            fields: vec![],
        };
        let field = Field {
            id: uuid::Uuid::new_v4(),
            form_id: form.id,
            column_name: "qty".into(),
            data_type: FieldDataType::Number,
            sub_form_id: Some(sub_form_id),
        };
        let table = resolve_table_for_field(&form, &field);
        assert_eq!(table.as_str(), format!("subform_{sub_form_id}"));
    }

    #[test]
    fn resolves_owning_form_table_when_no_subform() {
        let form = Form {
            id: uuid::Uuid::new_v4(),
            table_name: "form_orders".into(),
            fields: vec![],
        };
        let field = Field {
            id: uuid::Uuid::new_v4(),
            form_id: form.id,
            column_name: "qty".into(),
            data_type: FieldDataType::Number,
            sub_form_id: None,
        };
        let table = resolve_table_for_field(&form, &field);
        assert_eq!(table.as_str(), "form_orders");
    }
}
