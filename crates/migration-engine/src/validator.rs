//! The type-conversion validation table consulted by `MODIFY_COLUMN_TYPE`
//! before any backup or DDL runs.

use migration_core::{DataValue, FieldDataType};

/// Why a proposed type conversion was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("'{field}': {from:?} -> {to:?} is not a supported conversion")]
    Unsupported {
        field: String,
        from: FieldDataType,
        to: FieldDataType,
    },
    #[error("'{field}': existing value '{value}' does not parse as {to:?}")]
    UnparsableValue {
        field: String,
        value: String,
        to: FieldDataType,
    },
    #[error("'{field}': existing value '{value}' would not fit narrowed type {to:?}")]
    LossyNarrowing {
        field: String,
        value: String,
        to: FieldDataType,
    },
}

fn is_text(t: FieldDataType) -> bool {
    matches!(t, FieldDataType::ShortText | FieldDataType::LongText)
}

/// Numeric "width" used to decide widening vs. narrowing within the
/// numeric family. Higher is wider.
fn numeric_rank(t: FieldDataType) -> Option<u8> {
    match t {
        FieldDataType::Rating => Some(0),
        FieldDataType::Slider | FieldDataType::Number => Some(1),
        _ => None,
    }
}

/// type-conversion validation table: checked once, before any
/// backup or DDL is issued, using the column's existing non-null values
/// (`existing`) to decide whether a text->typed or narrowing conversion
/// is actually safe for the data in hand.
pub fn validate_conversion(
    field: &str,
    old_type: FieldDataType,
    new_type: FieldDataType,
    existing: &[DataValue],
) -> Result<(), ConversionError> {
    if old_type == new_type {
        return Ok(());
    }

    if old_type.is_opaque() || new_type.is_opaque() {
        if is_text(old_type) || is_text(new_type) {
            return Ok(());
        }
        return Err(ConversionError::Unsupported {
            field: field.to_string(),
            from: old_type,
            to: new_type,
        });
    }

    if !is_text(old_type) && is_text(new_type) {
        // Any typed value always has a text representation.
        return Ok(());
    }

    if is_text(old_type) && !is_text(new_type) {
        for value in existing {
            let DataValue::Text(s) = value else { continue };
            if !parses_as(s, new_type) {
                return Err(ConversionError::UnparsableValue {
                    field: field.to_string(),
                    value: s.clone(),
                    to: new_type,
                });
            }
        }
        return Ok(());
    }

    if let (Some(old_rank), Some(new_rank)) = (numeric_rank(old_type), numeric_rank(new_type)) {
        if new_rank >= old_rank {
            return Ok(());
        }
        for value in existing {
            if let DataValue::Number(n) = value {
                if !fits_rating(*n) {
                    return Err(ConversionError::LossyNarrowing {
                        field: field.to_string(),
                        value: n.to_string(),
                        to: new_type,
                    });
                }
            }
        }
        return Ok(());
    }

    Err(ConversionError::Unsupported {
        field: field.to_string(),
        from: old_type,
        to: new_type,
    })
}

fn parses_as(s: &str, target: FieldDataType) -> bool {
    match target {
        FieldDataType::Number | FieldDataType::Rating | FieldDataType::Slider => {
            s.parse::<f64>().is_ok()
        }
        FieldDataType::Boolean => matches!(
            s.to_ascii_lowercase().as_str(),
            "true" | "false" | "1" | "0" | "yes" | "no"
        ),
        FieldDataType::Date => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        FieldDataType::Time => chrono::NaiveTime::parse_from_str(s, "%H:%M:%S").is_ok(),
        FieldDataType::DateTime => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
        _ => true,
    }
}

/// `Rating` is stored as `smallint`; a value narrows losslessly to it
/// only if it is an integer within `i16`'s range.
fn fits_rating(n: f64) -> bool {
    n.fract() == 0.0 && n >= i16::MIN as f64 && n <= i16::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_to_text_is_always_allowed() {
        assert!(validate_conversion(
            "f",
            FieldDataType::Number,
            FieldDataType::ShortText,
            &[]
        )
        .is_ok());
    }

    #[test]
    fn text_to_number_requires_every_value_to_parse() {
        let ok = [DataValue::Text("42".into()), DataValue::Text("3.5".into())];
        assert!(validate_conversion("f", FieldDataType::ShortText, FieldDataType::Number, &ok).is_ok());

        let bad = [DataValue::Text("not a number".into())];
        assert!(matches!(
            validate_conversion("f", FieldDataType::ShortText, FieldDataType::Number, &bad),
            Err(ConversionError::UnparsableValue { .. })
        ));
    }

    #[test]
    fn numeric_widening_is_always_allowed() {
        assert!(validate_conversion(
            "f",
            FieldDataType::Rating,
            FieldDataType::Number,
            &[DataValue::Number(99999.0)]
        )
        .is_ok());
    }

    #[test]
    fn numeric_narrowing_rejects_values_that_do_not_fit() {
        let overflow = [DataValue::Number(100000.0)];
        assert!(matches!(
            validate_conversion("f", FieldDataType::Number, FieldDataType::Rating, &overflow),
            Err(ConversionError::LossyNarrowing { .. })
        ));

        let fits = [DataValue::Number(5.0)];
        assert!(validate_conversion("f", FieldDataType::Number, FieldDataType::Rating, &fits).is_ok());
    }

    #[test]
    fn opaque_types_reject_non_text_conversions() {
        assert!(matches!(
            validate_conversion("f", FieldDataType::GeoPoint, FieldDataType::Number, &[]),
            Err(ConversionError::Unsupported { .. })
        ));
        assert!(validate_conversion("f", FieldDataType::GeoPoint, FieldDataType::ShortText, &[]).is_ok());
    }

    #[test]
    fn unrelated_family_conversions_are_unsupported() {
        assert!(matches!(
            validate_conversion("f", FieldDataType::Boolean, FieldDataType::Date, &[]),
            Err(ConversionError::Unsupported { .. })
        ));
    }
}
