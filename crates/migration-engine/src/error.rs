//! Error type for the change detector, validator, and DDL executor.

use crate::validator::ConversionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] migration_core::Error),

    #[error("cannot convert '{field}' from {from:?} to {to:?}: {reason}")]
    UnsupportedConversion {
        field: String,
        from: migration_core::FieldDataType,
        to: migration_core::FieldDataType,
        reason: String,
    },

    #[error("cannot narrow '{field}': value '{value}' would not fit the new type")]
    LossyNarrowing { field: String, value: String },

    #[error("cannot convert '{field}': value '{value}' does not parse as the target type")]
    UnparsableValue { field: String, value: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration transaction timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::Unsupported { field, from, to } => Error::UnsupportedConversion {
                field,
                from,
                to,
                reason: "no supported conversion path".to_string(),
            },
            ConversionError::UnparsableValue { field, value, .. } => {
                Error::UnparsableValue { field, value }
            }
            ConversionError::LossyNarrowing { field, value, .. } => {
                Error::LossyNarrowing { field, value }
            }
        }
    }
}
