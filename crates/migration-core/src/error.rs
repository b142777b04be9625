//! Crate-wide error type for the migration core.

use uuid::Uuid;

/// Result alias used throughout the migration core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the Schema Catalog, the domain model, and the storage
/// traits defined in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("identifier '{0}' is empty")]
    EmptyIdentifier(String),

    #[error("identifier '{0}' exceeds the 63 byte Postgres limit")]
    IdentifierTooLong(String),

    #[error("identifier '{0}' must not start with a digit")]
    IdentifierLeadingDigit(String),

    #[error("identifier '{0}' contains characters outside [A-Za-z0-9_]")]
    IdentifierInvalidChars(String),

    #[error("identifier '{0}' collides with a reserved Postgres keyword")]
    ReservedKeyword(String),

    #[error("table '{0}' does not exist")]
    TableMissing(String),

    #[error("column '{0}' does not exist on table '{1}'")]
    ColumnMissing(String, String),

    #[error("column '{0}' already exists on table '{1}'")]
    ColumnAlreadyExists(String, String),

    #[error("backup {0} was not found")]
    BackupNotFound(Uuid),

    #[error("backup {0} has expired and can no longer be restored")]
    BackupExpired(Uuid),

    #[error("migration {0} was not found")]
    MigrationNotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error reflects a bad caller input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyIdentifier(_)
                | Error::IdentifierTooLong(_)
                | Error::IdentifierLeadingDigit(_)
                | Error::IdentifierInvalidChars(_)
                | Error::ReservedKeyword(_)
        )
    }

    /// Whether this error reflects a mismatch between the request and
    /// current system state.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Error::TableMissing(_)
                | Error::ColumnMissing(_, _)
                | Error::ColumnAlreadyExists(_, _)
                | Error::BackupNotFound(_)
                | Error::BackupExpired(_)
                | Error::MigrationNotFound(_)
        )
    }
}
