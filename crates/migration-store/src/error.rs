pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] migration_core::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("retention days {0} is outside the allowed [30, 365] range")]
    InvalidRetentionDays(i64),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
