pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] migration_core::Error),

    #[error(transparent)]
    Engine(#[from] migration_engine::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job {0} was not found")]
    JobNotFound(uuid::Uuid),

    #[error("job {0} is not in a waiting state and cannot be cancelled")]
    NotCancellable(uuid::Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
