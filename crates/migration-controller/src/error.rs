//! Error type for the outward-facing façade. Wraps every layer below it:
//! the DDL engine, the storage traits, and the queue.

use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] migration_core::Error),

    #[error(transparent)]
    Engine(#[from] migration_engine::Error),

    #[error(transparent)]
    Store(#[from] migration_store::Error),

    #[error(transparent)]
    Queue(#[from] migration_queue::Error),

    #[error("migration {0} cannot be rolled back: {1}")]
    NotRollbackable(Uuid, &'static str),

    #[error("cleanup days {0} is outside the allowed [30, 365] range")]
    InvalidCleanupDays(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
