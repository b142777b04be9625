//! # Migration Store
//!
//! Postgres-backed implementations of the `migration-core` storage
//! traits: the Backup Store and the Migration Journal, plus the embedded
//! schema migrations for both tables and the durable `migration_jobs`
//! table used by `migration-queue`.

pub mod backup_store;
pub mod error;
pub mod journal;
pub mod retention;

pub use backup_store::PostgresBackupStore;
pub use error::{Error, Result};
pub use journal::PostgresMigrationJournal;
pub use retention::RetentionConfig;

/// Runs the embedded migrations against `pool`. Call once at startup,
/// before serving any traffic.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Migration(e.to_string()))
}
