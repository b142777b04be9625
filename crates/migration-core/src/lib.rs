//! # Migration Core
//!
//! Core domain types, the Schema Catalog, and the storage traits shared by
//! every other crate in this workspace.
//!
//! This crate provides the foundational data structures and abstractions
//! used throughout the Field Migration Core:
//!
//! - The `Form`/`Field` collaborator types and the owned `FieldMigration`/
//!   `FieldDataBackup` history types
//! - The Schema Catalog (identifier sanitization, table resolution, the
//!   logical-to-physical type map)
//! - The `BackupStore` and `MigrationJournal` traits implemented by
//!   `migration-store`
//! - The crate-wide error type

pub mod catalog;
pub mod domain;
pub mod error;
pub mod traits;

pub use domain::{
    BackupType, DataValue, Field, FieldDataBackup, FieldDataType, FieldMigration, FieldSnapshot,
    FieldValue, Form, MigrationType,
};
pub use error::{Error, Result};
pub use traits::{BackupStore, HistoryFilter, MigrationJournal};
