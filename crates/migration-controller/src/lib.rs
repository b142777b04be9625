pub mod controller;
pub mod error;

pub use controller::{CleanupReport, MigrationController};
pub use error::{Error, Result};
