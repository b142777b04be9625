//! Error handling for the CLI: a `CliError` enum plus a
//! `colored`-annotated `print_error`.

use colored::Colorize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Controller(#[from] migration_controller::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    InvalidInput(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for CliError {
    fn from(e: serde_yaml::Error) -> Self {
        CliError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Serialization(e.to_string())
    }
}

pub fn print_error(error: &CliError) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    if let CliError::Config(_) = error {
        eprintln!("\n{}", "Hint:".yellow().bold());
        eprintln!("  Run 'migration-cli init --database-url <URL>' to write a config file");
    }
}
