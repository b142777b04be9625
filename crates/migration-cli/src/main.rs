mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use migration_controller::MigrationController;
use migration_store::{PostgresBackupStore, PostgresMigrationJournal, RetentionConfig};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;
use error::{print_error, Result};

#[derive(Parser)]
#[command(name = "migration-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the Q-Collector field migration core")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true, env = "FIELD_MIGRATION_CONFIG")]
    config: Option<String>,

    /// Database URL override.
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        print_error(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init { database_url, force } => {
            config::init_config(&database_url, force)?;
            output::print_success("configuration initialized");
            Ok(())
        }
        Command::Config => {
            let cfg = config::load_config(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&cfg)?);
            Ok(())
        }
        command => {
            let mut cfg = config::load_config(cli.config.as_deref())?;
            if let Some(url) = cli.database_url {
                cfg.database_url = url;
            }

            let pool = PgPoolOptions::new().max_connections(5).connect(&cfg.database_url).await?;
            migration_store::run_migrations(&pool)
                .await
                .map_err(|e| error::CliError::Migration(e.to_string()))?;

            let retention = RetentionConfig::new(cfg.retention_days, false)
                .map_err(|e| error::CliError::Config(e.to_string()))?;
            let backups = Arc::new(PostgresBackupStore::new(pool.clone(), retention));
            let journal = Arc::new(PostgresMigrationJournal::new(pool.clone()));
            let controller = Arc::new(MigrationController::new(pool, backups, journal));

            commands::run(command, controller).await
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::new("info") };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time())
        .init();
}
