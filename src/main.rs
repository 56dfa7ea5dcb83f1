// ABOUTME: CLI entry point for pg-table-migrator
// ABOUTME: Parses flags, resolves configuration, and runs the migration with an operator retry loop

use anyhow::{Context, Result};
use clap::Parser;
use pg_table_migrator::config::{self, ConfigLayer, EndpointConfig, Settings};
use pg_table_migrator::interactive::{ask_yes_no, SelectionProvider, TerminalSelector};
use pg_table_migrator::migration::{migrate, CreateMode, FileRunLog, TableReport};
use pg_table_migrator::postgres;
use pg_table_migrator::utils::is_database_error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pg-table-migrator")]
#[command(
    about = "Copy selected tables and columns from PostgreSQL into another database",
    long_about = None
)]
struct Cli {
    /// Source host [default: localhost]
    #[arg(long)]
    source_host: Option<String>,
    /// Source database [default: postgres]
    #[arg(long)]
    source_database: Option<String>,
    /// Source user [default: postgres]
    #[arg(long)]
    source_user: Option<String>,
    /// Source password [default: testtest]
    #[arg(long)]
    source_password: Option<String>,
    /// Source port [default: 5432]
    #[arg(long)]
    source_port: Option<u16>,
    /// Destination host [default: localhost]
    #[arg(long)]
    target_host: Option<String>,
    /// Destination database [default: postgres]
    #[arg(long)]
    target_database: Option<String>,
    /// Destination user [default: SYSTEM]
    #[arg(long)]
    target_user: Option<String>,
    /// Destination password [default: MANAGER]
    #[arg(long)]
    target_password: Option<String>,
    /// Destination port [default: 5432]
    #[arg(long)]
    target_port: Option<u16>,
    /// Rows per INSERT statement [default: 2]
    #[arg(long)]
    batch_size: Option<usize>,
    /// Statement head for synthesized tables [default: create]
    #[arg(long, value_enum)]
    create_mode: Option<CreateMode>,
    /// Run log receiving NULL findings [default: log_migration.txt]
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// TOML file with defaults for any of the flags above
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            batch_size: self.batch_size,
            create_mode: self.create_mode,
            log_file: self.log_file.clone(),
            source: EndpointConfig {
                host: self.source_host.clone(),
                port: self.source_port,
                database: self.source_database.clone(),
                user: self.source_user.clone(),
                password: self.source_password.clone(),
            },
            target: EndpointConfig {
                host: self.target_host.clone(),
                port: self.target_port,
                database: self.target_database.clone(),
                user: self.target_user.clone(),
                password: self.target_password.clone(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let file_layer = cli
        .config
        .as_deref()
        .map(config::load_config_file)
        .transpose()?;
    let settings = config::resolve(cli.layer(), file_layer)?;

    let mut selector = TerminalSelector::new();

    loop {
        match run_once(&settings, &mut selector).await {
            Ok(reports) => {
                let rows: u64 = reports.iter().map(|r| r.rows).sum();
                tracing::info!(
                    "✓ Migrated {} table(s), {} row(s) in total",
                    reports.len(),
                    rows
                );
                return Ok(());
            }
            Err(err) if is_database_error(&err) => {
                println!("ERROR. Database error:");
                println!("{:#}", err);
                println!();

                if !ask_yes_no(&mut selector, "Try again")? {
                    return Err(err);
                }
                tracing::info!("Restarting migration from table selection");
            }
            Err(err) => return Err(err),
        }
    }
}

/// One full attempt: fresh run log, fresh connections, full selection flow
async fn run_once(
    settings: &Settings,
    selector: &mut dyn SelectionProvider,
) -> Result<Vec<TableReport>> {
    let mut log = FileRunLog::create(&settings.log_file)?;

    tracing::info!(
        "Connecting to source {}...",
        settings.source.display_target()
    );
    let mut source = postgres::connect(&settings.source.to_config())
        .await
        .context("Failed to connect to source database")?;
    tracing::info!("✓ Connected to source");

    tracing::info!(
        "Connecting to destination {}...",
        settings.target.display_target()
    );
    let mut target = postgres::connect(&settings.target.to_config())
        .await
        .context("Failed to connect to destination database")?;
    tracing::info!("✓ Connected to destination");

    migrate(
        &mut source,
        &mut target,
        selector,
        &settings.options,
        &mut log,
    )
    .await
}
