//! dbex CLI - XML backup and restore of database tables.

use clap::{Parser, Subcommand};
use dbex::core::CleanupMode;
use dbex::drivers::PostgresDatabase;
use dbex::{Backup, BackupError, BatchMode, Config};
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbex")]
#[command(about = "Back up database tables to a portable XML document and restore them")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the configured tables and their data to a backup file
    Backup {
        /// Backup file to create
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Recreate tables from a backup file and load their data
    Restore {
        /// Backup file to read
        #[arg(short, long)]
        input: PathBuf,

        /// Insert rows one at a time instead of in batches
        #[arg(long)]
        no_batch: bool,

        /// Keep existing tables instead of dropping them first
        #[arg(long)]
        no_clean: bool,
    },

    /// Summarize a backup file without connecting to a database
    Inspect {
        /// Backup file to read
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), BackupError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(BackupError::Config)?;

    // Inspect works on the file alone
    if let Commands::Inspect { input } = &cli.command {
        return inspect(input, cli.output_json);
    }

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Inspect { input } => inspect(&input, cli.output_json)?,
        Commands::Backup { output } => {
            let started = Instant::now();
            let backup = Backup::connect(&config).await?;
            let file = File::create(&output)?;
            let context = backup.save(BufWriter::new(file)).await?;
            let tables = context.count::<dbex::core::Table>();

            if cli.output_json {
                let summary = json!({
                    "operation": "backup",
                    "file": output,
                    "tables": tables,
                    "duration_seconds": started.elapsed().as_secs_f64(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\nBackup completed!");
                println!("  File: {}", output.display());
                println!("  Tables: {}", tables);
                println!("  Duration: {:.2}s", started.elapsed().as_secs_f64());
            }
        }

        Commands::Restore {
            input,
            no_batch,
            no_clean,
        } => {
            if no_batch {
                config.backup.batch_mode = BatchMode::Off;
            }
            if no_clean {
                config.backup.cleanup_mode = CleanupMode::None;
            }

            let started = Instant::now();
            let file = File::open(&input)?;
            let backup = Backup::connect(&config).await?;
            let context = backup.restore(BufReader::new(file)).await?;
            let tables = context.count::<dbex::core::Table>();

            if cli.output_json {
                let summary = json!({
                    "operation": "restore",
                    "file": input,
                    "tables": tables,
                    "duration_seconds": started.elapsed().as_secs_f64(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\nRestore completed!");
                println!("  File: {}", input.display());
                println!("  Tables: {}", tables);
                println!("  Duration: {:.2}s", started.elapsed().as_secs_f64());
            }
        }

        Commands::HealthCheck => {
            let started = Instant::now();
            let result = match PostgresDatabase::connect(&config.database).await {
                Ok(database) => database.server_version().await.map(Some),
                Err(e) => Err(e),
            };
            let latency_ms = started.elapsed().as_millis() as u64;
            let (version, error) = match result {
                Ok(version) => (version, None),
                Err(e) => (None, Some(e.to_string())),
            };
            let healthy = error.is_none();

            if cli.output_json {
                let report = json!({
                    "healthy": healthy,
                    "latency_ms": latency_ms,
                    "server_version": version,
                    "error": error,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Database (PostgreSQL): {} ({}ms)",
                    if healthy { "OK" } else { "FAILED" },
                    latency_ms
                );
                if let Some(ref version) = version {
                    println!("    Version: {}", version);
                }
                if let Some(ref err) = error {
                    println!("    Error: {}", err);
                }
            }

            if !healthy {
                return Err(BackupError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn inspect(input: &Path, output_json: bool) -> Result<(), BackupError> {
    let file = File::open(input)?;
    let inventory = dbex::inspect(BufReader::new(file))?;
    info!(
        "Inspected {} tables from {}",
        inventory.tables.len(),
        input.display()
    );

    if output_json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(());
    }

    println!("Backup: {}", input.display());
    println!("\nMetadata:");
    for (key, value) in &inventory.metadata {
        println!("  {} = {}", key, value);
    }
    println!("\nTables:");
    for table in &inventory.tables {
        let rows = table
            .rows
            .map(|r| r.to_string())
            .unwrap_or_else(|| "no data".to_string());
        println!(
            "  {} ({} columns, {} foreign keys): {} rows",
            table.name, table.columns, table.foreign_keys, rows
        );
    }
    println!(
        "\n  Total: {} tables, {} rows",
        inventory.tables.len(),
        inventory.total_rows()
    );
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = verbosity.to_lowercase();
    if !matches!(level.as_str(), "debug" | "info" | "warn" | "error") {
        return Err(format!("Unknown verbosity '{}'", level));
    }

    // RUST_LOG, when set, overrides the verbosity flag.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Unknown log format '{}'", other)),
    }

    Ok(())
}
