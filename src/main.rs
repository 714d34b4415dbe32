use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};

use listings_etl::config::Config;
use listings_etl::logging;
use listings_etl::storage::SqliteStore;
use listings_etl::StageRunner;

#[derive(Parser)]
#[command(name = "listings-etl")]
#[command(about = "Transform and load short-term-rental listings")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run extract, transform and load once
    Run {
        /// Only listings with price strictly below this value are extracted
        #[arg(long)]
        price_limit: Option<f64>,
        /// Total attempts per stage
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Seconds to wait between attempts
        #[arg(long)]
        retry_delay_secs: Option<u64>,
    },
    /// Create the target table if it does not exist
    Provision,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load().context("Failed to load configuration")?;
    let store = SqliteStore::new(&config.database)?;

    match cli.command {
        Commands::Provision => {
            store.ensure_target_table()?;
            println!("Target table '{}' is ready", config.database.target_table);
        }
        Commands::Run {
            price_limit,
            max_attempts,
            retry_delay_secs,
        } => {
            if let Some(limit) = price_limit {
                config.pipeline.price_limit = limit;
            }
            if let Some(attempts) = max_attempts {
                config.pipeline.max_attempts = attempts;
            }
            if let Some(delay) = retry_delay_secs {
                config.pipeline.retry_delay_secs = delay;
            }
            config.validate()?;

            info!("Using database at {}", store.path().display());
            let store = Arc::new(store);
            let mut runner = StageRunner::new(
                store.clone(),
                store,
                config.pipeline.retry_policy(),
                config.pipeline.price_limit,
            );

            match runner.run().await {
                Ok(report) => {
                    println!("\nRun summary:");
                    println!("   Extracted: {}", report.rows_extracted);
                    println!("   Loaded: {}", report.rows_loaded);
                    println!(
                        "   Attempts: extract={} transform={} load={}",
                        report.attempts.extract, report.attempts.transform, report.attempts.load
                    );
                    println!("   Duration: {} ms", report.duration().num_milliseconds());
                }
                Err(e) => {
                    error!("ETL run failed: {}", e);
                    println!("Error loading data: {e}");
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
