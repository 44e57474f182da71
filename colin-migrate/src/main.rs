//! colin-migrate - COLIN to LEAR migration flow runner
//!
//! **Usage:**
//! ```bash
//! colin-migrate run --flow corps [--batch-size 50] [--corp BC0000001 ...]
//! colin-migrate status --flow firms
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colin_common::config::ConfigOverrides;
use colin_common::db::{connect_pool, init_colin_database};
use colin_common::{FlowKind, MigrationConfig};
use colin_migrate::db::ProcessingStatusService;
use colin_migrate::MigrationFlow;
use std::path::PathBuf;
use tracing::{info, warn};

/// COLIN to LEAR migration
#[derive(Parser, Debug)]
#[clap(name = "colin-migrate")]
#[clap(about = "Migrate legacy COLIN businesses into LEAR")]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one batch of unprocessed businesses
    Run {
        #[clap(flatten)]
        common: CommonArgs,

        /// Maximum businesses selected for this run
        #[clap(long)]
        batch_size: Option<usize>,

        /// Businesses processed concurrently within a stage
        #[clap(long)]
        max_concurrency: Option<usize>,

        /// Only consider these corp numbers (repeatable)
        #[clap(long = "corp", value_name = "CORP_NUM")]
        corps: Vec<String>,
    },
    /// Show tracker counts per status
    Status {
        #[clap(flatten)]
        common: CommonArgs,

        /// Also list this many FAILED/PARTIAL businesses
        #[clap(long, default_value = "0")]
        failures: i64,
    },
}

#[derive(clap::Args, Debug)]
struct CommonArgs {
    /// Flow to run: corps or firms
    #[clap(long, default_value = "corps")]
    flow: FlowKind,

    /// Data load environment (overrides DATA_LOAD_ENV)
    #[clap(long = "env")]
    data_load_env: Option<String>,

    /// COLIN extract database URL
    #[clap(long)]
    colin_db_url: Option<String>,

    /// LEAR database URL
    #[clap(long)]
    lear_db_url: Option<String>,

    /// TOML config file
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl CommonArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_load_env: self.data_load_env.clone(),
            colin_db_url: self.colin_db_url.clone(),
            lear_db_url: self.lear_db_url.clone(),
            config_path: self.config.clone(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("Could not load .env: {}", e);
        }
    }

    info!("Starting colin-migrate v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    match args.command {
        Command::Run {
            common,
            batch_size,
            max_concurrency,
            corps,
        } => {
            let overrides = ConfigOverrides {
                batch_size,
                max_concurrency,
                ..common.overrides()
            };
            let config = MigrationConfig::resolve(common.flow, &overrides)
                .context("Failed to resolve configuration")?;
            info!(
                flow_name = config.flow.flow_name(),
                environment = %config.data_load_env,
                batch_size = config.batch_size,
                max_concurrency = config.max_concurrency,
                "Configuration resolved"
            );

            let flow = MigrationFlow::connect(config)
                .await
                .context("Failed to open databases")?;
            let corp_filter = (!corps.is_empty()).then_some(corps.as_slice());
            let summary = flow.run(corp_filter).await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Status { common, failures } => {
            let config = MigrationConfig::resolve(common.flow, &common.overrides())
                .context("Failed to resolve configuration")?;
            let pool = connect_pool(&config.colin_db_url, 1)
                .await
                .context("Failed to open COLIN database")?;
            init_colin_database(&pool).await?;

            let tracker = ProcessingStatusService::new(pool, config.data_load_env.clone());
            let flow_name = config.flow.flow_name();
            println!("{} ({})", flow_name, config.data_load_env);
            for (status, count) in tracker.status_counts(flow_name).await? {
                println!("  {:<12} {}", status, count);
            }

            if failures > 0 {
                for record in tracker.list_failures(flow_name, failures).await? {
                    println!(
                        "  {} {} event={} {}: {}",
                        record.corp_num,
                        record.processed_status.as_deref().unwrap_or("-"),
                        record.failed_event_id.map(|id| id.to_string()).unwrap_or_default(),
                        record.failed_event_file_type.as_deref().unwrap_or("-"),
                        record.last_error.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }

    Ok(())
}
