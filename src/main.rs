use sports_lake::catalog::{GlueCatalog, MemoryCatalog};
use sports_lake::query::{AthenaQueryService, MemoryQueryService};
use sports_lake::source::SportsDataClient;
use sports_lake::storage::{MemoryStorage, S3Storage};
use sports_lake::telemetry::init_tracing;
use sports_lake::{LakeConfig, Pipeline, PipelineReport};

use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "sports-lake")]
#[command(about = "Provision an NBA analytics data lake and run a count query against it")]
#[command(version)]
struct Args {
    /// Use in-memory storage, catalog and query backends instead of AWS
    #[arg(long)]
    local: bool,

    /// Environment file to load (default: .env in the working directory)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Print the run report as JSON instead of the text summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file
    match &args.env_file {
        Some(path) => {
            dotenv::from_path(path)?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    init_tracing();

    let config = match LakeConfig::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Ok(());
        }
    };
    info!("Configuration loaded: {:?}", config);

    let source = match SportsDataClient::new(&config.endpoint, &config.api_key) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("{}", e);
            return Ok(());
        }
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, skipping remaining steps (press Ctrl-C again to exit now)");
        ctrl_c.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Second interrupt received, exiting");
            std::process::exit(130);
        }
    });

    let report = if args.local {
        info!("Running against in-memory backends");
        let storage = MemoryStorage::new();
        let catalog = MemoryCatalog::new();
        let queries = MemoryQueryService::new(storage.clone(), catalog.clone());
        Pipeline::new(
            &config,
            source,
            Arc::new(storage),
            Arc::new(catalog),
            Arc::new(queries),
        )
        .with_cancellation(cancel)
        .run()
        .await
    } else {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        Pipeline::new(
            &config,
            source,
            Arc::new(S3Storage::new(&sdk_config)),
            Arc::new(GlueCatalog::new(&sdk_config)),
            Arc::new(AthenaQueryService::new(&sdk_config)),
        )
        .with_cancellation(cancel)
        .run()
        .await
    };

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("\n=== Pipeline Steps ===");
    for step in &report.steps {
        println!("  {:<12} {:?}", step.step.as_str(), step.outcome);
    }
    println!("  records fetched: {}", report.records_fetched);

    let rows = report.result_rows();
    if rows.is_empty() {
        println!("\nFailed to query Athena.");
        return;
    }

    println!("\nAthena query results:");
    for row in rows {
        let cells: Vec<&str> = row.iter().map(|c| c.as_deref().unwrap_or("NULL")).collect();
        println!("  {}", cells.join(" | "));
    }
}
