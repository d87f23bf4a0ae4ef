//! Warehouse pipeline CLI
//!
//! One-shot invocation of the daily ETL run. With no argument the run
//! covers yesterday UTC; a `YYYY-MM-DD` argument overrides the window
//! start, which doubles as the manual backfill mechanism.
//!
//! Usage:
//!   dw_pipeline                  # process yesterday UTC
//!   dw_pipeline 2024-03-05       # process a specific day
//!   dw_pipeline --skip-export    # stop after mart building

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use integreat_dw::export::LocalDirSink;
use integreat_dw::{DatabaseManager, Pipeline, PipelineConfig, PipelineOptions, ProcessingWindow};

/// Daily dimensional ETL and per-tenant mart export
#[derive(Parser, Debug)]
#[command(name = "dw_pipeline", version)]
#[command(about = "Incremental star-schema ETL with per-tenant mart exports")]
struct Args {
    /// Window start date (YYYY-MM-DD); defaults to yesterday UTC
    date: Option<String>,

    /// Stop after mart building; no files are staged or delivered
    #[arg(long)]
    skip_export: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let window = match &args.date {
        Some(date) => ProcessingWindow::parse(date)?,
        None => ProcessingWindow::yesterday_utc(),
    };

    let config = PipelineConfig::from_env()?;
    let db = DatabaseManager::new(&config).await?;
    db.test_connection().await?;

    let sink = Arc::new(LocalDirSink::new(config.delivery_root.clone()));
    let pipeline = Pipeline::new(db.pool().clone(), sink, config.scratch_dir.clone());

    let summary = pipeline
        .run(
            window,
            PipelineOptions {
                skip_export: args.skip_export,
            },
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    db.close().await;
    Ok(())
}
