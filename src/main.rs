//! review-harvest
//!
//! Collects star-balanced product reviews with a pool of browser sessions and
//! stores them alongside a model's predicted rating.

mod cli;
mod config;
mod error;
mod quota;
mod retry;
mod scoring;
mod scraper;
mod storage;
mod types;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "review_harvest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Harvest {
            products,
            limit,
            db,
        } => cli::run_harvest(products, limit, db).await,
        Commands::Quota {
            percentages,
            total,
            ceiling,
            raw,
        } => cli::run_quota(percentages, total, ceiling, raw),
        Commands::Ingest { input, db } => cli::run_ingest(input, db).await,
    }
}
