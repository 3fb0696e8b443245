//! CLI commands for review-harvest.
//!
//! Supports a full harvest run, standalone quota calculation, and replaying
//! previously dumped reviews into the store.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::quota::{self, Proportions};
use crate::scoring::HttpScorer;
use crate::scraper::{discovery, ChromeSession, ScrapeReport, Session, SessionPool};
use crate::storage::SharedStore;
use crate::types::{RatingHistogram, ReviewRecord};

#[derive(Parser)]
#[command(name = "review-harvest")]
#[command(version, about = "Collect star-balanced product reviews and score them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape reviews for bestsellers (or the given products) and store them
    Harvest {
        /// Product IDs to scrape instead of discovering bestsellers
        #[arg(short, long, value_delimiter = ',')]
        products: Vec<String>,

        /// Maximum number of products to scrape
        #[arg(short, long)]
        limit: Option<usize>,

        /// Database path override
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print per-category quotas for a rating histogram
    Quota {
        /// Histogram shares, 5★ first (e.g. 0.5 0.2 0.15 0.1 0.05)
        #[arg(value_name = "SHARE", num_args = 5, required = true)]
        percentages: Vec<f64>,

        /// Target number of reviews per product
        #[arg(short, long)]
        total: Option<u32>,

        /// Per-category ceiling
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        ceiling: Option<u32>,

        /// Print the shares unchanged instead of quotas
        #[arg(long, conflicts_with = "total")]
        raw: bool,
    },

    /// Score and store reviews from a JSON dump
    Ingest {
        /// JSON array of {productId, reviewText, overall}
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Database path override
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// Run a full harvest.
pub async fn run_harvest(
    products: Vec<String>,
    limit: Option<usize>,
    db: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(path) = db {
        config.storage.db_path = path;
    }

    let credentials = config
        .auth
        .credentials()
        .context("credentials missing: set HARVEST_AUTH__EMAIL and HARVEST_AUTH__PASSWORD")?;

    let scorer = HttpScorer::new(&config.scorer)?;
    let store = SharedStore::open(
        &config.storage.db_path,
        scorer,
        config.storage.empty_review_policy,
    )?;
    info!("Storing reviews in {}", config.storage.db_path.display());

    let mut discovery_session = ChromeSession::launch(&config.browser).await?;

    let mut products = if products.is_empty() {
        match discovery::bestseller_ids(&mut discovery_session).await {
            Ok(ids) => ids,
            Err(e) => {
                close_quietly(discovery_session).await;
                return Err(e).context("bestseller discovery failed");
            }
        }
    } else {
        products
    };
    if let Some(limit) = limit {
        products.truncate(limit);
    }
    info!("Harvesting {} products", products.len());

    let pool = match SessionPool::launch(&config.browser, config.scraper.clone()).await {
        Ok(pool) => pool,
        Err(e) => {
            close_quietly(discovery_session).await;
            return Err(e).context("failed to start session pool");
        }
    };

    let logged_in = pool
        .login(&credentials)
        .await
        .iter()
        .filter(|r| r.is_ok())
        .count();
    if logged_in == 0 {
        pool.close().await;
        close_quietly(discovery_session).await;
        anyhow::bail!("no session could log in");
    }

    let mut reports = Vec::new();
    for product_id in &products {
        let histogram = match discovery::histogram(&mut discovery_session, product_id).await {
            Ok(h) => h,
            Err(e) => {
                warn!("{}: no usable histogram ({}), skipping", product_id, e);
                continue;
            }
        };

        let quotas = quota::quotas(&histogram, config.quota.total, config.quota.ceiling);
        info!("{}: quotas {:?}", product_id, quotas.as_slice());

        let report = pool.scrape_all(product_id, &quotas, &store).await;
        info!(
            "{}: {} reviews extracted, {} categories failed",
            product_id,
            report.emitted(),
            report.failures().count()
        );
        reports.push(report);
    }

    pool.close().await;
    close_quietly(discovery_session).await;

    print_summary(&store, &reports).await?;
    Ok(())
}

async fn close_quietly(session: ChromeSession) {
    if let Err(e) = session.close().await {
        warn!("Discovery browser did not close cleanly: {}", e);
    }
}

async fn print_summary(
    store: &SharedStore<HttpScorer>,
    reports: &[ScrapeReport],
) -> anyhow::Result<()> {
    println!("{:<14} {:>9} {:>7} {:>8}", "product", "extracted", "stored", "failures");
    for report in reports {
        println!(
            "{:<14} {:>9} {:>7} {:>8}",
            report.product_id,
            report.emitted(),
            store.row_count(&report.product_id).await?,
            report.failures().count()
        );
    }
    Ok(())
}

/// Print quotas (or raw shares) for a histogram.
pub fn run_quota(
    percentages: Vec<f64>,
    total: Option<u32>,
    ceiling: Option<u32>,
    raw: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let histogram = RatingHistogram::new(percentages)?;

    let total = if raw {
        None
    } else {
        Some(total.unwrap_or(config.quota.total))
    };
    let ceiling = ceiling.unwrap_or(config.quota.ceiling);

    let proportions = quota::compute(&histogram, total, ceiling);
    println!("{}", serde_json::to_string(&proportions)?);
    if let Proportions::Counts(q) = &proportions {
        eprintln!("total: {}", q.total());
    }
    Ok(())
}

/// Score and store reviews from a JSON dump, one batch per product.
pub async fn run_ingest(input: PathBuf, db: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(path) = db {
        config.storage.db_path = path;
    }

    let input_json = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let records: Vec<ReviewRecord> = serde_json::from_str(&input_json)
        .with_context(|| format!("{} is not a review dump", input.display()))?;
    info!("Loaded {} reviews from {}", records.len(), input.display());

    let store = SharedStore::open(
        &config.storage.db_path,
        HttpScorer::new(&config.scorer)?,
        config.storage.empty_review_policy,
    )?;

    for (product_id, reviews) in group_by_product(records) {
        let summary = store.record_batch(&product_id, &reviews).await?;
        println!(
            "{}: {} stored, {} blank, {} unscored, {} not processed",
            product_id,
            summary.persisted,
            summary.skipped_empty,
            summary.skipped_scoring,
            summary.abandoned
        );
    }
    Ok(())
}

/// Group records by product, keeping each product's records in file order
fn group_by_product(records: Vec<ReviewRecord>) -> BTreeMap<String, Vec<ReviewRecord>> {
    let mut groups: BTreeMap<String, Vec<ReviewRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.product_id.clone()).or_default().push(record);
    }
    groups
}
