//! Fixed-size pool of sessions, one per star category.
//!
//! Every phase (construction, login, per-product scraping, teardown) fans out
//! across all sessions and joins before returning. Slot `i` always serves
//! category `i + 1`.

use futures::future::{join_all, try_join_all};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{BrowserConfig, ScraperConfig};
use crate::error::{HarvestError, Result};
use crate::retry::retry_if;
use crate::types::{Credentials, QuotaVector, StarCategory, NUM_CATEGORIES};

use super::browser::ChromeSession;
use super::category::CategoryScraper;
use super::session::{self, Session};
use super::sink::ReviewSink;

/// Result of one category's scrape within a product run
#[derive(Debug)]
pub struct CategoryOutcome {
    pub category: StarCategory,
    pub quota: u32,
    pub result: Result<usize>,
}

/// Summary of a `scrape_all` call
#[derive(Debug)]
pub struct ScrapeReport {
    pub product_id: String,
    pub outcomes: Vec<CategoryOutcome>,
    /// Categories with no session or no quota to pair with
    pub skipped: Vec<StarCategory>,
    /// Sessions beyond the last category, which never scrape
    pub idle_slots: usize,
}

impl ScrapeReport {
    /// Total records emitted across successful categories
    pub fn emitted(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CategoryOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Pool of authenticated sessions bound 1:1 to star categories
pub struct SessionPool<S: Session> {
    slots: Vec<Mutex<S>>,
    scraper: CategoryScraper,
    config: ScraperConfig,
}

impl SessionPool<ChromeSession> {
    /// Launch `config.pool_size` browsers concurrently
    pub async fn launch(browser: &BrowserConfig, config: ScraperConfig) -> Result<Self> {
        let size = config.pool_size;
        Self::build(size, config, |_| ChromeSession::launch(browser)).await
    }
}

impl<S: Session> SessionPool<S> {
    /// Create `size` sessions concurrently.
    ///
    /// If any session fails to start, the whole pool fails with that error.
    pub async fn build<F, Fut>(size: usize, config: ScraperConfig, factory: F) -> Result<Self>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<S>>,
    {
        let sessions = try_join_all((0..size).map(factory)).await?;
        info!("Session pool ready with {} sessions", sessions.len());
        Ok(Self::from_sessions(sessions, config))
    }

    pub fn from_sessions(sessions: Vec<S>, config: ScraperConfig) -> Self {
        if sessions.len() > NUM_CATEGORIES {
            warn!(
                "{} sessions for {} categories; {} will stay idle",
                sessions.len(),
                NUM_CATEGORIES,
                sessions.len() - NUM_CATEGORIES
            );
        }
        Self {
            slots: sessions.into_iter().map(Mutex::new).collect(),
            scraper: CategoryScraper::from_config(&config),
            config,
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Sign every session in concurrently.
    ///
    /// A session whose page is missing an expected element retries the whole
    /// sequence with backoff until the login retry budget is spent. Returns
    /// one result per slot; a failed slot does not affect the others.
    pub async fn login(&self, credentials: &Credentials) -> Vec<Result<()>> {
        let logins = self.slots.iter().enumerate().map(|(idx, slot)| async move {
            let result = retry_if(
                &self.config.login_retry,
                "login",
                HarvestError::is_structure_mismatch,
                move || async move {
                    let mut guard = slot.lock().await;
                    let result = session::login(&mut *guard, credentials).await;
                    result
                },
            )
            .await;

            match result {
                Ok(()) => {
                    debug!("Session {} logged in", idx);
                    Ok(())
                }
                Err(exhausted) if exhausted.error.is_structure_mismatch() => {
                    warn!(
                        "Session {} login gave up after {} attempts: {}",
                        idx, exhausted.attempts, exhausted.error
                    );
                    Err(HarvestError::LoginExhausted {
                        attempts: exhausted.attempts,
                        reason: exhausted.error.to_string(),
                    })
                }
                Err(exhausted) => {
                    warn!("Session {} login failed: {}", idx, exhausted.error);
                    Err(exhausted.error)
                }
            }
        });

        let results = join_all(logins).await;
        let ok = results.iter().filter(|r| r.is_ok()).count();
        info!("{}/{} sessions logged in", ok, results.len());
        results
    }

    /// Scrape every category of `product_id` concurrently, each up to its quota.
    ///
    /// Category `i` (1-based) is served by slot `i - 1` with quota `i - 1`;
    /// categories lacking either are skipped. Each category is bounded by the
    /// configured timeout, and one category failing never stops the others.
    pub async fn scrape_all<K>(
        &self,
        product_id: &str,
        quotas: &QuotaVector,
        sink: &K,
    ) -> ScrapeReport
    where
        K: ReviewSink + ?Sized,
    {
        let mut jobs = Vec::new();
        let mut skipped = Vec::new();

        for (idx, category) in StarCategory::ALL.iter().copied().enumerate() {
            match (self.slots.get(idx), quotas.as_slice().get(idx)) {
                (Some(slot), Some(&quota)) => {
                    jobs.push(self.scrape_category(slot, product_id, category, quota, sink));
                }
                _ => {
                    warn!(
                        "{}: {}, skipping",
                        product_id,
                        HarvestError::NoCategorySessions(category.stars())
                    );
                    skipped.push(category);
                }
            }
        }

        let outcomes = join_all(jobs).await;

        ScrapeReport {
            product_id: product_id.to_string(),
            outcomes,
            skipped,
            idle_slots: self.slots.len().saturating_sub(NUM_CATEGORIES),
        }
    }

    async fn scrape_category<K>(
        &self,
        slot: &Mutex<S>,
        product_id: &str,
        category: StarCategory,
        quota: u32,
        sink: &K,
    ) -> CategoryOutcome
    where
        K: ReviewSink + ?Sized,
    {
        let scrape = self.scraper.run(slot, product_id, category, quota, sink);
        let result = match tokio::time::timeout(self.config.category_timeout(), scrape).await {
            Ok(result) => result,
            Err(_) => Err(HarvestError::Timeout(format!(
                "{} scrape of {}",
                category, product_id
            ))),
        };

        match &result {
            Ok(n) => debug!("{} {}: {} of {} reviews", product_id, category, n, quota),
            Err(e) => warn!("{} {}: scrape failed: {}", product_id, category, e),
        }

        CategoryOutcome {
            category,
            quota,
            result,
        }
    }

    /// Terminate every session concurrently; errors are logged, not returned
    pub async fn close(self) {
        let closes = self
            .slots
            .into_iter()
            .map(|slot| slot.into_inner().close());
        let results = join_all(closes).await;
        for (idx, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                warn!("Session {} did not close cleanly: {}", idx, e);
            }
        }
    }
}
