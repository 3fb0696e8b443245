//! Configuration for the review harvester.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::quota::{DEFAULT_CEILING, DEFAULT_TOTAL};
use crate::retry::RetryConfig;
use crate::types::{Credentials, NUM_CATEGORIES};

/// Browser launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chrome/Chromium executable; platform default when unset
    #[serde(default)]
    pub chrome_path: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Time to let a page settle after navigation or a click
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_headless() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    1500
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: default_headless(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl BrowserConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Session pool and pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_category_timeout_secs")]
    pub category_timeout_secs: u64,
    #[serde(default = "RetryConfig::login")]
    pub login_retry: RetryConfig,
    #[serde(default = "RetryConfig::network")]
    pub fetch_retry: RetryConfig,
}

fn default_pool_size() -> usize {
    NUM_CATEGORIES
}

fn default_max_pages() -> u32 {
    10
}

fn default_page_delay_ms() -> u64 {
    100
}

fn default_category_timeout_secs() -> u64 {
    300
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            max_pages: default_max_pages(),
            page_delay_ms: default_page_delay_ms(),
            category_timeout_secs: default_category_timeout_secs(),
            login_retry: RetryConfig::login(),
            fetch_retry: RetryConfig::network(),
        }
    }
}

impl ScraperConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn category_timeout(&self) -> Duration {
        Duration::from_secs(self.category_timeout_secs)
    }
}

/// Quota calculation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_total")]
    pub total: u32,
    #[serde(default = "default_ceiling")]
    pub ceiling: u32,
}

fn default_total() -> u32 {
    DEFAULT_TOTAL
}

fn default_ceiling() -> u32 {
    DEFAULT_CEILING
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            total: default_total(),
            ceiling: default_ceiling(),
        }
    }
}

/// What a blank review does to the rest of its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReviewPolicy {
    /// Stop processing the remaining reviews of the batch
    #[default]
    AbortBatch,
    /// Skip only the blank review
    SkipRecord,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub empty_review_policy: EmptyReviewPolicy,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/reviews.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            empty_review_policy: EmptyReviewPolicy::default(),
        }
    }
}

/// Scoring service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    #[serde(default = "default_scorer_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_scorer_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scorer_endpoint() -> String {
    "http://127.0.0.1:50051/rate".to_string()
}

fn default_scorer_timeout_secs() -> u64 {
    30
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_scorer_endpoint(),
            timeout_secs: default_scorer_timeout_secs(),
        }
    }
}

/// Account credentials, usually supplied through the environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl AuthConfig {
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(Credentials {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load configuration from defaults, `harvest.toml`, and environment
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(Self::environment())
    }

    /// Environment overrides: `HARVEST_<SECTION>__<KEY>`, e.g. `HARVEST_AUTH__EMAIL`
    fn environment() -> config::Environment {
        config::Environment::with_prefix("HARVEST")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with(environment: config::Environment) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("harvest").required(false))
            .add_source(environment)
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that no run could work with
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.quota.ceiling >= 1, "quota.ceiling must be at least 1");
        anyhow::ensure!(self.scraper.max_pages >= 1, "scraper.max_pages must be at least 1");
        Ok(())
    }
}
