//! Error types for the harvester.

use thiserror::Error;

/// Result type used throughout the harvester library modules
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Errors raised while computing quotas, driving sessions, or persisting reviews
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Rating histogram did not have exactly five entries
    #[error("invalid histogram: expected 5 percentages, got {0}")]
    InvalidHistogram(usize),

    /// A category had no session (or no quota) to pair with
    #[error("no session available for {0}-star category")]
    NoCategorySessions(u8),

    /// An expected page element was not present
    #[error("page element not found: {0}")]
    StructureMismatch(String),

    /// The external scorer failed or returned unusable output
    #[error("scoring failed: {0}")]
    Scoring(String),

    /// Page navigation or content retrieval failed
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The store's write handle could not be reacquired
    #[error("write handle unavailable: {0}")]
    StaleWriteHandle(String),

    /// Login did not complete within the retry budget
    #[error("login failed after {attempts} attempts: {reason}")]
    LoginExhausted { attempts: u32, reason: String },

    /// A category scrape exceeded its time budget
    #[error("{0} timed out")]
    Timeout(String),

    /// Browser could not be launched or driven
    #[error("browser error: {0}")]
    Browser(String),

    /// SQLite error
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl HarvestError {
    /// Whether the error came from a missing page element
    pub fn is_structure_mismatch(&self) -> bool {
        matches!(self, HarvestError::StructureMismatch(_))
    }

    pub(crate) fn fetch(url: &str, reason: impl std::fmt::Display) -> Self {
        HarvestError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
