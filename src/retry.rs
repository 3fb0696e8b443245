//! Retry logic with exponential backoff.
//!
//! Used for session login (retried on missing page elements) and for page
//! fetches (retried on network failures).

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,
    /// Initial delay between retries
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Maximum delay between retries
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config for page fetches
    pub fn network() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Create a config for the login sequence
    pub fn login() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
            multiplier: 2.0,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Calculate delay for a given attempt
    pub(crate) fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

/// Final error of a retried operation along with how many attempts were made
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub error: E,
}

/// Retry an async operation with exponential backoff.
///
/// Only errors for which `should_retry` returns true are retried; any other
/// error is returned immediately.
pub async fn retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= config.max_retries || !should_retry(&e) {
                    return Err(Exhausted {
                        attempts: attempt + 1,
                        error: e,
                    });
                }
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name,
                    attempt + 1,
                    config.max_attempts(),
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Retry an async operation on every error
pub async fn retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_if(config, operation_name, |_| true, operation)
        .await
        .map_err(|e| e.error)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
