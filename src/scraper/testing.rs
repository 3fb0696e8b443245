//! In-memory session and scorer doubles for tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{HarvestError, Result};
use crate::scoring::{Score, Scorer};

use super::session::{Session, ACCOUNT_LINK};

const EMPTY_PAGE: &str = "<html><body></body></html>";

/// Observations shared between a test and the sessions it hands to a pool
#[derive(Default)]
pub struct Probe {
    fetched: Mutex<Vec<String>>,
    filled: Mutex<Vec<(String, String)>>,
    pub login_attempts: AtomicU32,
    pub closed: AtomicU32,
}

impl Probe {
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn filled(&self) -> Vec<(String, String)> {
        self.filled.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

/// Session serving canned pages by URL; unknown URLs render an empty page
pub struct FakeSession {
    probe: Arc<Probe>,
    pages: HashMap<String, String>,
    current: Option<String>,
    login_failures: u32,
    fetch_failures: u32,
    navigate_delay: Duration,
    fail_close: bool,
}

impl FakeSession {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self {
            probe,
            pages: HashMap::new(),
            current: None,
            login_failures: 0,
            fetch_failures: 0,
            navigate_delay: Duration::ZERO,
            fail_close: false,
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// The account link is missing for the first `n` login passes
    pub fn with_login_failures(mut self, n: u32) -> Self {
        self.login_failures = n;
        self
    }

    /// The first `n` navigations fail
    pub fn with_fetch_failures(mut self, n: u32) -> Self {
        self.fetch_failures = n;
        self
    }

    pub fn with_navigate_delay(mut self, delay: Duration) -> Self {
        self.navigate_delay = delay;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Session for FakeSession {
    fn navigate(&mut self, url: &str) -> impl Future<Output = Result<()>> {
        async move {
            if !self.navigate_delay.is_zero() {
                tokio::time::sleep(self.navigate_delay).await;
            }
            if self.fetch_failures > 0 {
                self.fetch_failures -= 1;
                return Err(HarvestError::fetch(url, "connection reset"));
            }
            self.probe.fetched.lock().unwrap().push(url.to_string());
            self.current = Some(url.to_string());
            Ok(())
        }
    }

    fn html(&mut self) -> impl Future<Output = Result<String>> {
        let html = self
            .current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .cloned()
            .unwrap_or_else(|| EMPTY_PAGE.to_string());
        std::future::ready(Ok(html))
    }

    fn click(&mut self, selector: &str) -> impl Future<Output = Result<()>> {
        let result = if selector == ACCOUNT_LINK {
            self.probe.login_attempts.fetch_add(1, Ordering::SeqCst);
            if self.login_failures > 0 {
                self.login_failures -= 1;
                Err(HarvestError::StructureMismatch(selector.to_string()))
            } else {
                Ok(())
            }
        } else {
            Ok(())
        };
        std::future::ready(result)
    }

    fn fill(&mut self, selector: &str, text: &str) -> impl Future<Output = Result<()>> {
        self.probe
            .filled
            .lock()
            .unwrap()
            .push((selector.to_string(), text.to_string()));
        std::future::ready(Ok(()))
    }

    fn close(self) -> impl Future<Output = Result<()>> {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_close {
            Err(HarvestError::Browser("already gone".to_string()))
        } else {
            Ok(())
        };
        std::future::ready(result)
    }
}

/// Scorer that rates by text length and fails on texts containing "FAIL"
#[derive(Default)]
pub struct FakeScorer {
    pub calls: AtomicU32,
    delay: Duration,
}

impl FakeScorer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicU32::new(0),
            delay,
        }
    }
}

impl Scorer for FakeScorer {
    fn score(&self, text: &str) -> impl Future<Output = Result<Score>> {
        let text = text.to_string();
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if text.contains("FAIL") {
                return Err(HarvestError::Scoring("model raised".to_string()));
            }
            Ok(Score {
                prediction: (text.len() % 5) as f64 + 1.0,
                flags: serde_json::Value::Null,
            })
        }
    }
}

/// Review listing fixture with `n` reviews, each rated `stars`
pub fn review_listing(prefix: &str, stars: u8, n: usize) -> String {
    let mut html = String::from("<html><body><div id=\"cm_cr-review_list\">");
    for i in 0..n {
        html.push_str(&format!(
            r#"<div data-hook="review" class="a-section review">
                 <div class="a-row">
                   <i data-hook="review-star-rating" class="a-icon a-icon-star"><span class="a-icon-alt">{stars}.0 out of 5 stars</span></i>
                 </div>
                 <div class="a-row review-data">
                   <span data-hook="review-body" class="review-text"> {prefix} review {i} </span>
                 </div>
               </div>"#
        ));
    }
    html.push_str("</div></body></html>");
    html
}
