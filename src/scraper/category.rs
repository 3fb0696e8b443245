//! Paginated, quota-bounded scrape of one star category.

use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ScraperConfig;
use crate::error::Result;
use crate::retry::{retry, RetryConfig};
use crate::types::{ReviewRecord, StarCategory};

use super::parsers::ReviewParser;
use super::review_page_url;
use super::session::Session;
use super::sink::ReviewSink;

/// Walks the star-filtered listing pages of a product until its quota is met
#[derive(Debug, Clone)]
pub struct CategoryScraper {
    max_pages: u32,
    page_delay: Duration,
    fetch_retry: RetryConfig,
}

impl CategoryScraper {
    pub fn new(max_pages: u32, page_delay: Duration, fetch_retry: RetryConfig) -> Self {
        Self {
            max_pages,
            page_delay,
            fetch_retry,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(config.max_pages, config.page_delay(), config.fetch_retry.clone())
    }

    /// Scrape up to `limit` reviews of `category` for `product_id`.
    ///
    /// Records reach `sink` in page order, then document order. Returns the
    /// number emitted. Stops as soon as `limit` is reached (even mid-page) or
    /// after `max_pages` pages; pages with no reviews don't stop the loop. A
    /// fetch that still fails after retries aborts the remaining pages.
    pub async fn run<S, K>(
        &self,
        slot: &Mutex<S>,
        product_id: &str,
        category: StarCategory,
        limit: u32,
        sink: &K,
    ) -> Result<usize>
    where
        S: Session,
        K: ReviewSink + ?Sized,
    {
        let limit = limit as usize;
        let mut emitted = 0;

        for page in 1..=self.max_pages {
            if emitted >= limit {
                break;
            }

            let url = review_page_url(product_id, category, page);
            let url_ref = url.as_str();
            let html = retry(&self.fetch_retry, "review page fetch", move || async move {
                let mut session = slot.lock().await;
                let html = session.fetch_page(url_ref).await;
                html
            })
            .await?;

            let reviews = ReviewParser::parse(&html);
            debug!(
                "{} {} page {}: {} reviews",
                product_id,
                category,
                page,
                reviews.len()
            );

            for review in reviews {
                if emitted >= limit {
                    debug!("{} {}: quota of {} reached", product_id, category, limit);
                    return Ok(emitted);
                }
                sink.accept(ReviewRecord {
                    text: review.text,
                    rating: review.rating,
                    product_id: product_id.to_string(),
                })
                .await;
                emitted += 1;
            }

            if page < self.max_pages && emitted < limit {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        Ok(emitted)
    }
}
