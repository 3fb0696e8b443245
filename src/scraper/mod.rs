//! Review scraper for amazon.com
//!
//! Provides browser sessions, the per-category session pool, and HTML parsers
//! for review listings, rating histograms, and bestseller pages.

pub mod browser;
pub mod category;
pub mod discovery;
pub mod parsers;
pub mod pool;
pub mod session;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::ChromeSession;
pub use category::CategoryScraper;
pub use pool::{ScrapeReport, SessionPool};
pub use session::Session;
pub use sink::ReviewSink;

use crate::types::StarCategory;

/// Base URL for amazon.com
pub const BASE_URL: &str = "https://www.amazon.com";

/// Build home page URL, where the login sequence starts
pub fn home_url() -> String {
    BASE_URL.to_string()
}

/// Build bestsellers listing URL
pub fn bestsellers_url() -> String {
    format!("{}/gp/bestsellers/", BASE_URL)
}

/// Build product reviews landing URL (carries the rating histogram)
pub fn product_reviews_url(product_id: &str) -> String {
    format!("{}/product-reviews/{}", BASE_URL, product_id)
}

/// Build a star-filtered, paginated review listing URL
pub fn review_page_url(product_id: &str, category: StarCategory, page: u32) -> String {
    format!(
        "{}/product-reviews/{}/?ie=UTF8&reviewerType=all_reviews&pageNumber={}&filterByStar={}",
        BASE_URL,
        product_id,
        page,
        category.filter_slug()
    )
}
