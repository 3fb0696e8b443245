//! Bestseller listing parser.
//!
//! Collects product IDs from links of the form `/product-reviews/<ID>/...`.

use regex::Regex;
use scraper::{Html, Selector};

/// Parser for the bestsellers page
pub struct BestsellerParser;

impl BestsellerParser {
    /// Extract product IDs in document order, without duplicates
    pub fn parse(html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let link_selector = Selector::parse("a[href*='product-reviews']").unwrap();
        let id_re = Regex::new(r"/product-reviews/([A-Za-z0-9]+)").unwrap();

        let mut product_ids = Vec::new();
        for elem in document.select(&link_selector) {
            if let Some(href) = elem.value().attr("href") {
                if let Some(caps) = id_re.captures(href) {
                    let product_id = caps[1].to_string();
                    if !product_ids.contains(&product_id) {
                        product_ids.push(product_id);
                    }
                }
            }
        }

        product_ids
    }
}
