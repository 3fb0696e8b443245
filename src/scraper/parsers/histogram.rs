//! Rating histogram parser for product review pages.

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::Result;
use crate::types::RatingHistogram;

/// Parser for the "customer reviews" rating breakdown
pub struct HistogramParser;

impl HistogramParser {
    /// Parse the 5★→1★ percentages from a product review page.
    ///
    /// Fails with `InvalidHistogram` unless exactly five percentages are found.
    pub fn parse(html: &str) -> Result<RatingHistogram> {
        let document = Html::parse_document(html);
        let percent_re = Regex::new(r"(\d{1,3})\s*%").unwrap();

        let mut percentages = Vec::new();
        for selector_str in ["#histogramTable", ".histogram", "[data-hook='histogram']"] {
            let selector = Selector::parse(selector_str).unwrap();
            if let Some(table) = document.select(&selector).next() {
                let text = table.text().collect::<Vec<_>>().join(" ");
                percentages = percent_re
                    .captures_iter(&text)
                    .filter_map(|caps| caps[1].parse::<f64>().ok())
                    .map(|p| p / 100.0)
                    .collect();
                break;
            }
        }

        RatingHistogram::new(percentages)
    }
}
