//! Review listing parser.
//!
//! Extracts (rating, body) pairs from a star-filtered review listing page.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// A review row as found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReview {
    pub rating: u8,
    pub text: String,
}

/// Parser for review listing pages
pub struct ReviewParser;

impl ReviewParser {
    /// Parse all review rows in document order.
    ///
    /// Elements missing either a rating or a body (ads, widgets, etc.) are
    /// skipped. A page with no reviews yields an empty list.
    pub fn parse(html: &str) -> Vec<ParsedReview> {
        let document = Html::parse_document(html);
        let review_selector = Selector::parse("div[data-hook='review']").unwrap();
        let rating_selector = Selector::parse(
            "i[data-hook='review-star-rating'], i[data-hook='cmps-review-star-rating']",
        )
        .unwrap();
        let body_selector = Selector::parse("span[data-hook='review-body']").unwrap();
        let rating_re = Regex::new(r"^\s*(\d+)").unwrap();

        document
            .select(&review_selector)
            .filter_map(|review| {
                Self::parse_review(review, &rating_selector, &body_selector, &rating_re)
            })
            .collect()
    }

    fn parse_review(
        review: ElementRef<'_>,
        rating_selector: &Selector,
        body_selector: &Selector,
        rating_re: &Regex,
    ) -> Option<ParsedReview> {
        let rating_text = review
            .select(rating_selector)
            .next()?
            .text()
            .collect::<String>();
        let rating = Self::parse_rating(&rating_text, rating_re)?;

        let body = review.select(body_selector).next()?;
        let text = body.text().collect::<String>().trim().to_string();

        Some(ParsedReview { rating, text })
    }

    /// Integer part of a rating string ("4.0 out of 5 stars" -> 4)
    fn parse_rating(text: &str, rating_re: &Regex) -> Option<u8> {
        let caps = rating_re.captures(text)?;
        let rating: u8 = caps[1].parse().ok()?;
        (1..=5).contains(&rating).then_some(rating)
    }
}
