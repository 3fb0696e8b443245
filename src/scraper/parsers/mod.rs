//! HTML parsers for amazon.com review data.

pub mod bestsellers;
pub mod histogram;
pub mod review;

pub use bestsellers::BestsellerParser;
pub use histogram::HistogramParser;
pub use review::{ParsedReview, ReviewParser};
