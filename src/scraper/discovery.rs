//! Product discovery: bestseller IDs and per-product rating histograms.

use tracing::debug;

use crate::error::Result;
use crate::types::RatingHistogram;

use super::parsers::{BestsellerParser, HistogramParser};
use super::session::Session;
use super::{bestsellers_url, product_reviews_url};

/// Collect product IDs linked from the bestsellers page
pub async fn bestseller_ids<S: Session>(session: &mut S) -> Result<Vec<String>> {
    let html = session.fetch_page(&bestsellers_url()).await?;
    let ids = BestsellerParser::parse(&html);
    debug!("Found {} bestseller product IDs", ids.len());
    Ok(ids)
}

/// Read a product's rating histogram from its review landing page
pub async fn histogram<S: Session>(session: &mut S, product_id: &str) -> Result<RatingHistogram> {
    let html = session.fetch_page(&product_reviews_url(product_id)).await?;
    HistogramParser::parse(&html)
}
