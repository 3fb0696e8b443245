//! Quota calculation from a product's rating histogram.
//!
//! Turns the observed 5★→1★ distribution into integer per-category fetch
//! targets ordered 1★→5★, the order in which categories are assigned to pool
//! sessions.

use serde::Serialize;

use crate::types::{QuotaVector, RatingHistogram};

/// Default number of reviews to aim for per product
pub const DEFAULT_TOTAL: u32 = 500;

/// Default per-category ceiling
pub const DEFAULT_CEILING: u32 = 100;

/// Factor applied on each pass of the damping loop
const DAMPING_FACTOR: f64 = 0.99;

/// Output of [`compute`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Proportions {
    /// Histogram percentages, unchanged, in 5★→1★ order
    Raw(Vec<f64>),
    /// Integer quotas in 1★→5★ order
    Counts(QuotaVector),
}

impl Proportions {
    pub fn counts(&self) -> Option<&QuotaVector> {
        match self {
            Proportions::Counts(q) => Some(q),
            Proportions::Raw(_) => None,
        }
    }
}

/// Compute per-category proportions for a histogram.
///
/// With `total == None` the raw percentages are returned as-is. Otherwise
/// each percentage is scaled by `total`, damped until every value is within
/// `ceiling`, floored plus one (so no category gets zero), and reversed into
/// ascending star order.
pub fn compute(histogram: &RatingHistogram, total: Option<u32>, ceiling: u32) -> Proportions {
    match total {
        Some(total) => Proportions::Counts(quotas(histogram, total, ceiling)),
        None => Proportions::Raw(histogram.percentages().to_vec()),
    }
}

/// Integer quotas in 1★→5★ order for `total` reviews, each within `ceiling` (at least 1)
pub fn quotas(histogram: &RatingHistogram, total: u32, ceiling: u32) -> QuotaVector {
    let mut scaled: Vec<f64> = histogram
        .percentages()
        .iter()
        .map(|&p| if p.is_finite() { p.max(0.0) * total as f64 } else { 0.0 })
        .collect();

    damp(&mut scaled, ceiling as f64);

    // An exactly-at-ceiling value would floor+1 past it
    let quotas = scaled
        .iter()
        .rev()
        .map(|&x| (x.floor() as u32 + 1).min(ceiling))
        .collect();

    QuotaVector::new(quotas)
}

/// Scale every value by 0.99 until none exceeds `ceiling`.
///
/// A vector already within the ceiling is left untouched. `ceiling` must be
/// positive; configuration and CLI input reject anything below 1.
pub fn damp(values: &mut [f64], ceiling: f64) {
    while values.iter().any(|&v| v > ceiling) {
        for v in values.iter_mut() {
            *v *= DAMPING_FACTOR;
        }
    }
}
