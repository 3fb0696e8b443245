//! Core data types shared by the quota calculator, scrapers, and store.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HarvestError, Result};

/// Number of star-rating categories
pub const NUM_CATEGORIES: usize = 5;

/// Source-reported rating distribution, five percentages ordered 5★ to 1★
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingHistogram(Vec<f64>);

impl RatingHistogram {
    /// Build a histogram from percentages in 5★→1★ order.
    ///
    /// Values are taken as-is; a sum slightly off 1.0 is not renormalized.
    pub fn new(percentages: Vec<f64>) -> Result<Self> {
        if percentages.len() != NUM_CATEGORIES {
            return Err(HarvestError::InvalidHistogram(percentages.len()));
        }
        Ok(Self(percentages))
    }

    pub fn percentages(&self) -> &[f64] {
        &self.0
    }
}

/// Per-category fetch targets, ordered 1★ to 5★
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaVector(Vec<u32>);

impl QuotaVector {
    pub fn new(quotas: Vec<u32>) -> Self {
        Self(quotas)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

/// One of the five star-rating buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StarCategory(u8);

impl StarCategory {
    /// All categories in ascending order (1★ first)
    pub const ALL: [StarCategory; NUM_CATEGORIES] = [
        StarCategory(1),
        StarCategory(2),
        StarCategory(3),
        StarCategory(4),
        StarCategory(5),
    ];

    pub fn new(stars: u8) -> Option<Self> {
        (1..=5).contains(&stars).then_some(Self(stars))
    }

    pub fn stars(&self) -> u8 {
        self.0
    }

    /// Value of the listing page's `filterByStar` parameter
    pub fn filter_slug(&self) -> &'static str {
        match self.0 {
            1 => "one_star",
            2 => "two_star",
            3 => "three_star",
            4 => "four_star",
            _ => "five_star",
        }
    }
}

impl fmt::Display for StarCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}★", self.0)
    }
}

/// A review extracted from a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(rename = "reviewText")]
    pub text: String,
    #[serde(rename = "overall")]
    pub rating: u8,
    #[serde(rename = "productId")]
    pub product_id: String,
}

/// A scored review as stored in a product table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedRow {
    pub text: String,
    pub actual_rating: u8,
    pub predicted_score: f64,
}

/// Account used to authenticate every session in a pool
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
