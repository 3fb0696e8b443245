//! SQLite storage for scored reviews
//!
//! Every scraped review is scored and written to a table named after its
//! product ID, through a single store shared by all category scrapers.

pub mod schema;
pub mod store;

pub use store::{BatchSummary, RecordOutcome, SharedStore};
