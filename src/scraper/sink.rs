//! Consumers of extracted reviews.

use std::future::Future;
use tokio::sync::mpsc;
use tracing::warn;

use crate::types::ReviewRecord;

/// Receives every review a category scraper extracts.
///
/// Called concurrently from all categories of a pool; implementations do
/// their own synchronization.
pub trait ReviewSink {
    fn accept(&self, record: ReviewRecord) -> impl Future<Output = ()>;
}

/// Plain callbacks
impl<F> ReviewSink for F
where
    F: Fn(ReviewRecord),
{
    fn accept(&self, record: ReviewRecord) -> impl Future<Output = ()> {
        self(record);
        std::future::ready(())
    }
}

/// Bounded channel feeding a single consumer task
impl ReviewSink for mpsc::Sender<ReviewRecord> {
    fn accept(&self, record: ReviewRecord) -> impl Future<Output = ()> {
        async move {
            if self.send(record).await.is_err() {
                warn!("review consumer dropped; discarding record");
            }
        }
    }
}
