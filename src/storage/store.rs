//! Shared, lock-guarded store for scored reviews.
//!
//! All writers funnel through one async mutex that is held for a whole
//! `record` call, scoring included, so at most one review is being scored or
//! written at any time.

use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::EmptyReviewPolicy;
use crate::error::{HarvestError, Result};
use crate::scoring::{sanitize, Scorer};
use crate::scraper::ReviewSink;
use crate::types::{PersistedRow, ReviewRecord};

use super::schema::{ensure_product_table, product_tables, quote_identifier};

/// What happened to a single review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Persisted,
    SkippedEmpty,
    SkippedScoring,
}

/// Counts for a `record_batch` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub persisted: usize,
    pub skipped_empty: usize,
    pub skipped_scoring: usize,
    /// Reviews never looked at because a blank review ended the batch
    pub abandoned: usize,
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// The connection plus what is needed to reopen it
struct WriteHandle {
    location: Location,
    conn: Option<Connection>,
    known_tables: HashSet<String>,
}

impl WriteHandle {
    fn open(location: &Location) -> rusqlite::Result<Connection> {
        match location {
            Location::File(path) => Connection::open(path),
            Location::Memory => Connection::open_in_memory(),
        }
    }

    /// Current connection, reopening the file if the last one was dropped.
    ///
    /// An in-memory database dies with its connection, so it is never reopened.
    fn writer(&mut self) -> Result<&Connection> {
        if self.conn.is_none() {
            let conn = match &self.location {
                Location::File(path) => Connection::open(path)
                    .map_err(|e| HarvestError::StaleWriteHandle(e.to_string()))?,
                Location::Memory => {
                    return Err(HarvestError::StaleWriteHandle(
                        "in-memory database was dropped".to_string(),
                    ))
                }
            };
            self.conn = Some(conn);
        }
        self.conn
            .as_ref()
            .ok_or_else(|| HarvestError::StaleWriteHandle("connection unavailable".to_string()))
    }

    fn invalidate(&mut self) {
        self.conn = None;
        self.known_tables.clear();
    }

    fn ensure_table(&mut self, product_id: &str) -> Result<()> {
        if self.known_tables.contains(product_id) {
            return Ok(());
        }
        ensure_product_table(self.writer()?, product_id)?;
        self.known_tables.insert(product_id.to_string());
        Ok(())
    }

    fn insert(&mut self, product_id: &str, text: &str, rating: u8, prediction: f64) -> Result<()> {
        self.writer()?.execute(
            &format!(
                "INSERT INTO {} (text, actual, prediction) VALUES (?1, ?2, ?3)",
                quote_identifier(product_id)
            ),
            params![text, rating, prediction],
        )?;
        Ok(())
    }

    /// Run a write, reacquiring the connection and retrying exactly once on failure
    fn with_reacquire<T>(
        &mut self,
        product_id: &str,
        mut op: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<T> {
        match op(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("Write to {} failed ({}); reacquiring handle", product_id, e);
                self.invalidate();
                op(self).map_err(|e| match e {
                    HarvestError::StaleWriteHandle(_) => e,
                    other => HarvestError::StaleWriteHandle(other.to_string()),
                })
            }
        }
    }
}

/// Review store shared by every category scraper of a run
pub struct SharedStore<Sc> {
    handle: Mutex<WriteHandle>,
    scorer: Sc,
    policy: EmptyReviewPolicy,
}

impl<Sc: Scorer> SharedStore<Sc> {
    /// Open (or create) a store at `db_path`
    pub fn open(db_path: &Path, scorer: Sc, policy: EmptyReviewPolicy) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| HarvestError::StaleWriteHandle(format!("{}: {}", parent.display(), e)))?;
            }
        }
        Self::with_location(Location::File(db_path.to_path_buf()), scorer, policy)
    }

    /// In-memory store; its handle cannot be reacquired once dropped
    pub fn in_memory(scorer: Sc, policy: EmptyReviewPolicy) -> Result<Self> {
        Self::with_location(Location::Memory, scorer, policy)
    }

    fn with_location(location: Location, scorer: Sc, policy: EmptyReviewPolicy) -> Result<Self> {
        let conn = WriteHandle::open(&location)?;
        Ok(Self {
            handle: Mutex::new(WriteHandle {
                location,
                conn: Some(conn),
                known_tables: HashSet::new(),
            }),
            scorer,
            policy,
        })
    }

    pub fn scorer(&self) -> &Sc {
        &self.scorer
    }

    /// Score and persist one review.
    ///
    /// Blank reviews and reviews the scorer rejects are skipped, not errors.
    /// Only a write handle that cannot be reacquired is an error.
    pub async fn record(&self, product_id: &str, text: &str, rating: u8) -> Result<RecordOutcome> {
        let mut handle = self.handle.lock().await;
        self.record_locked(&mut handle, product_id, text, rating).await
    }

    /// Score and persist a batch of reviews for one product, in order.
    ///
    /// Under [`EmptyReviewPolicy::AbortBatch`] a blank review ends the batch
    /// and the reviews after it are not processed.
    pub async fn record_batch(&self, product_id: &str, reviews: &[ReviewRecord]) -> Result<BatchSummary> {
        let mut handle = self.handle.lock().await;
        let mut summary = BatchSummary::default();

        for (i, review) in reviews.iter().enumerate() {
            match self
                .record_locked(&mut handle, product_id, &review.text, review.rating)
                .await?
            {
                RecordOutcome::Persisted => summary.persisted += 1,
                RecordOutcome::SkippedScoring => summary.skipped_scoring += 1,
                RecordOutcome::SkippedEmpty => {
                    summary.skipped_empty += 1;
                    if self.policy == EmptyReviewPolicy::AbortBatch {
                        summary.abandoned = reviews.len() - i - 1;
                        if summary.abandoned > 0 {
                            warn!(
                                "{}: blank review ended batch, {} reviews not processed",
                                product_id, summary.abandoned
                            );
                        }
                        break;
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn record_locked(
        &self,
        handle: &mut WriteHandle,
        product_id: &str,
        text: &str,
        rating: u8,
    ) -> Result<RecordOutcome> {
        if text.trim().is_empty() {
            debug!("{}: skipping blank review", product_id);
            return Ok(RecordOutcome::SkippedEmpty);
        }

        handle.with_reacquire(product_id, |h| h.ensure_table(product_id))?;

        let score = match self.scorer.score(&sanitize(text)).await {
            Ok(score) => score,
            Err(e) => {
                warn!("{}: {}; review dropped", product_id, e);
                return Ok(RecordOutcome::SkippedScoring);
            }
        };

        handle.with_reacquire(product_id, |h| {
            h.ensure_table(product_id)?;
            h.insert(product_id, text, rating, score.prediction)
        })?;
        Ok(RecordOutcome::Persisted)
    }

    /// Rows stored for a product, in insertion order
    pub async fn rows(&self, product_id: &str) -> Result<Vec<PersistedRow>> {
        let mut handle = self.handle.lock().await;
        let conn = handle.writer()?;
        if !product_tables(conn)?.iter().any(|t| t == product_id) {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT text, actual, prediction FROM {} ORDER BY rowid",
            quote_identifier(product_id)
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PersistedRow {
                    text: row.get(0)?,
                    actual_rating: row.get(1)?,
                    predicted_score: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of rows stored for a product (0 if it has no table)
    pub async fn row_count(&self, product_id: &str) -> Result<usize> {
        Ok(self.rows(product_id).await?.len())
    }

    /// Products that have a table
    pub async fn tables(&self) -> Result<Vec<String>> {
        let mut handle = self.handle.lock().await;
        Ok(product_tables(handle.writer()?)?)
    }

    /// Drop the current connection so the next write has to reacquire it
    pub async fn invalidate_handle(&self) {
        self.handle.lock().await.invalidate();
    }
}

impl<Sc: Scorer> ReviewSink for SharedStore<Sc> {
    fn accept(&self, record: ReviewRecord) -> impl Future<Output = ()> {
        async move {
            match self.record(&record.product_id, &record.text, record.rating).await {
                Ok(outcome) => debug!("{}: {:?}", record.product_id, outcome),
                Err(e) => warn!("{}: review not stored: {}", record.product_id, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::FakeScorer;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    fn store(policy: EmptyReviewPolicy) -> SharedStore<FakeScorer> {
        SharedStore::in_memory(FakeScorer::default(), policy).unwrap()
    }

    fn review(text: &str, rating: u8) -> ReviewRecord {
        ReviewRecord {
            text: text.to_string(),
            rating,
            product_id: "B000TEST01".to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_persists_scored_row() {
        let store = store(EmptyReviewPolicy::AbortBatch);

        let outcome = store.record("B000TEST01", "Solid build", 4).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Persisted);

        let rows = store.rows("B000TEST01").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "Solid build");
        assert_eq!(rows[0].actual_rating, 4);
        assert_eq!(rows[0].predicted_score, ("Solid build".len() % 5) as f64 + 1.0);
    }

    #[tokio::test]
    async fn test_blank_review_never_persisted() {
        let store = store(EmptyReviewPolicy::AbortBatch);

        let outcome = store.record("B000TEST01", "   \n ", 5).await.unwrap();
        assert_eq!(outcome, RecordOutcome::SkippedEmpty);
        assert_eq!(store.row_count("B000TEST01").await.unwrap(), 0);
        assert!(store.tables().await.unwrap().is_empty());
        assert_eq!(store.scorer().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scoring_failure_skips_only_that_review() {
        let store = store(EmptyReviewPolicy::AbortBatch);
        let batch = vec![review("ok one", 5), review("FAIL me", 1), review("ok two", 3)];

        let summary = store.record_batch("B000TEST01", &batch).await.unwrap();

        assert_eq!(summary.persisted, 2);
        assert_eq!(summary.skipped_scoring, 1);
        let texts: Vec<_> = store
            .rows("B000TEST01")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["ok one", "ok two"]);
    }

    #[tokio::test]
    async fn test_blank_review_aborts_rest_of_batch() {
        let store = store(EmptyReviewPolicy::AbortBatch);
        let batch = vec![review("first", 5), review("   ", 5), review("never", 4), review("seen", 2)];

        let summary = store.record_batch("B000TEST01", &batch).await.unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                persisted: 1,
                skipped_empty: 1,
                skipped_scoring: 0,
                abandoned: 2,
            }
        );
        assert_eq!(store.row_count("B000TEST01").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_skip_record_policy_continues_batch() {
        let store = store(EmptyReviewPolicy::SkipRecord);
        let batch = vec![review("first", 5), review("   ", 5), review("second", 4)];

        let summary = store.record_batch("B000TEST01", &batch).await.unwrap();

        assert_eq!(summary.persisted, 2);
        assert_eq!(summary.skipped_empty, 1);
        assert_eq!(summary.abandoned, 0);
    }

    #[tokio::test]
    async fn test_sanitized_text_scored_raw_text_stored() {
        let store = store(EmptyReviewPolicy::AbortBatch);
        let raw = "The media could not be loaded.\n  Great  ";

        store.record("B000TEST01", raw, 5).await.unwrap();

        let rows = store.rows("B000TEST01").await.unwrap();
        assert_eq!(rows[0].text, raw);
        // "Great" has length 5
        assert_eq!(rows[0].predicted_score, 1.0);
    }

    #[tokio::test]
    async fn test_concurrent_writers_lose_nothing() {
        let store = Arc::new(
            SharedStore::in_memory(
                FakeScorer::with_delay(Duration::from_millis(1)),
                EmptyReviewPolicy::AbortBatch,
            )
            .unwrap(),
        );

        let writers = (1..=5u8).map(|stars| {
            let store = store.clone();
            async move {
                for i in 0..10 {
                    for product in ["B0PRODUCTA", "B0PRODUCTB"] {
                        let text = format!("{} star review {}", stars, i);
                        store.record(product, &text, stars).await.unwrap();
                    }
                }
            }
        });
        futures::future::join_all(writers).await;

        assert_eq!(store.row_count("B0PRODUCTA").await.unwrap(), 50);
        assert_eq!(store.row_count("B0PRODUCTB").await.unwrap(), 50);
        assert_eq!(store.tables().await.unwrap(), vec!["B0PRODUCTA", "B0PRODUCTB"]);
    }

    #[tokio::test]
    async fn test_invalidated_handle_is_reacquired() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reviews.db");
        let store =
            SharedStore::open(&path, FakeScorer::default(), EmptyReviewPolicy::AbortBatch).unwrap();

        store.record("B000TEST01", "before", 5).await.unwrap();
        store.invalidate_handle().await;
        store.record("B000TEST01", "after", 4).await.unwrap();

        assert_eq!(store.row_count("B000TEST01").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_handle_not_silently_replaced() {
        let store = store(EmptyReviewPolicy::AbortBatch);
        store.record("B000TEST01", "kept", 5).await.unwrap();

        store.invalidate_handle().await;

        let err = store.record("B000TEST01", "lost", 5).await.unwrap_err();
        assert!(matches!(err, HarvestError::StaleWriteHandle(_)));
        assert!(matches!(
            store.row_count("B000TEST01").await,
            Err(HarvestError::StaleWriteHandle(_))
        ));
    }

    #[tokio::test]
    async fn test_unrecoverable_handle_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("reviews.db");
        let store =
            SharedStore::open(&path, FakeScorer::default(), EmptyReviewPolicy::AbortBatch).unwrap();

        std::fs::remove_dir_all(dir.path().join("nested")).unwrap();
        store.invalidate_handle().await;

        let err = store.record("B000TEST01", "lost", 5).await.unwrap_err();
        assert!(matches!(err, HarvestError::StaleWriteHandle(_)));
    }

    #[tokio::test]
    async fn test_store_as_sink() {
        let store = store(EmptyReviewPolicy::AbortBatch);

        store.accept(review("from the pool", 2)).await;
        store.accept(review("", 2)).await;

        assert_eq!(store.row_count("B000TEST01").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rows_of_unknown_product() {
        let store = store(EmptyReviewPolicy::AbortBatch);
        assert!(store.rows("B0NOTHERE0").await.unwrap().is_empty());
    }
}
