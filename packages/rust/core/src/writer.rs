//! Batched, bounded writes into a bulk-capable store.

use std::num::NonZeroUsize;
use std::time::Instant;

use tracing::{debug, warn};

use bulkingest_shared::{BulkWriteOutcome, IngestError, Result, WriteMode};
use bulkingest_storage::BulkIngestible;

use crate::chunk::chunk;
use crate::dedup::deduplicate;
use crate::pipeline::{ImportOutcome, ProgressReporter, SilentProgress};

/// What a single committed batch amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCommit {
    /// Items handed to the store after deduplication.
    pub admitted: usize,
    pub outcome: BulkWriteOutcome,
}

/// Writes entities to `S` in batches no larger than the store accepts.
pub struct BatchWriter<S> {
    store: S,
    batch_size: NonZeroUsize,
}

impl<S: BulkIngestible> BatchWriter<S> {
    /// A writer using the store's largest batch size.
    pub fn new(store: S) -> Self {
        Self {
            store,
            batch_size: max_batch_size::<S>(),
        }
    }

    /// Use smaller batches. Sizes above the store's maximum are clamped.
    pub fn with_batch_size(mut self, size: usize) -> Result<Self> {
        let Some(requested) = NonZeroUsize::new(size) else {
            return Err(IngestError::validation("batch size must be at least 1"));
        };
        let max = max_batch_size::<S>();
        if requested > max {
            warn!(requested = size, max = max.get(), "batch size above store maximum, clamping");
        }
        self.batch_size = requested.min(max);
        Ok(self)
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Commit one batch. Upserts are deduplicated first so the store never
    /// sees two writes to one key in the same call; inserts go through
    /// untouched and the store rejects repeats.
    ///
    /// A batch longer than [`Self::batch_size`] is a validation error and
    /// nothing is written.
    pub async fn commit(&self, batch: Vec<S::Entity>, mode: WriteMode) -> Result<BatchCommit> {
        if batch.len() > self.batch_size.get() {
            return Err(IngestError::validation(format!(
                "batch of {} items exceeds batch size {}",
                batch.len(),
                self.batch_size
            )));
        }
        let batch = match mode {
            WriteMode::Upsert => deduplicate(batch),
            WriteMode::Insert => batch,
        };
        let outcome = self.store.bulk_write(&batch, mode).await?;
        Ok(BatchCommit {
            admitted: batch.len(),
            outcome,
        })
    }

    /// Chunk and commit an infallible stream of entities.
    pub async fn write_all<I>(&self, entities: I, mode: WriteMode) -> Result<ImportOutcome>
    where
        I: IntoIterator<Item = S::Entity>,
    {
        let batches = chunk(entities, self.batch_size).map(Ok);
        self.write_batches(batches, mode, &SilentProgress).await
    }

    /// Commit pre-formed batches in order. Batches longer than
    /// [`Self::batch_size`] are split before they reach the store.
    ///
    /// Stops at the first `Err`, whether it came from the batch stream or
    /// from the store, and reports it as [`IngestError::Aborted`] carrying
    /// the number of items committed before it.
    pub async fn write_batches<B>(
        &self,
        batches: B,
        mode: WriteMode,
        progress: &dyn ProgressReporter,
    ) -> Result<ImportOutcome>
    where
        B: IntoIterator<Item = Result<Vec<S::Entity>>>,
    {
        let start = Instant::now();
        let mut outcome = ImportOutcome::default();

        for batch in batches {
            let batch = batch.map_err(|e| IngestError::aborted(outcome.committed, e))?;
            if batch.len() > self.batch_size.get() {
                debug!(len = batch.len(), "splitting oversized batch");
            }
            for part in chunk(batch, self.batch_size) {
                let commit = self
                    .commit(part, mode)
                    .await
                    .map_err(|e| IngestError::aborted(outcome.committed, e))?;
                outcome.record(&commit);
                debug!(
                    batch = outcome.batches,
                    admitted = commit.admitted,
                    committed = commit.outcome.committed(),
                    "batch committed"
                );
                progress.batch_committed(outcome.batches, &commit, outcome.committed);
            }
        }

        outcome.elapsed = start.elapsed();
        Ok(outcome)
    }
}

fn max_batch_size<S: BulkIngestible>() -> NonZeroUsize {
    NonZeroUsize::new(S::MAX_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryStore, SmallStore};
    use bulkingest_shared::Edge;

    fn edges(n: i64) -> Vec<Edge> {
        (0..n).map(|i| Edge::new(i, i + 1)).collect()
    }

    #[tokio::test]
    async fn batches_never_exceed_store_maximum() {
        let writer = BatchWriter::new(MemoryStore::<Edge>::default());
        let outcome = writer.write_all(edges(2500), WriteMode::Upsert).await.unwrap();

        assert_eq!(writer.store().calls(), vec![1000, 1000, 500]);
        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.committed, 2500);
        assert_eq!(outcome.created, 2500);
    }

    #[tokio::test]
    async fn requested_size_is_clamped_to_maximum() {
        let writer = BatchWriter::new(SmallStore::default())
            .with_batch_size(50)
            .unwrap();
        assert_eq!(writer.batch_size().get(), SmallStore::MAX_BATCH_SIZE);

        writer.write_all(edges(7), WriteMode::Upsert).await.unwrap();
        assert_eq!(writer.store().calls(), vec![4, 3]);
    }

    #[tokio::test]
    async fn smaller_batch_size_is_honoured() {
        let writer = BatchWriter::new(MemoryStore::<Edge>::default())
            .with_batch_size(2)
            .unwrap();
        writer.write_all(edges(5), WriteMode::Upsert).await.unwrap();
        assert_eq!(writer.store().calls(), vec![2, 2, 1]);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result = BatchWriter::new(MemoryStore::<Edge>::default()).with_batch_size(0);
        assert!(matches!(result, Err(IngestError::Validation { .. })));
    }

    #[tokio::test]
    async fn upsert_dedups_within_batch_last_wins() {
        let writer = BatchWriter::new(MemoryStore::<Edge>::default());
        let batch = vec![Edge::new(1, 2).with_weight(1.0), Edge::new(1, 2).with_weight(5.0)];

        let commit = writer.commit(batch, WriteMode::Upsert).await.unwrap();
        assert_eq!(commit.admitted, 1);
        assert_eq!(writer.store().get(&Edge::new(1, 2)).unwrap().weight, 5.0);
    }

    #[tokio::test]
    async fn insert_does_not_dedup() {
        let writer = BatchWriter::new(MemoryStore::<Edge>::default());
        let batch = vec![Edge::new(1, 2), Edge::new(1, 2).with_weight(3.0)];

        let commit = writer.commit(batch, WriteMode::Insert).await.unwrap();
        assert_eq!(commit.admitted, 2);
        assert_eq!(commit.outcome.created, 1);
        assert_eq!(commit.outcome.rejected, 1);
        assert_eq!(writer.store().get(&Edge::new(1, 2)).unwrap().weight, 1.0);
    }

    #[tokio::test]
    async fn store_failure_reports_committed_so_far() {
        let store = MemoryStore::<Edge>::default().failing_on_call(3);
        let writer = BatchWriter::new(store);

        let err = writer.write_all(edges(2500), WriteMode::Upsert).await.unwrap_err();
        assert_eq!(err.committed(), Some(2000));
        assert!(matches!(
            err,
            IngestError::Aborted { ref source, .. } if matches!(**source, IngestError::Transport(_))
        ));
        assert_eq!(writer.store().len(), 2000);
    }

    #[tokio::test]
    async fn stream_error_stops_before_partial_batch() {
        let writer = BatchWriter::new(MemoryStore::<Edge>::default());
        let batches = vec![
            Ok(edges(3)),
            Err(IngestError::parse("row 5: unequal lengths")),
            Ok(edges(3)),
        ];

        let err = writer
            .write_batches(batches, WriteMode::Upsert, &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.committed(), Some(3));
        assert_eq!(writer.store().calls(), vec![3]);
    }

    #[tokio::test]
    async fn oversized_batches_are_split() {
        let writer = BatchWriter::new(MemoryStore::<Edge>::default());
        let outcome = writer
            .write_batches(vec![Ok(edges(2500))], WriteMode::Upsert, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(writer.store().calls(), vec![1000, 1000, 500]);
        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.admitted, 2500);
    }

    #[tokio::test]
    async fn oversized_commit_is_rejected() {
        let writer = BatchWriter::new(MemoryStore::<Edge>::default())
            .with_batch_size(2)
            .unwrap();

        let err = writer.commit(edges(3), WriteMode::Upsert).await.unwrap_err();
        assert!(matches!(err, IngestError::Validation { .. }));
        assert!(writer.store().calls().is_empty());
    }

    #[tokio::test]
    async fn duplicates_across_batches_count_in_each() {
        let writer = BatchWriter::new(MemoryStore::<Edge>::default())
            .with_batch_size(2)
            .unwrap();
        let input = vec![
            Edge::new(1, 2).with_weight(1.0),
            Edge::new(3, 4),
            Edge::new(1, 2).with_weight(9.0),
        ];

        let outcome = writer.write_all(input, WriteMode::Upsert).await.unwrap();
        assert_eq!(writer.store().calls(), vec![2, 1]);
        assert_eq!(outcome.committed, 3);
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.updated, 1);
        assert_eq!(writer.store().len(), 2);
        assert_eq!(writer.store().get(&Edge::new(1, 2)).unwrap().weight, 9.0);
    }

    #[tokio::test]
    async fn reupsert_counts_updates() {
        let writer = BatchWriter::new(MemoryStore::<Edge>::default());
        writer.write_all(edges(4), WriteMode::Upsert).await.unwrap();
        let again = writer.write_all(edges(4), WriteMode::Upsert).await.unwrap();

        assert_eq!(again.created, 0);
        assert_eq!(again.updated, 4);
        assert_eq!(writer.store().len(), 4);
    }
}
