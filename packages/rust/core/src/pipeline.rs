//! End-to-end imports: source → validate → chunk → dedup → bulk write.

use std::path::Path;
use std::time::Duration;

use tracing::{info, instrument};

use bulkingest_shared::{
    Document, Edge, EdgeListConfig, IngestError, ParserConfig, RawInput, Result, WriteMode,
};
use bulkingest_source::{EdgeRows, TextSource};
use bulkingest_storage::BulkIngestible;

use crate::chunk::try_chunk;
use crate::validate::{validate_doc, validate_edge};
use crate::writer::{BatchCommit, BatchWriter};

/// Totals for one import run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutcome {
    /// Items handed to the store, after validation and deduplication.
    pub admitted: usize,
    /// Items the store acknowledged (`created + updated`).
    pub committed: usize,
    pub created: usize,
    pub updated: usize,
    pub rejected: usize,
    /// Inputs that failed validation.
    pub dropped: usize,
    pub batches: usize,
    pub elapsed: Duration,
}

impl ImportOutcome {
    pub(crate) fn record(&mut self, commit: &BatchCommit) {
        self.batches += 1;
        self.admitted += commit.admitted;
        self.committed += commit.outcome.committed();
        self.created += commit.outcome.created;
        self.updated += commit.outcome.updated;
        self.rejected += commit.outcome.rejected;
    }
}

/// Progress callback for reporting import status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each batch commits; `total_committed` is the running sum.
    fn batch_committed(&self, batch_no: usize, commit: &BatchCommit, total_committed: usize);
    /// Called when the import completes.
    fn done(&self, outcome: &ImportOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn batch_committed(&self, _batch_no: usize, _commit: &BatchCommit, _total_committed: usize) {}
    fn done(&self, _outcome: &ImportOutcome) {}
}

/// Import a stream of raw inputs through `validate` into the writer's store.
///
/// Inputs rejected by `validate` are counted in [`ImportOutcome::dropped`].
/// A source error ends the import; the batch it interrupted is not written.
pub async fn import_raw<S, I, V>(
    writer: &BatchWriter<S>,
    source: I,
    mut validate: V,
    mode: WriteMode,
    progress: &dyn ProgressReporter,
) -> Result<ImportOutcome>
where
    S: BulkIngestible,
    I: IntoIterator<Item = Result<RawInput>>,
    V: FnMut(RawInput) -> Option<S::Entity>,
{
    let mut dropped = 0usize;
    let validated = source.into_iter().filter_map(|item| match item {
        Ok(raw) => match validate(raw) {
            Some(entity) => Some(Ok(entity)),
            None => {
                dropped += 1;
                None
            }
        },
        Err(e) => Some(Err(e)),
    });

    let mut outcome = writer
        .write_batches(try_chunk(validated, writer.batch_size()), mode, progress)
        .await?;
    outcome.dropped = dropped;

    progress.done(&outcome);
    Ok(outcome)
}

/// Import an edge-list file.
#[instrument(skip_all, fields(path = %path.display(), %mode))]
pub async fn import_edges<S>(
    writer: &BatchWriter<S>,
    path: &Path,
    config: &EdgeListConfig,
    mode: WriteMode,
    progress: &dyn ProgressReporter,
) -> Result<ImportOutcome>
where
    S: BulkIngestible<Entity = Edge>,
{
    progress.phase("Reading edges");
    let rows = EdgeRows::open(path, config)?;

    info!(batch_size = writer.batch_size().get(), "starting edge import");
    progress.phase("Writing edges");
    let outcome = import_raw(writer, rows, validate_edge, mode, progress).await?;

    info!(
        committed = outcome.committed,
        dropped = outcome.dropped,
        rejected = outcome.rejected,
        batches = outcome.batches,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "edge import complete"
    );
    Ok(outcome)
}

/// Import a CSV of text records, or a directory of text files, as documents.
#[instrument(skip_all, fields(path = %path.display(), %mode))]
pub async fn import_texts<S>(
    writer: &BatchWriter<S>,
    path: &Path,
    config: &ParserConfig,
    mode: WriteMode,
    progress: &dyn ProgressReporter,
) -> Result<ImportOutcome>
where
    S: BulkIngestible<Entity = Document>,
{
    progress.phase("Reading records");
    let records = TextSource::open(path, config)?;
    let raw = records.map(|record| record.map(RawInput::from));

    info!(batch_size = writer.batch_size().get(), "starting document import");
    progress.phase("Writing documents");
    let outcome = import_raw(writer, raw, |input| Some(validate_doc(input)), mode, progress).await?;

    info!(
        committed = outcome.committed,
        rejected = outcome.rejected,
        batches = outcome.batches,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "document import complete"
    );
    Ok(outcome)
}

/// Import documents already in memory.
pub async fn import_documents<S, I>(
    writer: &BatchWriter<S>,
    inputs: I,
    mode: WriteMode,
    progress: &dyn ProgressReporter,
) -> Result<ImportOutcome>
where
    S: BulkIngestible<Entity = Document>,
    I: IntoIterator<Item = RawInput>,
{
    let raw = inputs.into_iter().map(Ok::<_, IngestError>);
    import_raw(writer, raw, |input| Some(validate_doc(input)), mode, progress).await
}
