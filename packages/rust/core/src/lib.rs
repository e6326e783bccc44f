//! Ingestion pipeline for bulkingest.
//!
//! Raw inputs flow through [`validate`], are grouped by [`chunk`], collapsed
//! by [`dedup`] and committed by a [`writer::BatchWriter`]. [`pipeline`]
//! wires these to the file sources.

pub mod chunk;
pub mod dedup;
pub mod pipeline;
pub mod validate;
pub mod writer;

pub use chunk::{Chunks, TryChunks, chunk, try_chunk};
pub use dedup::deduplicate;
pub use pipeline::{
    ImportOutcome, ProgressReporter, SilentProgress, import_documents, import_edges, import_raw,
    import_texts,
};
pub use validate::{validate_doc, validate_edge};
pub use writer::{BatchCommit, BatchWriter};
