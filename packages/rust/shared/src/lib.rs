//! Shared types, error model, and configuration for bulkingest.
//!
//! This crate is the foundation depended on by all other bulkingest crates.
//! It provides:
//! - [`IngestError`]: the unified error type
//! - Domain types ([`LogicalRecord`], [`Edge`], [`Document`], [`RawInput`])
//! - Configuration ([`AppConfig`], [`ParserConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchingConfig, DefaultsConfig, EdgeListConfig, EdgeListSection, ParserConfig,
    ParserSection, ascii_byte, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_database_path,
};
pub use error::{IngestError, Result};
pub use types::{
    AsFields, BulkWriteOutcome, Document, Edge, EdgeKey, ID_FIELD, Keyed, LogicalRecord, RawInput,
    RecordId, TEXT_FIELD, WriteMode,
};
