//! CLI command definitions, routing, and tracing setup.

use std::future::Future;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::info;

use bulkingest_core::{BatchCommit, BatchWriter, ImportOutcome, ProgressReporter};
use bulkingest_shared::{
    AppConfig, EdgeListConfig, ParserConfig, WriteMode, init_config, load_config,
    resolve_database_path,
};
use bulkingest_storage::{BulkIngestible, DocFilter, EdgeFilter, StoreAdapter, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// bulkingest: stream large files into a store in bounded batches.
#[derive(Parser)]
#[command(
    name = "bulkingest",
    version,
    about = "Stream edge lists, CSV records and text directories into a store in bounded batches.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database path (defaults to `defaults.database` from the config file).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Edge collection operations.
    Edges {
        #[command(subcommand)]
        action: EdgesAction,
    },

    /// Document collection operations.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// List recorded import jobs.
    Jobs,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Edge subcommands.
#[derive(Subcommand)]
pub(crate) enum EdgesAction {
    /// Import an adjacency list (`from_id,to_id[,weight]` per line).
    Import {
        /// Edge list file.
        file: PathBuf,

        /// Write mode: insert or upsert.
        #[arg(long)]
        mode: Option<WriteMode>,

        /// Items per bulk write (capped by the store).
        #[arg(long)]
        batch_size: Option<usize>,

        /// The first line names the columns.
        #[arg(long)]
        headers: bool,

        /// Field delimiter.
        #[arg(long)]
        delimiter: Option<char>,

        /// Treat `#` lines as data instead of comments.
        #[arg(long)]
        no_comment: bool,
    },
    /// Count stored edges.
    Count,
    /// Delete every edge touching a node.
    RemoveNode {
        /// Node id.
        node: i64,
    },
}

/// Document subcommands.
#[derive(Subcommand)]
pub(crate) enum DocsAction {
    /// Import a CSV of text records or a directory of text files.
    Import {
        /// CSV file or directory.
        path: PathBuf,

        /// Write mode: insert or upsert.
        #[arg(long)]
        mode: Option<WriteMode>,

        /// Items per bulk write (capped by the store).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Column holding the record text.
        #[arg(long)]
        content_column: Option<String>,

        /// Column holding the record id; consecutive rows sharing an id merge.
        #[arg(long)]
        id_column: Option<String>,

        /// Reject CSV fields longer than this many bytes.
        #[arg(long)]
        max_field_size: Option<usize>,
    },
    /// Count stored documents.
    Count,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bulkingest=info",
        1 => "bulkingest=debug",
        _ => "bulkingest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Edges { action } => match action {
            EdgesAction::Import {
                file,
                mode,
                batch_size,
                headers,
                delimiter,
                no_comment,
            } => {
                let overrides = EdgeListOverrides {
                    headers,
                    delimiter,
                    no_comment,
                };
                cmd_edges_import(db, &file, mode, batch_size, overrides).await
            }
            EdgesAction::Count => cmd_edges_count(db).await,
            EdgesAction::RemoveNode { node } => cmd_edges_remove_node(db, node).await,
        },
        Command::Docs { action } => match action {
            DocsAction::Import {
                path,
                mode,
                batch_size,
                content_column,
                id_column,
                max_field_size,
            } => {
                let overrides = ParserOverrides {
                    content_column,
                    id_column,
                    max_field_size,
                };
                cmd_docs_import(db, &path, mode, batch_size, overrides).await
            }
            DocsAction::Count => cmd_docs_count(db).await,
        },
        Command::Jobs => cmd_jobs(db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn database_path(db: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(path),
        None => Ok(resolve_database_path(&config.defaults.database)?),
    }
}

async fn open_storage(db: Option<PathBuf>, config: &AppConfig) -> Result<Storage> {
    let path = database_path(db, config)?;
    info!(path = %path.display(), "opening database");
    Ok(Storage::open(&path).await?)
}

async fn open_storage_readonly(db: Option<PathBuf>, config: &AppConfig) -> Result<Storage> {
    let path = database_path(db, config)?;
    if !path.exists() {
        return Err(eyre!("no database at '{}'", path.display()));
    }
    Ok(Storage::open_readonly(&path).await?)
}

/// Build a writer, applying the first batch size found on the command line
/// or in the config file.
fn writer_for<S: BulkIngestible>(
    store: S,
    flag: Option<usize>,
    configured: Option<usize>,
) -> Result<BatchWriter<S>> {
    let writer = BatchWriter::new(store);
    match flag.or(configured) {
        Some(size) => Ok(writer.with_batch_size(size)?),
        None => Ok(writer),
    }
}

/// Run `import` bracketed by an import-job record.
async fn record_job<F>(
    storage: &Storage,
    kind: &str,
    source: &Path,
    mode: WriteMode,
    import: F,
) -> Result<ImportOutcome>
where
    F: Future<Output = bulkingest_shared::Result<ImportOutcome>>,
{
    let job_id = storage
        .insert_import_job(kind, &source.display().to_string(), mode)
        .await?;

    let result = import.await;
    let stats = match &result {
        Ok(outcome) => json!({
            "admitted": outcome.admitted,
            "committed": outcome.committed,
            "created": outcome.created,
            "updated": outcome.updated,
            "rejected": outcome.rejected,
            "dropped": outcome.dropped,
            "batches": outcome.batches,
            "elapsed_ms": outcome.elapsed.as_millis() as u64,
        }),
        Err(e) => json!({
            "committed": e.committed().unwrap_or(0),
            "error": e.to_string(),
        }),
    };
    storage.finish_import_job(&job_id, &stats.to_string()).await?;

    Ok(result?)
}

fn print_summary(heading: &str, outcome: &ImportOutcome) {
    println!();
    println!("  {heading}");
    println!("  Committed: {}", outcome.committed);
    println!("  Created:   {}", outcome.created);
    println!("  Updated:   {}", outcome.updated);
    println!("  Rejected:  {}", outcome.rejected);
    println!("  Dropped:   {}", outcome.dropped);
    println!("  Batches:   {}", outcome.batches);
    println!("  Time:      {:.1}s", outcome.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_edges_import(
    db: Option<PathBuf>,
    file: &Path,
    mode: Option<WriteMode>,
    batch_size: Option<usize>,
    overrides: EdgeListOverrides,
) -> Result<()> {
    let config = load_config()?;
    let mode = mode.unwrap_or(config.defaults.mode);

    let mut list = EdgeListConfig::from(&config);
    overrides.apply(&mut list);

    let storage = open_storage(db, &config).await?;
    let writer = writer_for(storage.edges(), batch_size, config.batching.edges)?;

    info!(file = %file.display(), %mode, "importing edges");

    let reporter = CliProgress::new();
    let import = bulkingest_core::import_edges(&writer, file, &list, mode, &reporter);
    let outcome = record_job(&storage, "edges", file, mode, import).await?;

    print_summary("Edges imported.", &outcome);
    Ok(())
}

/// Edge-list settings given on the command line.
struct EdgeListOverrides {
    headers: bool,
    delimiter: Option<char>,
    no_comment: bool,
}

impl EdgeListOverrides {
    fn apply(self, list: &mut EdgeListConfig) {
        list.has_headers |= self.headers;
        if let Some(delimiter) = self.delimiter {
            list.delimiter = delimiter;
        }
        if self.no_comment {
            list.comment = None;
        }
    }
}

/// Parser settings given on the command line.
struct ParserOverrides {
    content_column: Option<String>,
    id_column: Option<String>,
    max_field_size: Option<usize>,
}

impl ParserOverrides {
    fn apply(self, parser: &mut ParserConfig) {
        if let Some(column) = self.content_column {
            parser.content_column = column;
        }
        if let Some(column) = self.id_column {
            parser.id_column = Some(column);
        }
        if let Some(limit) = self.max_field_size {
            parser.max_field_size = Some(limit);
        }
    }
}

async fn cmd_docs_import(
    db: Option<PathBuf>,
    path: &Path,
    mode: Option<WriteMode>,
    batch_size: Option<usize>,
    overrides: ParserOverrides,
) -> Result<()> {
    let config = load_config()?;
    let mode = mode.unwrap_or(config.defaults.mode);

    let mut parser = ParserConfig::from(&config);
    overrides.apply(&mut parser);

    let storage = open_storage(db, &config).await?;
    let writer = writer_for(storage.docs(), batch_size, config.batching.documents)?;

    info!(path = %path.display(), %mode, "importing documents");

    let reporter = CliProgress::new();
    let import = bulkingest_core::import_texts(&writer, path, &parser, mode, &reporter);
    let outcome = record_job(&storage, "documents", path, mode, import).await?;

    print_summary("Documents imported.", &outcome);
    Ok(())
}

async fn cmd_edges_count(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(db, &config).await?;
    let edges = storage.edges();
    println!("edges: {}", edges.count(&EdgeFilter::All).await?);
    println!("nodes: {}", edges.count_nodes().await?);
    Ok(())
}

async fn cmd_edges_remove_node(db: Option<PathBuf>, node: i64) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(db, &config).await?;
    let removed = storage.edges().remove_node(node).await?;
    info!(node, removed, "node removed");
    println!("removed {removed} edges touching node {node}");
    Ok(())
}

async fn cmd_docs_count(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(db, &config).await?;
    println!("documents: {}", storage.docs().count(&DocFilter::All).await?);
    Ok(())
}

async fn cmd_jobs(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(db, &config).await?;
    let jobs = storage.list_import_jobs().await?;

    if jobs.is_empty() {
        println!("no import jobs recorded");
        return Ok(());
    }
    for job in jobs {
        println!(
            "{}  {:<9}  {:<6}  {}  {}",
            job.started_at,
            job.kind,
            job.mode,
            job.source,
            job.stats_json.as_deref().unwrap_or("(unfinished)")
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn batch_committed(&self, batch_no: usize, commit: &BatchCommit, total_committed: usize) {
        self.spinner.set_message(format!(
            "Batch {batch_no}: {} written, {total_committed} total",
            commit.outcome.committed()
        ));
    }

    fn done(&self, _outcome: &ImportOutcome) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.abandon();
        }
    }
}
