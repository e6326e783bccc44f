//! bulkingest CLI: streaming bulk import into a local store.
//!
//! Reads edge lists, CSV text records and directories of text files and
//! writes them in bounded, deduplicated batches.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
