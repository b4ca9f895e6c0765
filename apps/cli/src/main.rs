//! regsync CLI: regulatory corpus sync tool.
//!
//! Ingests a revised regulatory corpus from its provider and maintains the
//! versioned manual of individually addressable sections.

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
