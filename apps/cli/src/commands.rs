//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use regsync_core::SyncEngine;
use regsync_shared::{AppConfig, CorpusConfig, init_config, load_config, load_config_from};
use regsync_source::EcfrClient;
use regsync_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// regsync: keep a versioned manual in step with its source corpus.
#[derive(Parser)]
#[command(
    name = "regsync",
    version,
    about = "Sync a regulatory corpus into a versioned, browsable manual.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path (defaults to ~/.regsync/regsync.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file path override.
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
    /// Show the current sync status for the configured corpus.
    Status,

    /// Check whether the source corpus has newer amendments than the last sync.
    Check,

    /// Run a full sync: fetch, parse all sections, upsert documents and
    /// the manual structure.
    Sync {
        /// Actor recorded on created records.
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "regsync=info",
        1 => "regsync=debug",
        _ => "regsync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Config { action } => run_config(action),
        Command::Status => {
            let engine = build_engine(&cli).await?;
            let state = engine.sync_status().await?;
            println!("Corpus:        title {} part {}", state.cfr_title, state.cfr_part);
            println!("Status:        {}", state.status);
            println!(
                "Last synced:   {}",
                state.last_synced_at.as_deref().unwrap_or("never")
            );
            println!(
                "Amended date:  {}",
                state.last_amended_date.as_deref().unwrap_or("-")
            );
            println!("Sections:      {}", state.section_count);
            println!(
                "Manual:        {}",
                state.manual_id.as_deref().unwrap_or("-")
            );
            if let Some(err) = &state.last_error {
                println!("Last error:    {err}");
            }
            Ok(())
        }
        Command::Check => {
            let engine = build_engine(&cli).await?;
            let check = engine.check_for_updates().await?;
            println!(
                "Source date:   {}",
                check.source_date.as_deref().unwrap_or("-")
            );
            println!(
                "Stored date:   {}",
                check.stored_date.as_deref().unwrap_or("never synced")
            );
            println!("Status:        {}", check.sync_status);
            if check.has_updates {
                println!("Updates are available; run `regsync sync` to ingest them.");
            } else {
                println!("The manual is up to date.");
            }
            Ok(())
        }
        Command::Sync { ref actor } => {
            let engine = build_engine(&cli).await?;

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message("Syncing corpus...");
            spinner.enable_steady_tick(std::time::Duration::from_millis(120));

            let result = engine.sync_now(actor).await;
            spinner.finish_and_clear();

            let report = result?;
            info!(manual_id = %report.manual_id, "sync finished");

            println!("Sync complete.");
            println!("  Manual:    {}", report.manual_id);
            println!(
                "  Sections:  {} total across {} subparts",
                report.total_sections, report.subpart_count
            );
            println!(
                "  Changes:   {} new, {} updated, {} unchanged",
                report.new_sections, report.updated_sections, report.unchanged_sections
            );
            if let Some(date) = &report.source_amended_date {
                println!("  Amended:   {date}");
            }
            Ok(())
        }
    }
}

/// Load config, open storage, and construct the sync engine.
async fn build_engine(cli: &Cli) -> Result<SyncEngine<EcfrClient>> {
    let app_config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => app_config.storage.resolved_db_path()?,
    };

    let storage = Storage::open(&db_path).await?;
    let client = EcfrClient::new(
        &app_config.corpus.base_url,
        app_config.corpus.cfr_title,
        app_config.corpus.cfr_part,
    )?;
    let corpus = CorpusConfig::from(&app_config);

    Ok(SyncEngine::new(client, storage, corpus))
}

/// Handle `config` subcommands.
fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = init_config()?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config: AppConfig = load_config()?;
            let rendered = toml::to_string_pretty(&config)?;
            print!("{rendered}");
            Ok(())
        }
    }
}
