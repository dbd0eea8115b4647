//! feedhook binary entrypoint.
//! Loads configuration, runs every source once and persists the new cursors.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedhook::config::{self, Config, ENV_CACHE_PATH, ENV_CONFIG_PATH};
use feedhook::{
    run_once, CursorStore, DiscordWebhook, HttpFeedFetcher, JsonFileCursorStore, SourceStatus,
};

/// Relay new RSS/Atom entries to a Discord webhook
#[derive(Parser, Debug)]
#[command(name = "feedhook", version, about)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = ENV_CONFIG_PATH)]
    config: Option<PathBuf>,

    /// Cursor file remembering the last delivered entry per source
    #[arg(long, env = ENV_CACHE_PATH, default_value = config::DEFAULT_CACHE_PATH)]
    cache: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch all sources once and deliver new entries (default)
    Run,
    /// Validate the configuration and exit
    Check,
    /// Print the stored cursors
    Cursors,
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "feedhook=debug,warn"
    } else {
        "feedhook=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = match &cli.config {
        Some(p) => p.clone(),
        None => config::resolve_config_path()?,
    };
    let cfg = Config::load_from(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    tracing::info!(path = %path.display(), sources = cfg.sources.len(), "configuration loaded");
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let store = JsonFileCursorStore::new(&cli.cache);

    match cli.command.as_ref().unwrap_or(&Command::Run) {
        Command::Check => {
            let cfg = load_config(&cli)?;
            for src in &cfg.sources {
                tracing::info!(source = %src.name, feed = %src.feed, id = %src.id, "ok");
            }
            println!("configuration OK: {} source(s)", cfg.sources.len());
        }

        Command::Cursors => {
            let cursors = store
                .load()
                .await
                .with_context(|| format!("reading {}", cli.cache.display()))?;
            println!("{}", serde_json::to_string_pretty(&cursors)?);
        }

        Command::Run => {
            let cfg = load_config(&cli)?;
            let fetcher = HttpFeedFetcher::new().with_timeout(cfg.request_timeout_secs);
            let sink = DiscordWebhook::new(cfg.webhook.clone())
                .with_timeout(cfg.request_timeout_secs)
                .with_retries(cfg.max_retries);

            let report = run_once(&cfg, &fetcher, &sink, &store)
                .await
                .context("relay run failed")?;

            for src in &report.sources {
                if let SourceStatus::FetchFailed(reason) = &src.status {
                    tracing::warn!(source = %src.name, reason = %reason, "source skipped");
                }
            }
            tracing::info!(
                delivered = report.delivered(),
                failed = report.failed_deliveries(),
                committed = report.committed,
                "done"
            );
        }
    }

    Ok(())
}
