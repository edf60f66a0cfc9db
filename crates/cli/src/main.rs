//! suggestio entry point.
//!
//! Prints launcher feed JSON for `<search-id> <query>` on stdout.
//! Logging goes to stderr so it never mixes with the feed.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use suggestio_client::{FetchClient, FetchConfig, Suggester};
use suggestio_core::{AppConfig, AssembleOptions, Feed, FileCache, SearchConfig, assemble, env_resolver};

#[derive(Parser, Debug)]
#[command(name = "suggestio", version, about = "Search suggestions for launcher script filters")]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    /// Search id, the file stem of `<searches_dir>/<id>.json`
    #[arg(required = true)]
    search: Option<String>,

    /// Text typed so far
    #[arg(required = true, allow_hyphen_values = true)]
    query: Option<String>,

    /// Give up on suggestions after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Delete expired cache entries
    Clean,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = format!("{err:#}");
            tracing::error!(error = %message, "suggestio failed");
            match Feed::error(message).to_json() {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!(error = %e, "cannot serialize error feed"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load().context("loading configuration")?;

    if cli.command == Some(Command::Clean) {
        return clean(&config).await;
    }

    let (Some(search_id), Some(query)) = (cli.search, cli.query) else {
        anyhow::bail!("usage: suggestio <search-id> <query>");
    };
    let deadline = cli.timeout.map(|secs| Instant::now() + Duration::from_secs(secs));

    let feed = search(&config, &search_id, &query, deadline).await?;
    println!("{}", feed.to_json()?);

    Ok(())
}

async fn search(config: &AppConfig, search_id: &str, query: &str, deadline: Option<Instant>) -> Result<Feed> {
    let search = SearchConfig::load(&config.searches_dir, search_id).await?;
    let cache = FileCache::open(&config.cache_dir).await?;
    let fetch = FetchClient::new(FetchConfig::from_app(config))?;
    let suggester = Suggester::new(fetch, cache, config.max_age());

    tracing::info!(search = %search.title, query, "querying");
    let suggestions = suggester.suggestions(&search, query, deadline).await?;
    tracing::info!(count = suggestions.len(), query, "results");

    let options = AssembleOptions { include_query: config.show_query_in_results, emit_uids: config.sort_results };
    Ok(assemble(&search, query, &suggestions, options, env_resolver))
}

async fn clean(config: &AppConfig) -> Result<()> {
    let cache = FileCache::open(&config.cache_dir).await?;
    let removed = cache.purge_expired(config.max_age()).await?;
    tracing::info!(removed, dir = %config.cache_dir.display(), "purged expired cache entries");
    println!("removed {removed} expired cache entries");
    Ok(())
}
