//! Cache command - inspect or prune the result cache.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::sync::Arc;

use stanchion_store::{AppConfig, TieredCache};

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the cache command.
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands.
#[derive(Subcommand)]
pub enum CacheAction {
    /// Show entry counts per state and category.
    Stats,

    /// Remove expired and corrupt entries.
    Sweep,
}

/// Runs the cache command.
pub async fn run(args: &CacheArgs, config: AppConfig, cli: &Cli) -> Result<()> {
    // Only the cache is needed; no pools or backends.
    let cache = Arc::new(TieredCache::new(config.cache_dir(), config.cache_ttl()));

    match &args.action {
        CacheAction::Stats => {
            let stats = cache.stats().await;
            match cli.format {
                OutputFormat::Text => print!("{}", TextFormatter::new().cache_stats(&stats)),
                OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&stats)?),
            }
        }
        CacheAction::Sweep => {
            let report = cache.sweep().await;
            match cli.format {
                OutputFormat::Text => print!("{}", TextFormatter::new().sweep(&report)),
                OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&report)?),
            }
        }
    }

    Ok(())
}
