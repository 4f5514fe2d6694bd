// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! stanchion CLI - resilient topic research and generation.
//!
//! # Examples
//!
//! ```bash
//! # Resolve content for a topic (cache, live search, or category fallback)
//! stanchion search sunscreen
//!
//! # Structured generation over the resolved content
//! stanchion generate sunscreen --fields title,summary,highlights --non-empty highlights
//!
//! # Streamed generation, withholding everything before the first heading
//! stanchion stream sunscreen --marker "# "
//!
//! # Cache and credential maintenance
//! stanchion cache stats
//! stanchion cache sweep
//! stanchion pool status --format json
//! stanchion pool validate
//! ```

mod commands;
mod output;
mod prompt;
mod services;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use stanchion_fetch::OrchestratorError;
use stanchion_providers::{FeedError, SearchError};
use stanchion_store::{AppConfig, StoreError};

use commands::{cache, generate, pool, search, stream};
use output::{FailureOutput, JsonFormatter};

// ============================================================================
// CLI Definition
// ============================================================================

/// stanchion CLI - resilient topic research and generation.
#[derive(Parser)]
#[command(name = "stanchion")]
#[command(about = "Resilient topic research and LLM generation")]
#[command(long_about = r##"
stanchion fetches topic content from a rate-limited search API through a
rotating credential pool and a tiered cache, then hands it to a prioritised
list of chat models with retry, backoff and a shared deadline.

Configuration is read from ~/.config/stanchion/config.json (or --config)
and overridden by environment variables such as SEARCH_API_KEY_1..N,
LLM_MODELS and LLM_API_KEY.

Examples:
  stanchion search sunscreen               # Resolve topic content
  stanchion generate sunscreen             # Structured JSON generation
  stanchion stream sunscreen --marker "# " # Streamed generation
  stanchion cache stats                    # Cache contents
  stanchion pool status                    # Credential health
"##)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Path to a JSON config file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode (no logging, no error text).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve content for a topic.
    #[command(visible_alias = "s")]
    Search(search::SearchArgs),

    /// Generate a structured JSON result for a topic.
    #[command(visible_alias = "g")]
    Generate(generate::GenerateArgs),

    /// Stream generated text for a topic.
    Stream(stream::StreamArgs),

    /// Inspect or prune the result cache.
    Cache(cache::CacheArgs),

    /// Inspect or probe the credential pools.
    Pool(pool::PoolArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Required configuration is missing or invalid.
    MissingConfig = 2,
    /// Backends, credentials or the deadline ran out.
    Exhausted = 4,
}

impl ExitCode {
    /// Classifies a command failure.
    pub fn for_error(err: &anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<OrchestratorError>() {
            return match e {
                OrchestratorError::NoBackends => Self::MissingConfig,
                OrchestratorError::DeadlineExhausted(_) | OrchestratorError::BackendsExhausted(_) => {
                    Self::Exhausted
                }
            };
        }
        if let Some(e) = err.downcast_ref::<FeedError>() {
            return match e.search_error() {
                SearchError::NoCredentials(_) => Self::MissingConfig,
                SearchError::Auth(_) | SearchError::Timeout => Self::Exhausted,
                _ => Self::Error,
            };
        }
        if let Some(StoreError::Config(_)) = err.downcast_ref::<StoreError>() {
            return Self::MissingConfig;
        }
        Self::Error
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let default = if verbose {
        "stanchion=debug,info"
    } else {
        "stanchion=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = run(&cli).await;

    if let Err(e) = result {
        let code = ExitCode::for_error(&e);
        report_failure(&e, &cli);
        std::process::exit(code as i32);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Search(args) => search::run(args, config, cli).await,
        Commands::Generate(args) => generate::run(args, config, cli).await,
        Commands::Stream(args) => stream::run(args, config, cli).await,
        Commands::Cache(args) => cache::run(args, config, cli).await,
        Commands::Pool(args) => pool::run(args, config, cli).await,
    }
}

fn report_failure(err: &anyhow::Error, cli: &Cli) {
    if cli.format == OutputFormat::Json {
        let failure = FailureOutput::from_error(err);
        match JsonFormatter::new(cli.pretty).format(&failure) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error: {err:#}"),
        }
        return;
    }

    if cli.quiet {
        return;
    }

    eprintln!("Error: {err:#}");
    if let Some(e) = err.downcast_ref::<OrchestratorError>() {
        if e.is_retryable() {
            eprintln!("This request can be retried.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stanchion_fetch::ExhaustionReport;
    use std::time::Duration;

    fn report() -> ExhaustionReport {
        ExhaustionReport {
            attempts_per_backend: vec![("model-a".to_string(), 2)],
            attempts: Vec::new(),
            last_error: Some("HTTP 503".to_string()),
            elapsed: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_exit_codes() {
        let exhausted = anyhow::Error::new(OrchestratorError::BackendsExhausted(report()));
        assert_eq!(ExitCode::for_error(&exhausted), ExitCode::Exhausted);

        let deadline = anyhow::Error::new(OrchestratorError::DeadlineExhausted(report()));
        assert_eq!(ExitCode::for_error(&deadline), ExitCode::Exhausted);

        let no_backends = anyhow::Error::new(OrchestratorError::NoBackends);
        assert_eq!(ExitCode::for_error(&no_backends), ExitCode::MissingConfig);

        let no_keys = anyhow::Error::new(FeedError::Unavailable {
            topic: "coffee".to_string(),
            source: SearchError::NoCredentials("search".to_string()),
        });
        assert_eq!(ExitCode::for_error(&no_keys), ExitCode::MissingConfig);

        let config = anyhow::Error::new(StoreError::Config("bad".to_string()));
        assert_eq!(ExitCode::for_error(&config), ExitCode::MissingConfig);

        let other = anyhow::anyhow!("boom");
        assert_eq!(ExitCode::for_error(&other), ExitCode::Error);
    }

    #[test]
    fn test_exit_code_survives_context() {
        let err = anyhow::Error::new(OrchestratorError::NoBackends).context("generate failed");
        assert_eq!(ExitCode::for_error(&err), ExitCode::MissingConfig);
    }

    #[test]
    fn test_cli_parses_generate_fields() {
        let cli = Cli::try_parse_from([
            "stanchion",
            "generate",
            "sunscreen",
            "--fields",
            "title,highlights",
            "--non-empty",
            "highlights",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.topic, "sunscreen");
        assert_eq!(args.fields, ["title", "highlights"]);
        assert_eq!(args.non_empty, ["highlights"]);
    }
}
