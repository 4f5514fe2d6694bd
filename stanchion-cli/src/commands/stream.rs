//! Stream command - streamed generation printed as it arrives.

use anyhow::Result;
use clap::Args;
use std::io::Write;
use tracing::{debug, info, warn};

use stanchion_store::AppConfig;

use crate::output::{JsonFormatter, StreamOutput, TextFormatter};
use crate::prompt;
use crate::services::Services;
use crate::{Cli, OutputFormat};

/// Arguments for the stream command.
#[derive(Args)]
pub struct StreamArgs {
    /// Topic to generate for.
    pub topic: String,

    /// Withhold output until this text appears.
    #[arg(long)]
    pub marker: Option<String>,
}

/// Runs the stream command.
pub async fn run(args: &StreamArgs, config: AppConfig, cli: &Cli) -> Result<()> {
    let services = Services::build(config)?;
    let content = services.feed.resolve(&args.topic).await?;
    info!(origin = %content.origin, "Content resolved");

    let prompt = prompt::streamed(&args.topic, &content);
    let print_live = cli.format == OutputFormat::Text;
    let mut collected = String::new();

    let orchestrator = &services.orchestrator;
    let summary = orchestrator
        .request_stream_with_marker(
            &prompt,
            args.marker.as_deref(),
            |chunk| {
                if chunk.is_heartbeat() {
                    debug!("Stream heartbeat");
                    return;
                }
                if print_live {
                    let mut stdout = std::io::stdout().lock();
                    let _ = stdout.write_all(chunk.as_str().as_bytes());
                    let _ = stdout.flush();
                } else {
                    collected.push_str(chunk.as_str());
                }
            },
            |err| debug!(error = %err, retryable = err.is_retryable(), "Stream abandoned"),
            orchestrator.start_deadline(),
        )
        .await?;

    if !summary.completed {
        warn!(backend = %summary.backend_id, "Stream ended before completion");
    }

    match cli.format {
        OutputFormat::Text => {
            println!();
            if !cli.quiet {
                eprintln!("{}", TextFormatter::new().stream_footer(&summary));
            }
        }
        OutputFormat::Json => {
            let output = StreamOutput::new(&args.topic, collected, &summary);
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }

    Ok(())
}
