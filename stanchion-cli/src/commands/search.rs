//! Search command - resolve content for a topic.

use anyhow::Result;
use clap::Args;

use stanchion_store::AppConfig;

use crate::output::{JsonFormatter, TextFormatter};
use crate::services::Services;
use crate::{Cli, OutputFormat};

/// Arguments for the search command.
#[derive(Args)]
pub struct SearchArgs {
    /// Topic to search for.
    pub topic: String,

    /// Print the normalised records instead of the text payload.
    #[arg(long)]
    pub records: bool,
}

/// Runs the search command.
pub async fn run(args: &SearchArgs, config: AppConfig, cli: &Cli) -> Result<()> {
    let services = Services::build(config)?;
    let result = services.feed.resolve(&args.topic).await?;

    match cli.format {
        OutputFormat::Text if args.records => {
            for record in &result.entry.structured_records {
                println!(
                    "{:<24} {:>8} likes  {}",
                    record.id,
                    record.likes,
                    if record.title.is_empty() { "(untitled)" } else { &record.title }
                );
            }
        }
        OutputFormat::Text => {
            print!("{}", TextFormatter::new().feed(&args.topic, &result));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&result)?);
        }
    }

    Ok(())
}
