//! Generate command - structured JSON generation over topic content.

use anyhow::Result;
use clap::Args;
use tracing::info;

use stanchion_fetch::ResponseSchema;
use stanchion_store::AppConfig;

use crate::output::{GenerateOutput, JsonFormatter, TextFormatter};
use crate::prompt;
use crate::services::Services;
use crate::{Cli, OutputFormat};

/// Arguments for the generate command.
#[derive(Args)]
pub struct GenerateArgs {
    /// Topic to generate for.
    pub topic: String,

    /// Required top-level fields (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "title,summary,highlights")]
    pub fields: Vec<String>,

    /// Fields that must be non-empty arrays (comma-separated).
    #[arg(long = "non-empty", value_delimiter = ',', default_value = "highlights")]
    pub non_empty: Vec<String>,
}

impl GenerateArgs {
    /// Builds the response schema from the field lists.
    pub fn schema(&self) -> ResponseSchema {
        let schema = clean(&self.fields)
            .into_iter()
            .fold(ResponseSchema::new(), ResponseSchema::require);
        clean(&self.non_empty)
            .into_iter()
            .fold(schema, ResponseSchema::require_non_empty)
    }
}

fn clean(fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

/// Runs the generate command.
pub async fn run(args: &GenerateArgs, config: AppConfig, cli: &Cli) -> Result<()> {
    let services = Services::build(config)?;
    let content = services.feed.resolve(&args.topic).await?;
    info!(origin = %content.origin, "Content resolved");

    let schema = args.schema();
    let prompt = prompt::structured(&args.topic, &content, schema.required(), schema.non_empty());

    let orchestrator = &services.orchestrator;
    let response = orchestrator
        .request_structured(&prompt, &schema, orchestrator.start_deadline())
        .await?;

    match cli.format {
        OutputFormat::Text => print!("{}", TextFormatter::new().structured(&response)),
        OutputFormat::Json => {
            let output = GenerateOutput::new(&args.topic, &content.origin.to_string(), &response);
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_from_fields() {
        let args = GenerateArgs {
            topic: "coffee".to_string(),
            fields: vec!["title".to_string(), " ".to_string(), "tips".to_string()],
            non_empty: vec!["tips".to_string(), "sources".to_string()],
        };
        let schema = args.schema();
        assert_eq!(schema.required(), ["title", "tips", "sources"]);
        assert_eq!(schema.non_empty(), ["tips", "sources"]);
    }
}
