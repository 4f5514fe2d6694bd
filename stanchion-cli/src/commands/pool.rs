//! Pool command - inspect or probe the credential pools.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::sync::Arc;

use stanchion_fetch::CredentialPool;
use stanchion_store::AppConfig;

use crate::output::{JsonFormatter, PoolOutput, TextFormatter, ValidationOutput};
use crate::services::Services;
use crate::{Cli, OutputFormat};

/// Arguments for the pool command.
#[derive(Args)]
pub struct PoolArgs {
    #[command(subcommand)]
    pub action: PoolAction,
}

/// Pool subcommands.
#[derive(Subcommand)]
pub enum PoolAction {
    /// Show credential health (secrets are masked).
    Status,

    /// Probe every credential against the search API.
    Validate,
}

/// Runs the pool command.
pub async fn run(args: &PoolArgs, config: AppConfig, cli: &Cli) -> Result<()> {
    let services = Services::build(config)?;

    let mut pools: Vec<&Arc<CredentialPool>> = vec![&services.search_pool];
    if services.has_own_detail_keys() {
        pools.push(&services.detail_pool);
    }

    match &args.action {
        PoolAction::Status => show_status(&pools, cli),
        PoolAction::Validate => validate(&services, &pools, cli).await,
    }
}

fn show_status(pools: &[&Arc<CredentialPool>], cli: &Cli) -> Result<()> {
    let outputs: Vec<PoolOutput> = pools
        .iter()
        .map(|pool| PoolOutput {
            name: pool.name().to_string(),
            size: pool.len(),
            usable: pool.valid_count(),
            credentials: pool.snapshot(),
        })
        .collect();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new();
            for output in &outputs {
                print!("{}", formatter.pool(&output.name, output.usable, &output.credentials));
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&outputs)?),
    }

    Ok(())
}

async fn validate(services: &Services, pools: &[&Arc<CredentialPool>], cli: &Cli) -> Result<()> {
    let probe = services.search_probe();
    let formatter = TextFormatter::new();
    let mut outputs = Vec::new();

    for pool in pools {
        let reports = pool.validate_all(&probe).await;
        match cli.format {
            OutputFormat::Text => print!("{}", formatter.validation(pool.name(), &reports)),
            OutputFormat::Json => {
                outputs.extend(reports.iter().map(|r| ValidationOutput::new(pool.name(), r)));
            }
        }
    }

    if cli.format == OutputFormat::Json {
        println!("{}", JsonFormatter::new(cli.pretty).format(&outputs)?);
    }

    Ok(())
}
