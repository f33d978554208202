//! `stackwright ps`: list the project's services and endpoints.

use tracing::instrument;

use stackwright_core::application::StatusService;

use super::{connect, project_name};
use crate::{
    cli::{OutputFormat, PsArgs},
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

#[instrument(skip_all)]
pub async fn execute(args: PsArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let name = project_name(&args.project)?;
    let cluster = args
        .cluster
        .unwrap_or_else(|| config.platform.cluster.clone());

    let services = StatusService::new(connect(&config)?, cluster)
        .report(&name)
        .await?;

    if services.is_empty() && output.format() != OutputFormat::Json {
        output.info(&format!("Stack '{name}' has no services"))?;
        return Ok(());
    }
    output.services(&services)?;

    Ok(())
}
