//! `stackwright convert`: compile the project without deploying it.

use tracing::{info, instrument};

use stackwright_core::{application::DeployService, error::StackwrightError};

use super::{apply_platform_args, connect, load_project};
use crate::{
    cli::ConvertArgs,
    config::AppConfig,
    error::{CliResult, IntoCli},
    output::OutputManager,
};

#[instrument(skip_all, fields(file = %args.project.file.display()))]
pub async fn execute(args: ConvertArgs, mut config: AppConfig, output: OutputManager) -> CliResult<()> {
    apply_platform_args(&mut config, &args.platform);
    let project = load_project(&args.project)?;

    let deploy = DeployService::new(connect(&config)?, config.deploy_options()?);
    let template = deploy.convert(&project).await?;
    let json = template.to_json().map_err(|e| StackwrightError::Internal {
        message: format!("template serialisation failed: {e}"),
    })?;

    info!(
        project = %project.name,
        resources = template.resource_count(),
        "Template compiled"
    );

    match args.output {
        Some(path) => {
            std::fs::write(&path, json + "\n")
                .with_cli_context(|| format!("writing template to {}", path.display()))?;
            output.success(&format!(
                "Wrote {} resources to {}",
                template.resource_count(),
                path.display()
            ))?;
        }
        None => output.data(&json)?,
    }

    Ok(())
}
