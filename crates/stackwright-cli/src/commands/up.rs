//! `stackwright up`: create the project's stack and wait for it.
//!
//! Ctrl-C stops the wait; whatever the platform already created stays and
//! can be inspected with `stackwright ps` or removed with `stackwright down`.

use tracing::{info, instrument};

use stackwright_core::application::{DeployService, StatusService};

use super::{apply_platform_args, cancel_on_ctrl_c, connect, load_project};
use crate::{cli::UpArgs, config::AppConfig, error::CliResult, output::OutputManager};

#[instrument(skip_all, fields(file = %args.project.file.display()))]
pub async fn execute(args: UpArgs, mut config: AppConfig, output: OutputManager) -> CliResult<()> {
    apply_platform_args(&mut config, &args.platform);
    let project = load_project(&args.project)?;
    let options = config.deploy_options()?;
    let cluster = options.cluster.clone();

    let cloud = connect(&config)?;
    let deploy = DeployService::new(cloud.clone(), options);
    let cancel = cancel_on_ctrl_c();

    output.header(&format!(
        "Deploying '{}' ({} services) to cluster '{}'",
        project.name,
        project.services.len(),
        cluster
    ))?;

    let progress = output.progress(&format!("Creating stack {}", project.name));
    let result = deploy.up(&project, &progress, &cancel).await;
    progress.finish();
    let outcome = result?;

    info!(
        stack = %outcome.stack,
        status = %outcome.status,
        iterations = outcome.iterations,
        "Deployment finished"
    );
    output.success(&format!(
        "Stack '{}' reached {} ({} events)",
        outcome.stack, outcome.status, outcome.events_forwarded
    ))?;

    let services = StatusService::new(cloud, cluster)
        .report(&project.name)
        .await?;
    if !output.is_quiet() {
        output.services(&services)?;
    }

    Ok(())
}
