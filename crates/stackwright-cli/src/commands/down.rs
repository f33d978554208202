//! `stackwright down`: delete the project's stack.

use tracing::{info, instrument};

use stackwright_core::application::DeployService;

use super::{cancel_on_ctrl_c, connect, project_name};
use crate::{
    cli::DownArgs,
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

#[instrument(skip_all)]
pub async fn execute(args: DownArgs, mut config: AppConfig, output: OutputManager) -> CliResult<()> {
    let name = project_name(&args.project)?;
    if let Some(cluster) = args.cluster {
        config.platform.cluster = cluster;
    }

    if !args.yes && !confirm(&format!("Delete stack '{name}' and all of its resources?"))? {
        return Err(CliError::Cancelled);
    }

    let deploy = DeployService::new(connect(&config)?, config.deploy_options()?);
    let cancel = cancel_on_ctrl_c();

    let progress = output.progress(&format!("Deleting stack {name}"));
    let result = deploy
        .down(&name, args.delete_cluster, &progress, &cancel)
        .await;
    progress.finish();
    let outcome = result?;

    info!(stack = %outcome.stack, status = %outcome.status, "Stack removed");
    output.success(&format!("Stack '{}' reached {}", outcome.stack, outcome.status))?;
    if args.delete_cluster {
        output.success(&format!("Cluster '{}' deleted", config.platform.cluster))?;
    }

    Ok(())
}

#[cfg(feature = "interactive")]
fn confirm(prompt: &str) -> CliResult<bool> {
    use std::io::IsTerminal;

    if !std::io::stdin().is_terminal() {
        return Err(CliError::InvalidInput {
            message: "confirmation needs an interactive terminal; pass --yes".into(),
        });
    }

    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| CliError::IoError {
            message: "reading confirmation".into(),
            source: std::io::Error::other(e),
        })
}

#[cfg(not(feature = "interactive"))]
fn confirm(_prompt: &str) -> CliResult<bool> {
    Err(CliError::FeatureNotAvailable {
        feature: "interactive",
    })
}
