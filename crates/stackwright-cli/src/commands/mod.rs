//! Command handlers.
//!
//! Each handler translates CLI arguments into core calls and renders the
//! result. No business logic lives here.

pub mod completions;
pub mod config;
pub mod convert;
pub mod down;
pub mod ps;
pub mod up;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stackwright_adapters::{SandboxCloud, project_loader};
use stackwright_core::{domain::Project, error::StackwrightError};

use crate::{
    cli::{PlatformArgs, ProjectArgs, RoleModeArg},
    config::AppConfig,
    error::{CliError, CliResult},
};

/// Load the compose file, applying `--project-name`.
pub(crate) fn load_project(args: &ProjectArgs) -> CliResult<Project> {
    if !args.file.exists() {
        return Err(CliError::ProjectFileNotFound {
            path: args.file.clone(),
        });
    }
    let mut project = project_loader::load(&args.file).map_err(StackwrightError::from)?;
    if let Some(name) = &args.project_name {
        project.name = name.clone();
    }
    debug!(project = %project.name, services = project.services.len(), "Project loaded");
    Ok(project)
}

/// Stack name for commands that only need the name.
pub(crate) fn project_name(args: &ProjectArgs) -> CliResult<String> {
    match &args.project_name {
        Some(name) => Ok(name.clone()),
        None => load_project(args).map(|p| p.name),
    }
}

/// Open the sandbox platform described by `config`.
pub(crate) fn connect(config: &AppConfig) -> CliResult<Arc<SandboxCloud>> {
    let path = config.state_file();
    debug!(state_file = %path.display(), "Connecting to sandbox");
    Ok(Arc::new(SandboxCloud::open(path, config.sandbox_seed())?))
}

/// Fold per-run flags into the loaded configuration.
pub(crate) fn apply_platform_args(config: &mut AppConfig, args: &PlatformArgs) {
    if let Some(cluster) = &args.cluster {
        config.platform.cluster = cluster.clone();
    }
    if let Some(mode) = args.execution_role {
        config.platform.execution_role = match mode {
            RoleModeArg::Synthesize => "synthesize",
            RoleModeArg::Discover => "discover",
        }
        .to_string();
    }
}

/// Token cancelled on Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            trigger.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_file_is_reported_before_parsing() {
        let args = ProjectArgs {
            file: PathBuf::from("/no/such/compose.yaml"),
            project_name: None,
        };
        assert!(matches!(
            load_project(&args),
            Err(CliError::ProjectFileNotFound { .. })
        ));
    }

    #[test]
    fn explicit_name_skips_the_file() {
        let args = ProjectArgs {
            file: PathBuf::from("/no/such/compose.yaml"),
            project_name: Some("shop".into()),
        };
        assert_eq!(project_name(&args).unwrap(), "shop");
    }

    #[test]
    fn platform_flags_override_config() {
        let mut config = AppConfig::default();
        apply_platform_args(
            &mut config,
            &PlatformArgs {
                cluster: Some("prod".into()),
                execution_role: Some(RoleModeArg::Discover),
            },
        );
        assert_eq!(config.platform.cluster, "prod");
        assert_eq!(config.platform.execution_role, "discover");
    }
}
