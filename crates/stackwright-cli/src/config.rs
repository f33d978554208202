//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value. The
//! CLI layer owns config; the core crate only ever sees the plain option
//! structs built from it ([`DeployOptions`], [`PollPolicy`]).
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables: `STACKWRIGHT_<SECTION>__<KEY>`, e.g.
//!    `STACKWRIGHT_PLATFORM__CLUSTER=prod`
//! 3. Config file (`--config FILE`, or [`AppConfig::config_path`] if present)
//! 4. Built-in defaults (always present)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use stackwright_adapters::SandboxState;
use stackwright_core::application::{DeployOptions, PollPolicy, RoleMode};

use crate::error::{CliError, CliResult};

pub const ENV_PREFIX: &str = "STACKWRIGHT";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where and how stacks are deployed.
    pub platform: PlatformConfig,
    /// Polling behaviour while waiting on a stack.
    pub deploy: DeployConfig,
    /// The offline platform the CLI talks to.
    pub sandbox: SandboxConfig,
    /// Output settings.
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub cluster: String,
    /// `synthesize` or `discover`.
    pub execution_role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    pub poll_attempts: u32,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub state_file: Option<PathBuf>,
    pub default_vpc: Option<String>,
    pub subnets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub no_color: bool,
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig {
                cluster: "default".into(),
                execution_role: RoleMode::default().to_string(),
            },
            deploy: DeployConfig {
                poll_attempts: PollPolicy::DEFAULT_ATTEMPTS,
                poll_interval_secs: PollPolicy::DEFAULT_INTERVAL.as_secs(),
            },
            sandbox: SandboxConfig {
                state_file: None,
                default_vpc: Some("vpc-sandbox".into()),
                subnets: vec!["subnet-sandbox-a".into(), "subnet-sandbox-b".into()],
            },
            output: OutputConfig {
                no_color: false,
                format: "auto".into(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the config file, then environment.
    ///
    /// A file passed explicitly with `--config` must exist; the default
    /// location is optional.
    pub fn load(config_file: Option<&PathBuf>) -> CliResult<Self> {
        let defaults = Config::try_from(&Self::default()).map_err(config_error)?;

        let file = match config_file {
            Some(path) => File::from(path.as_path())
                .format(FileFormat::Toml)
                .required(true),
            None => File::from(Self::config_path().as_path())
                .format(FileFormat::Toml)
                .required(false),
        };

        Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sandbox.subnets")
                    .try_parsing(true),
            )
            .build()
            .and_then(Config::try_deserialize)
            .map_err(config_error)
    }

    /// Path to the default configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `.stackwright.toml` in the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "stackwright", "stackwright")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".stackwright.toml"))
    }

    /// Sandbox state file, defaulting to the platform data directory.
    pub fn state_file(&self) -> PathBuf {
        self.sandbox.state_file.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("dev", "stackwright", "stackwright")
                .map(|d| d.data_dir().join("sandbox.json"))
                .unwrap_or_else(|| Path::new(".stackwright").join("sandbox.json"))
        })
    }

    /// Initial account used when no state file exists yet.
    pub fn sandbox_seed(&self) -> SandboxState {
        SandboxState::seeded(
            self.sandbox.default_vpc.clone().filter(|v| !v.is_empty()),
            self.sandbox.subnets.clone(),
        )
    }

    /// Options handed to the deploy service.
    pub fn deploy_options(&self) -> CliResult<DeployOptions> {
        let role_mode: RoleMode =
            self.platform
                .execution_role
                .parse()
                .map_err(|message: String| CliError::ConfigError {
                    message,
                    source: None,
                })?;

        if self.deploy.poll_attempts == 0 {
            return Err(CliError::ConfigError {
                message: "deploy.poll_attempts must be at least 1".into(),
                source: None,
            });
        }

        Ok(DeployOptions {
            cluster: self.platform.cluster.clone(),
            role_mode,
            poll: PollPolicy::new(
                self.deploy.poll_attempts,
                Duration::from_secs(self.deploy.poll_interval_secs),
            ),
        })
    }
}

fn config_error(e: config::ConfigError) -> CliError {
    CliError::ConfigError {
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_core_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.platform.cluster, "default");
        assert_eq!(cfg.platform.execution_role, "synthesize");

        let options = cfg.deploy_options().unwrap();
        assert_eq!(options.poll, PollPolicy::default());
        assert_eq!(options.role_mode, RoleMode::Synthesize);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[platform]\ncluster = \"prod\"\nexecution_role = \"discover\"\n\n[deploy]\npoll_attempts = 5"
        )
        .unwrap();

        let cfg = AppConfig::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.platform.cluster, "prod");
        assert_eq!(cfg.deploy.poll_attempts, 5);
        assert_eq!(cfg.deploy.poll_interval_secs, 1);
        assert_eq!(cfg.deploy_options().unwrap().role_mode, RoleMode::Discover);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let missing = PathBuf::from("/definitely/not/here.toml");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(CliError::ConfigError { .. })
        ));
    }

    #[test]
    fn unknown_role_mode_is_a_config_error() {
        let mut cfg = AppConfig::default();
        cfg.platform.execution_role = "borrow".into();
        assert_eq!(cfg.deploy_options().unwrap_err().exit_code(), 4);
    }

    #[test]
    fn empty_default_vpc_seeds_account_without_one() {
        let mut cfg = AppConfig::default();
        cfg.sandbox.default_vpc = Some(String::new());
        assert!(cfg.sandbox_seed().default_vpc.is_none());
    }

    #[test]
    fn config_path_is_not_empty() {
        assert!(!AppConfig::config_path().as_os_str().is_empty());
    }
}
