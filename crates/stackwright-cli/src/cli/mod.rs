//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums. No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "stackwright",
    bin_name = "stackwright",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Deploy compose projects as container-platform stacks",
    long_about = "Stackwright compiles a compose file into a single infrastructure \
                  stack (networks, roles, task definitions, services, load balancer) \
                  and drives its creation, inspection and deletion.",
    after_help = "EXAMPLES:\n\
        \x20 stackwright convert -f compose.yaml > stack.json\n\
        \x20 stackwright up\n\
        \x20 stackwright ps --output-format json\n\
        \x20 stackwright down --yes --delete-cluster",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the compiled stack template without deploying it.
    #[command(
        about = "Compile the project into a stack template",
        after_help = "EXAMPLES:\n\
            \x20 stackwright convert\n\
            \x20 stackwright convert -f prod.yaml --output stack.json"
    )]
    Convert(ConvertArgs),

    /// Create the project's stack and wait for it.
    #[command(
        about = "Deploy the project",
        after_help = "EXAMPLES:\n\
            \x20 stackwright up\n\
            \x20 stackwright up -f prod.yaml --cluster prod"
    )]
    Up(UpArgs),

    /// List the project's services.
    #[command(
        visible_alias = "ls",
        about = "List running services and their endpoints",
        after_help = "EXAMPLES:\n\
            \x20 stackwright ps\n\
            \x20 stackwright ps --project-name shop --output-format json"
    )]
    Ps(PsArgs),

    /// Delete the project's stack.
    #[command(
        about = "Tear the project down",
        after_help = "EXAMPLES:\n\
            \x20 stackwright down\n\
            \x20 stackwright down --project-name shop --yes --delete-cluster"
    )]
    Down(DownArgs),

    /// Inspect the effective configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 stackwright config get platform.cluster\n\
            \x20 stackwright config list\n\
            \x20 stackwright config path"
    )]
    Config(ConfigCommands),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 stackwright completions bash > ~/.local/share/bash-completion/completions/stackwright\n\
            \x20 stackwright completions zsh  > ~/.zfunc/_stackwright\n\
            \x20 stackwright completions fish > ~/.config/fish/completions/stackwright.fish"
    )]
    Completions(CompletionsArgs),
}

// ── shared ────────────────────────────────────────────────────────────────────

/// Where the project comes from.
#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Compose file describing the project.
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        default_value = "compose.yaml",
        help = "Compose file"
    )]
    pub file: PathBuf,

    /// Override the project name.
    #[arg(
        short = 'p',
        long = "project-name",
        value_name = "NAME",
        help = "Project name (defaults to the compose file's name)"
    )]
    pub project_name: Option<String>,
}

/// Settings that override configuration for a single run.
#[derive(Debug, Args)]
pub struct PlatformArgs {
    /// Cluster to deploy into.
    #[arg(long = "cluster", value_name = "NAME", help = "Target cluster")]
    pub cluster: Option<String>,

    /// How services without an explicit role get one.
    #[arg(
        long = "execution-role",
        value_enum,
        value_name = "MODE",
        help = "Execution role strategy"
    )]
    pub execution_role: Option<RoleModeArg>,
}

/// Execution role strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleModeArg {
    /// Emit a least-privilege role per service.
    Synthesize,
    /// Reuse the single role attached to the managed execution policy.
    Discover,
}

// ── convert ───────────────────────────────────────────────────────────────────

/// Arguments for `stackwright convert`.
#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub platform: PlatformArgs,

    /// Write the template here instead of stdout.
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help = "Output file (default: stdout)"
    )]
    pub output: Option<PathBuf>,
}

// ── up ────────────────────────────────────────────────────────────────────────

/// Arguments for `stackwright up`.
#[derive(Debug, Args)]
pub struct UpArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub platform: PlatformArgs,
}

// ── ps ────────────────────────────────────────────────────────────────────────

/// Arguments for `stackwright ps`.
#[derive(Debug, Args)]
pub struct PsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Cluster to look in when the stack does not record one.
    #[arg(long = "cluster", value_name = "NAME", help = "Fallback cluster")]
    pub cluster: Option<String>,
}

// ── down ──────────────────────────────────────────────────────────────────────

/// Arguments for `stackwright down`.
#[derive(Debug, Args)]
pub struct DownArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Also delete the cluster once the stack is gone.
    #[arg(long = "delete-cluster", help = "Delete the cluster afterwards")]
    pub delete_cluster: bool,

    /// Cluster to delete with `--delete-cluster`.
    #[arg(long = "cluster", value_name = "NAME", help = "Target cluster")]
    pub cluster: Option<String>,

    /// Skip the confirmation prompt.
    #[arg(short = 'y', long = "yes", help = "Skip confirmation")]
    pub yes: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `stackwright completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `stackwright config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `platform.cluster`.
        key: String,
    },
    /// Print all configuration values.
    List,
    /// Print the path to the default configuration file.
    Path,
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_color_flag_takes_no_value() {
        let cli = Cli::parse_from(["stackwright", "--no-color", "ps"]);
        assert!(cli.global.no_color);
        assert!(matches!(cli.command, Commands::Ps(_)));
    }

    #[test]
    fn project_file_defaults_to_compose_yaml() {
        let cli = Cli::parse_from(["stackwright", "up"]);
        let Commands::Up(args) = cli.command else {
            panic!("expected Up command");
        };
        assert_eq!(args.project.file, PathBuf::from("compose.yaml"));
        assert!(args.project.project_name.is_none());
    }

    #[test]
    fn parse_convert_with_overrides() {
        let cli = Cli::parse_from([
            "stackwright",
            "convert",
            "-f",
            "prod.yaml",
            "--cluster",
            "prod",
            "--execution-role",
            "discover",
            "-o",
            "out.json",
        ]);
        let Commands::Convert(args) = cli.command else {
            panic!("expected Convert command");
        };
        assert_eq!(args.platform.cluster.as_deref(), Some("prod"));
        assert_eq!(args.platform.execution_role, Some(RoleModeArg::Discover));
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn ps_alias() {
        let cli = Cli::parse_from(["stackwright", "ls", "-p", "shop"]);
        assert!(matches!(cli.command, Commands::Ps(_)));
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["stackwright", "--quiet", "--verbose", "ps"]);
        assert!(result.is_err());
    }
}
