//! Flags accepted by every `stackwright` subcommand.
//!
//! Flattened into [`super::Cli`]; each one is `global = true`, so
//! `stackwright up -vv` and `stackwright -vv up` mean the same thing.

use std::path::PathBuf;

use clap::Args;
use clap::builder::FalseyValueParser;

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Log deploy phases (-v), poll iterations (-vv) or everything (-vvv).
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Show more of what stackwright is doing (-v, -vv, -vvv)",
        long_help = "Raise the log level of stackwright's own crates:
    (none)  - warnings and errors
    -v      - deploy phases and stack outcomes
    -vv     - every poll of the stack
    -vvv    - trace output

RUST_LOG, when set, replaces this mapping entirely."
    )]
    pub verbose: u8,

    /// Only errors reach stderr; stack events are not shown.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Print errors only, no progress"
    )]
    pub quiet: bool,

    /// Plain output without ANSI styling.
    ///
    /// `NO_COLOR` follows <https://no-color.org>: any non-empty value other
    /// than a falsey one (`0`, `false`, `no`, `off`) turns colour off.
    #[arg(
        long = "no-color",
        global = true,
        env = "NO_COLOR",
        action = clap::ArgAction::SetTrue,
        value_parser = FalseyValueParser::new(),
        help = "Never colour error messages or progress"
    )]
    pub no_color: bool,

    /// TOML settings file used instead of the per-user one.
    #[arg(
        short = 'c',
        long = "config",
        global = true,
        value_name = "FILE",
        help = "Read settings from FILE (must exist)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long = "output-format",
        global = true,
        value_enum,
        default_value = "auto",
        help = "How templates, tables and results are printed"
    )]
    pub output_format: OutputFormat,
}

/// Rendering of command results on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// `human` on a terminal, `plain` otherwise.
    #[default]
    Auto,
    /// Styled tables, spinner while a stack settles.
    Human,
    /// Unstyled tables, one line per stack event.
    Plain,
    /// Service lists and outcomes as JSON.
    Json,
}
