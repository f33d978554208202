//! Diagnostics for the `stackwright` binary.
//!
//! Logs go to stderr so that `stackwright convert > template.json` stays
//! clean. Filtering applies only to the workspace crates; dependency logs
//! are dropped unless `RUST_LOG` asks for them.
//!
//! | Invocation         | Level |
//! |--------------------|-------|
//! | `stackwright up`   | WARN  |
//! | `... -v`           | INFO  |
//! | `... -vv`          | DEBUG |
//! | `... -vvv`         | TRACE |
//! | `... --quiet`      | ERROR |

use std::io::IsTerminal as _;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::GlobalArgs;

const CRATES: [&str; 3] = ["stackwright", "stackwright_core", "stackwright_adapters"];

/// Install the stderr subscriber. Fails if one is already installed.
pub fn init_logging(args: &GlobalArgs) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::new(directives(level_for(args))),
    };

    // Stack events are rendered by the progress sink; log lines stay terse.
    let events = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_ansi(!args.no_color && std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(events)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot install log subscriber: {e}"))
}

fn directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn level_for(args: &GlobalArgs) -> &'static str {
    match (args.quiet, args.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;

    fn flags(verbose: u8, quiet: bool) -> GlobalArgs {
        GlobalArgs {
            verbose,
            quiet,
            no_color: true,
            config: None,
            output_format: OutputFormat::Auto,
        }
    }

    #[test]
    fn plain_invocation_logs_warnings() {
        assert_eq!(level_for(&flags(0, false)), "warn");
    }

    #[test]
    fn each_v_raises_the_level() {
        let levels: Vec<_> = (1..=4).map(|v| level_for(&flags(v, false))).collect();
        assert_eq!(levels, ["info", "debug", "trace", "trace"]);
    }

    #[test]
    fn quiet_keeps_errors_only() {
        assert_eq!(level_for(&flags(3, true)), "error");
    }

    #[test]
    fn filter_names_each_workspace_crate() {
        assert_eq!(
            directives("debug"),
            "stackwright=debug,stackwright_core=debug,stackwright_adapters=debug"
        );
    }
}
