//! Output management and formatting.

use std::io::{self, IsTerminal};
use std::time::Duration;

use clap::ValueEnum;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use stackwright_adapters::LineWriterSink;
use stackwright_core::application::ProgressSink;
use stackwright_core::domain::{ServiceStatus, StackEvent};

use crate::cli::global::{GlobalArgs, OutputFormat};
use crate::config::AppConfig;

/// Manages CLI output based on flags and configuration.
pub struct OutputManager {
    resolved_format: OutputFormat,
    quiet: bool,
    no_color: bool,
    term: Term,
}

impl OutputManager {
    /// Build an `OutputManager` from parsed CLI flags and loaded config.
    ///
    /// `--output-format` wins over `output.format`; `auto` resolves to human
    /// output on a terminal and plain output otherwise.
    pub fn new(args: &GlobalArgs, config: &AppConfig) -> Self {
        let requested = match args.output_format {
            OutputFormat::Auto => {
                OutputFormat::from_str(&config.output.format, true).unwrap_or(OutputFormat::Auto)
            }
            explicit => explicit,
        };
        let resolved_format = match requested {
            OutputFormat::Auto if io::stdout().is_terminal() => OutputFormat::Human,
            OutputFormat::Auto => OutputFormat::Plain,
            other => other,
        };

        Self {
            resolved_format,
            quiet: args.quiet,
            no_color: args.no_color
                || config.output.no_color
                || resolved_format != OutputFormat::Human,
            term: Term::stdout(),
        }
    }

    // ── Public write methods ───────────────────────────────────────────────

    /// Generic message; suppressed in quiet mode.
    pub fn print(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.term.write_line(msg)
    }

    /// Payload output (templates, JSON); never suppressed.
    pub fn data(&self, msg: &str) -> io::Result<()> {
        self.term.write_line(msg)
    }

    /// Success indicator: `✓ <msg>`.
    pub fn success(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            format!("\u{2713} {msg}")
        } else {
            format!("{} {}", "\u{2713}".green().bold(), msg.green())
        };
        self.term.write_line(&line)
    }

    /// Warning indicator: `⚠ <msg>`.
    pub fn warning(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            format!("\u{26a0} {msg}")
        } else {
            format!("{} {}", "\u{26a0}".yellow().bold(), msg.yellow())
        };
        self.term.write_line(&line)
    }

    /// Informational indicator: `ℹ <msg>`.
    pub fn info(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            format!("\u{2139} {msg}")
        } else {
            format!("{} {}", "\u{2139}".blue().bold(), msg.blue())
        };
        self.term.write_line(&line)
    }

    /// Bold cyan header line.
    pub fn header(&self, text: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            text.to_owned()
        } else {
            text.cyan().bold().to_string()
        };
        self.term.write_line(&line)
    }

    /// Service listing as a table, or a JSON array in JSON mode.
    pub fn services(&self, services: &[ServiceStatus]) -> io::Result<()> {
        if self.resolved_format == OutputFormat::Json {
            let json = serde_json::to_string_pretty(services).map_err(io::Error::other)?;
            return self.data(&json);
        }
        for line in service_table(services) {
            self.data(&line)?;
        }
        Ok(())
    }

    /// Sink for stack events while waiting on `message`.
    ///
    /// A spinner on an interactive stderr, one line per event otherwise,
    /// nothing in quiet mode.
    pub fn progress(&self, message: &str) -> Progress {
        if self.quiet {
            return Progress::Silent;
        }
        if !io::stderr().is_terminal() {
            return Progress::Lines(LineWriterSink::stderr());
        }

        let bar = ProgressBar::new_spinner();
        let template = if self.no_color {
            "{spinner} {msg}"
        } else {
            "{spinner:.cyan} {msg}"
        };
        bar.set_style(
            ProgressStyle::with_template(template)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Progress::Spinner(bar)
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// `true` if ANSI colours are enabled.
    pub fn supports_color(&self) -> bool {
        !self.no_color
    }

    /// `true` if quiet mode suppresses most output.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// The resolved (non-Auto) output format.
    pub fn format(&self) -> OutputFormat {
        self.resolved_format
    }
}

/// Where stack events go while a command waits.
pub enum Progress {
    Silent,
    Spinner(ProgressBar),
    Lines(LineWriterSink<io::Stderr>),
}

impl Progress {
    /// Remove the spinner, if any.
    pub fn finish(&self) {
        if let Self::Spinner(bar) = self {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for Progress {
    fn on_event(&self, event: &StackEvent) {
        match self {
            Self::Silent => {}
            Self::Spinner(bar) => {
                bar.println(event.progress_line());
                bar.set_message(format!("{} {}", event.logical_id, event.status));
            }
            Self::Lines(sink) => sink.on_event(event),
        }
    }
}

/// `ID NAME REPLICAS PORTS`, columns padded to the widest cell.
fn service_table(services: &[ServiceStatus]) -> Vec<String> {
    let rows: Vec<[String; 4]> = services
        .iter()
        .map(|s| [s.id.clone(), s.name.clone(), s.replicas(), s.ports.join(", ")])
        .collect();

    let header = ["ID", "NAME", "REPLICAS", "PORTS"].map(String::from);
    let mut widths = header.clone().map(|h| h.len());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    std::iter::once(&header)
        .chain(&rows)
        .map(|row| {
            let line = row
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("   ");
            line.trim_end().to_string()
        })
        .collect()
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_manager(quiet: bool, format: OutputFormat) -> OutputManager {
        let args = GlobalArgs {
            verbose: 0,
            quiet,
            no_color: false,
            config: None,
            output_format: format,
        };
        OutputManager::new(&args, &AppConfig::default())
    }

    #[test]
    fn quiet_suppresses_print() {
        let out = make_manager(true, OutputFormat::Plain);
        assert!(out.print("hello").is_ok());
        assert!(out.is_quiet());
    }

    #[test]
    fn plain_output_has_no_color() {
        assert!(!make_manager(false, OutputFormat::Plain).supports_color());
        assert!(make_manager(false, OutputFormat::Human).supports_color());
    }

    #[test]
    fn config_format_applies_when_flag_is_auto() {
        let args = GlobalArgs {
            verbose: 0,
            quiet: false,
            no_color: false,
            config: None,
            output_format: OutputFormat::Auto,
        };
        let mut config = AppConfig::default();
        config.output.format = "json".into();
        assert_eq!(OutputManager::new(&args, &config).format(), OutputFormat::Json);
    }

    #[test]
    fn quiet_progress_is_silent() {
        let out = make_manager(true, OutputFormat::Plain);
        let progress = out.progress("Creating stack");
        assert!(matches!(progress, Progress::Silent));
        progress.on_event(&StackEvent::new("1", "AWS::Logs::LogGroup", "LogGroup", "CREATE_COMPLETE"));
        progress.finish();
    }

    #[test]
    fn table_aligns_columns() {
        let services = vec![
            ServiceStatus {
                id: "arn:svc/api".into(),
                name: "api".into(),
                desired_count: 2,
                running_count: 1,
                ports: vec!["lb:80->80/tcp".into()],
            },
            ServiceStatus {
                id: "arn:svc/background-jobs".into(),
                name: "worker".into(),
                desired_count: 1,
                running_count: 1,
                ports: vec![],
            },
        ];
        let lines = service_table(&services);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("1/2"));
        assert!(lines[1].ends_with("lb:80->80/tcp"));
        let name_col = lines[0].find("NAME").unwrap();
        assert_eq!(lines[2].find("worker"), Some(name_col));
    }
}
