//! Command-line interface for consultrec.
//!
//! This module provides the CLI structure and output formatting for the
//! `consultrec` binary.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, HistoryCommand, OutputFormat, RecordCommand, StatusCommand};

/// consultrec - Keep every consultation, locally and remotely
///
/// Saves analyzed consultations to an on-device history and forwards them
/// to a remote collection endpoint, reporting partial failures without
/// discarding the analysis.
#[derive(Debug, Parser)]
#[command(name = "consultrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Save an analyzed consultation to both sinks
    Record(RecordCommand),

    /// Browse or prune the local consultation history
    #[command(subcommand)]
    History(HistoryCommand),

    /// Show storage and sync status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "consultrec");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["consultrec", "-q", "status"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["consultrec", "status"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["consultrec", "-v", "status"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["consultrec", "-vv", "status"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_record() {
        let cli = parse(&["consultrec", "record", "--form", "f.json", "--result", "r.json"]);
        match cli.command {
            Command::Record(cmd) => {
                assert_eq!(cmd.form, PathBuf::from("f.json"));
                assert_eq!(cmd.result, PathBuf::from("r.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_record_requires_both_files() {
        assert!(Cli::try_parse_from(["consultrec", "record", "--form", "f.json"]).is_err());
    }

    #[test]
    fn test_parse_history_list() {
        let cli = parse(&[
            "consultrec", "history", "list", "-s", "leak", "-l", "5", "-f", "json",
        ]);
        match cli.command {
            Command::History(HistoryCommand::List {
                search,
                limit,
                format,
            }) => {
                assert_eq!(search.as_deref(), Some("leak"));
                assert_eq!(limit, Some(5));
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_history_show_and_delete() {
        let cli = parse(&["consultrec", "history", "show", "abc", "--json"]);
        assert!(matches!(
            cli.command,
            Command::History(HistoryCommand::Show { json: true, .. })
        ));

        let cli = parse(&["consultrec", "history", "delete", "abc"]);
        match cli.command {
            Command::History(HistoryCommand::Delete { id }) => assert_eq!(id, "abc"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = parse(&["consultrec", "config", "validate", "--file", "/tmp/c.toml"]);
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["consultrec", "-c", "/custom/config.toml", "status"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }
}
