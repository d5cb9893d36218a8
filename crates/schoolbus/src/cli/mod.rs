//! Command-line interface for schoolbus.
//!
//! This module provides the CLI structure and output helpers for the
//! `busctl` binary.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_assignment, AuthCommand, ConfigCommand, DirectionArg, ListArgs, OutputFormat,
    ParentCommand, PlanCommand, RecordsCommand, ReportCommand, ResourceCommand, RouteCommand,
    ScanArgs, ScanCommand,
};
pub use output::{render_table, ScanFeed, ScanInput};

/// busctl - School bus tracking from the command line
///
/// Manage schools, students, fleet and daily plans, record boarding and
/// disembarking with a QR scanner, and export daily reports.
#[derive(Debug, Parser)]
#[command(name = "busctl")]
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
    /// Log in and out
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Manage schools
    #[command(subcommand)]
    School(ResourceCommand),

    /// Manage students
    #[command(subcommand)]
    Student(ResourceCommand),

    /// Manage user accounts
    #[command(subcommand)]
    User(ResourceCommand),

    /// Manage buses
    #[command(subcommand)]
    Bus(ResourceCommand),

    /// Manage routes and their stops
    #[command(subcommand)]
    Route(RouteCommand),

    /// Manage stops
    #[command(subcommand)]
    Stop(ResourceCommand),

    /// Manage trips
    #[command(subcommand)]
    Trip(ResourceCommand),

    /// Manage daily plans
    #[command(subcommand)]
    Plan(PlanCommand),

    /// List boarding or disembarking records
    Records(RecordsCommand),

    /// Record boarding and disembarking from QR scans
    #[command(subcommand)]
    Scan(ScanCommand),

    /// Export reports
    #[command(subcommand)]
    Report(ReportCommand),

    /// Parent portal
    #[command(subcommand)]
    Parent(ParentCommand),

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
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "busctl");
    }

    #[test]
    fn test_cli_verify() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(
            parse(&["busctl", "-q", "config", "path"]).verbosity(),
            crate::logging::Verbosity::Quiet
        );
        assert_eq!(
            parse(&["busctl", "config", "path"]).verbosity(),
            crate::logging::Verbosity::Normal
        );
        assert_eq!(
            parse(&["busctl", "-v", "config", "path"]).verbosity(),
            crate::logging::Verbosity::Verbose
        );
        assert_eq!(
            parse(&["busctl", "-vv", "config", "path"]).verbosity(),
            crate::logging::Verbosity::Trace
        );
    }

    #[test]
    fn test_parse_login() {
        let cli = parse(&["busctl", "auth", "login", "a@b.org", "--admin"]);
        assert!(matches!(
            cli.command,
            Command::Auth(AuthCommand::Login { admin: true, password: None, .. })
        ));
    }

    #[test]
    fn test_parse_resource_list() {
        let cli = parse(&[
            "busctl", "bus", "list", "--status", "inactive", "--sort", "capacity", "--desc",
        ]);
        let Command::Bus(ResourceCommand::List(args)) = cli.command else {
            panic!("expected bus list");
        };
        assert_eq!(args.status, crate::listing::ActiveFilter::Inactive);
        assert!(args.desc);
        assert_eq!(args.page, 1);
    }

    #[test]
    fn test_parse_create_assignments() {
        let cli = parse(&[
            "busctl", "stop", "create", "--set", "name=Main St", "--set", "latitude=4.61",
        ]);
        let Command::Stop(ResourceCommand::Create { set }) = cli.command else {
            panic!("expected stop create");
        };
        assert_eq!(set.len(), 2);
        assert_eq!(set[1].1, serde_json::json!(4.61));
    }

    #[test]
    fn test_update_requires_assignment() {
        assert!(Cli::try_parse_from(["busctl", "bus", "update", "3"]).is_err());
    }

    #[test]
    fn test_parse_route_extras() {
        let cli = parse(&["busctl", "route", "reorder", "4", "--stop", "9", "--to", "1"]);
        assert!(matches!(
            cli.command,
            Command::Route(RouteCommand::Reorder { id: 4, stop: 9, to: 1 })
        ));
        let cli = parse(&["busctl", "route", "deactivate", "4"]);
        assert!(matches!(
            cli.command,
            Command::Route(RouteCommand::Resource(ResourceCommand::Deactivate { id: 4 }))
        ));
    }

    #[test]
    fn test_parse_scan() {
        let cli = parse(&["busctl", "scan", "board", "--trip", "7", "--device", "/dev/ttyACM0"]);
        let Command::Scan(ScanCommand::Board(args)) = cli.command else {
            panic!("expected scan board");
        };
        assert_eq!(args.trip, Some(7));
        assert_eq!(args.device, Some(PathBuf::from("/dev/ttyACM0")));
        assert!(!args.auto_confirm);
    }

    #[test]
    fn test_parse_records_date() {
        let cli = parse(&["busctl", "records", "disembarking", "--date", "2024-10-07"]);
        let Command::Records(cmd) = cli.command else {
            panic!("expected records");
        };
        assert_eq!(cmd.direction, DirectionArg::Disembarking);
        assert_eq!(cmd.date, chrono::NaiveDate::from_ymd_opt(2024, 10, 7));
        assert!(Cli::try_parse_from(["busctl", "records", "boarding", "--date", "07/10"]).is_err());
    }

    #[test]
    fn test_report_output_conflicts_with_stdout() {
        assert!(Cli::try_parse_from([
            "busctl", "report", "daily", "--stdout", "--output", "x.csv"
        ])
        .is_err());
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["busctl", "-c", "/custom/config.toml", "config", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }
}
