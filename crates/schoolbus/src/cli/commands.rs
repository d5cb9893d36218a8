//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};
use serde_json::Value;

use crate::listing::{ActiveFilter, ListQuery, DEFAULT_PER_PAGE};
use crate::models::Direction;

/// Authentication commands.
#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Log in as a driver (or an administrator with --admin)
    Login {
        /// Account email
        email: String,

        /// Password (read from stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Use the administrator login
        #[arg(long)]
        admin: bool,
    },

    /// Log in as a parent with the child's QR code
    ParentLogin {
        /// The child's QR code
        qr_code: String,
    },

    /// End the current session
    Logout,

    /// Show who is logged in
    Whoami {
        /// Ask the backend instead of reading the stored session
        #[arg(long)]
        remote: bool,
    },
}

/// Commands shared by every managed resource.
#[derive(Debug, Subcommand)]
pub enum ResourceCommand {
    /// List entities
    List(ListArgs),

    /// Show one entity
    Get {
        /// Entity id
        id: i64,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Create an entity from field assignments
    Create {
        /// Field assignment, e.g. --set plateNumber=ABC-123 --set capacity=40
        #[arg(short, long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, Value)>,
    },

    /// Change fields of an entity
    Update {
        /// Entity id
        id: i64,

        /// Field assignment, e.g. --set capacity=52
        #[arg(short, long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment, required = true)]
        set: Vec<(String, Value)>,
    },

    /// Enable an entity
    Activate {
        /// Entity id
        id: i64,
    },

    /// Disable an entity without deleting it
    Deactivate {
        /// Entity id
        id: i64,
    },

    /// Delete an entity
    Delete {
        /// Entity id
        id: i64,

        /// Confirm the deletion
        #[arg(short, long)]
        yes: bool,
    },
}

/// Route commands.
#[derive(Debug, Subcommand)]
pub enum RouteCommand {
    #[command(flatten)]
    Resource(ResourceCommand),

    /// Show the ordered stops of a route
    Stops {
        /// Route id
        id: i64,
    },

    /// Move a stop to a new position and renumber the route
    Reorder {
        /// Route id
        id: i64,

        /// Stop id to move
        #[arg(long)]
        stop: i64,

        /// New 1-based position
        #[arg(long)]
        to: usize,
    },
}

/// List arguments.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Case-insensitive text search
    #[arg(short, long)]
    pub search: Option<String>,

    /// Filter by active flag
    #[arg(long, value_enum, default_value_t = ActiveFilter::All)]
    pub status: ActiveFilter,

    /// Sort key (e.g. id, name, capacity)
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Rows per page
    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl ListArgs {
    #[must_use]
    pub fn query(&self) -> ListQuery {
        ListQuery {
            search: self.search.clone(),
            status: self.status,
            sort: self.sort.clone(),
            descending: self.desc,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Daily plan commands.
#[derive(Debug, Subcommand)]
pub enum PlanCommand {
    /// List plans for a date
    List {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Plan a student on a trip
    Create {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Student id
        #[arg(long)]
        student: i64,

        /// Trip id
        #[arg(long)]
        trip: i64,

        /// Bus id
        #[arg(long)]
        bus: i64,

        /// Stop id
        #[arg(long)]
        stop: Option<i64>,

        /// Boarding or disembarking
        #[arg(long, value_enum)]
        direction: DirectionArg,
    },

    /// Delete a plan
    Delete {
        /// Plan id
        id: i64,
    },
}

/// Record listing arguments.
#[derive(Debug, Args)]
pub struct RecordsCommand {
    /// Which records
    #[arg(value_enum)]
    pub direction: DirectionArg,

    /// Date (YYYY-MM-DD), defaults to today
    #[arg(short, long, conflicts_with = "all")]
    pub date: Option<NaiveDate>,

    /// List records of every date
    #[arg(long)]
    pub all: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Scanner commands.
#[derive(Debug, Subcommand)]
pub enum ScanCommand {
    /// Record students getting on the bus
    Board(ScanArgs),

    /// Record students getting off the bus
    Disembark(ScanArgs),

    /// List cameras and show which one would be used
    Cameras {
        /// video4linux sysfs directory
        #[arg(long, default_value = crate::scanner::camera::V4L_SYSFS)]
        sysfs: PathBuf,
    },
}

/// Scan session arguments.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Trip used for students without a plan today
    #[arg(short, long)]
    pub trip: Option<i64>,

    /// Read codes from a scanner device instead of stdin
    #[arg(short, long, value_name = "PATH")]
    pub device: Option<PathBuf>,

    /// Submit every found student without asking
    #[arg(long)]
    pub auto_confirm: bool,
}

/// Report commands.
#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Export the daily report as CSV
    Daily {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Output file (defaults to report-<date>.csv in the report directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the CSV to stdout
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },
}

/// Parent portal commands.
#[derive(Debug, Subcommand)]
pub enum ParentCommand {
    /// Show where the child is today
    Status {
        /// Log in with this QR code first
        qr_code: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Direction argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    /// Getting on the bus
    Boarding,
    /// Getting off the bus
    Disembarking,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Boarding => Self::Boarding,
            DirectionArg::Disembarking => Self::Disembarking,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Parse `field=value`.
///
/// The value is read as JSON when it is `true`, `false`, `null`, a number,
/// or starts with `"`, `[` or `{`; anything else is a plain string. Quote a
/// value (`qrCode='"0042"'`) to force a string.
///
/// # Errors
///
/// Returns a message when `=` is missing, the field is empty, or a JSON
/// looking value does not parse.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }

    let looks_json = matches!(value, "true" | "false" | "null")
        || (value.starts_with(|c: char| c == '-' || c.is_ascii_digit())
            && value.parse::<f64>().is_ok())
        || value.starts_with(['"', '[', '{']);
    let value = if looks_json {
        serde_json::from_str(value).map_err(|e| format!("invalid value for {field}: {e}"))?
    } else {
        Value::String(value.to_string())
    };
    Ok((field.to_string(), value))
}
