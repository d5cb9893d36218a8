//! Resource types exchanged with the school-bus backend.
//!
//! Every entity carries a server-assigned `id`, optional timestamps and, for
//! the managed resources, an `isActive` flag used for soft enable/disable.
//! Wire names are camelCase.

mod bus;
mod plan;
mod record;
mod route;
mod school;
mod stop;
mod student;
mod user;

use std::cmp::Ordering;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use bus::{assigned_bus, Bus, BusInput};
pub use plan::{find_plan, DailyPlan, DailyPlanInput};
pub use record::{
    contains_student, latest_for_student, BoardingRecord, DisembarkingRecord, EventRecord,
    NewRecord,
};
pub use route::{
    move_stop, normalize_stop_order, Route, RouteInput, RouteStop, RouteStopInput, Trip,
    TripInput,
};
pub use school::{School, SchoolInput};
pub use stop::{Stop, StopInput};
pub use student::{Student, StudentInput};
pub use user::{Role, User, UserInput};

/// Direction of a bus event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Student gets on the bus.
    Boarding,
    /// Student gets off the bus.
    Disembarking,
}

impl Direction {
    /// Value of the `isBoarding` flag on a daily plan for this direction.
    #[must_use]
    pub fn is_boarding(self) -> bool {
        matches!(self, Self::Boarding)
    }

    /// Direction described by a plan's `isBoarding` flag.
    #[must_use]
    pub fn from_is_boarding(is_boarding: bool) -> Self {
        if is_boarding {
            Self::Boarding
        } else {
            Self::Disembarking
        }
    }

    /// Path segment of the record endpoints (`boarding` or `disembarking`).
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Boarding => "boarding",
            Self::Disembarking => "disembarking",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boarding => write!(f, "boarding"),
            Self::Disembarking => write!(f, "disembarking"),
        }
    }
}

/// Entities that can be soft enabled and disabled.
pub trait Activatable {
    /// Whether the entity is currently active.
    fn is_active(&self) -> bool;
}

/// Validation applied to form input before it is sent.
pub trait Validate {
    /// Check every field, returning the first problem found.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the offending field.
    fn validate(&self) -> Result<()>;
}

/// A value a listing can be sorted by.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// Integer column.
    Int(i64),
    /// Floating point column.
    Float(f64),
    /// Text column, compared case-insensitively.
    Text(String),
    /// Missing value; sorts last.
    Missing,
}

impl SortValue {
    /// Text value, lowercased for case-insensitive ordering.
    #[must_use]
    pub fn text(value: &str) -> Self {
        Self::Text(value.to_lowercase())
    }

    /// Optional text value.
    #[must_use]
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Missing, Self::text)
    }

    /// Optional integer value.
    #[must_use]
    pub fn opt_int(value: Option<i64>) -> Self {
        value.map_or(Self::Missing, Self::Int)
    }

    /// Total order used by listings. Missing values sort after everything.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Missing, Self::Missing) => Ordering::Equal,
            (Self::Missing, _) => Ordering::Greater,
            (_, Self::Missing) => Ordering::Less,
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Float(_) => 1,
            Self::Text(_) => 2,
            Self::Missing => 3,
        }
    }
}

/// A REST resource managed through the generic CRUD endpoints.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + fmt::Debug {
    /// Collection path under `/api`, e.g. `students`.
    const PATH: &'static str;
    /// Human-readable singular name.
    const NAME: &'static str;
    /// Column headers for table output.
    const COLUMNS: &'static [&'static str];

    /// Body sent on create and update.
    type Input: Serialize + DeserializeOwned + Validate + Send + Sync + fmt::Debug;

    /// Server-assigned id.
    fn id(&self) -> i64;

    /// Fields matched by the free-text search filter.
    fn search_fields(&self) -> Vec<&str>;

    /// Value for a named sort key; `None` if the key is unknown.
    fn sort_value(&self, key: &str) -> Option<SortValue>;

    /// Table row matching [`Resource::COLUMNS`].
    fn row(&self) -> Vec<String>;
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "is required"));
    }
    Ok(())
}

pub(crate) fn check_email(field: &'static str, value: Option<&str>) -> Result<()> {
    match value {
        Some(email) if !email.is_empty() => {
            let mut parts = email.splitn(2, '@');
            let local = parts.next().unwrap_or_default();
            let domain = parts.next().unwrap_or_default();
            if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
                return Err(Error::validation(field, format!("'{email}' is not an email address")));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

pub(crate) fn opt_cell<T: ToString>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_else(|| "-".to_string())
}

pub(crate) fn active_cell(active: bool) -> String {
    if active { "yes" } else { "no" }.to_string()
}
