//! Parent view of a child's day.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::{latest_for_student, Direction, EventRecord, Student};
use crate::recorder::BoardingBackend;
use crate::session::Session;

/// Where a child is, judged from today's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChildStatus {
    NotBoarded,
    OnBus { since: NaiveDateTime, bus_id: i64 },
    Disembarked { at: NaiveDateTime },
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotBoarded => write!(f, "not boarded yet"),
            Self::OnBus { since, bus_id } => {
                write!(f, "on bus {bus_id} since {}", since.format("%H:%M"))
            }
            Self::Disembarked { at } => write!(f, "dropped off at {}", at.format("%H:%M")),
        }
    }
}

/// Latest event wins. A disembarking at or after the latest boarding means
/// the child is off the bus.
#[must_use]
pub fn derive_status(
    student_id: i64,
    boardings: &[EventRecord],
    disembarkings: &[EventRecord],
) -> ChildStatus {
    let boarded = latest_for_student(boardings, student_id);
    let left = latest_for_student(disembarkings, student_id);

    match (boarded, left) {
        (None, None) => ChildStatus::NotBoarded,
        (Some(b), Some(d)) if d.recorded_at() < b.recorded_at() => ChildStatus::OnBus {
            since: b.recorded_at(),
            bus_id: b.bus_id,
        },
        (_, Some(d)) => ChildStatus::Disembarked { at: d.recorded_at() },
        (Some(b), None) => ChildStatus::OnBus {
            since: b.recorded_at(),
            bus_id: b.bus_id,
        },
    }
}

/// A child and their status on a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildReport {
    pub student: Student,
    pub date: NaiveDate,
    pub status: ChildStatus,
}

/// The child a status request is about.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildLookup {
    pub student: Student,
    /// Parent session opened by this lookup. `None` when the current
    /// session was used as is.
    pub opened: Option<Session>,
}

/// Decide which child to report on.
///
/// Staff sessions look the code up directly and are left in place. Without
/// a staff session a code opens a parent session; without a code the
/// current guardian session names the child.
///
/// # Errors
///
/// Returns [`Error::NotLoggedIn`] with neither a session nor a code,
/// [`Error::WrongRole`] for staff without a code, a 404 API error for an
/// unknown code, or the login error.
pub async fn resolve_child(
    api: &ApiClient,
    current: Option<&Session>,
    qr_code: Option<&str>,
) -> Result<ChildLookup> {
    let staff = current.filter(|s| s.user().is_some());
    match (qr_code.map(str::trim), staff) {
        (Some(code), Some(_)) => {
            let student = api
                .student_with_qr(code)
                .await?
                .ok_or_else(|| Error::api(404, format!("no student with QR code {code}")))?;
            debug!(student_id = student.id, "Resolved child with staff session");
            Ok(ChildLookup {
                student,
                opened: None,
            })
        }
        (Some(code), None) => {
            let session = api.parent_login(code).await?;
            let student = session
                .student()
                .cloned()
                .ok_or_else(|| Error::internal("parent login returned a staff session"))?;
            Ok(ChildLookup {
                student,
                opened: Some(session),
            })
        }
        (None, Some(session)) => Err(Error::WrongRole {
            role: session.role().to_string(),
            action: "check a child without a QR code",
        }),
        (None, None) => {
            let student = current
                .and_then(Session::student)
                .cloned()
                .ok_or(Error::NotLoggedIn)?;
            Ok(ChildLookup {
                student,
                opened: None,
            })
        }
    }
}

/// Fetch `date`'s records and derive the status of `student`.
///
/// # Errors
///
/// Returns the backend error if either record list cannot be fetched.
pub async fn child_status<B: BoardingBackend + ?Sized>(
    backend: &B,
    student: Student,
    date: NaiveDate,
) -> Result<ChildReport> {
    let (boardings, disembarkings) = tokio::try_join!(
        backend.records_on(Direction::Boarding, date),
        backend.records_on(Direction::Disembarking, date),
    )?;
    let status = derive_status(student.id, &boardings, &disembarkings);
    debug!(student_id = student.id, %status, "Derived child status");
    Ok(ChildReport {
        student,
        date,
        status,
    })
}
