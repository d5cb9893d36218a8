use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::Student;

/// A scan-confirmed boarding or disembarking event.
///
/// Both directions share one shape; the endpoint a record came from
/// determines its direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: i64,
    pub student_id: i64,
    pub trip_id: i64,
    pub bus_id: i64,
    pub driver_id: i64,
    pub record_date: NaiveDate,
    pub record_time: NaiveTime,
    /// A matching daily plan existed when the event was recorded.
    #[serde(default)]
    pub was_planned: bool,
    #[serde(default)]
    pub daily_plan_id: Option<i64>,
    #[serde(default)]
    pub stop_id: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student: Option<Student>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Record returned by the `boarding` endpoints.
pub type BoardingRecord = EventRecord;

/// Record returned by the `disembarking` endpoints.
pub type DisembarkingRecord = EventRecord;

impl EventRecord {
    /// Local date and time of the event.
    #[must_use]
    pub fn recorded_at(&self) -> NaiveDateTime {
        self.record_date.and_time(self.record_time)
    }

    /// Display name of the student, falling back to the id.
    #[must_use]
    pub fn student_label(&self) -> String {
        self.student
            .as_ref()
            .map_or_else(|| format!("#{}", self.student_id), Student::full_name)
    }
}

/// Body of `POST /api/boarding/board` and `POST /api/disembarking/disembark`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub student_id: i64,
    pub trip_id: i64,
    pub bus_id: i64,
    pub driver_id: i64,
    pub record_date: NaiveDate,
    pub record_time: NaiveTime,
    pub was_planned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_plan_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Whether any record in `records` belongs to `student_id`.
#[must_use]
pub fn contains_student(records: &[EventRecord], student_id: i64) -> bool {
    records.iter().any(|r| r.student_id == student_id)
}

/// The latest record for `student_id`, by date and time.
#[must_use]
pub fn latest_for_student(records: &[EventRecord], student_id: i64) -> Option<&EventRecord> {
    records
        .iter()
        .filter(|r| r.student_id == student_id)
        .max_by_key(|r| r.recorded_at())
}
