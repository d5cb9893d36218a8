use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{opt_cell, Direction, Resource, SortValue, Student, Validate};
use crate::error::{Error, Result};

/// Expectation that a student boards or leaves a given trip on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlan {
    pub id: i64,
    pub plan_date: NaiveDate,
    pub student_id: i64,
    pub trip_id: i64,
    pub bus_id: i64,
    #[serde(default)]
    pub stop_id: Option<i64>,
    /// `true` for boarding, `false` for disembarking.
    pub is_boarding: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student: Option<Student>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DailyPlan {
    #[must_use]
    pub fn direction(&self) -> Direction {
        Direction::from_is_boarding(self.is_boarding)
    }

    /// Whether this plan covers `student_id` travelling in `direction`.
    #[must_use]
    pub fn covers(&self, student_id: i64, direction: Direction) -> bool {
        self.student_id == student_id && self.is_boarding == direction.is_boarding()
    }
}

/// Create/update body for a daily plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlanInput {
    pub plan_date: NaiveDate,
    pub student_id: i64,
    pub trip_id: i64,
    pub bus_id: i64,
    #[serde(default)]
    pub stop_id: Option<i64>,
    pub is_boarding: bool,
}

impl Validate for DailyPlanInput {
    fn validate(&self) -> Result<()> {
        for (field, id) in [
            ("studentId", self.student_id),
            ("tripId", self.trip_id),
            ("busId", self.bus_id),
        ] {
            if id <= 0 {
                return Err(Error::validation(field, "must reference an existing entity"));
            }
        }
        Ok(())
    }
}

impl Resource for DailyPlan {
    const PATH: &'static str = "planning";
    const NAME: &'static str = "plan";
    const COLUMNS: &'static [&'static str] =
        &["ID", "Date", "Student", "Trip", "Bus", "Stop", "Direction"];

    type Input = DailyPlanInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        self.student
            .as_ref()
            .map(|s| vec![s.first_name.as_str(), s.last_name.as_str(), s.qr_code.as_str()])
            .unwrap_or_default()
    }

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        match key {
            "id" => Some(SortValue::Int(self.id)),
            "date" | "planDate" => Some(SortValue::text(&self.plan_date.to_string())),
            "student" | "studentId" => Some(SortValue::Int(self.student_id)),
            "trip" | "tripId" => Some(SortValue::Int(self.trip_id)),
            "bus" | "busId" => Some(SortValue::Int(self.bus_id)),
            _ => None,
        }
    }

    fn row(&self) -> Vec<String> {
        let student = self
            .student
            .as_ref()
            .map_or_else(|| self.student_id.to_string(), Student::full_name);
        vec![
            self.id.to_string(),
            self.plan_date.to_string(),
            student,
            self.trip_id.to_string(),
            self.bus_id.to_string(),
            opt_cell(self.stop_id.as_ref()),
            self.direction().to_string(),
        ]
    }
}

/// First plan covering `student_id` in `direction`.
#[must_use]
pub fn find_plan(plans: &[DailyPlan], student_id: i64, direction: Direction) -> Option<&DailyPlan> {
    plans.iter().find(|plan| plan.covers(student_id, direction))
}
