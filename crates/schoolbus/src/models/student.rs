use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    active_cell, check_email, default_true, opt_cell, require, Activatable, Resource, SortValue,
    Validate,
};
use crate::error::{Error, Result};

/// A student who rides the bus.
///
/// `qr_code` is the identifier printed on the student's card and scanned by
/// drivers; the backend keeps it unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub qr_code: String,
    #[serde(default)]
    pub school_id: Option<i64>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub parent_phone: Option<String>,
    #[serde(default)]
    pub parent_email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Student {
    /// "First Last".
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Create/update body for a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    pub first_name: String,
    pub last_name: String,
    pub qr_code: String,
    #[serde(default)]
    pub school_id: Option<i64>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub parent_phone: Option<String>,
    #[serde(default)]
    pub parent_email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for StudentInput {
    fn validate(&self) -> Result<()> {
        require("firstName", &self.first_name)?;
        require("lastName", &self.last_name)?;
        require("qrCode", &self.qr_code)?;
        if self.qr_code.chars().any(char::is_whitespace) {
            return Err(Error::validation("qrCode", "must not contain whitespace"));
        }
        check_email("parentEmail", self.parent_email.as_deref())
    }
}

impl Activatable for Student {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Resource for Student {
    const PATH: &'static str = "students";
    const NAME: &'static str = "student";
    const COLUMNS: &'static [&'static str] =
        &["ID", "Name", "QR code", "School", "Grade", "Parent", "Active"];

    type Input = StudentInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.qr_code.as_str(),
        ];
        fields.extend(self.grade.as_deref());
        fields.extend(self.parent_name.as_deref());
        fields
    }

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        match key {
            "id" => Some(SortValue::Int(self.id)),
            "name" | "lastName" => Some(SortValue::text(&format!(
                "{} {}",
                self.last_name, self.first_name
            ))),
            "firstName" => Some(SortValue::text(&self.first_name)),
            "qrCode" => Some(SortValue::text(&self.qr_code)),
            "grade" => Some(SortValue::opt_text(self.grade.as_deref())),
            "school" | "schoolId" => Some(SortValue::opt_int(self.school_id)),
            _ => None,
        }
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.full_name(),
            self.qr_code.clone(),
            opt_cell(self.school_id.as_ref()),
            opt_cell(self.grade.as_ref()),
            opt_cell(self.parent_name.as_ref()),
            active_cell(self.is_active),
        ]
    }
}
