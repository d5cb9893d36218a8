use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    active_cell, check_email, default_true, opt_cell, require, Activatable, Resource, SortValue,
    Validate,
};
use crate::error::Result;

/// A school served by the bus fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    /// Server-assigned id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// Office phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Office email.
    #[serde(default)]
    pub email: Option<String>,
    /// Soft enable/disable flag.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create/update body for a school.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolInput {
    /// Display name.
    pub name: String,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// Office phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Office email.
    #[serde(default)]
    pub email: Option<String>,
    /// Soft enable/disable flag.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for SchoolInput {
    fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        check_email("email", self.email.as_deref())
    }
}

impl Activatable for School {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Resource for School {
    const PATH: &'static str = "schools";
    const NAME: &'static str = "school";
    const COLUMNS: &'static [&'static str] = &["ID", "Name", "Address", "Phone", "Email", "Active"];

    type Input = SchoolInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.address.as_deref());
        fields.extend(self.email.as_deref());
        fields
    }

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        match key {
            "id" => Some(SortValue::Int(self.id)),
            "name" => Some(SortValue::text(&self.name)),
            "address" => Some(SortValue::opt_text(self.address.as_deref())),
            _ => None,
        }
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            opt_cell(self.address.as_ref()),
            opt_cell(self.phone.as_ref()),
            opt_cell(self.email.as_ref()),
            active_cell(self.is_active),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "id": 3,
            "name": "Lincoln Elementary",
            "address": "12 Elm St",
            "isActive": false,
            "createdAt": "2024-09-01T08:00:00Z"
        }"#;
        let school: School = serde_json::from_str(json).unwrap();
        assert_eq!(school.id, 3);
        assert!(!school.is_active);
        assert!(school.created_at.is_some());
        assert!(school.phone.is_none());
    }

    #[test]
    fn test_is_active_defaults_to_true() {
        let school: School = serde_json::from_str(r#"{"id": 1, "name": "A"}"#).unwrap();
        assert!(school.is_active());
    }

    #[test]
    fn test_input_validation() {
        let mut input: SchoolInput = serde_json::from_str(r#"{"name": "Lincoln"}"#).unwrap();
        assert!(input.validate().is_ok());

        input.email = Some("not-an-email".to_string());
        assert!(input.validate().is_err());

        input.email = None;
        input.name = String::new();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_row_matches_columns() {
        let school: School = serde_json::from_str(r#"{"id": 1, "name": "A"}"#).unwrap();
        assert_eq!(school.row().len(), School::COLUMNS.len());
        assert_eq!(school.row()[2], "-");
    }
}
