use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    active_cell, check_email, default_true, opt_cell, require, Activatable, Resource, SortValue,
    Validate,
};
use crate::error::Result;

/// Role of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages schools, fleet and plans.
    Admin,
    /// Drives a bus and records scans.
    Driver,
    /// Views their child's status.
    Parent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Driver => write!(f, "driver"),
            Self::Parent => write!(f, "parent"),
        }
    }
}

/// An administrator, driver or parent account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Create/update body for a user. `password` is only sent when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for UserInput {
    fn validate(&self) -> Result<()> {
        require("firstName", &self.first_name)?;
        require("lastName", &self.last_name)?;
        require("email", &self.email)?;
        check_email("email", Some(&self.email))?;
        if let Some(password) = &self.password {
            if password.len() < 6 {
                return Err(crate::Error::validation(
                    "password",
                    "must be at least 6 characters",
                ));
            }
        }
        Ok(())
    }
}

impl Activatable for User {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Resource for User {
    const PATH: &'static str = "users";
    const NAME: &'static str = "user";
    const COLUMNS: &'static [&'static str] = &["ID", "Name", "Email", "Role", "Phone", "Active"];

    type Input = UserInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.email.as_str(),
            match self.role {
                Role::Admin => "admin",
                Role::Driver => "driver",
                Role::Parent => "parent",
            },
        ]
    }

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        match key {
            "id" => Some(SortValue::Int(self.id)),
            "name" => Some(SortValue::text(&format!(
                "{} {}",
                self.last_name, self.first_name
            ))),
            "email" => Some(SortValue::text(&self.email)),
            "role" => Some(SortValue::text(&self.role.to_string())),
            _ => None,
        }
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.full_name(),
            self.email.clone(),
            self.role.to_string(),
            opt_cell(self.phone.as_ref()),
            active_cell(self.is_active),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        let user: User = serde_json::from_str(
            r#"{"id": 4, "firstName": "Luis", "lastName": "Mora", "email": "luis@bus.org", "role": "driver"}"#,
        )
        .unwrap();
        assert_eq!(user.role, Role::Driver);
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "admin");
    }

    #[test]
    fn test_search_fields_include_role() {
        let user: User = serde_json::from_str(
            r#"{"id": 4, "firstName": "Luis", "lastName": "Mora", "email": "luis@bus.org", "role": "driver"}"#,
        )
        .unwrap();
        assert!(user.search_fields().contains(&"driver"));
    }

    #[test]
    fn test_password_omitted_when_none() {
        let input = UserInput {
            first_name: "Luis".to_string(),
            last_name: "Mora".to_string(),
            email: "luis@bus.org".to_string(),
            role: Role::Driver,
            phone: None,
            password: None,
            is_active: true,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("password").is_none());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_short_password_rejected() {
        let input = UserInput {
            first_name: "Luis".to_string(),
            last_name: "Mora".to_string(),
            email: "luis@bus.org".to_string(),
            role: Role::Driver,
            phone: None,
            password: Some("123".to_string()),
            is_active: true,
        };
        assert!(input.validate().is_err());
    }
}
