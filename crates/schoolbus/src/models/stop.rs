use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{active_cell, default_true, require, Activatable, Resource, SortValue, Validate};
use crate::error::{Error, Result};

/// A pick-up/drop-off point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create/update body for a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopInput {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for StopInput {
    fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(Error::validation("latitude", "must be between -90 and 90"));
                }
                if !(-180.0..=180.0).contains(&lng) {
                    return Err(Error::validation(
                        "longitude",
                        "must be between -180 and 180",
                    ));
                }
                Ok(())
            }
            (None, None) => Ok(()),
            (Some(_), None) => Err(Error::validation(
                "longitude",
                "is required when latitude is set",
            )),
            (None, Some(_)) => Err(Error::validation(
                "latitude",
                "is required when longitude is set",
            )),
        }
    }
}

impl Activatable for Stop {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Resource for Stop {
    const PATH: &'static str = "stops";
    const NAME: &'static str = "stop";
    const COLUMNS: &'static [&'static str] = &["ID", "Name", "Address", "Coordinates", "Active"];

    type Input = StopInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.address.as_deref());
        fields
    }

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        match key {
            "id" => Some(SortValue::Int(self.id)),
            "name" => Some(SortValue::text(&self.name)),
            "address" => Some(SortValue::opt_text(self.address.as_deref())),
            "latitude" => Some(self.latitude.map_or(SortValue::Missing, SortValue::Float)),
            _ => None,
        }
    }

    fn row(&self) -> Vec<String> {
        let coordinates = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => format!("{lat:.5}, {lng:.5}"),
            _ => "-".to_string(),
        };
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.address.clone().unwrap_or_else(|| "-".to_string()),
            coordinates,
            active_cell(self.is_active),
        ]
    }
}
