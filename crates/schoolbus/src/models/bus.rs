use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    active_cell, default_true, opt_cell, require, Activatable, Resource, SortValue, Validate,
};
use crate::error::{Error, Result};

/// A bus in the fleet, optionally assigned to a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bus {
    pub id: i64,
    pub plate_number: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub capacity: u32,
    /// Assigned driver's user id.
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create/update body for a bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusInput {
    pub plate_number: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub capacity: u32,
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for BusInput {
    fn validate(&self) -> Result<()> {
        require("plateNumber", &self.plate_number)?;
        if self.capacity == 0 {
            return Err(Error::validation("capacity", "must be greater than 0"));
        }
        Ok(())
    }
}

/// The active bus assigned to `driver_id`, if any.
#[must_use]
pub fn assigned_bus(buses: &[Bus], driver_id: i64) -> Option<&Bus> {
    buses
        .iter()
        .find(|bus| bus.is_active && bus.driver_id == Some(driver_id))
}

impl Activatable for Bus {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Resource for Bus {
    const PATH: &'static str = "buses";
    const NAME: &'static str = "bus";
    const COLUMNS: &'static [&'static str] =
        &["ID", "Plate", "Brand", "Model", "Capacity", "Driver", "Active"];

    type Input = BusInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.plate_number.as_str()];
        fields.extend(self.brand.as_deref());
        fields.extend(self.model.as_deref());
        fields
    }

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        match key {
            "id" => Some(SortValue::Int(self.id)),
            "plate" | "plateNumber" => Some(SortValue::text(&self.plate_number)),
            "capacity" => Some(SortValue::Int(i64::from(self.capacity))),
            "driver" | "driverId" => Some(SortValue::opt_int(self.driver_id)),
            _ => None,
        }
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.plate_number.clone(),
            opt_cell(self.brand.as_ref()),
            opt_cell(self.model.as_ref()),
            self.capacity.to_string(),
            opt_cell(self.driver_id.as_ref()),
            active_cell(self.is_active),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(id: i64, driver_id: Option<i64>, is_active: bool) -> Bus {
        Bus {
            id,
            plate_number: format!("BUS-{id}"),
            brand: None,
            model: None,
            capacity: 40,
            driver_id,
            is_active,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_assigned_bus_skips_inactive() {
        let buses = vec![bus(1, Some(7), false), bus(2, Some(7), true), bus(3, None, true)];
        assert_eq!(assigned_bus(&buses, 7).map(|b| b.id), Some(2));
        assert!(assigned_bus(&buses, 8).is_none());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let input: BusInput =
            serde_json::from_str(r#"{"plateNumber": "ABC-123", "capacity": 0}"#).unwrap();
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_sort_by_capacity() {
        assert_eq!(
            bus(1, None, true).sort_value("capacity"),
            Some(SortValue::Int(40))
        );
    }
}
