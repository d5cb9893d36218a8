use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    active_cell, default_true, opt_cell, require, Activatable, Resource, SortValue, Stop, Validate,
};
use crate::error::{Error, Result};

/// A named route, optionally served by an assigned bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bus_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stops: Vec<RouteStop>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trips: Vec<Trip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create/update body for a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bus_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for RouteInput {
    fn validate(&self) -> Result<()> {
        require("name", &self.name)
    }
}

/// An ordered waypoint of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<i64>,
    pub stop_id: i64,
    /// 1-based position along the route.
    pub order: u32,
    #[serde(default)]
    pub estimated_arrival_time: Option<NaiveTime>,
    /// Embedded stop, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Stop>,
}

/// Body element of `PUT /api/routes/:id/stops`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStopInput {
    pub stop_id: i64,
    pub order: u32,
    #[serde(default)]
    pub estimated_arrival_time: Option<NaiveTime>,
}

impl From<&RouteStop> for RouteStopInput {
    fn from(stop: &RouteStop) -> Self {
        Self {
            stop_id: stop.stop_id,
            order: stop.order,
            estimated_arrival_time: stop.estimated_arrival_time,
        }
    }
}

/// Sort stops by their current `order` and renumber them 1..=n.
pub fn normalize_stop_order(stops: &mut [RouteStop]) {
    stops.sort_by_key(|s| s.order);
    for (position, stop) in (1u32..).zip(stops.iter_mut()) {
        stop.order = position;
    }
}

/// Move `stop_id` to the 1-based `position` and renumber the sequence.
///
/// # Errors
///
/// Returns [`Error::InvalidStopOrder`] if the stop is not on the route or
/// the position is outside `1..=stops.len()`.
pub fn move_stop(stops: &mut Vec<RouteStop>, stop_id: i64, position: usize) -> Result<()> {
    normalize_stop_order(stops);
    if position == 0 || position > stops.len() {
        return Err(Error::InvalidStopOrder {
            message: format!(
                "position {position} is outside 1..={} for this route",
                stops.len()
            ),
        });
    }
    let from = stops
        .iter()
        .position(|s| s.stop_id == stop_id)
        .ok_or_else(|| Error::InvalidStopOrder {
            message: format!("stop {stop_id} is not on this route"),
        })?;
    let moved = stops.remove(from);
    stops.insert(position - 1, moved);
    for (order, stop) in (1u32..).zip(stops.iter_mut()) {
        stop.order = order;
    }
    Ok(())
}

impl Activatable for Route {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Resource for Route {
    const PATH: &'static str = "routes";
    const NAME: &'static str = "route";
    const COLUMNS: &'static [&'static str] = &["ID", "Name", "Description", "Bus", "Active"];

    type Input = RouteInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.description.as_deref());
        fields
    }

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        match key {
            "id" => Some(SortValue::Int(self.id)),
            "name" => Some(SortValue::text(&self.name)),
            "bus" | "busId" => Some(SortValue::opt_int(self.bus_id)),
            _ => None,
        }
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            opt_cell(self.description.as_ref()),
            opt_cell(self.bus_id.as_ref()),
            active_cell(self.is_active),
        ]
    }
}

/// A scheduled departure of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: i64,
    pub route_id: i64,
    pub departure_time: NaiveTime,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create/update body for a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripInput {
    pub route_id: i64,
    pub departure_time: NaiveTime,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for TripInput {
    fn validate(&self) -> Result<()> {
        if self.route_id <= 0 {
            return Err(Error::validation("routeId", "must reference a route"));
        }
        Ok(())
    }
}

impl Activatable for Trip {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Resource for Trip {
    const PATH: &'static str = "trips";
    const NAME: &'static str = "trip";
    const COLUMNS: &'static [&'static str] = &["ID", "Route", "Departure", "Active"];

    type Input = TripInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        Vec::new()
    }

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        match key {
            "id" => Some(SortValue::Int(self.id)),
            "route" | "routeId" => Some(SortValue::Int(self.route_id)),
            "departure" | "departureTime" => {
                Some(SortValue::text(&self.departure_time.format("%H:%M:%S").to_string()))
            }
            _ => None,
        }
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.route_id.to_string(),
            self.departure_time.format("%H:%M").to_string(),
            active_cell(self.is_active),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(orders: &[(i64, u32)]) -> Vec<RouteStop> {
        orders
            .iter()
            .map(|&(stop_id, order)| RouteStop {
                id: None,
                route_id: Some(1),
                stop_id,
                order,
                estimated_arrival_time: None,
                stop: None,
            })
            .collect()
    }

    fn ids(stops: &[RouteStop]) -> Vec<(i64, u32)> {
        stops.iter().map(|s| (s.stop_id, s.order)).collect()
    }

    #[test]
    fn test_normalize_closes_gaps() {
        let mut list = stops(&[(30, 9), (10, 2), (20, 5)]);
        normalize_stop_order(&mut list);
        assert_eq!(ids(&list), vec![(10, 1), (20, 2), (30, 3)]);
    }

    #[test]
    fn test_move_stop_forward_and_back() {
        let mut list = stops(&[(10, 1), (20, 2), (30, 3), (40, 4)]);
        move_stop(&mut list, 10, 3).unwrap();
        assert_eq!(ids(&list), vec![(20, 1), (30, 2), (10, 3), (40, 4)]);

        move_stop(&mut list, 40, 1).unwrap();
        assert_eq!(ids(&list), vec![(40, 1), (20, 2), (30, 3), (10, 4)]);
    }

    #[test]
    fn test_move_stop_errors() {
        let mut list = stops(&[(10, 1), (20, 2)]);
        assert!(move_stop(&mut list, 99, 1).is_err());
        assert!(move_stop(&mut list, 10, 0).is_err());
        assert!(move_stop(&mut list, 10, 3).is_err());
        assert_eq!(ids(&list), vec![(10, 1), (20, 2)]);
    }

    #[test]
    fn test_trip_time_wire_format() {
        let trip: Trip = serde_json::from_str(
            r#"{"id": 5, "routeId": 2, "departureTime": "06:45:00"}"#,
        )
        .unwrap();
        assert_eq!(trip.row()[2], "06:45");
        assert_eq!(
            serde_json::to_value(&trip).unwrap()["departureTime"],
            "06:45:00"
        );
    }

    #[test]
    fn test_route_stop_embeds_stop() {
        let stop: RouteStop = serde_json::from_str(
            r#"{"stopId": 3, "order": 1, "estimatedArrivalTime": "07:10:00",
                "stop": {"id": 3, "name": "Plaza"}}"#,
        )
        .unwrap();
        assert_eq!(stop.stop.map(|s| s.name), Some("Plaza".to_string()));
        let input = RouteStopInput::from(&RouteStop {
            id: Some(1),
            route_id: Some(2),
            stop_id: 3,
            order: 1,
            estimated_arrival_time: None,
            stop: None,
        });
        assert_eq!(input.stop_id, 3);
    }
}
