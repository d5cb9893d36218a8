//! CRUD endpoints for the managed resources, route stops, daily plans and
//! boarding/disembarking records.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::ApiClient;
use crate::error::{Error, Result};
use crate::models::{
    move_stop, Activatable, Bus, DailyPlan, Direction, EventRecord, NewRecord, Resource,
    RouteStop, RouteStopInput, Student, Validate,
};

impl ApiClient {
    /// Every entity of `R`, active or not.
    ///
    /// # Errors
    ///
    /// Returns the mapped API error.
    pub async fn list<R: Resource>(&self) -> Result<Vec<R>> {
        self.get(&[R::PATH]).await
    }

    /// One entity of `R` by id.
    ///
    /// # Errors
    ///
    /// Returns the mapped API error; 404 when the id does not exist.
    pub async fn fetch<R: Resource>(&self, id: i64) -> Result<R> {
        self.get(&[R::PATH, &id.to_string()]).await
    }

    /// Validate `input` and create a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before sending, or the mapped API error.
    pub async fn create<R: Resource>(&self, input: &R::Input) -> Result<R> {
        input.validate()?;
        let created: R = self.post(&[R::PATH], input).await?;
        info!("Created {} {}", R::NAME, created.id());
        Ok(created)
    }

    /// Validate `input` and replace entity `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before sending, or the mapped API error.
    pub async fn update<R: Resource>(&self, id: i64, input: &R::Input) -> Result<R> {
        input.validate()?;
        let updated: R = self.put(&[R::PATH, &id.to_string()], input).await?;
        info!("Updated {} {}", R::NAME, id);
        Ok(updated)
    }

    /// Apply `changes` (wire field names) on top of the current entity and
    /// send the merged body as an update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the merged body is not a valid input, or
    /// any error from [`Self::update`].
    pub async fn patch<R: Resource>(&self, id: i64, changes: Map<String, Value>) -> Result<R> {
        let current: R = self.fetch(id).await?;
        let input = merge_input::<R>(&current, changes)?;
        self.update::<R>(id, &input).await
    }

    /// Soft enable or disable entity `id` by updating its `isActive` flag.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::patch`].
    pub async fn set_active<R>(&self, id: i64, active: bool) -> Result<R>
    where
        R: Resource + Activatable,
    {
        let mut changes = Map::new();
        changes.insert("isActive".to_string(), Value::Bool(active));
        self.patch::<R>(id, changes).await
    }

    /// Delete entity `id`.
    ///
    /// # Errors
    ///
    /// Returns the mapped API error.
    pub async fn remove<R: Resource>(&self, id: i64) -> Result<()> {
        self.delete(&[R::PATH, &id.to_string()]).await?;
        info!("Deleted {} {}", R::NAME, id);
        Ok(())
    }

    /// Ordered stops of a route.
    ///
    /// # Errors
    ///
    /// Returns the mapped API error.
    pub async fn route_stops(&self, route_id: i64) -> Result<Vec<RouteStop>> {
        let mut stops: Vec<RouteStop> = self
            .get(&["routes", &route_id.to_string(), "stops"])
            .await?;
        stops.sort_by_key(|s| s.order);
        Ok(stops)
    }

    /// Replace the ordered stop list of a route.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStopOrder`] if orders are not `1..=n`, or the
    /// mapped API error.
    pub async fn replace_route_stops(
        &self,
        route_id: i64,
        stops: &[RouteStopInput],
    ) -> Result<Vec<RouteStop>> {
        for (expected, stop) in (1u32..).zip(stops) {
            if stop.order != expected {
                return Err(Error::InvalidStopOrder {
                    message: format!(
                        "stop {} has order {}, expected {expected}",
                        stop.stop_id, stop.order
                    ),
                });
            }
        }
        let updated = self
            .put(&["routes", &route_id.to_string(), "stops"], stops)
            .await?;
        info!(route_id, stops = stops.len(), "Replaced route stops");
        Ok(updated)
    }

    /// Move `stop_id` to the 1-based `position` on a route and save the
    /// renumbered list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStopOrder`] if the stop is not on the route or
    /// the position is out of range, or the mapped API error.
    pub async fn reorder_stops(
        &self,
        route_id: i64,
        stop_id: i64,
        position: usize,
    ) -> Result<Vec<RouteStop>> {
        let mut stops = self.route_stops(route_id).await?;
        move_stop(&mut stops, stop_id, position)?;
        let body: Vec<RouteStopInput> = stops.iter().map(RouteStopInput::from).collect();
        debug!(route_id, stop_id, position, "Reordering route stops");
        self.replace_route_stops(route_id, &body).await
    }

    /// Daily plans for `date`.
    ///
    /// # Errors
    ///
    /// Returns the mapped API error.
    pub async fn plans_for(&self, date: NaiveDate) -> Result<Vec<DailyPlan>> {
        self.get(&["planning", "date", &date.to_string()]).await
    }

    /// Student owning `code`, or `None` when no student matches.
    ///
    /// # Errors
    ///
    /// Returns any API error other than 404.
    pub async fn student_with_qr(&self, code: &str) -> Result<Option<Student>> {
        debug!(code, "Resolving QR code");
        self.get_optional(&["students", "qr", code]).await
    }

    /// The active bus assigned to `driver_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns the mapped API error.
    pub async fn bus_for_driver(&self, driver_id: i64) -> Result<Option<Bus>> {
        let buses: Vec<Bus> = self.list().await?;
        Ok(crate::models::assigned_bus(&buses, driver_id).cloned())
    }

    /// Every record of `direction`.
    ///
    /// # Errors
    ///
    /// Returns the mapped API error.
    pub async fn records(&self, direction: Direction) -> Result<Vec<EventRecord>> {
        self.get(&[direction.path()]).await
    }

    /// Records of `direction` on `date`.
    ///
    /// # Errors
    ///
    /// Returns the mapped API error.
    pub async fn records_for(&self, direction: Direction, date: NaiveDate) -> Result<Vec<EventRecord>> {
        self.get(&[direction.path(), "date", &date.to_string()])
            .await
    }

    /// Create a record of `direction`, tagged with `idempotency_key`.
    ///
    /// # Errors
    ///
    /// Returns the mapped API error; 409 when the server already holds it.
    pub async fn record_event(
        &self,
        direction: Direction,
        record: &NewRecord,
        idempotency_key: &str,
    ) -> Result<EventRecord> {
        self.post_idempotent(&record_segments(direction), record, idempotency_key)
            .await
    }
}

fn record_segments(direction: Direction) -> [&'static str; 2] {
    match direction {
        Direction::Boarding => ["boarding", "board"],
        Direction::Disembarking => ["disembarking", "disembark"],
    }
}

/// Serialize `current`, overlay `changes`, and read the result back as an
/// input body. Unknown read-only fields (`id`, timestamps) are dropped.
///
/// # Errors
///
/// Returns [`Error::Json`] if the merged object is not a valid input.
pub fn merge_input<R: Resource>(current: &R, changes: Map<String, Value>) -> Result<R::Input> {
    let mut value = serde_json::to_value(current)?;
    match &mut value {
        Value::Object(fields) => fields.extend(changes),
        _ => {
            return Err(Error::internal(format!(
                "{} did not serialize to an object",
                R::NAME
            )))
        }
    }
    Ok(serde_json::from_value(value)?)
}
