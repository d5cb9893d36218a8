//! Backend seam for the recorder.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::{DailyPlan, Direction, EventRecord, NewRecord, Student};

/// The backend calls the boarding workflow depends on.
#[async_trait]
pub trait BoardingBackend: Send + Sync {
    /// Student owning `code`, `None` when nobody matches.
    async fn student_by_qr(&self, code: &str) -> Result<Option<Student>>;

    /// Records of `direction` on `date`.
    async fn records_on(&self, direction: Direction, date: NaiveDate) -> Result<Vec<EventRecord>>;

    /// Daily plans for `date`.
    async fn plans_on(&self, date: NaiveDate) -> Result<Vec<DailyPlan>>;

    /// Create a record. A server that already holds `idempotency_key`
    /// answers 409.
    async fn create_record(
        &self,
        direction: Direction,
        record: &NewRecord,
        idempotency_key: &str,
    ) -> Result<EventRecord>;
}

#[async_trait]
impl BoardingBackend for ApiClient {
    async fn student_by_qr(&self, code: &str) -> Result<Option<Student>> {
        self.student_with_qr(code).await
    }

    async fn records_on(&self, direction: Direction, date: NaiveDate) -> Result<Vec<EventRecord>> {
        self.records_for(direction, date).await
    }

    async fn plans_on(&self, date: NaiveDate) -> Result<Vec<DailyPlan>> {
        self.plans_for(date).await
    }

    async fn create_record(
        &self,
        direction: Direction,
        record: &NewRecord,
        idempotency_key: &str,
    ) -> Result<EventRecord> {
        self.record_event(direction, record, idempotency_key).await
    }
}

#[async_trait]
impl<B: BoardingBackend + ?Sized> BoardingBackend for &B {
    async fn student_by_qr(&self, code: &str) -> Result<Option<Student>> {
        (**self).student_by_qr(code).await
    }

    async fn records_on(&self, direction: Direction, date: NaiveDate) -> Result<Vec<EventRecord>> {
        (**self).records_on(direction, date).await
    }

    async fn plans_on(&self, date: NaiveDate) -> Result<Vec<DailyPlan>> {
        (**self).plans_on(date).await
    }

    async fn create_record(
        &self,
        direction: Direction,
        record: &NewRecord,
        idempotency_key: &str,
    ) -> Result<EventRecord> {
        (**self)
            .create_record(direction, record, idempotency_key)
            .await
    }
}
