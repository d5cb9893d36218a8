//! Driver boarding/disembarking workflow.
//!
//! One [`Recorder`] drives one direction for one driver. Each scan cycle is
//!
//! ```text
//! Idle -> Searching -> Confirming -> Submitting -> Idle
//!             |             |
//!             +- not found  +- cancel -> Idle
//! ```
//!
//! The duplicate and plan checks run against today's record and plan lists,
//! fetched through a [`QueryCache`] that is invalidated after every submit.
//! They are advisory; every submit also carries an idempotency key so the
//! server can reject repeats.

mod backend;
mod notice;

use std::fmt;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::cache::{QueryCache, QueryKey};
use crate::error::{Error, Result};
use crate::models::{
    contains_student, find_plan, DailyPlan, Direction, EventRecord, NewRecord, Role, Student,
};
use crate::session::Session;

pub use backend::BoardingBackend;
pub use notice::{Level, Notice};

/// Where the current scan cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecorderState {
    Idle,
    Searching,
    Confirming,
    Submitting,
}

impl RecorderState {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::Confirming => "confirming",
            Self::Submitting => "submitting",
        }
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who is recording, on which bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverContext {
    pub driver_id: i64,
    pub bus_id: i64,
    /// Trip used when the student has no plan for today.
    pub trip_id: Option<i64>,
}

impl DriverContext {
    /// Resolve the driver behind `session` and their assigned bus.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongRole`] for non-driver sessions,
    /// [`Error::NoAssignedBus`] when no active bus is assigned, or an API
    /// error.
    pub async fn resolve(api: &ApiClient, session: &Session, trip_id: Option<i64>) -> Result<Self> {
        session.require_staff(Role::Driver, "record scans")?;
        let me = api.me().await?;
        let bus = api
            .bus_for_driver(me.id)
            .await?
            .ok_or(Error::NoAssignedBus { driver_id: me.id })?;
        info!(driver_id = me.id, bus = %bus.plate_number, "Driver context resolved");
        Ok(Self {
            driver_id: me.id,
            bus_id: bus.id,
            trip_id,
        })
    }
}

/// A resolved student awaiting confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingScan {
    pub student: Student,
    /// Today's plan for this student and direction, if any.
    pub plan: Option<DailyPlan>,
}

/// Idempotency key for one student, day and direction.
#[must_use]
pub fn idempotency_key(student_id: i64, date: NaiveDate, direction: Direction) -> String {
    let material = format!("{student_id}:{date}:{}", direction.path());
    blake3::hash(material.as_bytes()).to_hex().to_string()
}

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// The scan/confirm/submit state machine.
pub struct Recorder<B> {
    backend: B,
    direction: Direction,
    driver: DriverContext,
    state: RecorderState,
    pending: Option<PendingScan>,
    cache: QueryCache,
    clock: Clock,
}

impl<B> fmt::Debug for Recorder<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("direction", &self.direction)
            .field("driver", &self.driver)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<B: BoardingBackend> Recorder<B> {
    #[must_use]
    pub fn new(backend: B, direction: Direction, driver: DriverContext, cache_ttl: Duration) -> Self {
        Self {
            backend,
            direction,
            driver,
            state: RecorderState::Idle,
            pending: None,
            cache: QueryCache::new(cache_ttl),
            clock: Box::new(|| Local::now().naive_local()),
        }
    }

    /// Replace the local clock.
    #[must_use]
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn state(&self) -> RecorderState {
        self.state
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingScan> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn driver(&self) -> &DriverContext {
        &self.driver
    }

    /// Set the trip used for unplanned students.
    pub fn set_trip(&mut self, trip_id: Option<i64>) {
        self.driver.trip_id = trip_id;
    }

    fn today(&self) -> NaiveDate {
        (self.clock)().date()
    }

    fn expect_state(&self, allowed: &[RecorderState], action: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                state: self.state.name(),
                action,
            })
        }
    }

    /// Where a scan that found nothing leaves the machine.
    fn settle(&mut self) {
        self.state = if self.pending.is_some() {
            RecorderState::Confirming
        } else {
            RecorderState::Idle
        };
    }

    fn reset(&mut self) {
        self.pending = None;
        self.state = RecorderState::Idle;
    }

    async fn records_today(&mut self, direction: Direction) -> Result<Vec<EventRecord>> {
        let date = self.today();
        let key = QueryKey::new([direction.path().to_string(), "date".to_string(), date.to_string()]);
        let backend = &self.backend;
        self.cache
            .get_or_fetch(key, || backend.records_on(direction, date))
            .await
    }

    async fn plans_today(&mut self) -> Result<Vec<DailyPlan>> {
        let date = self.today();
        let key = QueryKey::new(["planning".to_string(), "date".to_string(), date.to_string()]);
        let backend = &self.backend;
        self.cache
            .get_or_fetch(key, || backend.plans_on(date))
            .await
    }

    async fn already_recorded(&mut self, student_id: i64) -> Result<bool> {
        let records = self.records_today(self.direction).await?;
        Ok(contains_student(&records, student_id))
    }

    fn duplicate_notice(&self, student: &Student) -> Notice {
        let verb = match self.direction {
            Direction::Boarding => "boarded",
            Direction::Disembarking => "disembarked",
        };
        Notice::warning(format!(
            "{} ({}) has already {verb} today",
            student.full_name(),
            student.qr_code
        ))
    }

    /// Resolve `code` and prepare it for confirmation.
    ///
    /// Blank input is ignored. A code that matches nobody leaves any
    /// pending student in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] while searching or submitting,
    /// and propagates 401s so the caller can stop. Other failures become
    /// error notices.
    pub async fn scan(&mut self, code: &str) -> Result<Vec<Notice>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(Vec::new());
        }
        self.expect_state(&[RecorderState::Idle, RecorderState::Confirming], "scan")?;

        self.state = RecorderState::Searching;
        match self.lookup(code).await {
            Ok(notices) => Ok(notices),
            Err(e) if e.is_unauthorized() => {
                self.reset();
                Err(e)
            }
            Err(e) => {
                warn!(code, error = %e, "Scan lookup failed");
                self.settle();
                Ok(vec![Notice::error(e.user_message())])
            }
        }
    }

    async fn lookup(&mut self, code: &str) -> Result<Vec<Notice>> {
        let Some(student) = self.backend.student_by_qr(code).await? else {
            debug!(code, "No student for code");
            self.settle();
            return Ok(vec![Notice::warning(format!("No student found for code {code}"))]);
        };

        if self.already_recorded(student.id).await? {
            let notice = self.duplicate_notice(&student);
            self.reset();
            return Ok(vec![notice]);
        }

        let mut notices = Vec::new();
        if !student.is_active {
            notices.push(Notice::warning(format!(
                "{} is marked inactive",
                student.full_name()
            )));
        }

        if self.direction == Direction::Disembarking {
            let boarded = self.records_today(Direction::Boarding).await?;
            if !contains_student(&boarded, student.id) {
                notices.push(Notice::warning(format!(
                    "{} has no boarding record today",
                    student.full_name()
                )));
            }
        }

        let plans = self.plans_today().await?;
        let plan = find_plan(&plans, student.id, self.direction).cloned();
        match &plan {
            Some(plan) => notices.push(Notice::info(format!("Planned on trip {}", plan.trip_id))),
            None => notices.push(Notice::warning(format!(
                "{} is not in today's {} plan",
                student.full_name(),
                self.direction
            ))),
        }

        notices.push(Notice::info(format!(
            "Confirm {} for {} ({})?",
            self.direction,
            student.full_name(),
            student.qr_code
        )));
        self.pending = Some(PendingScan { student, plan });
        self.state = RecorderState::Confirming;
        Ok(notices)
    }

    /// Submit the pending student.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless confirming, and
    /// propagates 401s. Other failures become notices.
    pub async fn confirm(&mut self) -> Result<Vec<Notice>> {
        self.expect_state(&[RecorderState::Confirming], "confirm")?;
        let Some(pending) = self.pending.clone() else {
            self.reset();
            return Err(Error::internal("confirming without a pending student"));
        };

        self.state = RecorderState::Submitting;
        match self.submit(&pending).await {
            Ok(notices) => Ok(notices),
            Err(e) if e.is_unauthorized() => {
                self.reset();
                Err(e)
            }
            Err(e) if e.is_conflict() => {
                self.cache.invalidate(&[self.direction.path()]);
                let notice = self.duplicate_notice(&pending.student);
                self.reset();
                Ok(vec![notice])
            }
            Err(e) => {
                warn!(student_id = pending.student.id, error = %e, "Submit failed");
                self.reset();
                Ok(vec![Notice::error(e.user_message())])
            }
        }
    }

    async fn submit(&mut self, pending: &PendingScan) -> Result<Vec<Notice>> {
        let student = &pending.student;
        if self.already_recorded(student.id).await? {
            let notice = self.duplicate_notice(student);
            self.reset();
            return Ok(vec![notice]);
        }

        let plan = pending.plan.as_ref();
        let Some(trip_id) = plan.map(|p| p.trip_id).or(self.driver.trip_id) else {
            self.state = RecorderState::Confirming;
            return Ok(vec![Notice::error(format!(
                "{} has no plan today; choose a trip before confirming",
                student.full_name()
            ))]);
        };

        let now = (self.clock)();
        let now = now.with_nanosecond(0).unwrap_or(now);
        let record = NewRecord {
            student_id: student.id,
            trip_id,
            bus_id: self.driver.bus_id,
            driver_id: self.driver.driver_id,
            record_date: now.date(),
            record_time: now.time(),
            was_planned: plan.is_some(),
            daily_plan_id: plan.map(|p| p.id),
            stop_id: plan.and_then(|p| p.stop_id),
            notes: None,
        };
        let key = idempotency_key(student.id, record.record_date, self.direction);

        let created = self
            .backend
            .create_record(self.direction, &record, &key)
            .await?;
        self.cache.invalidate(&[self.direction.path()]);
        info!(
            direction = %self.direction,
            student_id = student.id,
            record_id = created.id,
            planned = created.was_planned,
            "Recorded event"
        );
        self.reset();

        Ok(vec![Notice::success(format!(
            "{} recorded for {} at {}",
            capitalize(&self.direction.to_string()),
            student.full_name(),
            created.record_time.format("%H:%M")
        ))])
    }

    /// Drop the pending student.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless confirming.
    pub fn cancel(&mut self) -> Result<Vec<Notice>> {
        self.expect_state(&[RecorderState::Confirming], "cancel")?;
        let name = self
            .pending
            .as_ref()
            .map(|p| p.student.full_name())
            .unwrap_or_default();
        self.reset();
        Ok(vec![Notice::info(format!("Cancelled {name}"))])
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveTime;

    use super::*;

    fn student(id: i64, qr: &str) -> Student {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "firstName": "Student",
            "lastName": format!("{id}"),
            "qrCode": qr,
        }))
        .unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 7).unwrap()
    }

    fn plan(id: i64, student_id: i64, direction: Direction, trip_id: i64) -> DailyPlan {
        DailyPlan {
            id,
            plan_date: day(),
            student_id,
            trip_id,
            bus_id: 2,
            stop_id: Some(40),
            is_boarding: direction.is_boarding(),
            student: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        students: Vec<Student>,
        plans: Vec<DailyPlan>,
        records: Mutex<HashMap<Direction, Vec<EventRecord>>>,
        created: Mutex<Vec<(NewRecord, String)>>,
        lookups: AtomicUsize,
        lookup_status: Option<u16>,
        create_status: Option<u16>,
    }

    impl FakeBackend {
        fn with_students(students: Vec<Student>) -> Self {
            Self {
                students,
                ..Self::default()
            }
        }

        fn seed(&self, direction: Direction, student_id: i64) {
            let record = EventRecord {
                id: 100 + student_id,
                student_id,
                trip_id: 1,
                bus_id: 2,
                driver_id: 3,
                record_date: day(),
                record_time: NaiveTime::from_hms_opt(6, 50, 0).unwrap(),
                was_planned: false,
                daily_plan_id: None,
                stop_id: None,
                notes: None,
                student: None,
                created_at: None,
            };
            self.records
                .lock()
                .unwrap()
                .entry(direction)
                .or_default()
                .push(record);
        }
    }

    #[async_trait]
    impl BoardingBackend for FakeBackend {
        async fn student_by_qr(&self, code: &str) -> Result<Option<Student>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.lookup_status {
                return Err(Error::api(status, "lookup failed"));
            }
            Ok(self.students.iter().find(|s| s.qr_code == code).cloned())
        }

        async fn records_on(&self, direction: Direction, date: NaiveDate) -> Result<Vec<EventRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(&direction)
                .map(|all| all.iter().filter(|r| r.record_date == date).cloned().collect())
                .unwrap_or_default())
        }

        async fn plans_on(&self, date: NaiveDate) -> Result<Vec<DailyPlan>> {
            Ok(self.plans.iter().filter(|p| p.plan_date == date).cloned().collect())
        }

        async fn create_record(
            &self,
            direction: Direction,
            record: &NewRecord,
            idempotency_key: &str,
        ) -> Result<EventRecord> {
            if let Some(status) = self.create_status {
                return Err(Error::api(status, "create failed"));
            }
            self.created
                .lock()
                .unwrap()
                .push((record.clone(), idempotency_key.to_string()));
            let stored = EventRecord {
                id: 500,
                student_id: record.student_id,
                trip_id: record.trip_id,
                bus_id: record.bus_id,
                driver_id: record.driver_id,
                record_date: record.record_date,
                record_time: record.record_time,
                was_planned: record.was_planned,
                daily_plan_id: record.daily_plan_id,
                stop_id: record.stop_id,
                notes: None,
                student: None,
                created_at: None,
            };
            self.records
                .lock()
                .unwrap()
                .entry(direction)
                .or_default()
                .push(stored.clone());
            Ok(stored)
        }
    }

    fn recorder(backend: &FakeBackend, direction: Direction, trip_id: Option<i64>) -> Recorder<&FakeBackend> {
        let driver = DriverContext {
            driver_id: 3,
            bus_id: 2,
            trip_id,
        };
        Recorder::new(backend, direction, driver, Duration::from_secs(60))
            .with_clock(|| day().and_hms_opt(7, 15, 42).unwrap())
    }

    fn has(notices: &[Notice], level: Level, text: &str) -> bool {
        notices
            .iter()
            .any(|n| n.level == level && n.message.contains(text))
    }

    #[tokio::test]
    async fn test_unknown_code_from_idle() {
        let backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        let notices = rec.scan("ghost").await.unwrap();
        assert!(has(&notices, Level::Warning, "No student found"));
        assert_eq!(rec.state(), RecorderState::Idle);
        assert!(rec.pending().is_none());
    }

    #[tokio::test]
    async fn test_unknown_code_keeps_pending_student() {
        let backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        rec.scan("STU-1").await.unwrap();
        assert_eq!(rec.state(), RecorderState::Confirming);

        rec.scan("ghost").await.unwrap();
        assert_eq!(rec.state(), RecorderState::Confirming);
        assert_eq!(rec.pending().unwrap().student.id, 1);
    }

    #[tokio::test]
    async fn test_blank_input_ignored() {
        let backend = FakeBackend::default();
        let mut rec = recorder(&backend, Direction::Boarding, None);
        assert!(rec.scan("  ").await.unwrap().is_empty());
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_every_scan_requeries() {
        let backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));
        rec.scan("STU-1").await.unwrap();
        rec.scan("STU-1").await.unwrap();
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_already_boarded_blocks_and_clears() {
        let backend = FakeBackend::with_students(vec![student(1, "STU-1"), student(2, "STU-2")]);
        backend.seed(Direction::Boarding, 2);
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        rec.scan("STU-1").await.unwrap();
        let notices = rec.scan("STU-2").await.unwrap();

        assert!(has(&notices, Level::Warning, "already boarded today"));
        assert_eq!(rec.state(), RecorderState::Idle);
        assert!(rec.pending().is_none());
        let err = rec.confirm().await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { action: "confirm", .. }));
    }

    #[tokio::test]
    async fn test_planned_student_sets_plan_fields() {
        let mut backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        backend.plans = vec![plan(11, 1, Direction::Boarding, 7)];
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        let notices = rec.scan("STU-1").await.unwrap();
        assert!(has(&notices, Level::Info, "Planned on trip 7"));
        let notices = rec.confirm().await.unwrap();
        assert!(has(&notices, Level::Success, "Boarding recorded"));

        let created = backend.created.lock().unwrap();
        let (record, key) = &created[0];
        assert!(record.was_planned);
        assert_eq!(record.daily_plan_id, Some(11));
        assert_eq!(record.trip_id, 7);
        assert_eq!(record.stop_id, Some(40));
        assert_eq!(record.bus_id, 2);
        assert_eq!(record.driver_id, 3);
        assert_eq!(record.record_time, NaiveTime::from_hms_opt(7, 15, 42).unwrap());
        assert_eq!(key, &idempotency_key(1, day(), Direction::Boarding));
    }

    #[tokio::test]
    async fn test_unplanned_student_uses_driver_trip() {
        let mut backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        backend.plans = vec![plan(11, 1, Direction::Disembarking, 7)];
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        let notices = rec.scan("STU-1").await.unwrap();
        assert!(has(&notices, Level::Warning, "not in today's boarding plan"));
        rec.confirm().await.unwrap();

        let created = backend.created.lock().unwrap();
        let (record, _) = &created[0];
        assert!(!record.was_planned);
        assert_eq!(record.daily_plan_id, None);
        assert_eq!(record.trip_id, 9);
    }

    #[tokio::test]
    async fn test_missing_trip_keeps_confirming() {
        let backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        let mut rec = recorder(&backend, Direction::Boarding, None);

        rec.scan("STU-1").await.unwrap();
        let notices = rec.confirm().await.unwrap();
        assert!(has(&notices, Level::Error, "choose a trip"));
        assert_eq!(rec.state(), RecorderState::Confirming);
        assert!(backend.created.lock().unwrap().is_empty());

        rec.set_trip(Some(4));
        rec.confirm().await.unwrap();
        assert_eq!(backend.created.lock().unwrap()[0].0.trip_id, 4);
    }

    #[tokio::test]
    async fn test_submit_invalidates_cached_records() {
        let backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        rec.scan("STU-1").await.unwrap();
        rec.confirm().await.unwrap();
        assert_eq!(rec.state(), RecorderState::Idle);

        let notices = rec.scan("STU-1").await.unwrap();
        assert!(has(&notices, Level::Warning, "already boarded today"));
        assert_eq!(backend.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_is_already_recorded() {
        let backend = FakeBackend {
            create_status: Some(409),
            ..FakeBackend::with_students(vec![student(1, "STU-1")])
        };
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        rec.scan("STU-1").await.unwrap();
        let notices = rec.confirm().await.unwrap();
        assert!(has(&notices, Level::Warning, "already boarded today"));
        assert_eq!(rec.state(), RecorderState::Idle);
    }

    #[tokio::test]
    async fn test_failed_submit_returns_to_idle() {
        let backend = FakeBackend {
            create_status: Some(500),
            ..FakeBackend::with_students(vec![student(1, "STU-1")])
        };
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        rec.scan("STU-1").await.unwrap();
        let notices = rec.confirm().await.unwrap();
        assert!(has(&notices, Level::Error, "Server error"));
        assert_eq!(rec.state(), RecorderState::Idle);
        assert!(rec.pending().is_none());
    }

    #[tokio::test]
    async fn test_failed_search_is_error_notice() {
        let backend = FakeBackend {
            lookup_status: Some(503),
            ..FakeBackend::default()
        };
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        let notices = rec.scan("STU-1").await.unwrap();
        assert_eq!(notices[0].level, Level::Error);
        assert_eq!(rec.state(), RecorderState::Idle);
    }

    #[tokio::test]
    async fn test_unauthorized_search_propagates() {
        let backend = FakeBackend {
            lookup_status: Some(401),
            ..FakeBackend::default()
        };
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        let err = rec.scan("STU-1").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(rec.state(), RecorderState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_only_while_confirming() {
        let backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        let mut rec = recorder(&backend, Direction::Boarding, Some(9));

        let err = rec.cancel().unwrap_err();
        assert_eq!(err.to_string(), "cannot cancel while idle");
        assert_eq!(rec.state(), RecorderState::Idle);

        rec.scan("STU-1").await.unwrap();
        let notices = rec.cancel().unwrap();
        assert!(has(&notices, Level::Info, "Cancelled Student 1"));
        assert_eq!(rec.state(), RecorderState::Idle);
        assert!(backend.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disembark_without_boarding_warns() {
        let backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        let mut rec = recorder(&backend, Direction::Disembarking, Some(9));

        let notices = rec.scan("STU-1").await.unwrap();
        assert!(has(&notices, Level::Warning, "no boarding record today"));
        assert_eq!(rec.state(), RecorderState::Confirming);

        rec.confirm().await.unwrap();
        let created = backend.records.lock().unwrap();
        assert_eq!(created[&Direction::Disembarking].len(), 1);
    }

    #[tokio::test]
    async fn test_disembark_twice_blocked() {
        let backend = FakeBackend::with_students(vec![student(1, "STU-1")]);
        backend.seed(Direction::Boarding, 1);
        backend.seed(Direction::Disembarking, 1);
        let mut rec = recorder(&backend, Direction::Disembarking, Some(9));

        let notices = rec.scan("STU-1").await.unwrap();
        assert!(has(&notices, Level::Warning, "already disembarked today"));
        assert!(rec.pending().is_none());
    }

    #[test]
    fn test_idempotency_key_inputs() {
        let key = idempotency_key(1, day(), Direction::Boarding);
        assert_eq!(key.len(), 64);
        assert_eq!(key, idempotency_key(1, day(), Direction::Boarding));
        assert_ne!(key, idempotency_key(1, day(), Direction::Disembarking));
        assert_ne!(key, idempotency_key(2, day(), Direction::Boarding));
        assert_ne!(key, idempotency_key(1, day().succ_opt().unwrap(), Direction::Boarding));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("boarding"), "Boarding");
        assert_eq!(capitalize(""), "");
    }
}
