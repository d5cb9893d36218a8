//! Daily boarding/disembarking report and CSV export.
//!
//! The CSV starts with `label,value` summary rows, followed by one header row
//! and one row per record. Every field is quoted.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::{Bus, DailyPlan, Direction, EventRecord, User};

/// Column names of the record section.
pub const COLUMNS: [&str; 9] = [
    "Type", "Student", "QR code", "Bus", "Trip", "Driver", "Date", "Time", "Planned",
];

/// Headline counts for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub boardings: usize,
    pub disembarkings: usize,
    /// Records of either direction that matched a plan.
    pub planned: usize,
    pub unplanned: usize,
    /// Students planned to board who have no boarding record.
    pub planned_not_boarded: usize,
}

/// Display names used instead of raw ids where known.
#[derive(Debug, Clone, Default)]
pub struct ReportLabels {
    pub buses: HashMap<i64, String>,
    pub drivers: HashMap<i64, String>,
}

impl ReportLabels {
    #[must_use]
    pub fn from_lists(buses: &[Bus], users: &[User]) -> Self {
        Self {
            buses: buses
                .iter()
                .map(|b| (b.id, b.plate_number.clone()))
                .collect(),
            drivers: users.iter().map(|u| (u.id, u.full_name())).collect(),
        }
    }

    fn bus(&self, id: i64) -> String {
        self.buses.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn driver(&self, id: i64) -> String {
        self.drivers.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }
}

/// Everything recorded and planned on one day.
#[derive(Debug, Clone)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub boardings: Vec<EventRecord>,
    pub disembarkings: Vec<EventRecord>,
    pub plans: Vec<DailyPlan>,
    pub labels: ReportLabels,
}

impl DailyReport {
    /// Assemble a report; records are ordered by time within each direction.
    #[must_use]
    pub fn new(
        date: NaiveDate,
        mut boardings: Vec<EventRecord>,
        mut disembarkings: Vec<EventRecord>,
        plans: Vec<DailyPlan>,
    ) -> Self {
        boardings.sort_by_key(EventRecord::recorded_at);
        disembarkings.sort_by_key(EventRecord::recorded_at);
        Self {
            date,
            boardings,
            disembarkings,
            plans,
            labels: ReportLabels::default(),
        }
    }

    #[must_use]
    pub fn with_labels(mut self, labels: ReportLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Fetch records and plans for `date`.
    ///
    /// Bus and driver names are looked up as well; if that fails the report
    /// falls back to ids.
    ///
    /// # Errors
    ///
    /// Returns an API error if records or plans cannot be fetched.
    pub async fn fetch(api: &ApiClient, date: NaiveDate) -> Result<Self> {
        let (boardings, disembarkings, plans) = tokio::try_join!(
            api.records_for(Direction::Boarding, date),
            api.records_for(Direction::Disembarking, date),
            api.plans_for(date),
        )?;

        let labels = match tokio::try_join!(api.list::<Bus>(), api.list::<User>()) {
            Ok((buses, users)) => ReportLabels::from_lists(&buses, &users),
            Err(e) => {
                warn!(error = %e, "Could not load bus and driver names for report");
                ReportLabels::default()
            }
        };

        info!(
            %date,
            boardings = boardings.len(),
            disembarkings = disembarkings.len(),
            plans = plans.len(),
            "Fetched daily report"
        );
        Ok(Self::new(date, boardings, disembarkings, plans).with_labels(labels))
    }

    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let planned = self
            .boardings
            .iter()
            .chain(&self.disembarkings)
            .filter(|r| r.was_planned)
            .count();
        let total = self.boardings.len() + self.disembarkings.len();

        let boarded: HashSet<i64> = self.boardings.iter().map(|r| r.student_id).collect();
        let planned_not_boarded = self
            .plans
            .iter()
            .filter(|p| p.is_boarding && !boarded.contains(&p.student_id))
            .map(|p| p.student_id)
            .collect::<HashSet<_>>()
            .len();

        ReportSummary {
            boardings: self.boardings.len(),
            disembarkings: self.disembarkings.len(),
            planned,
            unplanned: total - planned,
            planned_not_boarded,
        }
    }

    fn summary_rows(&self) -> Vec<(&'static str, String)> {
        let summary = self.summary();
        vec![
            ("Date", self.date.to_string()),
            ("Total boardings", summary.boardings.to_string()),
            ("Total disembarkings", summary.disembarkings.to_string()),
            ("Planned", summary.planned.to_string()),
            ("Unplanned", summary.unplanned.to_string()),
            ("Planned not boarded", summary.planned_not_boarded.to_string()),
        ]
    }

    fn record_row(&self, kind: &str, record: &EventRecord) -> [String; 9] {
        [
            kind.to_string(),
            record.student_label(),
            record
                .student
                .as_ref()
                .map(|s| s.qr_code.clone())
                .unwrap_or_default(),
            self.labels.bus(record.bus_id),
            record.trip_id.to_string(),
            self.labels.driver(record.driver_id),
            record.record_date.to_string(),
            record.record_time.format("%H:%M:%S").to_string(),
            if record.was_planned { "Yes" } else { "No" }.to_string(),
        ]
    }

    /// Write the CSV export to `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Csv`] or [`crate::Error::Io`] on write failure.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .flexible(true)
            .from_writer(writer);

        for (label, value) in self.summary_rows() {
            csv.write_record([label, value.as_str()])?;
        }
        csv.write_record(COLUMNS)?;
        for record in &self.boardings {
            csv.write_record(self.record_row("Boarding", record))?;
        }
        for record in &self.disembarkings {
            csv.write_record(self.record_row("Disembarking", record))?;
        }
        csv.flush()?;
        Ok(())
    }

    /// The CSV export as a string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Csv`] on encoding failure.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Default file name, `report-<date>.csv`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("report-{}.csv", self.date)
    }

    /// Write the CSV to `output`, or to [`Self::file_name`] inside `dir`.
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryCreate`] if the parent directory cannot be
    /// created, or an error if the file cannot be created or written.
    pub fn save(&self, output: Option<&Path>, dir: &Path) -> Result<PathBuf> {
        let path = output.map_or_else(|| dir.join(self.file_name()), Path::to_path_buf);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let file = std::fs::File::create(&path)?;
        self.write_csv(std::io::BufWriter::new(file))?;
        info!(path = %path.display(), "Report written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 7).unwrap()
    }

    fn record(id: i64, student_id: i64, name: &str, time: &str, planned: bool) -> EventRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "studentId": student_id,
            "tripId": 4,
            "busId": 2,
            "driverId": 3,
            "recordDate": "2024-10-07",
            "recordTime": time,
            "wasPlanned": planned,
            "student": {
                "id": student_id,
                "firstName": name,
                "lastName": "Ruiz",
                "qrCode": format!("STU-{student_id}"),
            },
        }))
        .unwrap()
    }

    fn plan(student_id: i64, is_boarding: bool) -> DailyPlan {
        serde_json::from_value(serde_json::json!({
            "id": student_id * 10,
            "planDate": "2024-10-07",
            "studentId": student_id,
            "tripId": 4,
            "busId": 2,
            "isBoarding": is_boarding,
        }))
        .unwrap()
    }

    fn sample() -> DailyReport {
        DailyReport::new(
            date(),
            vec![
                record(2, 6, "Luis", "07:20:00", false),
                record(1, 5, "Ana \"Nena\"", "07:05:00", true),
            ],
            vec![record(3, 5, "Ana \"Nena\"", "15:10:00", true)],
            vec![plan(5, true), plan(7, true), plan(7, false), plan(5, false)],
        )
    }

    #[test]
    fn test_summary_counts() {
        let summary = sample().summary();
        assert_eq!(
            summary,
            ReportSummary {
                boardings: 2,
                disembarkings: 1,
                planned: 2,
                unplanned: 1,
                planned_not_boarded: 1,
            }
        );
    }

    #[test]
    fn test_csv_layout() {
        let report = sample().with_labels(ReportLabels {
            buses: HashMap::from([(2, "BUS-2".to_string())]),
            drivers: HashMap::new(),
        });
        let csv = report.to_csv_string().unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 6 + 1 + 3);
        assert_eq!(lines[0], r#""Date","2024-10-07""#);
        assert_eq!(lines[1], r#""Total boardings","2""#);
        assert_eq!(lines[5], r#""Planned not boarded","1""#);
        assert_eq!(
            lines[6],
            r#""Type","Student","QR code","Bus","Trip","Driver","Date","Time","Planned""#
        );
        assert_eq!(
            lines[7],
            r#""Boarding","Ana ""Nena"" Ruiz","STU-5","BUS-2","4","3","2024-10-07","07:05:00","Yes""#
        );
        assert!(lines[8].starts_with(r#""Boarding","Luis Ruiz""#));
        assert!(lines[9].starts_with(r#""Disembarking","#));
        assert!(lines[9].ends_with(r#""15:10:00","Yes""#));
    }

    #[test]
    fn test_empty_day() {
        let report = DailyReport::new(date(), Vec::new(), Vec::new(), Vec::new());
        let csv = report.to_csv_string().unwrap();
        assert_eq!(csv.lines().count(), 7);
        assert_eq!(report.summary(), ReportSummary::default());
    }

    #[test]
    fn test_save_uses_default_name() {
        let dir = std::env::temp_dir().join(format!("schoolbus-report-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let path = sample().save(None, &dir).unwrap();
        assert_eq!(path, dir.join("report-2024-10-07.csv"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("\"Date\""));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_creates_missing_report_dir() {
        let root = std::env::temp_dir().join(format!("schoolbus-report-new-{}", std::process::id()));
        let dir = root.join("reports").join("daily");
        assert!(!dir.exists());

        let path = sample().save(None, &dir).unwrap();
        assert_eq!(path, dir.join("report-2024-10-07.csv"));
        assert!(path.is_file());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_save_reports_uncreatable_dir() {
        let root = std::env::temp_dir().join(format!("schoolbus-report-blocked-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        let blocker = root.join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let err = sample().save(None, &blocker.join("reports")).unwrap_err();
        assert!(matches!(err, Error::DirectoryCreate { .. }));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
