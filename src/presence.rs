// src/presence.rs

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PresenceError {
    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// One employee's presence state as reported by the tracking view.
/// `last_detection` is null when no detection has been recorded today;
/// some deployments instead default it to today's shift start, which
/// must be treated the same way.
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    pub employee_id: String,
    pub push_token: String,
    pub shift_start: NaiveTime,
    pub last_detection: Option<NaiveDateTime>,
}

/// An employee whose elapsed absence meets the threshold. Created fresh
/// on every cycle and discarded once its notification is dispatched.
#[derive(Debug, Clone)]
pub struct AbsenceCandidate {
    pub employee_id: String,
    pub push_token: String,
    pub elapsed_minutes: f64,
}

/// One row of the per-employee presence tracking detail view.
#[derive(Debug, Clone, Serialize)]
pub struct AbsentDetailRow {
    pub store_id: Option<String>,
    pub store: Option<String>,
    pub location: Option<String>,
    pub employee_id: Option<String>,
    pub employee: Option<String>,
    pub shift_in: Option<String>,
    pub shift_out: Option<String>,
    pub last_detection: Option<String>,
    pub absent_duration: Option<String>,
}

#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Current presence state for every employee.
    async fn presence_snapshot(&self) -> Result<Vec<PresenceRecord>, PresenceError>;

    /// Presence tracking detail rows for one employee.
    async fn absent_details(&self, employee_id: &str) -> Result<Vec<AbsentDetailRow>, PresenceError>;
}

pub struct PgPresenceStore {
    pool: PgPool,
}

impl PgPresenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &PgRow) -> Result<PresenceRecord, PresenceError> {
        Ok(PresenceRecord {
            employee_id: row.try_get("employee_id")?,
            push_token: row
                .try_get::<Option<String>, _>("push_token")?
                .unwrap_or_default(),
            shift_start: row.try_get("shift_start")?,
            last_detection: row.try_get("last_detection")?,
        })
    }

    fn row_to_detail(row: &PgRow) -> Result<AbsentDetailRow, PresenceError> {
        Ok(AbsentDetailRow {
            store_id: row.try_get("store_id")?,
            store: row.try_get("store")?,
            location: row.try_get("location")?,
            employee_id: row.try_get("employee_id")?,
            employee: row.try_get("employee")?,
            shift_in: row.try_get("shift_in")?,
            shift_out: row.try_get("shift_out")?,
            last_detection: row.try_get("last_detection")?,
            absent_duration: row.try_get("absent_duration")?,
        })
    }
}

#[async_trait]
impl PresenceStore for PgPresenceStore {
    async fn presence_snapshot(&self) -> Result<Vec<PresenceRecord>, PresenceError> {
        let rows = sqlx::query(
            r#"
            SELECT employee_id, push_token, shift_start, last_detection
            FROM v_employee_presence
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn absent_details(&self, employee_id: &str) -> Result<Vec<AbsentDetailRow>, PresenceError> {
        let rows = sqlx::query(
            r#"
            SELECT "Store ID"::text AS store_id,
                   "Store"::text AS store,
                   "Location"::text AS location,
                   "Employee ID"::text AS employee_id,
                   "Employee"::text AS employee,
                   "Shift In"::text AS shift_in,
                   "Shift Out"::text AS shift_out,
                   "Last Detection"::text AS last_detection,
                   "Absent Duration (Hour:Minute)"::text AS absent_duration
            FROM v_presence_tracking
            WHERE "Employee ID" = $1
            "#,
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_detail).collect()
    }
}

/// Selects the employees whose elapsed absence meets `threshold_minutes`.
///
/// The baseline instant is today's date combined with `shift_start`
/// when the employee has no real detection today (`last_detection` null
/// or equal to that shift instant), otherwise `last_detection` itself.
/// `now` and every baseline live in the one operating timezone; the
/// subtraction never mixes UTC with local wall-clock time.
///
/// Candidates with an empty `push_token` are still included; the
/// dispatch step reports their failure individually.
pub fn absence_candidates(
    records: &[PresenceRecord],
    now: DateTime<FixedOffset>,
    threshold_minutes: u32,
) -> Vec<AbsenceCandidate> {
    let today = now.date_naive();
    let now_local = now.naive_local();

    records
        .iter()
        .filter_map(|record| {
            let shift_instant = today.and_time(record.shift_start);
            let baseline = match record.last_detection {
                Some(detected) if detected != shift_instant => detected,
                _ => shift_instant,
            };
            let elapsed_minutes = (now_local - baseline).num_seconds() as f64 / 60.0;
            if elapsed_minutes >= threshold_minutes as f64 {
                Some(AbsenceCandidate {
                    employee_id: record.employee_id.clone(),
                    push_token: record.push_token.clone(),
                    elapsed_minutes,
                })
            } else {
                None
            }
        })
        .collect()
}
