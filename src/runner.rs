// src/runner.rs

use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use serde::Serialize;
use tracing::info;

use crate::audit::AuditTrail;
use crate::beacon_api::TokenManager;
use crate::business_hours::is_active_window;
use crate::dispatch::{DeliveryOutcome, NotificationDispatcher};
use crate::presence::{absence_candidates, PresenceStore};

/// Aggregate result of one notification cycle. Serializes into the
/// shape callers observe:
/// `{success, threshold_minutes, message, total_employees,
/// notifications_sent, notifications_failed, notifications_detail}`.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub success: bool,
    pub threshold_minutes: u32,
    pub message: String,
    pub total_employees: usize,
    #[serde(rename = "notifications_sent")]
    pub sent_count: usize,
    #[serde(rename = "notifications_failed")]
    pub failed_count: usize,
    #[serde(rename = "notifications_detail")]
    pub details: Vec<DeliveryOutcome>,
    /// A window skip is not a job failure. Not part of the wire shape.
    #[serde(skip)]
    pub skipped: bool,
}

impl CycleSummary {
    fn empty(threshold_minutes: u32, success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            threshold_minutes,
            message: message.into(),
            total_employees: 0,
            sent_count: 0,
            failed_count: 0,
            details: Vec::new(),
            skipped: false,
        }
    }

    fn window_skip(threshold_minutes: u32) -> Self {
        let mut summary = Self::empty(threshold_minutes, false, "Outside business hours");
        summary.skipped = true;
        summary
    }
}

type NowSource = dyn Fn() -> chrono::DateTime<FixedOffset> + Send + Sync;

/// Runs one absence notification cycle: window check, token check,
/// presence snapshot, sequential dispatch, aggregation.
pub struct AbsenceRunner {
    weekday_start_hour: u32,
    weekday_end_hour: u32,
    token_manager: Arc<TokenManager>,
    store: Arc<dyn PresenceStore>,
    dispatcher: NotificationDispatcher,
    audit: Arc<AuditTrail>,
    now_source: Box<NowSource>,
}

impl AbsenceRunner {
    pub fn new(
        weekday_start_hour: u32,
        weekday_end_hour: u32,
        offset: FixedOffset,
        token_manager: Arc<TokenManager>,
        store: Arc<dyn PresenceStore>,
        dispatcher: NotificationDispatcher,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            weekday_start_hour,
            weekday_end_hour,
            token_manager,
            store,
            dispatcher,
            audit,
            now_source: Box::new(move || Utc::now().with_timezone(&offset)),
        }
    }

    /// Replaces the wall clock, pinning every window and absence
    /// evaluation to the instants the source produces.
    pub fn with_now_source(mut self, now_source: Box<NowSource>) -> Self {
        self.now_source = now_source;
        self
    }

    pub async fn run_cycle(&self, threshold_minutes: u32) -> CycleSummary {
        let now = (self.now_source)();

        if !is_active_window(now, self.weekday_start_hour, self.weekday_end_hour) {
            self.audit
                .info("Outside business hours, skipping notification");
            return CycleSummary::window_skip(threshold_minutes);
        }

        if self.token_manager.ensure_valid().await.is_err() {
            return CycleSummary::empty(threshold_minutes, false, "Authentication failed");
        }

        info!(
            "Checking absences with threshold: {} minutes",
            threshold_minutes
        );

        let records = match self.store.presence_snapshot().await {
            Ok(records) => records,
            Err(e) => {
                self.audit.error(format!("Presence query failed: {}", e));
                return CycleSummary::empty(threshold_minutes, false, "Presence query failed");
            }
        };

        let candidates = absence_candidates(&records, now, threshold_minutes);
        if candidates.is_empty() {
            self.audit.info("No absent employees detected");
            return CycleSummary::empty(threshold_minutes, true, "No absent employees detected");
        }

        let mut details = Vec::with_capacity(candidates.len());
        let mut sent_count = 0;
        let mut failed_count = 0;

        for candidate in &candidates {
            let outcome = self.dispatcher.dispatch(candidate).await;
            if outcome.succeeded {
                sent_count += 1;
            } else {
                failed_count += 1;
                self.audit.warn(format!(
                    "Notification failed for employee {}: HTTP {} - {}",
                    outcome.employee_id,
                    outcome.response_code,
                    truncate(&outcome.response_message, 100)
                ));
            }
            details.push(outcome);
        }

        let total_employees = candidates.len();
        self.audit.info(format!(
            "Notification summary: {} employees processed, {} sent, {} failed",
            total_employees, sent_count, failed_count
        ));

        CycleSummary {
            success: true,
            threshold_minutes,
            message: format!("Processed {} employees", total_employees),
            total_employees,
            sent_count,
            failed_count,
            details,
            skipped: false,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
