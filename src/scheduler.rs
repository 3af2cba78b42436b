// src/scheduler.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::audit::AuditTrail;
use crate::beacon_api::TokenManager;
use crate::runner::{AbsenceRunner, CycleSummary};

/// Drives [`AbsenceRunner`] on a fixed interval equal to the absence
/// threshold, so each employee is checked and notified at most once per
/// threshold window.
///
/// Missed ticks are coalesced, late ticks beyond the misfire grace are
/// dropped, and at most one cycle is ever in flight: the loop awaits
/// each cycle inline before polling the timer again.
pub struct NotificationScheduler {
    runner: Arc<AbsenceRunner>,
    token_manager: Arc<TokenManager>,
    threshold_minutes: u32,
    period: Duration,
    misfire_grace: Duration,
    audit: Arc<AuditTrail>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationScheduler {
    pub fn new(
        runner: Arc<AbsenceRunner>,
        token_manager: Arc<TokenManager>,
        threshold_minutes: u32,
        misfire_grace: Duration,
        audit: Arc<AuditTrail>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            runner,
            token_manager,
            threshold_minutes,
            period: Duration::from_secs(u64::from(threshold_minutes) * 60),
            misfire_grace,
            audit,
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Overrides the tick period, which normally equals the threshold.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Performs an initial authentication probe (logged, not fatal) and
    /// spawns the interval loop. The first cycle runs one full period
    /// after start.
    pub async fn start(&self) {
        if let Err(e) = self.token_manager.authenticate().await {
            self.audit.warn(format!(
                "Initial authentication failed, will retry on first cycle: {}",
                e
            ));
        }

        let runner = Arc::clone(&self.runner);
        let threshold_minutes = self.threshold_minutes;
        let period = self.period;
        let misfire_grace = self.misfire_grace;
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval() yields immediately; consume that tick so the
            // first cycle lands one period from now.
            ticker.tick().await;

            loop {
                let scheduled = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    instant = ticker.tick() => instant,
                };

                if scheduled.elapsed() > misfire_grace {
                    warn!(
                        "Tick late by more than {:?}, skipping this run",
                        misfire_grace
                    );
                    continue;
                }

                let summary = runner.run_cycle(threshold_minutes).await;
                log_cycle(&summary);

                if *shutdown_rx.borrow() {
                    break;
                }
            }
            info!("Scheduler loop stopped");
        });

        *self.handle.lock().await = Some(handle);
        self.audit.info(format!(
            "Scheduler started with {}-minute interval",
            self.threshold_minutes
        ));
    }

    /// Finish-then-halt: any in-flight cycle completes, then the loop
    /// exits. No new cycles start after this returns.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
        self.audit.info("Scheduler stopped");
    }

    /// Runs a single cycle outside the periodic loop, with the same
    /// semantics as a scheduled tick.
    pub async fn run_once(&self) -> CycleSummary {
        let summary = self.runner.run_cycle(self.threshold_minutes).await;
        log_cycle(&summary);
        summary
    }
}

fn log_cycle(summary: &CycleSummary) {
    if summary.skipped {
        debug!("Cycle skipped: {}", summary.message);
    } else if summary.success {
        info!("Cycle completed: {}", summary.message);
    } else {
        warn!("Cycle failed: {}", summary.message);
    }
}
