//! Self-rescheduling background sweep.
//!
//! The task facility runs a submitted sweep once, no earlier than the
//! requested time, and may cut it short by raising its cancel signal. Each
//! run therefore submits the next run before it does any work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vens_core::config::SweepConfig;
use vens_core::types::{Clock, Timestamp};

use crate::error::ReminderError;
use crate::scheduler::SchedulerCore;

/// A one-shot request for a sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepRequest {
    pub not_before: Timestamp,
}

/// Cooperative cancellation raised by the task facility when the run's
/// time budget runs out.
#[derive(Debug, Clone, Default)]
pub struct SweepCancel {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl SweepCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// External facility that runs sweeps.
#[async_trait]
pub trait TaskFacility: Send + Sync {
    /// Submit the next run. A newer submission replaces a pending one.
    async fn submit(&self, request: SweepRequest) -> Result<(), ReminderError>;
}

/// What one sweep run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub reconciled: usize,
    /// The run stopped early on its cancel signal.
    pub cancelled: bool,
    pub next_run: Timestamp,
}

pub struct BackgroundSweep {
    scheduler: Arc<SchedulerCore>,
    facility: Arc<dyn TaskFacility>,
    interval_secs: i64,
    overdue_grace_secs: i64,
}

impl BackgroundSweep {
    pub fn new(
        scheduler: Arc<SchedulerCore>,
        facility: Arc<dyn TaskFacility>,
        config: &SweepConfig,
    ) -> Self {
        Self {
            scheduler,
            facility,
            interval_secs: i64::try_from(config.interval_secs).unwrap_or(i64::MAX),
            overdue_grace_secs: config.overdue_grace_secs.max(0),
        }
    }

    /// Ask the facility to run a sweep no earlier than `not_before`.
    pub async fn schedule_background_sweep(
        &self,
        not_before: Timestamp,
    ) -> Result<(), ReminderError> {
        self.facility.submit(SweepRequest { not_before }).await?;
        debug!(not_before = %not_before, "Background sweep submitted");
        Ok(())
    }

    /// Submit a run one interval from now.
    pub async fn schedule_next(&self) -> Result<Timestamp, ReminderError> {
        let next = self.scheduler.now().plus_secs(self.interval_secs);
        self.schedule_background_sweep(next).await?;
        Ok(next)
    }

    /// One sweep run.
    ///
    /// Resubmits itself first, then marks active reminders that are overdue
    /// by more than the grace period as Fired. `cancel` is checked between
    /// items; each item is committed whole or not at all.
    pub async fn run_sweep(&self, cancel: &SweepCancel) -> Result<SweepReport, ReminderError> {
        let next_run = self.schedule_next().await?;

        let cutoff = self.scheduler.now().plus_secs(-self.overdue_grace_secs);
        let mut report = SweepReport {
            examined: 0,
            reconciled: 0,
            cancelled: false,
            next_run,
        };

        for item in self.scheduler.store().list_active()? {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let reminder = item?;
            // Records are re-read after the ordering snapshot, so a later
            // entry may still be overdue.
            if reminder.fire_at >= cutoff {
                continue;
            }
            report.examined += 1;

            match self
                .scheduler
                .reconcile_overdue(reminder.id, cutoff, || cancel.is_cancelled())
                .await
            {
                Ok(true) => report.reconciled += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(id = %reminder.id, error = %e, "Sweep item failed");
                    return Err(e);
                }
            }
            tokio::task::yield_now().await;
        }
        if cancel.is_cancelled() {
            report.cancelled = true;
        }

        info!(
            examined = report.examined,
            reconciled = report.reconciled,
            cancelled = report.cancelled,
            next_run = %report.next_run,
            "Background sweep finished"
        );
        Ok(report)
    }
}

/// A sweep run handed out by [`TokioTaskFacility`].
#[derive(Debug)]
pub struct SweepLaunch {
    pub request: SweepRequest,
    pub cancel: SweepCancel,
}

/// In-process task facility driven by tokio timers.
///
/// Sleeps until the requested time, hands a [`SweepLaunch`] to the
/// receiver returned by `new`, and raises the launch's cancel signal once
/// the budget has elapsed.
pub struct TokioTaskFacility {
    clock: Arc<dyn Clock>,
    budget: Duration,
    launches: mpsc::UnboundedSender<SweepLaunch>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl TokioTaskFacility {
    pub fn new(
        clock: Arc<dyn Clock>,
        budget: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SweepLaunch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let facility = Arc::new(Self {
            clock,
            budget,
            launches: tx,
            pending: Mutex::new(None),
        });
        (facility, rx)
    }
}

#[async_trait]
impl TaskFacility for TokioTaskFacility {
    async fn submit(&self, request: SweepRequest) -> Result<(), ReminderError> {
        if self.launches.is_closed() {
            return Err(ReminderError::BackgroundTask(
                "sweep runner has shut down".to_string(),
            ));
        }

        let delay = request.not_before.secs_since(self.clock.now()).max(0) as u64;
        let launches = self.launches.clone();
        let budget = self.budget;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay)).await;

            let cancel = SweepCancel::new();
            let expiry = cancel.clone();
            if launches.send(SweepLaunch { request, cancel }).is_err() {
                return;
            }
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                expiry.cancel();
            });
        });

        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
        Ok(())
    }
}

impl Drop for TokioTaskFacility {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}
