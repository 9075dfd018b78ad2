//! Scheduler core.
//!
//! Owns the reminder lifecycle: every operation on an id runs under that
//! id's async mutex, so operations on one reminder resolve in the order they
//! were issued and never interleave. The notifier is only awaited for the
//! accept/reject of a call, bounded by a timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use vens_core::config::SchedulerConfig;
use vens_core::types::{
    CategoryId, Clock, Exactness, Reminder, ReminderId, ReminderStatus, Timestamp,
};
use vens_storage::ReminderStore;

use crate::error::{NotifierError, ReminderError};
use crate::events::ReminderEvent;
use crate::notifier::{trigger_identifier, Notifier, TriggerRequest};
use crate::state_machine::{accepts_delivery, validate_transition};
use crate::trigger::{ScheduleWarning, TriggerCalculator, ZonePolicy};

const EVENT_CAPACITY: usize = 256;
const DEFAULT_NOTIFIER_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to create or replace a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub id: ReminderId,
    pub title: String,
    pub body: String,
    pub fire_at: Timestamp,
    #[serde(default)]
    pub exactness: Exactness,
    #[serde(default)]
    pub category: CategoryId,
}

impl ScheduleRequest {
    pub fn new(
        id: impl Into<ReminderId>,
        title: impl Into<String>,
        body: impl Into<String>,
        fire_at: Timestamp,
        exactness: Exactness,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            fire_at,
            exactness,
            category: CategoryId::default(),
        }
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = category;
        self
    }

    fn from_reminder(reminder: &Reminder, fire_at: Timestamp) -> Self {
        Self {
            id: reminder.id,
            title: reminder.title.clone(),
            body: reminder.body.clone(),
            fire_at,
            exactness: reminder.exactness,
            category: reminder.category,
        }
    }
}

/// Result of a successful schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleOutcome {
    pub reminder: Reminder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ScheduleWarning>,
}

/// Holds one id's lock. On release the map entry is dropped unless another
/// operation is holding or waiting for the same lock.
struct IdGuard<'a> {
    locks: &'a DashMap<ReminderId, Arc<Mutex<()>>>,
    id: ReminderId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct SchedulerCore {
    store: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
    calculator: TriggerCalculator,
    clock: Arc<dyn Clock>,
    notifier_timeout: Duration,
    locks: DashMap<ReminderId, Arc<Mutex<()>>>,
    events: broadcast::Sender<ReminderEvent>,
}

impl SchedulerCore {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        notifier: Arc<dyn Notifier>,
        calculator: TriggerCalculator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            notifier,
            calculator,
            clock,
            notifier_timeout: DEFAULT_NOTIFIER_TIMEOUT,
            locks: DashMap::new(),
            events,
        }
    }

    /// Build a scheduler from the `[scheduler]` config section.
    pub fn from_config(
        config: &SchedulerConfig,
        store: Arc<dyn ReminderStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ReminderError> {
        let zone = ZonePolicy::from_offset_minutes(config.utc_offset_minutes)?;
        let calculator = TriggerCalculator::new(zone, config.past_due_tolerance_secs);
        Ok(Self::new(store, notifier, calculator, clock)
            .with_notifier_timeout(Duration::from_millis(config.notifier_timeout_ms)))
    }

    pub fn with_notifier_timeout(mut self, timeout: Duration) -> Self {
        self.notifier_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        &self.store
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEvent> {
        self.events.subscribe()
    }

    pub fn get(&self, id: ReminderId) -> Result<Reminder, ReminderError> {
        Ok(self.store.get(id)?)
    }

    /// Snapshot of the active reminders in fire order.
    pub fn active_reminders(&self) -> Result<Vec<Reminder>, ReminderError> {
        let reminders = self
            .store
            .list_active()?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reminders)
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Create or replace a reminder and register its trigger.
    ///
    /// On failure the store is rolled back to the prior record, or the new
    /// record is removed.
    pub async fn schedule(
        &self,
        request: ScheduleRequest,
    ) -> Result<ScheduleOutcome, ReminderError> {
        let _guard = self.lock_id(request.id).await;
        let prior = self.store.find(request.id)?;
        self.schedule_locked(request, prior).await
    }

    /// Remove the live trigger and mark the reminder Cancelled.
    ///
    /// Cancelling an id that was never scheduled succeeds.
    pub async fn cancel(&self, id: ReminderId) -> Result<(), ReminderError> {
        let _guard = self.lock_id(id).await;

        let identifier = trigger_identifier(id);
        self.call_notifier("remove", id, self.notifier.remove_trigger(&identifier))
            .await?;

        match self.store.find(id)? {
            None => {
                debug!(id = %id, "Cancel for unknown reminder");
            }
            Some(reminder) if reminder.status == ReminderStatus::Cancelled => {
                debug!(id = %id, "Reminder already cancelled");
            }
            Some(mut reminder) => {
                validate_transition(reminder.status, ReminderStatus::Cancelled)?;
                reminder.status = ReminderStatus::Cancelled;
                reminder.updated_at = self.clock.now();
                self.store.put(reminder)?;
                info!(id = %id, "Reminder cancelled");
                self.emit(ReminderEvent::Cancelled { id });
            }
        }
        Ok(())
    }

    /// Move a reminder to `new_fire_at`, keeping its other fields.
    ///
    /// The new registration supersedes the old one under the same
    /// identifier, so the id never has two live triggers.
    pub async fn reschedule(
        &self,
        id: ReminderId,
        new_fire_at: Timestamp,
    ) -> Result<ScheduleOutcome, ReminderError> {
        let _guard = self.lock_id(id).await;
        let existing = self.store.get(id)?;
        let request = ScheduleRequest::from_reminder(&existing, new_fire_at);
        self.schedule_locked(request, Some(existing)).await
    }

    /// The notifier delivered the reminder.
    ///
    /// `registered_for` is the fire time carried by the delivered
    /// registration, when the notifier reports it. A delivery for a
    /// registration that has since been superseded does not match the
    /// record's `fire_at` and is ignored, as are late or duplicate
    /// deliveries. Returns whether the record moved to Fired.
    pub async fn on_fired(
        &self,
        id: ReminderId,
        registered_for: Option<Timestamp>,
    ) -> Result<bool, ReminderError> {
        let _guard = self.lock_id(id).await;

        let Some(mut reminder) = self.store.find(id)? else {
            debug!(id = %id, "Delivery for unknown reminder");
            return Ok(false);
        };
        if !accepts_delivery(reminder.status) {
            debug!(id = %id, status = %reminder.status, "Ignoring late delivery");
            return Ok(false);
        }
        if let Some(fire_at) = registered_for.filter(|at| *at != reminder.fire_at) {
            debug!(
                id = %id,
                delivered = %fire_at,
                current = %reminder.fire_at,
                "Ignoring delivery for superseded registration"
            );
            return Ok(false);
        }

        reminder.status = ReminderStatus::Fired;
        reminder.updated_at = self.clock.now();
        self.store.put(reminder)?;
        info!(id = %id, "Reminder fired");
        self.emit(ReminderEvent::Fired { id });
        Ok(true)
    }

    /// Push a reminder out to `new_fire_at` and mark it Snoozed.
    pub async fn snooze(
        &self,
        id: ReminderId,
        new_fire_at: Timestamp,
    ) -> Result<ScheduleOutcome, ReminderError> {
        let _guard = self.lock_id(id).await;

        let prior = self.store.get(id)?;
        validate_transition(prior.status, ReminderStatus::Snoozed)?;

        let request = ScheduleRequest::from_reminder(&prior, new_fire_at);
        let outcome = self
            .install(request, ReminderStatus::Snoozed, Some(prior))
            .await?;
        info!(id = %id, fire_at = %new_fire_at, "Reminder snoozed");
        self.emit(ReminderEvent::Snoozed {
            id,
            fire_at: new_fire_at,
        });
        Ok(outcome)
    }

    /// Close a reminder after a user action, removing any live trigger.
    pub async fn complete(&self, id: ReminderId) -> Result<Reminder, ReminderError> {
        let _guard = self.lock_id(id).await;

        let mut reminder = self.store.get(id)?;
        validate_transition(reminder.status, ReminderStatus::Fired)?;

        if reminder.is_active() {
            let identifier = trigger_identifier(id);
            self.call_notifier("remove", id, self.notifier.remove_trigger(&identifier))
                .await?;
        }

        reminder.status = ReminderStatus::Fired;
        reminder.updated_at = self.clock.now();
        self.store.put(reminder.clone())?;
        info!(id = %id, "Reminder completed");
        self.emit(ReminderEvent::Completed { id });
        Ok(reminder)
    }

    /// Delete a Fired or Cancelled record once the caller has observed it.
    pub async fn acknowledge(&self, id: ReminderId) -> Result<(), ReminderError> {
        let _guard = self.lock_id(id).await;

        let reminder = self.store.get(id)?;
        if reminder.is_active() {
            return Err(ReminderError::StillActive(id));
        }
        self.store.remove(id)?;
        debug!(id = %id, status = %reminder.status, "Reminder acknowledged");
        self.emit(ReminderEvent::Removed { id });
        Ok(())
    }

    /// Mark an active reminder Fired if its fire time is before `cutoff`.
    ///
    /// `is_cancelled` is checked once the id lock is held; when it reports
    /// true nothing is written.
    pub async fn reconcile_overdue<F>(
        &self,
        id: ReminderId,
        cutoff: Timestamp,
        is_cancelled: F,
    ) -> Result<bool, ReminderError>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let _guard = self.lock_id(id).await;
        if is_cancelled() {
            return Ok(false);
        }

        let Some(mut reminder) = self.store.find(id)? else {
            return Ok(false);
        };
        if !reminder.is_active() || reminder.fire_at >= cutoff {
            return Ok(false);
        }

        reminder.status = ReminderStatus::Fired;
        reminder.updated_at = self.clock.now();
        self.store.put(reminder)?;
        info!(id = %id, "Overdue reminder marked fired");
        self.emit(ReminderEvent::Fired { id });
        Ok(true)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn schedule_locked(
        &self,
        request: ScheduleRequest,
        prior: Option<Reminder>,
    ) -> Result<ScheduleOutcome, ReminderError> {
        if let Some(prior) = &prior {
            validate_transition(prior.status, ReminderStatus::Pending)?;
        }
        let id = request.id;
        let (fire_at, exactness) = (request.fire_at, request.exactness);

        let outcome = self.install(request, ReminderStatus::Pending, prior).await?;
        info!(id = %id, fire_at = %fire_at, %exactness, "Reminder scheduled");
        self.emit(ReminderEvent::Scheduled {
            id,
            fire_at,
            exactness,
        });
        Ok(outcome)
    }

    /// Store the record with `status` and register its trigger, rolling the
    /// store back if the notifier does not accept.
    async fn install(
        &self,
        request: ScheduleRequest,
        status: ReminderStatus,
        prior: Option<Reminder>,
    ) -> Result<ScheduleOutcome, ReminderError> {
        let now = self.clock.now();
        let plan = self
            .calculator
            .compute(request.fire_at, request.exactness, now)?;

        let reminder = Reminder {
            id: request.id,
            title: request.title,
            body: request.body,
            fire_at: request.fire_at,
            exactness: request.exactness,
            category: request.category,
            status,
            updated_at: now,
        };
        self.store.put(reminder.clone())?;

        let trigger = TriggerRequest {
            identifier: trigger_identifier(reminder.id),
            reminder_id: reminder.id,
            title: reminder.title.clone(),
            body: reminder.body.clone(),
            category: reminder.category,
            fire_at: reminder.fire_at,
            trigger: plan.descriptor,
            sound: true,
        };

        if let Err(e) = self
            .call_notifier("register", reminder.id, self.notifier.register_trigger(trigger))
            .await
        {
            self.roll_back(reminder.id, prior, &e).await;
            return Err(e);
        }

        Ok(ScheduleOutcome {
            reminder,
            warning: plan.warning,
        })
    }

    async fn roll_back(&self, id: ReminderId, prior: Option<Reminder>, cause: &ReminderError) {
        let had_live_trigger = prior.as_ref().is_some_and(Reminder::is_active);
        let restored = match prior {
            Some(prior) => self.store.put(prior),
            None => self.store.remove(id),
        };
        if let Err(e) = restored {
            error!(id = %id, error = %e, "Failed to roll back reminder record");
        }

        // A timed-out registration may still land after we gave up on it.
        let timed_out = matches!(cause, ReminderError::SchedulingFailed { retryable: true, .. });
        if timed_out && !had_live_trigger {
            let identifier = trigger_identifier(id);
            if let Err(e) = self
                .call_notifier("remove", id, self.notifier.remove_trigger(&identifier))
                .await
            {
                warn!(id = %id, error = %e, "Could not withdraw timed-out trigger");
            }
        }
        debug!(id = %id, "Reminder record rolled back");
    }

    async fn call_notifier<F>(
        &self,
        op: &'static str,
        id: ReminderId,
        call: F,
    ) -> Result<(), ReminderError>
    where
        F: Future<Output = Result<(), NotifierError>>,
    {
        match tokio::time::timeout(self.notifier_timeout, call).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(id = %id, op, error = %e, "Notifier rejected request");
                Err(ReminderError::from_notifier(e))
            }
            Err(_) => {
                warn!(
                    id = %id,
                    op,
                    timeout_ms = self.notifier_timeout.as_millis() as u64,
                    "Notifier timed out"
                );
                Err(ReminderError::SchedulingFailed {
                    reason: format!(
                        "notifier did not answer {} within {} ms",
                        op,
                        self.notifier_timeout.as_millis()
                    ),
                    retryable: true,
                })
            }
        }
    }

    async fn lock_id(&self, id: ReminderId) -> IdGuard<'_> {
        let lock = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        IdGuard {
            locks: &self.locks,
            id,
            guard: Some(lock.lock_owned().await),
        }
    }

    fn emit(&self, event: ReminderEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
