//! Maps notification actions to reminder transitions.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use vens_core::types::{ReminderId, Timestamp};

use crate::category::{ActionId, CategoryRegistry};
use crate::error::ReminderError;
use crate::scheduler::SchedulerCore;

/// What an action did to its reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Tracked,
    Taken,
    Skipped,
    /// The app should open the reminder's details.
    Opened,
    Snoozed { fire_at: Timestamp },
}

pub struct ActionDispatcher {
    scheduler: Arc<SchedulerCore>,
    registry: Arc<CategoryRegistry>,
}

impl ActionDispatcher {
    pub fn new(scheduler: Arc<SchedulerCore>, registry: Arc<CategoryRegistry>) -> Self {
        Self {
            scheduler,
            registry,
        }
    }

    /// Apply `action` to reminder `id`.
    ///
    /// The action must belong to the reminder's category; otherwise the call
    /// fails with `UnknownAction` and nothing changes.
    pub async fn handle(
        &self,
        id: ReminderId,
        action: &str,
    ) -> Result<ActionOutcome, ReminderError> {
        let reminder = self.scheduler.get(id)?;

        let action_id = action
            .parse::<ActionId>()
            .ok()
            .filter(|a| self.registry.contains_action(reminder.category, *a))
            .ok_or_else(|| {
                warn!(id = %id, category = %reminder.category, action, "Unknown action");
                ReminderError::UnknownAction {
                    category: reminder.category,
                    action: action.to_string(),
                }
            })?;

        let outcome = match action_id {
            ActionId::RemindLater | ActionId::MedicationRemind => {
                let offset = action_id.snooze_secs().unwrap_or_default();
                let fire_at = self.scheduler.now().plus_secs(offset);
                self.scheduler.snooze(id, fire_at).await?;
                ActionOutcome::Snoozed { fire_at }
            }
            ActionId::MarkAsTracked => {
                self.scheduler.complete(id).await?;
                ActionOutcome::Tracked
            }
            ActionId::MedicationTaken => {
                self.scheduler.complete(id).await?;
                ActionOutcome::Taken
            }
            ActionId::MedicationSkip => {
                self.scheduler.complete(id).await?;
                ActionOutcome::Skipped
            }
            ActionId::ViewFertilityDetails => {
                self.scheduler.complete(id).await?;
                ActionOutcome::Opened
            }
        };

        info!(id = %id, action = %action_id, ?outcome, "Action handled");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::recording::RecordingNotifier;
    use crate::scheduler::ScheduleRequest;
    use crate::trigger::{TriggerCalculator, ZonePolicy};
    use vens_core::types::{CategoryId, Exactness, ManualClock, ReminderStatus};
    use vens_storage::MemoryReminderStore;

    const NOW: Timestamp = Timestamp(1_700_000_000);

    struct Harness {
        dispatcher: ActionDispatcher,
        scheduler: Arc<SchedulerCore>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let scheduler = Arc::new(SchedulerCore::new(
            Arc::new(MemoryReminderStore::new()),
            notifier.clone(),
            TriggerCalculator::new(ZonePolicy::from_offset_minutes(Some(0)).unwrap(), 5),
            clock.clone(),
        ));
        let dispatcher =
            ActionDispatcher::new(scheduler.clone(), Arc::new(CategoryRegistry::standard()));
        Harness {
            dispatcher,
            scheduler,
            notifier,
            clock,
        }
    }

    async fn schedule(h: &Harness, id: i64, category: CategoryId) {
        h.scheduler
            .schedule(
                ScheduleRequest::new(id, "Pill", "Dose", NOW.plus_secs(600), Exactness::Approximate)
                    .with_category(category),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_medication_remind_snoozes_thirty_minutes() {
        let h = harness();
        schedule(&h, 1, CategoryId::MedicationReminder).await;
        h.clock.advance(700);
        let now = h.scheduler.now();

        let outcome = h.dispatcher.handle(ReminderId(1), "MEDICATION_REMIND").await.unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::Snoozed {
                fire_at: now.plus_secs(1800)
            }
        );

        let record = h.scheduler.get(ReminderId(1)).unwrap();
        assert_eq!(record.status, ReminderStatus::Snoozed);
        assert_eq!(record.fire_at, now.plus_secs(1800));
        assert_eq!(h.notifier.live_for(ReminderId(1)).len(), 1);
    }

    #[tokio::test]
    async fn test_remind_later_snoozes_one_hour() {
        let h = harness();
        schedule(&h, 2, CategoryId::PeriodReminder).await;

        let outcome = h.dispatcher.handle(ReminderId(2), "REMIND_LATER").await.unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::Snoozed {
                fire_at: NOW.plus_secs(3600)
            }
        );
    }

    #[tokio::test]
    async fn test_medication_taken_fires_without_reschedule() {
        let h = harness();
        schedule(&h, 3, CategoryId::MedicationReminder).await;
        let registrations = h.notifier.register_count();

        let outcome = h.dispatcher.handle(ReminderId(3), "MEDICATION_TAKEN").await.unwrap();
        assert_eq!(outcome, ActionOutcome::Taken);
        assert_eq!(
            h.scheduler.get(ReminderId(3)).unwrap().status,
            ReminderStatus::Fired
        );
        assert_eq!(h.notifier.register_count(), registrations);
        assert!(h.notifier.live_for(ReminderId(3)).is_empty());
    }

    #[tokio::test]
    async fn test_completing_actions() {
        let h = harness();
        schedule(&h, 4, CategoryId::PeriodReminder).await;
        schedule(&h, 5, CategoryId::MedicationReminder).await;
        schedule(&h, 6, CategoryId::FertilityAlert).await;

        assert_eq!(
            h.dispatcher.handle(ReminderId(4), "MARK_AS_TRACKED").await.unwrap(),
            ActionOutcome::Tracked
        );
        assert_eq!(
            h.dispatcher.handle(ReminderId(5), "MEDICATION_SKIP").await.unwrap(),
            ActionOutcome::Skipped
        );
        assert_eq!(
            h.dispatcher
                .handle(ReminderId(6), "VIEW_FERTILITY_DETAILS")
                .await
                .unwrap(),
            ActionOutcome::Opened
        );
        assert!(h.scheduler.active_reminders().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_action_after_delivery_is_accepted() {
        let h = harness();
        schedule(&h, 7, CategoryId::PeriodReminder).await;
        h.scheduler.on_fired(ReminderId(7), None).await.unwrap();

        let outcome = h.dispatcher.handle(ReminderId(7), "REMIND_LATER").await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Snoozed { .. }));
    }

    #[tokio::test]
    async fn test_action_outside_category_does_not_mutate() {
        let h = harness();
        schedule(&h, 8, CategoryId::FertilityAlert).await;
        let before = h.scheduler.get(ReminderId(8)).unwrap();
        let calls = h.notifier.calls().len();

        for action in ["MEDICATION_TAKEN", "NOT_AN_ACTION", ""] {
            let err = h.dispatcher.handle(ReminderId(8), action).await.unwrap_err();
            assert!(matches!(err, ReminderError::UnknownAction { .. }));
        }

        assert_eq!(h.scheduler.get(ReminderId(8)).unwrap(), before);
        assert_eq!(h.notifier.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_cancelled_rejects_actions() {
        let h = harness();
        schedule(&h, 9, CategoryId::MedicationReminder).await;
        h.scheduler.cancel(ReminderId(9)).await.unwrap();

        for action in ["MEDICATION_TAKEN", "MEDICATION_REMIND"] {
            let err = h.dispatcher.handle(ReminderId(9), action).await.unwrap_err();
            assert!(matches!(err, ReminderError::InvalidTransition { .. }));
        }
        assert_eq!(
            h.scheduler.get(ReminderId(9)).unwrap().status,
            ReminderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_unknown_reminder() {
        let h = harness();
        let err = h.dispatcher.handle(ReminderId(404), "REMIND_LATER").await.unwrap_err();
        assert!(matches!(err, ReminderError::NotFound(ReminderId(404))));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(ActionOutcome::Snoozed {
            fire_at: Timestamp(10),
        })
        .unwrap();
        assert_eq!(json["outcome"], "snoozed");
        assert_eq!(json["fire_at"], 10);
        assert_eq!(
            serde_json::to_value(ActionOutcome::Taken).unwrap()["outcome"],
            "taken"
        );
    }
}
