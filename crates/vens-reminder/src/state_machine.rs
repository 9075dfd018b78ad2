//! Reminder lifecycle transitions.
//!
//! Pending/Snoozed/Fired -> Snoozed | Fired
//! any -> Pending (schedule), any -> Cancelled (cancel)
//!
//! A cancelled reminder only comes back through `schedule`.

use vens_core::types::ReminderStatus;

use crate::error::ReminderError;

/// Validate that a stored reminder may move from `from` to `to`.
pub fn validate_transition(from: ReminderStatus, to: ReminderStatus) -> Result<(), ReminderError> {
    use vens_core::types::ReminderStatus::*;

    let valid = matches!(
        (from, to),
        (_, Pending)
            | (_, Cancelled)
            | (Pending | Snoozed | Fired, Snoozed)
            | (Pending | Snoozed | Fired, Fired)
    );

    if valid {
        Ok(())
    } else {
        Err(ReminderError::InvalidTransition { from, to })
    }
}

/// Whether a notifier delivery moves `status` to Fired.
///
/// Deliveries for fired or cancelled reminders are late duplicates.
pub fn accepts_delivery(status: ReminderStatus) -> bool {
    status.is_active()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vens_core::types::ReminderStatus::*;

    const ALL: [ReminderStatus; 4] = [Pending, Snoozed, Fired, Cancelled];

    #[test]
    fn test_schedule_from_any_state() {
        for from in ALL {
            assert!(validate_transition(from, Pending).is_ok());
        }
    }

    #[test]
    fn test_cancel_from_any_state() {
        for from in ALL {
            assert!(validate_transition(from, Cancelled).is_ok());
        }
    }

    #[test]
    fn test_snooze_from_live_or_fired() {
        assert!(validate_transition(Pending, Snoozed).is_ok());
        assert!(validate_transition(Snoozed, Snoozed).is_ok());
        assert!(validate_transition(Fired, Snoozed).is_ok());
    }

    #[test]
    fn test_complete_from_live_or_fired() {
        assert!(validate_transition(Pending, Fired).is_ok());
        assert!(validate_transition(Snoozed, Fired).is_ok());
        assert!(validate_transition(Fired, Fired).is_ok());
    }

    #[test]
    fn test_cancelled_rejects_actions() {
        let err = validate_transition(Cancelled, Snoozed).unwrap_err();
        assert!(matches!(
            err,
            ReminderError::InvalidTransition {
                from: Cancelled,
                to: Snoozed
            }
        ));
        assert!(validate_transition(Cancelled, Fired).is_err());
    }

    #[test]
    fn test_delivery_only_for_active() {
        assert!(accepts_delivery(Pending));
        assert!(accepts_delivery(Snoozed));
        assert!(!accepts_delivery(Fired));
        assert!(!accepts_delivery(Cancelled));
    }
}
