use serde::{Deserialize, Serialize};

use vens_core::types::{Exactness, ReminderId, Timestamp};

/// State changes published by the scheduler core.
///
/// Events for one reminder are sent in the order the operations producing
/// them were issued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderEvent {
    /// A trigger was registered and the record is Pending.
    Scheduled {
        id: ReminderId,
        fire_at: Timestamp,
        exactness: Exactness,
    },

    /// The reminder was pushed out by a snoozing action.
    Snoozed { id: ReminderId, fire_at: Timestamp },

    /// The notifier delivered the reminder.
    Fired { id: ReminderId },

    /// A user action closed the reminder.
    Completed { id: ReminderId },

    Cancelled { id: ReminderId },

    /// A terminal record was acknowledged and deleted.
    Removed { id: ReminderId },
}

impl ReminderEvent {
    pub fn id(&self) -> ReminderId {
        match self {
            ReminderEvent::Scheduled { id, .. }
            | ReminderEvent::Snoozed { id, .. }
            | ReminderEvent::Fired { id }
            | ReminderEvent::Completed { id }
            | ReminderEvent::Cancelled { id }
            | ReminderEvent::Removed { id } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id() {
        let event = ReminderEvent::Snoozed {
            id: ReminderId(4),
            fire_at: Timestamp(100),
        };
        assert_eq!(event.id(), ReminderId(4));
        assert_eq!(ReminderEvent::Removed { id: ReminderId(9) }.id(), ReminderId(9));
    }

    #[test]
    fn test_event_serialization() {
        let event = ReminderEvent::Scheduled {
            id: ReminderId(7),
            fire_at: Timestamp(1_700_000_000),
            exactness: Exactness::Exact,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scheduled");
        assert_eq!(json["id"], 7);
        assert_eq!(json["fire_at"], 1_700_000_000i64);
        assert_eq!(json["exactness"], "exact");

        let back: ReminderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
