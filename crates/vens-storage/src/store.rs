//! The reminder store contract.

use vens_core::types::{Reminder, ReminderId};

use crate::error::StoreError;

/// Lazy sequence of active reminders in ascending `fire_at` order.
///
/// Only the ordering keys are snapshotted when the sequence is created;
/// each record is read when the iterator reaches it, so a record that was
/// removed or left the active set in the meantime is skipped. A record that
/// cannot be read is yielded as an error rather than skipped.
pub type ActiveReminders<'a> =
    Box<dyn Iterator<Item = Result<Reminder, StoreError>> + Send + 'a>;

/// Durable mapping of reminder id to reminder record.
///
/// Every mutation touches exactly one record and is atomic with respect to
/// concurrent readers.
pub trait ReminderStore: Send + Sync {
    /// Insert or replace the record with `reminder.id`, whatever its status.
    fn put(&self, reminder: Reminder) -> Result<(), StoreError>;

    /// Fetch a record, or `StoreError::NotFound`.
    fn get(&self, id: ReminderId) -> Result<Reminder, StoreError>;

    /// Delete a record. Deleting an absent id is not an error.
    fn remove(&self, id: ReminderId) -> Result<(), StoreError>;

    /// Pending and snoozed reminders ordered by `fire_at`, then id.
    /// Each call starts a fresh sequence.
    fn list_active(&self) -> Result<ActiveReminders<'_>, StoreError>;

    /// `get` that maps `NotFound` to `None`.
    fn find(&self, id: ReminderId) -> Result<Option<Reminder>, StoreError> {
        match self.get(id) {
            Ok(reminder) => Ok(Some(reminder)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Shared contract tests run against every backend.
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use vens_core::types::{CategoryId, Exactness, ReminderStatus, Timestamp};

    pub fn reminder(id: i64, fire_at: i64, status: ReminderStatus) -> Reminder {
        Reminder {
            id: ReminderId(id),
            title: format!("Reminder {}", id),
            body: "body".to_string(),
            fire_at: Timestamp(fire_at),
            exactness: Exactness::Approximate,
            category: CategoryId::PeriodReminder,
            status,
            updated_at: Timestamp(0),
        }
    }

    pub fn put_get_roundtrip(store: &dyn ReminderStore) {
        let mut r = reminder(1, 500, ReminderStatus::Pending);
        r.exactness = Exactness::Exact;
        r.category = CategoryId::MedicationReminder;
        store.put(r.clone()).unwrap();
        assert_eq!(store.get(ReminderId(1)).unwrap(), r);
    }

    pub fn put_replaces_regardless_of_status(store: &dyn ReminderStore) {
        store
            .put(reminder(1, 500, ReminderStatus::Fired))
            .unwrap();
        let mut replacement = reminder(1, 900, ReminderStatus::Pending);
        replacement.title = "Replaced".to_string();
        store.put(replacement).unwrap();

        let got = store.get(ReminderId(1)).unwrap();
        assert_eq!(got.title, "Replaced");
        assert_eq!(got.fire_at, Timestamp(900));
        assert_eq!(got.status, ReminderStatus::Pending);
    }

    pub fn get_missing_is_not_found(store: &dyn ReminderStore) {
        let err = store.get(ReminderId(404)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ReminderId(404))));
        assert!(store.find(ReminderId(404)).unwrap().is_none());
    }

    pub fn remove_is_unconditional(store: &dyn ReminderStore) {
        store.remove(ReminderId(99)).unwrap();
        store
            .put(reminder(2, 100, ReminderStatus::Cancelled))
            .unwrap();
        store.remove(ReminderId(2)).unwrap();
        assert!(store.find(ReminderId(2)).unwrap().is_none());
        store.remove(ReminderId(2)).unwrap();
    }

    pub fn list_active_filters_and_orders(store: &dyn ReminderStore) {
        store.put(reminder(1, 300, ReminderStatus::Pending)).unwrap();
        store.put(reminder(2, 100, ReminderStatus::Snoozed)).unwrap();
        store.put(reminder(3, 200, ReminderStatus::Fired)).unwrap();
        store
            .put(reminder(4, 50, ReminderStatus::Cancelled))
            .unwrap();
        store.put(reminder(5, 300, ReminderStatus::Pending)).unwrap();
        store.put(reminder(6, 150, ReminderStatus::Pending)).unwrap();

        let ids: Vec<i64> = store.list_active().unwrap().map(|r| r.unwrap().id.0).collect();
        assert_eq!(ids, vec![2, 6, 1, 5]);
    }

    pub fn list_active_is_restartable(store: &dyn ReminderStore) {
        store.put(reminder(1, 10, ReminderStatus::Pending)).unwrap();
        store.put(reminder(2, 20, ReminderStatus::Pending)).unwrap();

        let first: Vec<i64> = store.list_active().unwrap().map(|r| r.unwrap().id.0).collect();
        let second: Vec<i64> = store.list_active().unwrap().map(|r| r.unwrap().id.0).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![1, 2]);
    }

    pub fn list_active_is_lazy(store: &dyn ReminderStore) {
        store.put(reminder(1, 10, ReminderStatus::Pending)).unwrap();
        store.put(reminder(2, 20, ReminderStatus::Pending)).unwrap();
        store.put(reminder(3, 30, ReminderStatus::Pending)).unwrap();

        let mut iter = store.list_active().unwrap();
        assert_eq!(iter.next().unwrap().unwrap().id, ReminderId(1));

        // Changes made mid-iteration are observed for records not yet read.
        store.remove(ReminderId(2)).unwrap();
        let mut fired = reminder(3, 30, ReminderStatus::Fired);
        fired.title = "done".to_string();
        store.put(fired).unwrap();

        assert!(iter.next().is_none());
    }

    pub fn list_active_reflects_current_record(store: &dyn ReminderStore) {
        store.put(reminder(1, 10, ReminderStatus::Pending)).unwrap();
        let mut iter = store.list_active().unwrap();
        let mut snoozed = reminder(1, 10, ReminderStatus::Snoozed);
        snoozed.title = "Snoozed".to_string();
        store.put(snoozed).unwrap();

        let got = iter.next().unwrap().unwrap();
        assert_eq!(got.status, ReminderStatus::Snoozed);
        assert_eq!(got.title, "Snoozed");
    }
}
