//! In-memory reminder store.
//!
//! Backed by a sharded `DashMap`, so readers only contend with writers that
//! touch the same shard.

use dashmap::DashMap;

use vens_core::types::{Reminder, ReminderId};

use crate::error::StoreError;
use crate::store::{ActiveReminders, ReminderStore};

/// Non-durable store used for tests and the `--memory` mode.
#[derive(Debug, Default)]
pub struct MemoryReminderStore {
    records: DashMap<ReminderId, Reminder>,
}

impl MemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ReminderStore for MemoryReminderStore {
    fn put(&self, reminder: Reminder) -> Result<(), StoreError> {
        self.records.insert(reminder.id, reminder);
        Ok(())
    }

    fn get(&self, id: ReminderId) -> Result<Reminder, StoreError> {
        self.records
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    fn remove(&self, id: ReminderId) -> Result<(), StoreError> {
        self.records.remove(&id);
        Ok(())
    }

    fn list_active(&self) -> Result<ActiveReminders<'_>, StoreError> {
        let mut keys: Vec<_> = self
            .records
            .iter()
            .filter(|entry| entry.is_active())
            .map(|entry| (entry.fire_at, entry.id))
            .collect();
        keys.sort_unstable();

        Ok(Box::new(keys.into_iter().filter_map(move |(_, id)| {
            self.records
                .get(&id)
                .filter(|entry| entry.is_active())
                .map(|entry| Ok(entry.value().clone()))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;
    use std::sync::Arc;
    use vens_core::types::ReminderStatus;

    #[test]
    fn test_put_get_roundtrip() {
        contract::put_get_roundtrip(&MemoryReminderStore::new());
    }

    #[test]
    fn test_put_replaces_regardless_of_status() {
        contract::put_replaces_regardless_of_status(&MemoryReminderStore::new());
    }

    #[test]
    fn test_get_missing_is_not_found() {
        contract::get_missing_is_not_found(&MemoryReminderStore::new());
    }

    #[test]
    fn test_remove_is_unconditional() {
        contract::remove_is_unconditional(&MemoryReminderStore::new());
    }

    #[test]
    fn test_list_active_filters_and_orders() {
        contract::list_active_filters_and_orders(&MemoryReminderStore::new());
    }

    #[test]
    fn test_list_active_is_restartable() {
        contract::list_active_is_restartable(&MemoryReminderStore::new());
    }

    #[test]
    fn test_list_active_is_lazy() {
        contract::list_active_is_lazy(&MemoryReminderStore::new());
    }

    #[test]
    fn test_list_active_reflects_current_record() {
        contract::list_active_reflects_current_record(&MemoryReminderStore::new());
    }

    #[test]
    fn test_len_tracks_records() {
        let store = MemoryReminderStore::new();
        assert!(store.is_empty());
        store
            .put(contract::reminder(1, 10, ReminderStatus::Pending))
            .unwrap();
        store
            .put(contract::reminder(1, 20, ReminderStatus::Pending))
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_writers_on_distinct_ids() {
        let store = Arc::new(MemoryReminderStore::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let id = worker * 100 + i;
                        store
                            .put(contract::reminder(id, id, ReminderStatus::Pending))
                            .unwrap();
                        let got = store.get(ReminderId(id)).unwrap();
                        assert_eq!(got.title, format!("Reminder {}", id));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 800);
        assert_eq!(store.list_active().unwrap().count(), 800);
    }
}
