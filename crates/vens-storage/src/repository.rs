//! SQLite-backed reminder store.

use std::sync::Arc;

use rusqlite::OptionalExtension;

use vens_core::types::{Reminder, ReminderId, ReminderStatus, Timestamp};

use crate::db::Database;
use crate::error::StoreError;
use crate::store::{ActiveReminders, ReminderStore};

const SELECT_COLUMNS: &str =
    "SELECT id, title, body, fire_at, exactness, category, status, updated_at FROM reminders";

/// Durable reminder store. Each mutation is a single statement.
pub struct SqliteReminderStore {
    db: Arc<Database>,
}

impl SqliteReminderStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ReminderStore for SqliteReminderStore {
    fn put(&self, reminder: Reminder) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reminders (id, title, body, fire_at, exactness, category, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    body = excluded.body,
                    fire_at = excluded.fire_at,
                    exactness = excluded.exactness,
                    category = excluded.category,
                    status = excluded.status,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    reminder.id.0,
                    reminder.title,
                    reminder.body,
                    reminder.fire_at.0,
                    reminder.exactness.to_string(),
                    reminder.category.as_str(),
                    reminder.status.to_string(),
                    reminder.updated_at.0,
                ],
            )
            .map_err(|e| StoreError::Backend(format!("Failed to save reminder: {}", e)))?;
            Ok(())
        })
    }

    fn get(&self, id: ReminderId) -> Result<Reminder, StoreError> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                rusqlite::params![id.0],
                RawReminder::from_row,
            )
            .optional()
            .map_err(StoreError::from)
        })?;

        row.ok_or(StoreError::NotFound(id))?.into_reminder()
    }

    fn remove(&self, id: ReminderId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM reminders WHERE id = ?1", rusqlite::params![id.0])
                .map_err(|e| StoreError::Backend(format!("Failed to delete reminder: {}", e)))?;
            Ok(())
        })
    }

    fn list_active(&self) -> Result<ActiveReminders<'_>, StoreError> {
        let ids: Vec<i64> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM reminders
                 WHERE status IN ('pending', 'snoozed')
                 ORDER BY fire_at ASC, id ASC",
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })?;

        Ok(Box::new(ids.into_iter().filter_map(move |id| {
            match self.get(ReminderId(id)) {
                Ok(reminder) if reminder.is_active() => Some(Ok(reminder)),
                Ok(_) | Err(StoreError::NotFound(_)) => None,
                Err(e) => {
                    tracing::warn!(id, error = %e, "Unreadable active reminder");
                    Some(Err(e))
                }
            }
        })))
    }
}

/// Column values before enum parsing.
struct RawReminder {
    id: i64,
    title: String,
    body: String,
    fire_at: i64,
    exactness: String,
    category: String,
    status: String,
    updated_at: i64,
}

impl RawReminder {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            fire_at: row.get(3)?,
            exactness: row.get(4)?,
            category: row.get(5)?,
            status: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_reminder(self) -> Result<Reminder, StoreError> {
        let id = ReminderId(self.id);
        let corrupt = |reason: String| StoreError::Corrupt { id, reason };

        Ok(Reminder {
            id,
            title: self.title,
            body: self.body,
            fire_at: Timestamp(self.fire_at),
            exactness: self.exactness.parse().map_err(corrupt)?,
            category: self.category.parse().map_err(corrupt)?,
            status: self.status.parse::<ReminderStatus>().map_err(corrupt)?,
            updated_at: Timestamp(self.updated_at),
        })
    }
}
