//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| StoreError::Backend(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Backend(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: reminders");
    }

    Ok(())
}

/// Version 1: reminders table.
fn apply_v1(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS reminders (
            id          INTEGER PRIMARY KEY NOT NULL,
            title       TEXT NOT NULL,
            body        TEXT NOT NULL DEFAULT '',
            fire_at     INTEGER NOT NULL,
            exactness   TEXT NOT NULL
                        CHECK (exactness IN ('approximate', 'exact')),
            category    TEXT NOT NULL
                        CHECK (category IN ('PERIOD_REMINDER', 'MEDICATION_REMINDER', 'FERTILITY_ALERT')),
            status      TEXT NOT NULL
                        CHECK (status IN ('pending', 'snoozed', 'fired', 'cancelled')),
            updated_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reminders_active
            ON reminders (status, fire_at, id);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'reminders');
        ",
    )
    .map_err(|e| StoreError::Backend(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}
