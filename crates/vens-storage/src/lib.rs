//! Reminder persistence for Vens.
//!
//! Defines the `ReminderStore` contract and two backends: a sharded
//! in-memory map and a SQLite database in WAL mode.

pub mod db;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod repository;
pub mod store;

pub use db::Database;
pub use error::StoreError;
pub use memory::MemoryReminderStore;
pub use repository::SqliteReminderStore;
pub use store::{ActiveReminders, ReminderStore};
