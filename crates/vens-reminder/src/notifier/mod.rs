//! The notifier seam.
//!
//! A notifier surfaces reminders to the user. The engine only needs three
//! capabilities from it: register a trigger, remove a trigger, and install
//! the category set.

pub mod local;
pub mod recording;

use async_trait::async_trait;
use serde::Serialize;

use vens_core::types::{CategoryId, ReminderId, Timestamp};

use crate::category::CategoryDefinition;
use crate::error::NotifierError;
use crate::trigger::TriggerDescriptor;

const IDENTIFIER_PREFIX: &str = "notification_";

/// Stable notifier identifier for a reminder id.
pub fn trigger_identifier(id: ReminderId) -> String {
    format!("{}{}", IDENTIFIER_PREFIX, id.0)
}

/// A request to surface one reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerRequest {
    pub identifier: String,
    pub reminder_id: ReminderId,
    pub title: String,
    pub body: String,
    pub category: CategoryId,
    /// Fire time of the record this registration was made for. Echoed back
    /// with the delivery so a superseded registration can be recognized.
    pub fire_at: Timestamp,
    pub trigger: TriggerDescriptor,
    pub sound: bool,
}

/// External system that delivers reminders.
///
/// Registering under an identifier that already has a live trigger replaces
/// that trigger. Removing an identifier with no live trigger is a no-op.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn register_trigger(&self, request: TriggerRequest) -> Result<(), NotifierError>;

    async fn remove_trigger(&self, identifier: &str) -> Result<(), NotifierError>;

    /// Replace the installed category set with `categories`.
    async fn install_categories(
        &self,
        categories: &[CategoryDefinition],
    ) -> Result<(), NotifierError>;
}
