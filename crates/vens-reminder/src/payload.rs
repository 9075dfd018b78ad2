//! Push payload enrichment.
//!
//! Incoming push payloads name their category in lowercase and may ask the
//! app to refresh its data. Before display the content is rewritten to the
//! registered category id, period reminders are raised to time-sensitive,
//! and refresh requests light the badge.

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use vens_core::types::{CategoryId, ReminderId};

/// How strongly the notifier may interrupt the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionLevel {
    Passive,
    #[default]
    Active,
    TimeSensitive,
}

/// A push payload as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub reminder_id: Option<ReminderId>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub refresh_data: bool,
    #[serde(default)]
    pub badge: Option<u32>,
}

/// Display-ready notification content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub category: Option<String>,
    pub interruption_level: InterruptionLevel,
    pub badge: Option<u32>,
}

/// Tracks which reminders asked for a data refresh.
#[derive(Debug, Default)]
pub struct PayloadEnricher {
    refresh: DashSet<ReminderId>,
}

impl PayloadEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite a payload for display.
    pub fn enrich(&self, payload: PushPayload) -> NotificationContent {
        let mut content = NotificationContent {
            title: payload.title,
            body: payload.body,
            category: payload.category.clone(),
            interruption_level: InterruptionLevel::Active,
            badge: payload.badge,
        };

        if let Some(raw) = payload.category.as_deref() {
            if let Ok(category) = raw.parse::<CategoryId>() {
                content.category = Some(category.as_str().to_string());
                if category == CategoryId::PeriodReminder {
                    content.interruption_level = InterruptionLevel::TimeSensitive;
                }
            }
        }

        if payload.refresh_data {
            content.badge = Some(1);
            if let Some(id) = payload.reminder_id {
                self.refresh.insert(id);
            }
        }

        debug!(
            category = ?content.category,
            level = ?content.interruption_level,
            badge = ?content.badge,
            "Payload enriched"
        );
        content
    }

    /// Set or clear the refresh flag for `id`. Store records are untouched.
    pub fn on_refresh_payload(&self, id: ReminderId, needs_refresh: bool) {
        if needs_refresh {
            self.refresh.insert(id);
        } else {
            self.refresh.remove(&id);
        }
        debug!(id = %id, needs_refresh, badge = self.badge_count(), "Refresh flag updated");
    }

    pub fn needs_refresh(&self, id: ReminderId) -> bool {
        self.refresh.contains(&id)
    }

    /// Badge number to show: one per reminder awaiting a refresh.
    pub fn badge_count(&self) -> usize {
        self.refresh.len()
    }
}
