//! Error types for the reminder engine.

use vens_core::error::VensError;
use vens_core::types::{CategoryId, ReminderId, ReminderStatus};
use vens_storage::StoreError;

/// Errors reported by a notifier implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifierError {
    #[error("Notification permission denied")]
    PermissionDenied,
    #[error("Notifier is full: {limit} pending triggers")]
    ResourceExhausted { limit: usize },
    #[error("Notifier unavailable: {0}")]
    Unavailable(String),
}

impl NotifierError {
    /// Whether the same request could succeed later without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotifierError::Unavailable(_))
    }
}

/// Errors from reminder scheduling, dispatch, and the background sweep.
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Scheduling failed: {reason}")]
    SchedulingFailed { reason: String, retryable: bool },
    #[error("Reminder not found: {0}")]
    NotFound(ReminderId),
    #[error("Action {action} is not defined for category {category}")]
    UnknownAction { category: CategoryId, action: String },
    #[error("Category not registered: {0}")]
    UnknownCategory(CategoryId),
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: ReminderStatus,
        to: ReminderStatus,
    },
    #[error("Reminder {0} is still active")]
    StillActive(ReminderId),
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("Background task submission failed: {0}")]
    BackgroundTask(String),
    #[error("Store error: {0}")]
    Store(#[source] StoreError),
}

impl ReminderError {
    pub(crate) fn from_notifier(err: NotifierError) -> Self {
        ReminderError::SchedulingFailed {
            retryable: err.is_retryable(),
            reason: err.to_string(),
        }
    }
}

impl From<StoreError> for ReminderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ReminderError::NotFound(id),
            other => ReminderError::Store(other),
        }
    }
}

impl From<ReminderError> for VensError {
    fn from(err: ReminderError) -> Self {
        match err {
            ReminderError::Store(e) => e.into(),
            other => VensError::Scheduling(other.to_string()),
        }
    }
}
