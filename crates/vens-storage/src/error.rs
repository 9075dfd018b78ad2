//! Error types for reminder persistence.

use vens_core::error::VensError;
use vens_core::types::ReminderId;

/// Errors from a reminder store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Reminder not found: {0}")]
    NotFound(ReminderId),
    #[error("Store backend failed: {0}")]
    Backend(String),
    #[error("Corrupt reminder row {id}: {reason}")]
    Corrupt { id: ReminderId, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<StoreError> for VensError {
    fn from(err: StoreError) -> Self {
        VensError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound(ReminderId(7));
        assert_eq!(err.to_string(), "Reminder not found: 7");

        let err = StoreError::Backend("disk full".to_string());
        assert_eq!(err.to_string(), "Store backend failed: disk full");

        let err = StoreError::Corrupt {
            id: ReminderId(3),
            reason: "unknown status 'done'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt reminder row 3: unknown status 'done'"
        );
    }

    #[test]
    fn test_store_error_into_vens_error() {
        let err: VensError = StoreError::Backend("locked".to_string()).into();
        assert!(matches!(err, VensError::Storage(_)));
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_rusqlite_error_conversion() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
