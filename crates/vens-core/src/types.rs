use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// How precisely a reminder must fire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exactness {
    /// Relative delay; the OS may coalesce or drift it under sleep/throttling.
    #[default]
    Approximate,
    /// Pinned to wall-clock calendar fields.
    Exact,
}

impl Exactness {
    pub fn from_is_exact(is_exact: bool) -> Self {
        if is_exact {
            Exactness::Exact
        } else {
            Exactness::Approximate
        }
    }
}

impl fmt::Display for Exactness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exactness::Approximate => write!(f, "approximate"),
            Exactness::Exact => write!(f, "exact"),
        }
    }
}

impl std::str::FromStr for Exactness {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approximate" => Ok(Exactness::Approximate),
            "exact" => Ok(Exactness::Exact),
            _ => Err(format!("Unknown exactness: {}", s)),
        }
    }
}

/// Reminder kinds. Each maps to one notification category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryId {
    #[default]
    PeriodReminder,
    MedicationReminder,
    FertilityAlert,
}

impl CategoryId {
    pub const ALL: [CategoryId; 3] = [
        CategoryId::PeriodReminder,
        CategoryId::MedicationReminder,
        CategoryId::FertilityAlert,
    ];

    /// Wire identifier shared with the notifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryId::PeriodReminder => "PERIOD_REMINDER",
            CategoryId::MedicationReminder => "MEDICATION_REMINDER",
            CategoryId::FertilityAlert => "FERTILITY_ALERT",
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CategoryId {
    type Err = String;

    /// Accepts the wire id and the lowercase form push payloads carry.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERIOD_REMINDER" | "period_reminder" => Ok(CategoryId::PeriodReminder),
            "MEDICATION_REMINDER" | "medication_reminder" => Ok(CategoryId::MedicationReminder),
            "FERTILITY_ALERT" | "fertility_alert" => Ok(CategoryId::FertilityAlert),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Reminder lifecycle states.
///
/// `Absent` is not a stored status: a missing record is the absent state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Snoozed,
    Fired,
    Cancelled,
}

impl ReminderStatus {
    /// Pending and Snoozed reminders own a live trigger at the notifier.
    pub fn is_active(&self) -> bool {
        matches!(self, ReminderStatus::Pending | ReminderStatus::Snoozed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderStatus::Pending => write!(f, "pending"),
            ReminderStatus::Snoozed => write!(f, "snoozed"),
            ReminderStatus::Fired => write!(f, "fired"),
            ReminderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ReminderStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReminderStatus::Pending),
            "snoozed" => Ok(ReminderStatus::Snoozed),
            "fired" => Ok(ReminderStatus::Fired),
            "cancelled" => Ok(ReminderStatus::Cancelled),
            _ => Err(format!("Unknown reminder status: {}", s)),
        }
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Caller-supplied reminder key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(pub i64);

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ReminderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Unix timestamp in seconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    pub fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Signed seconds from `earlier` to `self`.
    pub fn secs_since(&self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Domain Structs
// =============================================================================

/// A scheduled reminder, owned by the reminder store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub title: String,
    pub body: String,
    pub fire_at: Timestamp,
    pub exactness: Exactness,
    pub category: CategoryId,
    pub status: ReminderStatus,
    pub updated_at: Timestamp,
}

impl Reminder {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Source of "now" for scheduling decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to. Used by tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start.0),
        }
    }

    pub fn set(&self, ts: Timestamp) {
        self.now.store(ts.0, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::SeqCst))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactness_from_is_exact() {
        assert_eq!(Exactness::from_is_exact(true), Exactness::Exact);
        assert_eq!(Exactness::from_is_exact(false), Exactness::Approximate);
        assert_eq!(Exactness::default(), Exactness::Approximate);
    }

    #[test]
    fn test_category_wire_ids() {
        assert_eq!(CategoryId::PeriodReminder.to_string(), "PERIOD_REMINDER");
        assert_eq!(
            CategoryId::MedicationReminder.to_string(),
            "MEDICATION_REMINDER"
        );
        assert_eq!(CategoryId::FertilityAlert.to_string(), "FERTILITY_ALERT");
    }

    #[test]
    fn test_category_from_str_accepts_payload_form() {
        assert_eq!(
            "period_reminder".parse::<CategoryId>().unwrap(),
            CategoryId::PeriodReminder
        );
        assert_eq!(
            "MEDICATION_REMINDER".parse::<CategoryId>().unwrap(),
            CategoryId::MedicationReminder
        );
        assert!("SLEEP_REMINDER".parse::<CategoryId>().is_err());
    }

    #[test]
    fn test_category_serializes_as_wire_id() {
        let json = serde_json::to_string(&CategoryId::FertilityAlert).unwrap();
        assert_eq!(json, "\"FERTILITY_ALERT\"");
    }

    #[test]
    fn test_status_activity() {
        assert!(ReminderStatus::Pending.is_active());
        assert!(ReminderStatus::Snoozed.is_active());
        assert!(ReminderStatus::Fired.is_terminal());
        assert!(ReminderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_display_from_str() {
        for status in [
            ReminderStatus::Pending,
            ReminderStatus::Snoozed,
            ReminderStatus::Fired,
            ReminderStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<ReminderStatus>().unwrap(), status);
        }
        assert!("done".parse::<ReminderStatus>().is_err());
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = Timestamp(1_000);
        assert_eq!(ts.plus_secs(1800), Timestamp(2_800));
        assert_eq!(Timestamp(2_800).secs_since(ts), 1800);
        assert_eq!(ts.secs_since(Timestamp(2_800)), -1800);
        assert_eq!(Timestamp(i64::MAX).plus_secs(1), Timestamp(i64::MAX));
    }

    #[test]
    fn test_timestamp_to_datetime_roundtrip() {
        let now = Utc::now();
        let ts = Timestamp::from_datetime(now);
        assert_eq!(ts.to_datetime().timestamp(), now.timestamp());
    }

    #[test]
    fn test_reminder_id_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&ReminderId(7)).unwrap(), "7");
        let id: ReminderId = serde_json::from_str("42").unwrap();
        assert_eq!(id, ReminderId(42));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(Timestamp(100));
        assert_eq!(clock.now(), Timestamp(100));
        clock.advance(30);
        assert_eq!(clock.now(), Timestamp(130));
        clock.set(Timestamp(5));
        assert_eq!(clock.now(), Timestamp(5));
    }
}
