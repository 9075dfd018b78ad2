//! Trigger calculation.
//!
//! Approximate reminders become a relative delay, which the notifier may
//! let drift under sleep or coalescing. Exact reminders become calendar
//! fields pinned to wall-clock time in the caller's zone.

use chrono::{DateTime, Datelike, FixedOffset, Local, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use tracing::warn;

use vens_core::types::{Exactness, Timestamp};

use crate::error::ReminderError;

/// Zone in which exact triggers are expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZonePolicy {
    /// The system's local zone, including its DST rules.
    SystemLocal,
    Fixed(FixedOffset),
}

impl ZonePolicy {
    pub fn from_offset_minutes(minutes: Option<i32>) -> Result<Self, ReminderError> {
        match minutes {
            None => Ok(ZonePolicy::SystemLocal),
            Some(m) => m
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .map(ZonePolicy::Fixed)
                .ok_or_else(|| {
                    ReminderError::InvalidSchedule(format!("UTC offset out of range: {} min", m))
                }),
        }
    }

    fn offset_at(&self, utc: &DateTime<chrono::Utc>) -> FixedOffset {
        match self {
            ZonePolicy::SystemLocal => Local.offset_from_utc_datetime(&utc.naive_utc()),
            ZonePolicy::Fixed(offset) => *offset,
        }
    }
}

/// Wall-clock fields of an exact trigger, with the UTC offset they were
/// taken in so the instant can be reconstructed without ambiguity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFields {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub utc_offset_secs: i32,
}

impl CalendarFields {
    /// The instant these fields denote, or `None` for out-of-range fields.
    pub fn to_timestamp(&self) -> Option<Timestamp> {
        FixedOffset::east_opt(self.utc_offset_secs)?
            .with_ymd_and_hms(
                self.year,
                self.month,
                self.day,
                self.hour,
                self.minute,
                self.second,
            )
            .single()
            .map(|dt| Timestamp(dt.timestamp()))
    }
}

/// A one-shot scheduling directive handed to the notifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerDescriptor {
    /// Fires `delay_secs` after registration.
    Interval { delay_secs: u64 },
    /// Fires at the wall-clock instant given by the fields.
    Calendar { fields: CalendarFields },
}

impl TriggerDescriptor {
    /// Seconds from `now` until the trigger fires, never negative.
    pub fn delay_from(&self, now: Timestamp) -> u64 {
        match self {
            TriggerDescriptor::Interval { delay_secs } => *delay_secs,
            TriggerDescriptor::Calendar { fields } => fields
                .to_timestamp()
                .map(|at| at.secs_since(now).max(0) as u64)
                .unwrap_or(0),
        }
    }
}

/// Non-fatal conditions surfaced alongside a trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleWarning {
    /// The requested time had already passed; the reminder fires immediately.
    PastDue { late_by_secs: i64 },
}

/// Result of a trigger computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerPlan {
    pub descriptor: TriggerDescriptor,
    pub warning: Option<ScheduleWarning>,
}

/// Converts a requested fire time into a trigger descriptor.
#[derive(Clone, Copy, Debug)]
pub struct TriggerCalculator {
    zone: ZonePolicy,
    past_due_tolerance_secs: i64,
}

impl TriggerCalculator {
    pub fn new(zone: ZonePolicy, past_due_tolerance_secs: i64) -> Self {
        Self {
            zone,
            past_due_tolerance_secs: past_due_tolerance_secs.max(0),
        }
    }

    pub fn zone(&self) -> ZonePolicy {
        self.zone
    }

    /// Compute the trigger for `fire_at` as seen at `now`.
    ///
    /// Approximate delays are clamped to zero; exact times are never
    /// clamped, so a past exact time fires immediately. Either way a time
    /// later than the tolerance carries a `PastDue` warning.
    pub fn compute(
        &self,
        fire_at: Timestamp,
        exactness: Exactness,
        now: Timestamp,
    ) -> Result<TriggerPlan, ReminderError> {
        let delta = fire_at.secs_since(now);
        let warning = if delta < -self.past_due_tolerance_secs {
            warn!(
                fire_at = fire_at.0,
                now = now.0,
                late_by_secs = -delta,
                %exactness,
                "Reminder requested in the past, firing as soon as possible"
            );
            Some(ScheduleWarning::PastDue {
                late_by_secs: -delta,
            })
        } else {
            None
        };

        let descriptor = match exactness {
            Exactness::Approximate => TriggerDescriptor::Interval {
                delay_secs: delta.max(0) as u64,
            },
            Exactness::Exact => TriggerDescriptor::Calendar {
                fields: self.decompose(fire_at)?,
            },
        };

        Ok(TriggerPlan {
            descriptor,
            warning,
        })
    }

    /// Split `ts` into calendar fields in the configured zone.
    pub fn decompose(&self, ts: Timestamp) -> Result<CalendarFields, ReminderError> {
        let utc = DateTime::from_timestamp(ts.0, 0).ok_or_else(|| {
            ReminderError::InvalidSchedule(format!("timestamp {} is out of range", ts.0))
        })?;
        let offset = self.zone.offset_at(&utc);
        let local = utc.with_timezone(&offset);

        Ok(CalendarFields {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hour: local.hour(),
            minute: local.minute(),
            second: local.second(),
            utc_offset_secs: offset.local_minus_utc(),
        })
    }
}
