//! Reminder scheduling engine for Vens.
//!
//! Computes triggers, keeps one live notifier registration per reminder,
//! maps notification actions to state transitions, and runs the
//! self-rescheduling background sweep.

pub mod category;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod notifier;
pub mod payload;
pub mod scheduler;
pub mod state_machine;
pub mod sweep;
pub mod trigger;

pub use category::{ActionDefinition, ActionId, CategoryDefinition, CategoryRegistry};
pub use dispatcher::{ActionDispatcher, ActionOutcome};
pub use error::{NotifierError, ReminderError};
pub use events::ReminderEvent;
pub use notifier::local::{LocalNotifier, NotifierEvent};
pub use notifier::recording::RecordingNotifier;
pub use notifier::{trigger_identifier, Notifier, TriggerRequest};
pub use payload::{InterruptionLevel, NotificationContent, PayloadEnricher, PushPayload};
pub use scheduler::{ScheduleOutcome, ScheduleRequest, SchedulerCore};
pub use sweep::{
    BackgroundSweep, SweepCancel, SweepLaunch, SweepReport, SweepRequest, TaskFacility,
    TokioTaskFacility,
};
pub use trigger::{
    CalendarFields, ScheduleWarning, TriggerCalculator, TriggerDescriptor, TriggerPlan, ZonePolicy,
};
