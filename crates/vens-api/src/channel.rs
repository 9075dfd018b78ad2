//! The method channel.
//!
//! A narrow RPC boundary: a method name plus a JSON argument map. Arguments
//! are validated here; malformed input is answered with
//! `INVALID_ARGUMENTS` and never reaches the scheduler.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use vens_core::types::{CategoryId, Exactness, ReminderId, Timestamp};
use vens_reminder::{BackgroundSweep, ScheduleRequest, SchedulerCore};

use crate::error::{ChannelError, ErrorCode};

/// Channel name shared with callers.
pub const CHANNEL_NAME: &str = "com.vens/notifications";

/// One call on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleArgs {
    id: i64,
    title: String,
    body: String,
    /// Epoch seconds. Fractional values are rejected.
    timestamp: i64,
    #[serde(default)]
    is_exact: bool,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelArgs {
    id: i64,
}

impl ScheduleArgs {
    fn into_request(self) -> Result<ScheduleRequest, ChannelError> {
        let category = match self.category.as_deref() {
            None => CategoryId::default(),
            Some(raw) => raw.parse::<CategoryId>().map_err(ChannelError::invalid_arguments)?,
        };

        Ok(ScheduleRequest::new(
            self.id,
            self.title,
            self.body,
            Timestamp(self.timestamp),
            Exactness::from_is_exact(self.is_exact),
        )
        .with_category(category))
    }
}

fn parse_args<T: DeserializeOwned>(method: &str, arguments: Value) -> Result<T, ChannelError> {
    serde_json::from_value(arguments).map_err(|e| {
        warn!(method, error = %e, "Rejected channel arguments");
        ChannelError::invalid_arguments(format!("Invalid arguments for {}: {}", method, e))
    })
}

/// Dispatches channel calls to the scheduler and background sweep.
pub struct MethodChannel {
    scheduler: Arc<SchedulerCore>,
    sweep: Option<Arc<BackgroundSweep>>,
}

impl MethodChannel {
    pub fn new(scheduler: Arc<SchedulerCore>, sweep: Option<Arc<BackgroundSweep>>) -> Self {
        Self { scheduler, sweep }
    }

    /// Invoke `call.method`. Every known method answers with a boolean.
    pub async fn invoke(&self, call: MethodCall) -> Result<Value, ChannelError> {
        debug!(channel = CHANNEL_NAME, method = %call.method, "Channel call");
        match call.method.as_str() {
            "scheduleNotification" => {
                let args: ScheduleArgs = parse_args(&call.method, call.arguments)?;
                self.scheduler.schedule(args.into_request()?).await?;
                Ok(Value::Bool(true))
            }
            "cancelNotification" => {
                let args: CancelArgs = parse_args(&call.method, call.arguments)?;
                self.scheduler.cancel(ReminderId(args.id)).await?;
                Ok(Value::Bool(true))
            }
            "scheduleBackgroundTask" => Ok(Value::Bool(self.schedule_background_task().await)),
            other => Err(ChannelError::new(
                ErrorCode::NotImplemented,
                format!("Method not implemented: {}", other),
            )),
        }
    }

    async fn schedule_background_task(&self) -> bool {
        let Some(sweep) = &self.sweep else {
            debug!("Background sweep disabled");
            return false;
        };
        match sweep.schedule_next().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Could not submit background sweep");
                false
            }
        }
    }
}
