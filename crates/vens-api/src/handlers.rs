//! Route handler functions.
//!
//! Handlers validate request bodies at the boundary, call into the
//! scheduler, dispatcher, or enricher, and answer with JSON.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use vens_core::types::{Reminder, ReminderId, Timestamp};
use vens_reminder::{ActionOutcome, NotificationContent, PushPayload};

use crate::channel::MethodCall;
use crate::error::ChannelError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub id: i64,
    pub action_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiredRequest {
    pub id: i64,
    /// Fire time the delivering registration was made for. Without it the
    /// delivery applies to whatever is currently scheduled.
    #[serde(default)]
    pub fire_at: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub id: i64,
    pub needs_refresh: bool,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_reminders: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MethodResponse {
    pub result: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FiredResponse {
    /// Whether the delivery moved the reminder to fired.
    pub transitioned: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub badge: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemindersResponse {
    pub reminders: Vec<Reminder>,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ChannelError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ChannelError::invalid_arguments(rejection.body_text()))
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ChannelError> {
    let active_reminders = state.scheduler.active_reminders()?.len();
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_reminders,
    }))
}

/// POST /channel/{method} - invoke a method channel call.
///
/// The body is the argument map; it may be empty for methods without
/// arguments.
pub async fn invoke_method(
    State(state): State<AppState>,
    Path(method): Path<String>,
    body: Bytes,
) -> Result<Json<MethodResponse>, ChannelError> {
    let arguments = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ChannelError::invalid_arguments(format!("Malformed JSON: {}", e)))?
    };

    let result = state
        .channel
        .invoke(MethodCall::new(method, arguments))
        .await?;
    Ok(Json(MethodResponse { result }))
}

/// POST /notifier/action - a user tapped a notification action.
pub async fn notifier_action(
    State(state): State<AppState>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionOutcome>, ChannelError> {
    let request = json_body(body)?;
    let outcome = state
        .dispatcher
        .handle(ReminderId(request.id), &request.action_id)
        .await?;
    Ok(Json(outcome))
}

/// POST /notifier/fired - the notifier delivered a reminder.
pub async fn notifier_fired(
    State(state): State<AppState>,
    body: Result<Json<FiredRequest>, JsonRejection>,
) -> Result<Json<FiredResponse>, ChannelError> {
    let request = json_body(body)?;
    let transitioned = state
        .scheduler
        .on_fired(ReminderId(request.id), request.fire_at.map(Timestamp))
        .await?;
    Ok(Json(FiredResponse { transitioned }))
}

/// POST /notifier/payload - set or clear a reminder's refresh flag.
pub async fn notifier_payload(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, ChannelError> {
    let request = json_body(body)?;
    state
        .enricher
        .on_refresh_payload(ReminderId(request.id), request.needs_refresh);
    Ok(Json(RefreshResponse {
        badge: state.enricher.badge_count(),
    }))
}

/// POST /notifier/enrich - rewrite an incoming push payload for display.
pub async fn notifier_enrich(
    State(state): State<AppState>,
    body: Result<Json<PushPayload>, JsonRejection>,
) -> Result<Json<NotificationContent>, ChannelError> {
    let payload = json_body(body)?;
    Ok(Json(state.enricher.enrich(payload)))
}

/// GET /reminders - active reminders in fire order.
pub async fn list_reminders(
    State(state): State<AppState>,
) -> Result<Json<RemindersResponse>, ChannelError> {
    let reminders = state.scheduler.active_reminders()?;
    Ok(Json(RemindersResponse { reminders }))
}

/// GET /reminders/{id}
pub async fn get_reminder(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Reminder>, ChannelError> {
    Ok(Json(state.scheduler.get(ReminderId(id))?))
}

/// DELETE /reminders/{id} - acknowledge a fired or cancelled reminder.
pub async fn acknowledge_reminder(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<axum::http::StatusCode, ChannelError> {
    state.scheduler.acknowledge(ReminderId(id)).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// GET /events - SSE stream of reminder state changes.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let rx = state.scheduler.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().event("reminder").data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
