//! Vens API crate: the method channel and its HTTP surface.
//!
//! Callers schedule and cancel reminders through the method channel; the
//! notifier reports deliveries, actions, and refresh payloads through the
//! `/notifier` routes.

pub mod channel;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use channel::{MethodCall, MethodChannel, CHANNEL_NAME};
pub use error::{ChannelError, ErrorCode};
pub use routes::{create_router, start_server};
pub use state::AppState;
