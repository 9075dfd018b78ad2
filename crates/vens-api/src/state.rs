//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use vens_reminder::{
    ActionDispatcher, BackgroundSweep, CategoryRegistry, PayloadEnricher, SchedulerCore,
};

use crate::channel::MethodChannel;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<SchedulerCore>,
    pub dispatcher: Arc<ActionDispatcher>,
    pub enricher: Arc<PayloadEnricher>,
    pub channel: Arc<MethodChannel>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        scheduler: Arc<SchedulerCore>,
        registry: Arc<CategoryRegistry>,
        sweep: Option<Arc<BackgroundSweep>>,
    ) -> Self {
        let dispatcher = ActionDispatcher::new(Arc::clone(&scheduler), registry);
        let channel = MethodChannel::new(Arc::clone(&scheduler), sweep);
        Self {
            scheduler,
            dispatcher: Arc::new(dispatcher),
            enricher: Arc::new(PayloadEnricher::new()),
            channel: Arc::new(channel),
            start_time: Instant::now(),
        }
    }
}
