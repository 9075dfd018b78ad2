//! Instrumented in-memory notifier.
//!
//! Records every call and tracks, per reminder id, the highest number of
//! live registrations ever observed at once. Rejections and latency can be
//! injected.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use vens_core::types::ReminderId;

use crate::category::CategoryDefinition;
use crate::error::NotifierError;
use crate::notifier::{Notifier, TriggerRequest};

/// A notifier call as observed by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Register(TriggerRequest),
    Remove(String),
    InstallCategories(usize),
}

#[derive(Debug, Default)]
struct RecordingState {
    live: Vec<TriggerRequest>,
    calls: Vec<NotifierCall>,
    categories: Vec<CategoryDefinition>,
    category_installs: usize,
    peak_live: HashMap<ReminderId, usize>,
    reject: Option<NotifierError>,
    latency: Option<Duration>,
}

impl RecordingState {
    fn note_peak(&mut self, id: ReminderId) {
        let live = self.live.iter().filter(|r| r.reminder_id == id).count();
        let peak = self.peak_live.entry(id).or_insert(0);
        *peak = (*peak).max(live);
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    state: Mutex<RecordingState>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent call with `err`.
    pub fn reject_with(&self, err: NotifierError) {
        self.lock().reject = Some(err);
    }

    pub fn accept_all(&self) {
        self.lock().reject = None;
    }

    /// Delay every subsequent call by `latency` before answering.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Live registrations, in registration order.
    pub fn live(&self) -> Vec<TriggerRequest> {
        self.lock().live.clone()
    }

    pub fn live_for(&self, id: ReminderId) -> Vec<TriggerRequest> {
        self.lock()
            .live
            .iter()
            .filter(|r| r.reminder_id == id)
            .cloned()
            .collect()
    }

    /// Highest number of simultaneous live registrations seen for `id`.
    pub fn peak_live_for(&self, id: ReminderId) -> usize {
        self.lock().peak_live.get(&id).copied().unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.lock().calls.clone()
    }

    pub fn register_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, NotifierCall::Register(_)))
            .count()
    }

    pub fn installed_categories(&self) -> Vec<CategoryDefinition> {
        self.lock().categories.clone()
    }

    pub fn category_installs(&self) -> usize {
        self.lock().category_installs
    }

    /// Drop a live registration as if it had been delivered.
    pub fn deliver(&self, id: ReminderId) -> Option<TriggerRequest> {
        let mut state = self.lock();
        let pos = state.live.iter().position(|r| r.reminder_id == id)?;
        Some(state.live.remove(pos))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn preamble(&self) -> Result<(), NotifierError> {
        let (latency, reject) = {
            let state = self.lock();
            (state.latency, state.reject.clone())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match reject {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn register_trigger(&self, request: TriggerRequest) -> Result<(), NotifierError> {
        self.lock().calls.push(NotifierCall::Register(request.clone()));
        self.preamble().await?;

        let mut state = self.lock();
        let id = request.reminder_id;
        match state
            .live
            .iter()
            .position(|r| r.identifier == request.identifier)
        {
            Some(pos) => state.live[pos] = request,
            None => state.live.push(request),
        }
        state.note_peak(id);
        Ok(())
    }

    async fn remove_trigger(&self, identifier: &str) -> Result<(), NotifierError> {
        self.lock()
            .calls
            .push(NotifierCall::Remove(identifier.to_string()));
        self.preamble().await?;

        self.lock().live.retain(|r| r.identifier != identifier);
        Ok(())
    }

    async fn install_categories(
        &self,
        categories: &[CategoryDefinition],
    ) -> Result<(), NotifierError> {
        self.lock()
            .calls
            .push(NotifierCall::InstallCategories(categories.len()));
        self.preamble().await?;

        let mut state = self.lock();
        state.categories = categories.to_vec();
        state.category_installs += 1;
        Ok(())
    }
}
