//! In-process notifier backed by tokio timers.
//!
//! Each registration is a sleeping task. When it wakes it reports
//! `NotifierEvent::Fired` on the channel returned by [`LocalNotifier::new`];
//! the application routes that back into the scheduler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vens_core::config::NotifierConfig;
use vens_core::types::{Clock, ReminderId, SystemClock, Timestamp};

use crate::category::CategoryDefinition;
use crate::error::NotifierError;
use crate::notifier::{Notifier, TriggerRequest};

/// Callbacks raised by the local notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    /// A registration came due. `fire_at` is the one it was registered with.
    Fired { id: ReminderId, fire_at: Timestamp },
}

struct PendingTrigger {
    generation: u64,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingTrigger>>>;

fn lock_pending(
    pending: &Mutex<HashMap<String, PendingTrigger>>,
) -> MutexGuard<'_, HashMap<String, PendingTrigger>> {
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct LocalNotifier {
    authorized: bool,
    max_pending: usize,
    clock: Arc<dyn Clock>,
    pending: PendingMap,
    categories: Mutex<Vec<CategoryDefinition>>,
    generation: AtomicU64,
    events: mpsc::UnboundedSender<NotifierEvent>,
}

impl LocalNotifier {
    pub fn new(config: &NotifierConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<NotifierEvent>) {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &NotifierConfig,
        clock: Arc<dyn Clock>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<NotifierEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(Self {
            authorized: config.authorized,
            max_pending: config.max_pending,
            clock,
            pending: Arc::new(Mutex::new(HashMap::new())),
            categories: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            events: tx,
        });
        (notifier, rx)
    }

    /// Number of triggers waiting to fire.
    pub fn pending_count(&self) -> usize {
        lock_pending(&self.pending).len()
    }

    pub fn is_pending(&self, identifier: &str) -> bool {
        lock_pending(&self.pending).contains_key(identifier)
    }

    pub fn installed_categories(&self) -> Vec<CategoryDefinition> {
        match self.categories.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for LocalNotifier {
    async fn register_trigger(&self, request: TriggerRequest) -> Result<(), NotifierError> {
        if !self.authorized {
            return Err(NotifierError::PermissionDenied);
        }

        let delay = request.trigger.delay_from(self.clock.now());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let identifier = request.identifier.clone();

        let mut pending = lock_pending(&self.pending);
        if !pending.contains_key(&identifier) && pending.len() >= self.max_pending {
            warn!(
                identifier = %identifier,
                limit = self.max_pending,
                "Notifier full, rejecting trigger"
            );
            return Err(NotifierError::ResourceExhausted {
                limit: self.max_pending,
            });
        }

        let task_pending = Arc::clone(&self.pending);
        let events = self.events.clone();
        let task_identifier = identifier.clone();
        let fired = NotifierEvent::Fired {
            id: request.reminder_id,
            fire_at: request.fire_at,
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay)).await;
            {
                let mut pending = lock_pending(&task_pending);
                match pending.get(&task_identifier) {
                    Some(entry) if entry.generation == generation => {
                        pending.remove(&task_identifier);
                    }
                    _ => return,
                }
            }
            debug!(identifier = %task_identifier, "Trigger fired");
            if events.send(fired).is_err() {
                warn!(identifier = %task_identifier, "No listener for fired trigger");
            }
        });

        let entry = PendingTrigger { generation, handle };
        if let Some(previous) = pending.insert(identifier.clone(), entry) {
            previous.handle.abort();
            debug!(identifier = %identifier, "Superseded existing trigger");
        }
        debug!(identifier = %identifier, delay_secs = delay, "Trigger registered");
        Ok(())
    }

    async fn remove_trigger(&self, identifier: &str) -> Result<(), NotifierError> {
        if let Some(entry) = lock_pending(&self.pending).remove(identifier) {
            entry.handle.abort();
            debug!(identifier, "Trigger removed");
        }
        Ok(())
    }

    async fn install_categories(
        &self,
        categories: &[CategoryDefinition],
    ) -> Result<(), NotifierError> {
        let mut installed = match self.categories.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *installed = categories.to_vec();
        info!(count = categories.len(), "Category set replaced");
        Ok(())
    }
}

impl Drop for LocalNotifier {
    fn drop(&mut self) {
        for (_, entry) in lock_pending(&self.pending).drain() {
            entry.handle.abort();
        }
    }
}
