//! Event ledger - at most one successful handling per event

use crate::domain::output::WorkflowOutput;
use crate::domain::shared::{FlowError, Result};
use crate::domain::switch::SwitchEvent;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

pub const DEFAULT_LEDGER_CAPACITY: usize = 4096;

/// Remembers the successful output of every handled event.
///
/// Handling the same event again (same action, same event key) returns
/// the remembered output instead of running the handler. Concurrent
/// duplicates wait for the first handler to finish. Errors and
/// unsuccessful outputs are not remembered, so a later redelivery tries
/// again. The oldest entries are evicted beyond `capacity`.
pub struct EventLedger {
    capacity: usize,
    entries: Mutex<Entries>,
}

#[derive(Default)]
struct Entries {
    cells: HashMap<String, Arc<OnceCell<WorkflowOutput>>>,
    order: VecDeque<String>,
}

/// Handler outcomes that must not be remembered
enum Forgotten {
    Failed(FlowError),
    Unsuccessful(WorkflowOutput),
}

impl EventLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Run `handler` unless this event was already handled successfully
    /// for `action`. Events without a usable key are always handled.
    pub async fn run_once<F, Fut>(&self, action: &str, event: &SwitchEvent, handler: F) -> Result<WorkflowOutput>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WorkflowOutput>>,
    {
        let Some(event_key) = event.dedup_key() else {
            return handler().await;
        };
        let key = format!("{}/{}", action, event_key);
        let cell = self.cell(&key);

        let mut executed = false;
        let outcome = cell
            .get_or_try_init(|| {
                executed = true;
                async move {
                    match handler().await {
                        Ok(output) if output.success => Ok(output),
                        Ok(output) => Err(Forgotten::Unsuccessful(output)),
                        Err(e) => Err(Forgotten::Failed(e)),
                    }
                }
            })
            .await;

        match outcome {
            Ok(output) => {
                if !executed {
                    debug!("Event {} already handled, reusing its output", key);
                }
                Ok(output.clone())
            }
            Err(Forgotten::Unsuccessful(output)) => Ok(output),
            Err(Forgotten::Failed(e)) => Err(e),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, key: &str) -> Arc<OnceCell<WorkflowOutput>> {
        let mut entries = self.lock();
        if let Some(cell) = entries.cells.get(key) {
            return cell.clone();
        }

        let cell = Arc::new(OnceCell::new());
        entries.cells.insert(key.to_string(), cell.clone());
        entries.order.push_back(key.to_string());

        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.cells.remove(&oldest);
            }
        }
        cell
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}
