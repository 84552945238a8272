//! Pause/resume/cancel signals and the `get_progress` query: a small message
//! enum delivered over a channel, applied to shared state via atomics for
//! low-overhead reads from the query path without blocking the workflow loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use crate::state::{BomProgress, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Pause,
    Resume,
    Cancel,
}

/// Per-workflow shared state: the running stage loop polls `paused`/
/// `cancelled` at each batch boundary; `get_progress` reads `progress` and
/// `state` without touching the loop at all.
pub struct WorkflowHandle {
    pub organization_id: Uuid,
    paused: AtomicBool,
    cancelled: AtomicBool,
    state: RwLock<WorkflowState>,
    progress: RwLock<BomProgress>,
    signal_tx: watch::Sender<()>,
    signal_rx: watch::Receiver<()>,
}

impl WorkflowHandle {
    pub fn new(total_items: u32, organization_id: Uuid) -> Arc<Self> {
        let (signal_tx, signal_rx) = watch::channel(());
        Arc::new(Self {
                organization_id,
                paused: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                state: RwLock::new(WorkflowState::Parsed),
                progress: RwLock::new(BomProgress { total: total_items, ..Default::default() }),
                signal_tx,
                signal_rx,
            })
    }

    pub fn apply(&self, signal: ControlSignal) {
        match signal {
            ControlSignal::Pause => self.paused.store(true, Ordering::SeqCst),
            ControlSignal::Resume => self.paused.store(false, Ordering::SeqCst),
            ControlSignal::Cancel => self.cancelled.store(true, Ordering::SeqCst),
        }
        let _ = self.signal_tx.send(());
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Blocks the caller until a pause/resume/cancel signal arrives. Used by
    /// the batch loop's paused sub-state to await `resume()` instead of
    /// busy-polling.
    pub async fn wait_for_signal(&self) {
        let mut rx = self.signal_rx.clone();
        let _ = rx.changed().await;
    }

    pub async fn set_state(&self, next: WorkflowState) {
        *self.state.write().await = next;
    }

    pub async fn state(&self) -> WorkflowState {
        *self.state.read().await
    }

    pub async fn update_progress(&self, f: impl FnOnce(&mut BomProgress)) {
        let mut p = self.progress.write().await;
        f(&mut p);
    }

    pub async fn progress(&self) -> BomProgress {
        *self.progress.read().await
    }
}

/// Registry of live workflow handles, the in-process half of I2 (at most one
/// active workflow per deterministic workflow id) and the backing store for
/// `get_progress` queries and signal dispatch from
/// [`bomenrich_events::WorkflowDispatch`].
#[derive(Default)]
pub struct WorkflowRegistry {
    handles: dashmap::DashMap<String, Arc<WorkflowHandle>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new handle if `workflow_id` isn't already active. Returns
    /// `None` if a workflow with this id is already running — the caller
    /// should treat the start request as a no-op (P2).
    pub fn register(&self, workflow_id: &str, total_items: u32, organization_id: Uuid) -> Option<Arc<WorkflowHandle>> {
        use dashmap::mapref::entry::Entry;
        match self.handles.entry(workflow_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(v) => {
                let handle = WorkflowHandle::new(total_items, organization_id);
                v.insert(handle.clone());
                Some(handle)
            }
        }
    }

    pub fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowHandle>> {
        self.handles.get(workflow_id).map(|e| e.clone())
    }

    /// Removes the handle once the workflow reaches a terminal state,
    /// freeing the id for a later unrelated run (e.g. a retried BOM upload
    /// after explicit admin deletion, not a replay of the same run).
    pub fn retire(&self, workflow_id: &str) {
        self.handles.remove(workflow_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_sets_flag_until_resume() {
        let handle = WorkflowHandle::new(10, Uuid::new_v4());
        assert!(!handle.is_paused());
        handle.apply(ControlSignal::Pause);
        assert!(handle.is_paused());
        handle.apply(ControlSignal::Resume);
        assert!(!handle.is_paused());
    }

    #[tokio::test]
    async fn cancel_is_sticky() {
        let handle = WorkflowHandle::new(10, Uuid::new_v4());
        handle.apply(ControlSignal::Cancel);
        assert!(handle.is_cancelled());
    }

    #[test]
    fn registry_rejects_second_registration_for_same_id() {
        let registry = WorkflowRegistry::new();
        assert!(registry.register("bom-enrichment-1", 5, Uuid::new_v4()).is_some());
        assert!(registry.register("bom-enrichment-1", 5, Uuid::new_v4()).is_none());
    }

    #[test]
    fn retire_frees_the_id_for_reuse() {
        let registry = WorkflowRegistry::new();
        registry.register("wf-1", 5, Uuid::new_v4()).unwrap();
        registry.retire("wf-1");
        assert!(registry.register("wf-1", 5, Uuid::new_v4()).is_some());
    }

    #[tokio::test]
    async fn wait_for_signal_wakes_on_pause() {
        let handle = WorkflowHandle::new(10, Uuid::new_v4());
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move {
                    handle.wait_for_signal().await;
                    handle.is_paused()
                })
        };
        tokio::task::yield_now().await;
        handle.apply(ControlSignal::Pause);
        assert!(waiter.await.unwrap());
    }
}
