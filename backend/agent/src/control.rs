//! Cooperative pause/resume/stop for a running engine.
//!
//! The flag is a `watch` channel. The engine checks it at the top of every
//! iteration and before every action; an action in flight always finishes.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::info;

use clawpilot_core::{Event, EventKind, EventPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunControl {
    Running,
    Paused,
    Stopped,
}

/// The engine observed a stop request at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopRequested;

pub(crate) struct ControlState {
    tx: watch::Sender<RunControl>,
    session_id: Mutex<Option<String>>,
    events: Arc<dyn EventPort>,
}

impl ControlState {
    pub(crate) fn new(events: Arc<dyn EventPort>) -> Arc<Self> {
        let (tx, _) = watch::channel(RunControl::Running);
        Arc::new(Self {
            tx,
            session_id: Mutex::new(None),
            events,
        })
    }

    /// Start of a new run. A leftover pause is cleared; a stop requested
    /// before the run started stays in force.
    pub(crate) fn begin_run(&self, session_id: &str) {
        self.tx.send_if_modified(|c| {
            let paused = *c == RunControl::Paused;
            if paused {
                *c = RunControl::Running;
            }
            paused
        });
        if let Ok(mut current) = self.session_id.lock() {
            *current = Some(session_id.to_string());
        }
    }

    /// Back to `Running` once resources are released, so a stop aimed at
    /// one run never reaches the next.
    pub(crate) fn reset(&self) {
        self.tx.send_replace(RunControl::Running);
    }

    pub(crate) fn current(&self) -> RunControl {
        *self.tx.borrow()
    }

    pub(crate) fn request_stop(&self) -> bool {
        self.tx.send_if_modified(|c| {
            let changed = *c != RunControl::Stopped;
            *c = RunControl::Stopped;
            changed
        })
    }

    /// Wait out a pause. Errors if a stop was requested.
    pub(crate) async fn checkpoint(&self) -> Result<(), StopRequested> {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|c| *c != RunControl::Paused).await {
            Ok(control) if *control == RunControl::Running => Ok(()),
            _ => Err(StopRequested),
        }
    }

    /// Resolves once a stop has been requested.
    pub(crate) async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|c| *c == RunControl::Stopped).await;
    }

    fn emit(&self, kind: EventKind) {
        let session_id = self.session_id.lock().ok().and_then(|s| s.clone());
        self.events.emit(Event::new(session_id, kind));
    }
}

/// Cloneable control for an `ExecutionEngine`, usable while `execute` runs.
#[derive(Clone)]
pub struct EngineHandle {
    state: Arc<ControlState>,
}

impl EngineHandle {
    pub(crate) fn new(state: Arc<ControlState>) -> Self {
        Self { state }
    }

    /// Suspend before the next iteration or action. Returns false if the
    /// engine was not running.
    pub fn pause(&self) -> bool {
        let paused = self.state.tx.send_if_modified(|c| {
            if *c == RunControl::Running {
                *c = RunControl::Paused;
                true
            } else {
                false
            }
        });
        if paused {
            info!("Engine paused");
            self.state.emit(EventKind::AgentPaused);
        }
        paused
    }

    /// Continue a paused engine. Returns false if it was not paused.
    pub fn resume(&self) -> bool {
        let resumed = self.state.tx.send_if_modified(|c| {
            if *c == RunControl::Paused {
                *c = RunControl::Running;
                true
            } else {
                false
            }
        });
        if resumed {
            info!("Engine resumed");
            self.state.emit(EventKind::AgentResumed);
        }
        resumed
    }

    /// Ask the running engine to stop at its next checkpoint; it then
    /// releases the operator and planner. Repeated calls are no-ops.
    pub fn stop(&self) {
        if self.state.request_stop() {
            info!("Engine stop requested");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.current() == RunControl::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state.current() == RunControl::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawpilot_core::EventBus;
    use std::time::Duration;

    fn handle() -> (EngineHandle, Arc<ControlState>, EventBus) {
        let bus = EventBus::new();
        let state = ControlState::new(Arc::new(bus.clone()));
        state.begin_run("s-1");
        (EngineHandle::new(state.clone()), state, bus)
    }

    #[tokio::test]
    async fn pause_and_resume_emit_once() {
        let (handle, _state, bus) = handle();
        let mut rx = bus.subscribe();
        assert!(handle.pause());
        assert!(!handle.pause());
        assert!(handle.resume());
        assert!(!handle.resume());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::AgentPaused);
        assert_eq!(first.session_id.as_deref(), Some("s-1"));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::AgentResumed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn checkpoint_waits_while_paused() {
        let (handle, state, _bus) = handle();
        handle.pause();
        let waiter = tokio::spawn({
            let state = state.clone();
            async move { state.checkpoint().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        handle.resume();
        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn stop_releases_a_paused_checkpoint() {
        let (handle, state, _bus) = handle();
        handle.pause();
        let waiter = tokio::spawn({
            let state = state.clone();
            async move { state.checkpoint().await }
        });
        handle.stop();
        assert_eq!(waiter.await.unwrap(), Err(StopRequested));
        assert!(!handle.pause());
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn new_run_keeps_a_pending_stop() {
        let (handle, state, _bus) = handle();
        handle.stop();
        state.begin_run("s-2");
        assert_eq!(state.checkpoint().await, Err(StopRequested));
    }

    #[tokio::test]
    async fn new_run_clears_a_pause() {
        let (handle, state, _bus) = handle();
        handle.pause();
        state.begin_run("s-2");
        assert!(!handle.is_paused());
        assert_eq!(state.checkpoint().await, Ok(()));
    }

    #[tokio::test]
    async fn reset_clears_stop() {
        let (handle, state, _bus) = handle();
        handle.stop();
        state.reset();
        assert!(!handle.is_stopped());
        assert_eq!(state.checkpoint().await, Ok(()));
    }
}
