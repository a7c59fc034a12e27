use std::time::Duration;

use async_trait::async_trait;

use crate::error::PilotError;
use crate::event::Event;
use crate::types::{
    Action, ActionResult, Analysis, Instruction, OperatorKind, Screenshot, Session, SurfaceState,
};

/// Executes actions against one automation surface and captures its visual state.
///
/// Expected automation failures (element not found, navigation timeout) come
/// back as `Ok` results with `success == false`. `Err` is reserved for faults
/// of the operator itself.
#[async_trait]
pub trait Operator: Send + Sync {
    fn kind(&self) -> OperatorKind;

    /// Launch or attach to the surface.
    async fn initialize(&mut self) -> Result<(), PilotError>;

    /// The surface as it looks right now. Never mutates it.
    async fn capture(&self) -> Result<Screenshot, PilotError>;

    async fn execute(&mut self, action: &Action) -> Result<ActionResult, PilotError>;

    /// Current location. May be stale or empty, never fails.
    async fn query_state(&self) -> SurfaceState;

    /// Release OS/browser resources. Safe to call repeatedly, and after a
    /// partial or failed `initialize`.
    async fn cleanup(&mut self) -> Result<(), PilotError>;
}

/// Maps (screenshot, instruction, history) to the next proposed step.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Name used in logs and fault messages.
    fn name(&self) -> &str;

    async fn initialize(&mut self) -> Result<(), PilotError> {
        Ok(())
    }

    /// Always returns a complete `Analysis`; errors only for transport or
    /// authorization faults.
    async fn analyze_screenshot(
        &self,
        screenshot: &Screenshot,
        instruction: &Instruction,
        iteration: u32,
        prior_results: &[ActionResult],
    ) -> Result<Analysis, PilotError>;

    async fn cleanup(&mut self) -> Result<(), PilotError> {
        Ok(())
    }
}

/// Append-only store of per-run results.
pub trait SessionRecorder: Send + Sync {
    /// Start a session; it becomes the active one.
    fn create_session(&self, instruction: &Instruction) -> Result<String, PilotError>;

    fn append(&self, session_id: &str, result: &ActionResult) -> Result<(), PilotError>;

    fn get(&self, session_id: &str) -> Result<Option<Session>, PilotError>;

    /// Most recently updated sessions first.
    fn history(&self, limit: usize) -> Result<Vec<Session>, PilotError>;

    /// Drop sessions not updated within `max_age`. The active session is
    /// never removed. Returns how many were pruned.
    fn prune_older_than(&self, max_age: Duration) -> Result<usize, PilotError>;
}

/// Outbound, fire-and-forget progress notifications.
pub trait EventPort: Send + Sync {
    fn emit(&self, event: Event);
}
