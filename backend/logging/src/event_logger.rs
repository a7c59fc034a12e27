//! Engine Event Logger
//!
//! An `EventPort` that writes every engine event to the `pilot_events`
//! tracing target, with planner text redacted.

use clawpilot_core::{Event, EventKind, EventPort};
use tracing::{debug, info, warn};

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Copy, Default)]
pub struct EventLogger;

impl EventLogger {
    pub fn new() -> Self {
        Self
    }

    /// Serialize an event for logging with planner output scrubbed.
    pub fn render(event: &Event) -> String {
        let mut event = event.clone();
        if let EventKind::AnalysisCompleted { reasoning, .. } = &mut event.kind {
            *reasoning = redact_sensitive_data(reasoning);
        }
        if let EventKind::ActionCompleted { error: Some(error), .. } = &mut event.kind {
            *error = redact_sensitive_data(error);
        }
        serde_json::to_string(&event).unwrap_or_else(|e| format!("unserializable event: {e}"))
    }
}

impl EventPort for EventLogger {
    fn emit(&self, event: Event) {
        let session_id = event.session_id.as_deref().unwrap_or("-");
        let name = event.kind.name();
        let rendered = Self::render(&event);
        match &event.kind {
            EventKind::ActionCompleted { success: false, .. }
            | EventKind::NavigationCompleted { success: false, .. } => {
                warn!(target: "pilot_events", session_id, event = name, payload = %rendered, "Engine event");
            }
            EventKind::ScreenshotCaptured { .. } => {
                debug!(target: "pilot_events", session_id, event = name, payload = %rendered, "Engine event");
            }
            _ => {
                info!(target: "pilot_events", session_id, event = name, payload = %rendered, "Engine event");
            }
        }
    }
}
