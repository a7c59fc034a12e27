//! Structured logging components for ClawPilot.
//!
//! Handles log redaction, console/JSON output, file rotation, and logging of
//! engine events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::EventLogger;
pub use logger::{init_logger, LoggerOptions};
pub use redact::redact_sensitive_data;
