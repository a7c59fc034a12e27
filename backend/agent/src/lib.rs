//! ClawPilot execution engine
//!
//! Runs the perceive, plan, act loop: captures the surface through an
//! `Operator`, asks a `Planner` for the next actions, executes them and
//! records every step in a `SessionRecorder`.

pub mod control;
pub mod engine;
pub mod heuristic;
pub mod navigation;

#[cfg(test)]
mod testing;

pub use control::{EngineHandle, RunControl};
pub use engine::{EngineSettings, EngineState, ExecutionEngine};
pub use navigation::find_url;
