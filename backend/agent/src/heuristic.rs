//! Stopping heuristic.
//!
//! Evaluated once per iteration, after the action batch, over real results
//! only. Thresholds are fixed; a false stop is preferred over a false
//! continuation.

use clawpilot_core::{ActionResult, StopReason};

/// Number of most recent real results the success-rate check looks at.
pub const SUCCESS_WINDOW: usize = 3;
/// Stop when the success rate over `SUCCESS_WINDOW` is strictly below this.
pub const MIN_SUCCESS_RATE: f64 = 0.3;
/// Stop when the planner's confidence is strictly below this.
pub const MIN_CONFIDENCE: f64 = 0.2;
/// Number of most recent real results the failure-count check looks at.
pub const FAILURE_WINDOW: usize = 5;
/// Stop when at least this many of the last `FAILURE_WINDOW` results failed.
pub const MAX_FAILURES: usize = 4;

/// `real` holds real results in append order; `confidence` is the current
/// iteration's.
pub fn evaluate(real: &[&ActionResult], confidence: f64) -> Option<StopReason> {
    if real.len() >= SUCCESS_WINDOW {
        let recent = &real[real.len() - SUCCESS_WINDOW..];
        let successes = recent.iter().filter(|r| r.success).count();
        let success_rate = successes as f64 / SUCCESS_WINDOW as f64;
        if success_rate < MIN_SUCCESS_RATE {
            return Some(StopReason::UnproductiveLoop { success_rate });
        }
    }

    if confidence < MIN_CONFIDENCE {
        return Some(StopReason::LowConfidence { confidence });
    }

    let window = real.len().min(FAILURE_WINDOW);
    let failures = real[real.len() - window..]
        .iter()
        .filter(|r| !r.success)
        .count();
    if failures >= MAX_FAILURES {
        return Some(StopReason::RepeatedFailure {
            failures,
            window: FAILURE_WINDOW,
        });
    }

    None
}
