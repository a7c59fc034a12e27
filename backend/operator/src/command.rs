//! Action decoding and result classification shared by all operators.

use std::time::Duration;

use clawpilot_core::{Action, ActionResult, ActionType, PilotError};
use tracing::{debug, warn};

use crate::driver::{DriverError, Target};

const DEFAULT_SCROLL_AMOUNT: i64 = 300;
const DEFAULT_WAIT_MS: u64 = 1_000;
const MAX_WAIT_MS: u64 = 30_000;

/// A decoded action, ready to be dispatched to a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Navigate { url: String },
    Click { target: Target, count: u8 },
    Type { target: Option<Target>, text: String },
    Key { key: String },
    Scroll { dx: i64, dy: i64 },
    Wait { duration: Duration },
}

impl InputCommand {
    pub fn from_action(action: &Action) -> Result<Self, DriverError> {
        match action.action_type {
            ActionType::Navigate => {
                let url = required_str(action, "url")?;
                url::Url::parse(url)
                    .map_err(|e| DriverError::InvalidInput(format!("bad url '{url}': {e}")))?;
                Ok(InputCommand::Navigate { url: url.to_string() })
            }
            ActionType::Click | ActionType::DoubleClick => {
                let target = target_of(action).ok_or_else(|| {
                    DriverError::InvalidInput(format!(
                        "{} needs a selector or x/y coordinates",
                        action.action_type
                    ))
                })?;
                let count = if action.action_type == ActionType::DoubleClick { 2 } else { 1 };
                Ok(InputCommand::Click { target, count })
            }
            ActionType::Type => Ok(InputCommand::Type {
                target: target_of(action),
                text: required_str(action, "text")?.to_string(),
            }),
            ActionType::Key => Ok(InputCommand::Key {
                key: required_str(action, "key")?.to_string(),
            }),
            ActionType::Scroll => {
                if action.parameters.contains_key("dx") || action.parameters.contains_key("dy") {
                    return Ok(InputCommand::Scroll {
                        dx: action.i64_param("dx").unwrap_or(0),
                        dy: action.i64_param("dy").unwrap_or(0),
                    });
                }
                let amount = action.i64_param("amount").unwrap_or(DEFAULT_SCROLL_AMOUNT);
                let (dx, dy) = match action.str_param("direction").unwrap_or("down") {
                    "down" => (0, amount),
                    "up" => (0, amount.saturating_neg()),
                    "right" => (amount, 0),
                    "left" => (amount.saturating_neg(), 0),
                    other => {
                        return Err(DriverError::InvalidInput(format!(
                            "unknown scroll direction '{other}'"
                        )))
                    }
                };
                Ok(InputCommand::Scroll { dx, dy })
            }
            ActionType::Wait => {
                let ms = action
                    .i64_param("duration")
                    .or_else(|| action.i64_param("ms"))
                    .map(|ms| ms.max(0) as u64)
                    .unwrap_or(DEFAULT_WAIT_MS)
                    .min(MAX_WAIT_MS);
                Ok(InputCommand::Wait {
                    duration: Duration::from_millis(ms),
                })
            }
        }
    }
}

fn required_str<'a>(action: &'a Action, key: &str) -> Result<&'a str, DriverError> {
    action
        .str_param(key)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DriverError::InvalidInput(format!("missing parameter '{key}'")))
}

fn target_of(action: &Action) -> Option<Target> {
    if let Some(selector) = action.str_param("selector").filter(|s| !s.is_empty()) {
        return Some(Target::Selector(selector.to_string()));
    }
    match (action.i64_param("x"), action.i64_param("y")) {
        (Some(x), Some(y)) => Some(Target::Point { x, y }),
        _ => None,
    }
}

/// Turn a driver outcome into the operator contract: expected failures are
/// failed results, faults are errors.
pub fn classify(action: &Action, outcome: Result<(), DriverError>) -> Result<ActionResult, PilotError> {
    match outcome {
        Ok(()) => {
            debug!(action_id = %action.id, action_type = %action.action_type, "Action succeeded");
            Ok(ActionResult::ok(&action.id))
        }
        Err(e) if e.is_fault() => {
            warn!(action_id = %action.id, error = %e, "Driver fault");
            Err(PilotError::OperatorFault(e.to_string()))
        }
        Err(e) => {
            debug!(action_id = %action.id, error = %e, "Action failed");
            Ok(ActionResult::failed(&action.id, e.to_string()))
        }
    }
}
