pub mod channel;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use channel::{EventBus, FanOut, NullPort};
pub use error::{PilotError, RunFailure};
pub use event::{Event, EventKind};
pub use traits::{EventPort, Operator, Planner, SessionRecorder};
pub use types::{
    Action, ActionResult, ActionType, Analysis, ImageFormat, Instruction, OperatorKind,
    ResultKind, RunReport, RunStatus, Screenshot, Session, StopReason, SurfaceState,
    DATA_ACTION, DATA_ITERATION, DATA_URL,
};
