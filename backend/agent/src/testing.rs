//! Scripted operator and planner doubles for engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use clawpilot_core::{
    Action, ActionResult, ActionType, Analysis, Event, EventPort, ImageFormat, Instruction,
    Operator, OperatorKind, PilotError, Planner, Screenshot, SurfaceState,
};

/// What the test can observe after the engine took ownership of the fakes.
#[derive(Default)]
pub struct Probe {
    pub initializations: AtomicUsize,
    pub cleanups: AtomicUsize,
    pub planner_calls: AtomicUsize,
    pub planner_cleanups: AtomicUsize,
    pub executed: Mutex<Vec<Action>>,
    pub prior_lengths: Mutex<Vec<usize>>,
}

impl Probe {
    pub fn executed(&self) -> Vec<Action> {
        self.executed.lock().unwrap().clone()
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    pub fn planner_calls(&self) -> usize {
        self.planner_calls.load(Ordering::SeqCst)
    }
}

/// Operator whose action outcomes are chosen by action parameters:
/// `fail: true` gives a failed result, `fault: true` raises, `delay_ms`
/// keeps the action in flight that long.
pub struct FakeOperator {
    kind: OperatorKind,
    probe: Arc<Probe>,
    url: Option<String>,
    fail_init: bool,
}

impl FakeOperator {
    pub fn new(kind: OperatorKind, probe: Arc<Probe>) -> Self {
        Self {
            kind,
            probe,
            url: None,
            fail_init: false,
        }
    }

    pub fn at(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }
}

#[async_trait]
impl Operator for FakeOperator {
    fn kind(&self) -> OperatorKind {
        self.kind
    }

    async fn initialize(&mut self) -> Result<(), PilotError> {
        self.probe.initializations.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(PilotError::Initialization("no display".into()));
        }
        Ok(())
    }

    async fn capture(&self) -> Result<Screenshot, PilotError> {
        Ok(Screenshot {
            width: 800,
            height: 600,
            timestamp: Utc::now(),
            format: ImageFormat::Png,
            image_data: vec![0x89, b'P', b'N', b'G'],
        })
    }

    async fn execute(&mut self, action: &Action) -> Result<ActionResult, PilotError> {
        self.probe.executed.lock().unwrap().push(action.clone());
        if let Some(ms) = action.i64_param("delay_ms") {
            tokio::time::sleep(std::time::Duration::from_millis(ms as u64)).await;
        }
        if action.parameters.get("fault").and_then(|v| v.as_bool()) == Some(true) {
            return Err(PilotError::OperatorFault("browser crashed".into()));
        }
        if action.parameters.get("fail").and_then(|v| v.as_bool()) == Some(true) {
            return Ok(ActionResult::failed(&action.id, "element not found"));
        }
        if action.action_type == ActionType::Navigate {
            self.url = action.str_param("url").map(str::to_string);
        }
        Ok(ActionResult::ok(&action.id))
    }

    async fn query_state(&self) -> SurfaceState {
        SurfaceState {
            url: self.url.clone(),
            title: None,
            window: None,
        }
    }

    async fn cleanup(&mut self) -> Result<(), PilotError> {
        self.probe.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Planner answering from a queue; an empty queue proposes nothing.
pub struct FakePlanner {
    probe: Arc<Probe>,
    replies: Mutex<VecDeque<Result<Analysis, PilotError>>>,
}

impl FakePlanner {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self {
            probe,
            replies: Mutex::new(VecDeque::new()),
        }
    }

    pub fn then(self, analysis: Analysis) -> Self {
        self.replies.lock().unwrap().push_back(Ok(analysis));
        self
    }

    pub fn then_fail(self, error: PilotError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }
}

#[async_trait]
impl Planner for FakePlanner {
    fn name(&self) -> &str {
        "fake"
    }

    async fn analyze_screenshot(
        &self,
        _screenshot: &Screenshot,
        _instruction: &Instruction,
        _iteration: u32,
        prior_results: &[ActionResult],
    ) -> Result<Analysis, PilotError> {
        self.probe.planner_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.prior_lengths.lock().unwrap().push(prior_results.len());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(analysis(0.5, false, vec![])))
    }

    async fn cleanup(&mut self) -> Result<(), PilotError> {
        self.probe.planner_cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Event port that keeps everything it is given.
#[derive(Default)]
pub struct CollectingPort {
    pub events: Mutex<Vec<Event>>,
}

impl CollectingPort {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind.name()).collect()
    }
}

impl EventPort for CollectingPort {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn analysis(confidence: f64, is_complete: bool, actions: Vec<Action>) -> Analysis {
    Analysis {
        reasoning: format!("confidence {confidence}"),
        confidence,
        is_complete,
        actions,
    }
}

pub fn click() -> Action {
    Action::new(ActionType::Click).with_param("x", 10).with_param("y", 10)
}

pub fn failing_click() -> Action {
    click().with_param("fail", true)
}
