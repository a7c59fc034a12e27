//! The execution engine: perceive, plan, act until done or halted.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use clawpilot_config::RunSettings;
use clawpilot_core::{
    Action, ActionResult, ActionType, Analysis, Event, EventKind, EventPort, Instruction, Operator,
    PilotError, Planner, ResultKind, RunFailure, RunReport, RunStatus, Session, SessionRecorder,
    StopReason, SurfaceState, DATA_ACTION, DATA_ITERATION, DATA_URL,
};

use crate::control::{ControlState, EngineHandle};
use crate::heuristic;
use crate::navigation::find_url;

/// Loop limits, resolved from `settings` in the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_iterations: u32,
    pub iteration_delay: Duration,
    pub session_retention: Duration,
}

impl From<&RunSettings> for EngineSettings {
    fn from(settings: &RunSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations().max(1),
            iteration_delay: Duration::from_millis(settings.iteration_delay_ms()),
            session_retention: Duration::from_millis(settings.session_retention_ms()),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&RunSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Initializing,
    Ready,
    Iterating,
    Completed,
    Exhausted,
    Aborted,
    Failed,
}

/// Drives one Operator/Planner pairing through bounded iteration runs.
///
/// The engine exclusively owns its operator and planner. Both are released
/// when a run ends, whatever the outcome; the next `execute` initializes
/// them again.
pub struct ExecutionEngine {
    operator: Box<dyn Operator>,
    planner: Box<dyn Planner>,
    recorder: Arc<dyn SessionRecorder>,
    events: Arc<dyn EventPort>,
    settings: EngineSettings,
    control: Arc<ControlState>,
    state: EngineState,
    iteration: u32,
    session_id: Option<String>,
    location: SurfaceState,
    released: bool,
}

impl ExecutionEngine {
    pub fn new(
        operator: Box<dyn Operator>,
        planner: Box<dyn Planner>,
        recorder: Arc<dyn SessionRecorder>,
        events: Arc<dyn EventPort>,
        settings: EngineSettings,
    ) -> Self {
        let control = ControlState::new(events.clone());
        Self {
            operator,
            planner,
            recorder,
            events,
            settings,
            control,
            state: EngineState::Created,
            iteration: 0,
            session_id: None,
            location: SurfaceState::default(),
            released: true,
        }
    }

    /// Prepare the operator and planner. On failure both are released and
    /// the error is an `Initialization` error.
    pub async fn initialize(&mut self) -> Result<(), PilotError> {
        self.state = EngineState::Initializing;
        self.released = false;
        info!(operator = %self.operator.kind(), planner = self.planner.name(), "Initializing engine");

        let outcome = match self.operator.initialize().await {
            Ok(()) => self.planner.initialize().await,
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            error!(error = %e, "Engine initialization failed");
            self.release().await;
            self.state = EngineState::Failed;
            return Err(match e {
                PilotError::Initialization(_) => e,
                other => PilotError::Initialization(other.to_string()),
            });
        }

        self.location = self.operator.query_state().await;
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Run `instruction` to a terminal state.
    ///
    /// COMPLETED, EXHAUSTED and ABORTED runs return a `RunReport`; a FAILED
    /// run returns `PilotError::RunFailed` carrying the iteration, session id
    /// and partial results.
    #[instrument(skip_all, fields(instruction = %instruction))]
    pub async fn execute(&mut self, instruction: &Instruction) -> Result<RunReport, PilotError> {
        if self.state != EngineState::Ready {
            self.initialize().await?;
        }

        let session_id = match self.recorder.create_session(instruction) {
            Ok(id) => id,
            Err(e) => {
                self.release().await;
                self.state = EngineState::Failed;
                return Err(e);
            }
        };
        self.session_id = Some(session_id.clone());
        self.iteration = 0;
        self.control.begin_run(&session_id);
        self.state = EngineState::Iterating;
        info!(session_id = %session_id, max_iterations = self.settings.max_iterations, "Run started");

        let mut results = Vec::new();
        let outcome = self.drive(instruction, &session_id, &mut results).await;

        let (outcome, finished) = match outcome {
            Ok(status) => {
                self.state = match status {
                    RunStatus::Completed => EngineState::Completed,
                    RunStatus::Exhausted => EngineState::Exhausted,
                    RunStatus::Aborted { .. } => EngineState::Aborted,
                };
                info!(session_id = %session_id, iterations = self.iteration, status = %status, "Run finished");
                let report = RunReport {
                    session_id: session_id.clone(),
                    status: status.clone(),
                    iterations: self.iteration,
                    results,
                };
                (Ok(report), Some(status))
            }
            Err(source) => {
                self.state = EngineState::Failed;
                error!(session_id = %session_id, iteration = self.iteration, error = %source, "Run failed");
                let failure = RunFailure {
                    iteration: self.iteration,
                    session_id: session_id.clone(),
                    partial_results: results,
                    source,
                };
                (Err(PilotError::RunFailed(Box::new(failure))), None)
            }
        };

        if let Some(status) = finished {
            self.emit(EventKind::RunFinished {
                status,
                iterations: self.iteration,
            });
        }
        self.release().await;
        outcome
    }

    async fn drive(
        &mut self,
        instruction: &Instruction,
        session_id: &str,
        results: &mut Vec<ActionResult>,
    ) -> Result<RunStatus, PilotError> {
        if let Some(status) = self.navigate_from_instruction(instruction, session_id, results).await? {
            return Ok(status);
        }

        loop {
            if self.control.checkpoint().await.is_err() {
                return Ok(stopped());
            }

            self.iteration += 1;
            let iteration = self.iteration;
            self.emit(EventKind::IterationStarted {
                iteration,
                max_iterations: self.settings.max_iterations,
            });

            let screenshot = self.operator.capture().await?;
            self.record(
                session_id,
                results,
                ActionResult::artifact(ResultKind::Screenshot, iteration)
                    .with_data("width", screenshot.width)
                    .with_data("height", screenshot.height),
            )?;
            self.emit(EventKind::ScreenshotCaptured {
                iteration,
                width: screenshot.width,
                height: screenshot.height,
            });

            let analysis = self
                .planner
                .analyze_screenshot(&screenshot, instruction, iteration, results)
                .await?;
            drop(screenshot);
            analysis
                .validate()
                .map_err(|message| PilotError::planner(self.planner.name(), message))?;
            self.record_analysis(session_id, results, iteration, &analysis)?;

            if analysis.is_complete {
                self.record(
                    session_id,
                    results,
                    ActionResult::artifact(ResultKind::TaskComplete, iteration),
                )?;
                return Ok(RunStatus::Completed);
            }

            if analysis.actions.is_empty() {
                warn!(iteration, "Planner proposed no actions");
                return Ok(RunStatus::Aborted {
                    stop: StopReason::NoActions,
                });
            }

            for action in &analysis.actions {
                if self.control.checkpoint().await.is_err() {
                    return Ok(stopped());
                }
                self.run_action(session_id, results, iteration, action).await?;
            }

            let real: Vec<&ActionResult> = results.iter().filter(|r| r.is_real()).collect();
            if let Some(stop) = heuristic::evaluate(&real, analysis.confidence) {
                warn!(iteration, reason = %stop, "Stopping heuristic triggered");
                return Ok(RunStatus::Aborted { stop });
            }

            if iteration >= self.settings.max_iterations {
                return Ok(RunStatus::Exhausted);
            }

            let delay = self.settings.iteration_delay;
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.control.stopped() => {
                        debug!("Stop requested during iteration delay");
                    }
                }
            }
        }
    }

    /// Issue a NAVIGATE for a URL named in the instruction before the first
    /// iteration, unless the surface is already there.
    async fn navigate_from_instruction(
        &mut self,
        instruction: &Instruction,
        session_id: &str,
        results: &mut Vec<ActionResult>,
    ) -> Result<Option<RunStatus>, PilotError> {
        if !self.operator.kind().can_navigate() {
            return Ok(None);
        }
        let Some(url) = find_url(instruction.as_str()) else {
            return Ok(None);
        };
        let current = self.operator.query_state().await;
        if current.url.as_deref() == Some(url.as_str()) {
            debug!(url = %url, "Already at instruction URL");
            return Ok(None);
        }
        if self.control.checkpoint().await.is_err() {
            return Ok(Some(stopped()));
        }
        info!(url = %url, "Navigating to URL from instruction");
        let action = Action::navigate(url).with_description("open the URL named in the instruction");
        self.run_action(session_id, results, 0, &action).await?;
        Ok(None)
    }

    /// Execute one action. Operator errors become failed results; only a
    /// recorder failure escapes.
    async fn run_action(
        &mut self,
        session_id: &str,
        results: &mut Vec<ActionResult>,
        iteration: u32,
        action: &Action,
    ) -> Result<(), PilotError> {
        self.emit(EventKind::ActionStarted {
            iteration,
            action_id: action.id.clone(),
            action_type: action.action_type,
            description: action.description.clone(),
        });

        let result = match self.operator.execute(action).await {
            Ok(result) => result,
            Err(e) => {
                warn!(action_id = %action.id, error = %e, "Action raised; recording as failed");
                ActionResult::failed(&action.id, e.to_string())
            }
        };

        self.location = self.operator.query_state().await;
        let mut result = result
            .with_data(DATA_ACTION, action.action_type.tag())
            .with_data(DATA_ITERATION, iteration);
        if let Some(url) = &self.location.url {
            result = result.with_data(DATA_URL, url.clone());
        }

        self.emit(EventKind::ActionCompleted {
            iteration,
            action_id: action.id.clone(),
            success: result.success,
            error: result.error.clone(),
        });
        if action.action_type == ActionType::Navigate {
            self.emit(EventKind::NavigationCompleted {
                url: action.str_param("url").unwrap_or_default().to_string(),
                success: result.success,
            });
        }

        self.record(session_id, results, result)
    }

    fn record_analysis(
        &self,
        session_id: &str,
        results: &mut Vec<ActionResult>,
        iteration: u32,
        analysis: &Analysis,
    ) -> Result<(), PilotError> {
        debug!(
            iteration,
            confidence = analysis.confidence,
            is_complete = analysis.is_complete,
            actions = analysis.actions.len(),
            "Analysis accepted"
        );
        self.record(
            session_id,
            results,
            ActionResult::artifact(ResultKind::AiAnalysis, iteration)
                .with_data("reasoning", analysis.reasoning.clone())
                .with_data("confidence", analysis.confidence)
                .with_data("isComplete", analysis.is_complete)
                .with_data("actionCount", analysis.actions.len()),
        )?;
        self.emit(EventKind::AnalysisCompleted {
            iteration,
            confidence: analysis.confidence,
            is_complete: analysis.is_complete,
            action_count: analysis.actions.len(),
            reasoning: analysis.reasoning.clone(),
        });
        Ok(())
    }

    fn record(
        &self,
        session_id: &str,
        results: &mut Vec<ActionResult>,
        result: ActionResult,
    ) -> Result<(), PilotError> {
        self.recorder.append(session_id, &result)?;
        results.push(result);
        Ok(())
    }

    fn emit(&self, kind: EventKind) {
        self.events.emit(Event::new(self.session_id.clone(), kind));
    }

    /// Release the operator and planner, then prune stale sessions.
    /// Runs at most once per initialization; the control flag is reset on
    /// every call.
    async fn release(&mut self) {
        self.control.reset();
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.operator.cleanup().await {
            warn!(error = %e, "Operator cleanup failed");
        }
        if let Err(e) = self.planner.cleanup().await {
            warn!(error = %e, "Planner cleanup failed");
        }
        match self.recorder.prune_older_than(self.settings.session_retention) {
            Ok(0) => {}
            Ok(pruned) => info!(pruned, "Pruned stale sessions"),
            Err(e) => warn!(error = %e, "Session pruning failed"),
        }
        debug!("Engine resources released");
    }

    /// Stop the engine and release its resources. Idempotent.
    ///
    /// To stop a run in progress, use `handle().stop()`.
    pub async fn stop(&mut self) {
        self.release().await;
        if self.state == EngineState::Ready {
            self.state = EngineState::Created;
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle::new(self.control.clone())
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Where the operator was after the most recent action.
    pub fn current_location(&self) -> &SurfaceState {
        &self.location
    }

    pub fn current_session(&self) -> Result<Option<Session>, PilotError> {
        match &self.session_id {
            Some(id) => self.recorder.get(id),
            None => Ok(None),
        }
    }

    pub fn session_history(&self, limit: usize) -> Result<Vec<Session>, PilotError> {
        self.recorder.history(limit)
    }
}

fn stopped() -> RunStatus {
    RunStatus::Aborted {
        stop: StopReason::Stopped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        analysis, click, failing_click, CollectingPort, FakeOperator, FakePlanner, Probe,
    };
    use clawpilot_core::OperatorKind;
    use clawpilot_recorder::MemoryRecorder;

    struct Rig {
        engine: ExecutionEngine,
        probe: Arc<Probe>,
        events: Arc<CollectingPort>,
        recorder: Arc<MemoryRecorder>,
    }

    fn settings(max_iterations: u32, delay_ms: u64) -> EngineSettings {
        EngineSettings {
            max_iterations,
            iteration_delay: Duration::from_millis(delay_ms),
            session_retention: Duration::from_secs(3600),
        }
    }

    fn rig_with(
        operator: impl FnOnce(Arc<Probe>) -> FakeOperator,
        planner: impl FnOnce(FakePlanner) -> FakePlanner,
        settings: EngineSettings,
    ) -> Rig {
        let probe = Arc::new(Probe::default());
        let events = Arc::new(CollectingPort::default());
        let recorder = Arc::new(MemoryRecorder::new());
        let engine = ExecutionEngine::new(
            Box::new(operator(probe.clone())),
            Box::new(planner(FakePlanner::new(probe.clone()))),
            recorder.clone(),
            events.clone(),
            settings,
        );
        Rig {
            engine,
            probe,
            events,
            recorder,
        }
    }

    fn rig(planner: impl FnOnce(FakePlanner) -> FakePlanner, max_iterations: u32) -> Rig {
        rig_with(
            |p| FakeOperator::new(OperatorKind::Browser, p),
            planner,
            settings(max_iterations, 0),
        )
    }

    fn instruction(text: &str) -> Instruction {
        Instruction::new(text).unwrap()
    }

    #[tokio::test]
    async fn completes_after_three_iterations() {
        let mut rig = rig(
            |p| {
                p.then(analysis(0.9, false, vec![click()]))
                    .then(analysis(0.9, false, vec![click()]))
                    .then(analysis(0.9, true, vec![]))
            },
            5,
        );
        let report = rig.engine.execute(&instruction("open settings")).await.unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.count_kind(ResultKind::Screenshot), 3);
        assert_eq!(report.count_kind(ResultKind::AiAnalysis), 3);
        assert_eq!(report.real_results().count(), 2);
        assert!(report.real_results().all(|r| r.success));
        assert_eq!(report.count_kind(ResultKind::TaskComplete), 1);

        let last = report.results.last().unwrap();
        assert_eq!(last.kind(), ResultKind::TaskComplete);
        assert_eq!(last.iteration(), Some(3));
        assert_eq!(rig.probe.planner_calls(), 3);
        assert_eq!(rig.engine.state(), EngineState::Completed);

        let names = rig.events.names();
        assert_eq!(
            &names[..5],
            [
                "iteration-started",
                "screenshot-captured",
                "analysis-completed",
                "action-started",
                "action-completed"
            ]
        );
        assert_eq!(names.last().copied(), Some("run-finished"));
    }

    #[tokio::test]
    async fn navigates_to_instruction_url_before_first_iteration() {
        let mut rig = rig(|p| p.then(analysis(0.9, true, vec![])), 3);
        let report = rig
            .engine
            .execute(&instruction("go to https://example.com and take a screenshot"))
            .await
            .unwrap();

        let executed = rig.probe.executed();
        assert_eq!(executed[0].action_type, ActionType::Navigate);
        assert_eq!(executed[0].str_param("url"), Some("https://example.com"));

        let first = &report.results[0];
        assert_eq!(first.kind(), ResultKind::Action(ActionType::Navigate));
        assert_eq!(first.iteration(), Some(0));
        assert_eq!(first.url(), Some("https://example.com"));

        let names = rig.events.names();
        let nav = names.iter().position(|n| *n == "navigation-completed").unwrap();
        let first_iteration = names.iter().position(|n| *n == "iteration-started").unwrap();
        assert!(nav < first_iteration);
        assert_eq!(
            rig.engine.current_location().url.as_deref(),
            Some("https://example.com")
        );
    }

    #[tokio::test]
    async fn skips_navigation_when_already_there_or_on_desktop() {
        let mut rig = rig_with(
            |p| FakeOperator::new(OperatorKind::Browser, p).at("https://example.com"),
            |p| p.then(analysis(0.9, true, vec![])),
            settings(3, 0),
        );
        rig.engine
            .execute(&instruction("on https://example.com read the title"))
            .await
            .unwrap();
        assert!(rig.probe.executed().is_empty());

        let mut rig = rig_with(
            |p| FakeOperator::new(OperatorKind::Desktop, p),
            |p| p.then(analysis(0.9, true, vec![])),
            settings(3, 0),
        );
        rig.engine
            .execute(&instruction("open https://example.com in the mail client"))
            .await
            .unwrap();
        assert!(rig.probe.executed().is_empty());
    }

    #[tokio::test]
    async fn empty_action_list_aborts_without_further_planning() {
        let mut rig = rig(|p| p.then(analysis(0.9, false, vec![])), 5);
        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(
            report.status,
            RunStatus::Aborted {
                stop: StopReason::NoActions
            }
        );
        assert_eq!(rig.probe.planner_calls(), 1);
        assert_eq!(report.iterations, 1);
    }

    #[tokio::test]
    async fn three_failures_in_a_row_stop_the_run() {
        let mut rig = rig(
            |p| {
                p.then(analysis(
                    0.9,
                    false,
                    vec![failing_click(), failing_click(), failing_click()],
                ))
                .then(analysis(0.9, true, vec![]))
            },
            5,
        );
        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(
            report.status,
            RunStatus::Aborted {
                stop: StopReason::UnproductiveLoop { success_rate: 0.0 }
            }
        );
        assert_eq!(rig.probe.planner_calls(), 1);
    }

    #[tokio::test]
    async fn one_success_in_three_continues() {
        let mut rig = rig(
            |p| {
                p.then(analysis(
                    0.9,
                    false,
                    vec![click(), failing_click(), failing_click()],
                ))
                .then(analysis(0.9, true, vec![]))
            },
            5,
        );
        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(rig.probe.planner_calls(), 2);
    }

    #[tokio::test]
    async fn low_confidence_stops_after_the_batch() {
        let mut rig = rig(
            |p| {
                p.then(analysis(0.15, false, vec![click(), click()]))
                    .then(analysis(0.9, true, vec![]))
            },
            5,
        );
        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(
            report.status,
            RunStatus::Aborted {
                stop: StopReason::LowConfidence { confidence: 0.15 }
            }
        );
        assert_eq!(rig.probe.executed().len(), 2);
        assert_eq!(rig.probe.planner_calls(), 1);
    }

    #[tokio::test]
    async fn four_of_five_failures_stop_the_run() {
        let mut rig = rig(
            |p| {
                p.then(analysis(
                    0.9,
                    false,
                    vec![failing_click(), failing_click(), click()],
                ))
                .then(analysis(0.9, false, vec![failing_click(), failing_click()]))
                .then(analysis(0.9, true, vec![]))
            },
            5,
        );
        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(
            report.status,
            RunStatus::Aborted {
                stop: StopReason::RepeatedFailure {
                    failures: 4,
                    window: 5
                }
            }
        );
        assert_eq!(report.iterations, 2);
    }

    #[tokio::test]
    async fn iteration_budget_is_never_exceeded() {
        let mut rig = rig(
            |p| {
                (0..10).fold(p, |p, _| p.then(analysis(0.9, false, vec![click()])))
            },
            3,
        );
        let report = rig.engine.execute(&instruction("keep going")).await.unwrap();
        assert_eq!(report.status, RunStatus::Exhausted);
        assert_eq!(report.iterations, 3);
        assert_eq!(rig.engine.iteration(), 3);
        assert_eq!(rig.probe.planner_calls(), 3);
        assert!(report.results.iter().all(|r| r.iteration().unwrap() <= 3));
    }

    #[tokio::test]
    async fn raising_action_becomes_failed_result() {
        let mut rig = rig(
            |p| {
                p.then(analysis(
                    0.9,
                    false,
                    vec![click().with_param("fault", true), click()],
                ))
                .then(analysis(0.9, true, vec![]))
            },
            5,
        );
        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(rig.probe.executed().len(), 2);

        let real: Vec<_> = report.real_results().collect();
        assert!(!real[0].success);
        assert!(real[0].error.as_deref().unwrap().contains("browser crashed"));
        assert!(real[1].success);
    }

    #[tokio::test]
    async fn planner_fault_fails_the_run_with_context() {
        let mut rig = rig(
            |p| {
                p.then(analysis(0.9, false, vec![click()]))
                    .then_fail(PilotError::planner("fake", "401 unauthorized"))
            },
            5,
        );
        let err = rig.engine.execute(&instruction("do it")).await.unwrap_err();
        let failure = err.as_run_failure().unwrap();
        assert_eq!(failure.iteration, 2);
        assert!(matches!(failure.source, PilotError::PlannerFault { .. }));
        // screenshot, analysis, click from iteration 1 plus iteration 2's screenshot
        assert_eq!(failure.partial_results.len(), 4);
        assert!(err.to_string().contains("401 unauthorized"));

        let session = rig.recorder.get(&failure.session_id).unwrap().unwrap();
        assert_eq!(session.results, failure.partial_results);
        assert_eq!(rig.engine.state(), EngineState::Failed);
        assert_eq!(rig.probe.cleanups(), 1);
    }

    #[tokio::test]
    async fn inconsistent_analysis_is_a_planner_fault() {
        let mut rig = rig(|p| p.then(analysis(1.5, false, vec![click()])), 5);
        let err = rig.engine.execute(&instruction("do it")).await.unwrap_err();
        let failure = err.as_run_failure().unwrap();
        assert!(matches!(failure.source, PilotError::PlannerFault { .. }));
        assert!(rig.probe.executed().is_empty());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut rig = rig(|p| p, 5);
        rig.engine.initialize().await.unwrap();
        rig.engine.stop().await;
        rig.engine.stop().await;
        assert_eq!(rig.probe.cleanups(), 1);
        assert_eq!(rig.probe.planner_cleanups.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_after_a_run_releases_nothing_twice() {
        let mut rig = rig(|p| p.then(analysis(0.9, true, vec![])), 5);
        rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(rig.probe.cleanups(), 1);
        rig.engine.stop().await;
        assert_eq!(rig.probe.cleanups(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_stop_ends_a_run_during_the_delay() {
        let mut rig = rig_with(
            |p| FakeOperator::new(OperatorKind::Browser, p),
            |p| (0..5).fold(p, |p, _| p.then(analysis(0.9, false, vec![click()]))),
            settings(5, 10_000),
        );
        let handle = rig.engine.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.stop();
            handle.stop();
        });

        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(
            report.status,
            RunStatus::Aborted {
                stop: StopReason::Stopped
            }
        );
        assert_eq!(report.iterations, 1);
        assert_eq!(rig.probe.cleanups(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_batch_lets_the_running_action_finish() {
        let mut rig = rig_with(
            |p| FakeOperator::new(OperatorKind::Browser, p),
            |p| {
                p.then(analysis(
                    0.9,
                    false,
                    vec![click().with_param("delay_ms", 2_000), click(), click()],
                ))
            },
            settings(5, 0),
        );
        let handle = rig.engine.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            handle.stop();
        });

        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(
            report.status,
            RunStatus::Aborted {
                stop: StopReason::Stopped
            }
        );
        assert_eq!(rig.probe.executed().len(), 1);
        let real: Vec<_> = report.real_results().collect();
        assert_eq!(real.len(), 1);
        assert!(real[0].success);
        assert_eq!(rig.probe.cleanups(), 1);
    }

    #[tokio::test]
    async fn stop_before_the_run_starts_is_honoured() {
        let mut rig = rig(
            |p| {
                p.then(analysis(0.9, false, vec![click()]))
                    .then(analysis(0.9, true, vec![]))
            },
            5,
        );
        rig.engine.handle().stop();

        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(
            report.status,
            RunStatus::Aborted {
                stop: StopReason::Stopped
            }
        );
        assert_eq!(report.iterations, 0);
        assert_eq!(rig.probe.planner_calls(), 0);
        assert!(rig.probe.executed().is_empty());
        assert_eq!(rig.probe.cleanups(), 1);

        // The stop belonged to that run only.
        assert!(!rig.engine.handle().is_stopped());
        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(rig.probe.planner_calls(), 2);
    }

    #[tokio::test]
    async fn stop_before_the_implicit_navigation_skips_it() {
        let mut rig = rig(|p| p.then(analysis(0.9, true, vec![])), 3);
        rig.engine.handle().stop();
        let report = rig
            .engine
            .execute(&instruction("go to https://example.com and take a screenshot"))
            .await
            .unwrap();
        assert_eq!(
            report.status,
            RunStatus::Aborted {
                stop: StopReason::Stopped
            }
        );
        assert!(rig.probe.executed().is_empty());
        assert!(report.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_the_next_iteration_until_resume() {
        let mut rig = rig_with(
            |p| FakeOperator::new(OperatorKind::Browser, p),
            |p| {
                p.then(analysis(0.9, false, vec![click()]))
                    .then(analysis(0.9, true, vec![]))
            },
            settings(5, 1_000),
        );
        let handle = rig.engine.handle();
        let probe = rig.probe.clone();
        let controller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            handle.pause();
            tokio::time::sleep(Duration::from_secs(5)).await;
            let calls_while_paused = probe.planner_calls();
            handle.resume();
            calls_while_paused
        });

        let report = rig.engine.execute(&instruction("do it")).await.unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(controller.await.unwrap(), 1);

        let names = rig.events.names();
        assert!(names.contains(&"agent-paused"));
        assert!(names.contains(&"agent-resumed"));
    }

    #[tokio::test]
    async fn initialization_failure_never_starts_a_run() {
        let mut rig = rig_with(
            |p| FakeOperator::new(OperatorKind::Browser, p).failing_init(),
            |p| p,
            settings(5, 0),
        );
        let err = rig.engine.execute(&instruction("do it")).await.unwrap_err();
        assert!(matches!(err, PilotError::Initialization(_)));
        assert_eq!(rig.probe.cleanups(), 1);
        assert_eq!(rig.probe.planner_calls(), 0);
        assert!(rig.engine.session_history(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn accessors_reflect_the_last_run() {
        let mut rig = rig(
            |p| {
                p.then(analysis(0.9, false, vec![click()]))
                    .then(analysis(0.9, true, vec![]))
            },
            5,
        );
        assert!(rig.engine.current_session().unwrap().is_none());
        let report = rig.engine.execute(&instruction("do it")).await.unwrap();

        let session = rig.engine.current_session().unwrap().unwrap();
        assert_eq!(session.id, report.session_id);
        assert_eq!(session.results, report.results);
        assert_eq!(rig.engine.session_history(10).unwrap().len(), 1);
        assert_eq!(*rig.probe.prior_lengths.lock().unwrap(), vec![1, 4]);
    }

    #[tokio::test]
    async fn engine_can_run_again_after_a_run() {
        let mut rig = rig(
            |p| {
                p.then(analysis(0.9, true, vec![]))
                    .then(analysis(0.9, true, vec![]))
            },
            5,
        );
        rig.engine.execute(&instruction("first")).await.unwrap();
        rig.engine.execute(&instruction("second")).await.unwrap();
        assert_eq!(
            rig.probe
                .initializations
                .load(std::sync::atomic::Ordering::SeqCst),
            2
        );
        assert_eq!(rig.probe.cleanups(), 2);
        assert_eq!(rig.engine.session_history(10).unwrap().len(), 2);
    }
}
