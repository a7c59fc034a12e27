use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use clawpilot_core::{
    Action, ActionResult, Operator, OperatorKind, PilotError, Screenshot, SurfaceState,
};

use crate::command::{classify, InputCommand};
use crate::driver::{BrowserDriver, DriverError, LaunchOptions};
use crate::screenshot::from_png;

/// Drives a single browser page through a `BrowserDriver`.
pub struct BrowserOperator {
    driver: Box<dyn BrowserDriver>,
    options: LaunchOptions,
    start_url: Option<String>,
    launched: bool,
}

impl BrowserOperator {
    pub fn new(driver: Box<dyn BrowserDriver>, options: LaunchOptions) -> Self {
        Self {
            driver,
            options,
            start_url: None,
            launched: false,
        }
    }

    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_url = Some(url.into());
        self
    }

    pub(crate) async fn run(&mut self, command: InputCommand) -> Result<(), DriverError> {
        match command {
            InputCommand::Navigate { url } => {
                let limit = self.options.navigation_timeout_ms;
                match tokio::time::timeout(
                    Duration::from_millis(limit),
                    self.driver.navigate(&url),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(DriverError::Timeout(limit)),
                }
            }
            InputCommand::Click { target, count } => self.driver.click(&target, count).await,
            InputCommand::Type { target, text } => {
                self.driver.type_text(target.as_ref(), &text).await
            }
            InputCommand::Key { key } => self.driver.press_key(&key).await,
            InputCommand::Scroll { dx, dy } => self.driver.scroll(dx, dy).await,
            InputCommand::Wait { duration } => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Operator for BrowserOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Browser
    }

    async fn initialize(&mut self) -> Result<(), PilotError> {
        info!(
            headless = self.options.headless,
            width = self.options.viewport.0,
            height = self.options.viewport.1,
            "Launching browser"
        );
        // Marked before launch so cleanup runs after a partial launch too.
        self.launched = true;
        self.driver
            .launch(&self.options)
            .await
            .map_err(|e| PilotError::Initialization(format!("browser launch failed: {e}")))?;

        if let Some(url) = self.start_url.clone() {
            self.run(InputCommand::Navigate { url: url.clone() })
                .await
                .map_err(|e| {
                    PilotError::Initialization(format!("cannot open start url {url}: {e}"))
                })?;
        }
        Ok(())
    }

    async fn capture(&self) -> Result<Screenshot, PilotError> {
        let bytes = self
            .driver
            .screenshot()
            .await
            .map_err(|e| PilotError::OperatorFault(format!("browser screenshot failed: {e}")))?;
        from_png(bytes)
    }

    async fn execute(&mut self, action: &Action) -> Result<ActionResult, PilotError> {
        let outcome = match InputCommand::from_action(action) {
            Ok(command) => self.run(command).await,
            Err(e) => Err(e),
        };
        classify(action, outcome)
    }

    async fn query_state(&self) -> SurfaceState {
        let url = self.driver.current_url().await.ok().flatten();
        let title = self.driver.title().await.ok().flatten();
        SurfaceState {
            url,
            title,
            window: None,
        }
    }

    async fn cleanup(&mut self) -> Result<(), PilotError> {
        if !self.launched {
            debug!("Browser cleanup: nothing to release");
            return Ok(());
        }
        self.launched = false;
        if let Err(e) = self.driver.close().await {
            warn!(error = %e, "Browser close failed");
            return Err(PilotError::OperatorFault(format!("browser close failed: {e}")));
        }
        info!("Browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedBrowser;
    use clawpilot_core::ActionType;

    fn operator(driver: SimulatedBrowser) -> BrowserOperator {
        BrowserOperator::new(Box::new(driver), LaunchOptions::default())
    }

    #[tokio::test]
    async fn executes_actions_and_reports_location() {
        let driver = SimulatedBrowser::new();
        let handle = driver.handle();
        let mut op = operator(driver).with_start_url("https://example.com");
        op.initialize().await.unwrap();

        let result = op
            .execute(&Action::new(ActionType::Type).with_param("text", "hello"))
            .await
            .unwrap();
        assert!(result.success);

        let state = op.query_state().await;
        assert_eq!(state.url.as_deref(), Some("https://example.com"));
        assert_eq!(state.title.as_deref(), Some("example.com"));
        assert!(handle.journal().contains(&"type hello".to_string()));

        let shot = op.capture().await.unwrap();
        assert_eq!((shot.width, shot.height), (1280, 800));
    }

    #[tokio::test]
    async fn expected_failures_are_results_not_errors() {
        let mut op = operator(
            SimulatedBrowser::new()
                .with_missing_selector("#nope")
                .with_unreachable_url("https://slow.example/"),
        );
        op.initialize().await.unwrap();

        let missing = op
            .execute(&Action::new(ActionType::Click).with_param("selector", "#nope"))
            .await
            .unwrap();
        assert!(!missing.success);

        let timeout = op
            .execute(&Action::navigate("https://slow.example/"))
            .await
            .unwrap();
        assert!(!timeout.success);
        assert!(timeout.error.unwrap().contains("timed out"));

        let invalid = op.execute(&Action::new(ActionType::Key)).await.unwrap();
        assert!(!invalid.success);
    }

    #[tokio::test]
    async fn lost_connection_is_a_fault() {
        let driver = SimulatedBrowser::new();
        let handle = driver.handle();
        let mut op = operator(driver);
        op.initialize().await.unwrap();
        handle.disconnect();
        let err = op
            .execute(&Action::new(ActionType::Key).with_param("key", "Enter"))
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::OperatorFault(_)));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent_even_after_failed_launch() {
        let driver = SimulatedBrowser::new().with_launch_failure("no chrome binary");
        let handle = driver.handle();
        let mut op = operator(driver);
        let err = op.initialize().await.unwrap_err();
        assert!(matches!(err, PilotError::Initialization(_)));

        op.cleanup().await.unwrap();
        op.cleanup().await.unwrap();
        assert_eq!(handle.close_calls(), 1);
    }

    #[tokio::test]
    async fn query_state_never_fails_before_launch() {
        let op = operator(SimulatedBrowser::new());
        let state = op.query_state().await;
        assert!(state.url.is_none());
    }
}
