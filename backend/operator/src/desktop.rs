use async_trait::async_trait;
use tracing::{debug, info, warn};

use clawpilot_core::{
    Action, ActionResult, Operator, OperatorKind, PilotError, Screenshot, SurfaceState,
};

use crate::command::{classify, InputCommand};
use crate::driver::{DesktopDriver, DriverError};
use crate::screenshot::from_png;

/// Drives the OS desktop through a `DesktopDriver`. Cannot navigate.
pub struct DesktopOperator {
    driver: Box<dyn DesktopDriver>,
    connected: bool,
}

impl DesktopOperator {
    pub fn new(driver: Box<dyn DesktopDriver>) -> Self {
        Self {
            driver,
            connected: false,
        }
    }

    pub(crate) async fn run(&mut self, command: InputCommand) -> Result<(), DriverError> {
        match command {
            InputCommand::Navigate { url } => Err(DriverError::Unsupported(format!(
                "desktop operator cannot navigate to {url}"
            ))),
            InputCommand::Click { target, count } => self.driver.click(&target, count).await,
            InputCommand::Type { target, text } => {
                if let Some(target) = target {
                    self.driver.click(&target, 1).await?;
                }
                self.driver.type_text(&text).await
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
impl Operator for DesktopOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Desktop
    }

    async fn initialize(&mut self) -> Result<(), PilotError> {
        info!("Connecting to desktop session");
        self.connected = true;
        self.driver
            .connect()
            .await
            .map_err(|e| PilotError::Initialization(format!("desktop connect failed: {e}")))
    }

    async fn capture(&self) -> Result<Screenshot, PilotError> {
        let bytes = self
            .driver
            .screenshot()
            .await
            .map_err(|e| PilotError::OperatorFault(format!("desktop screenshot failed: {e}")))?;
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
        SurfaceState {
            url: None,
            title: None,
            window: self.driver.active_window().await.ok().flatten(),
        }
    }

    async fn cleanup(&mut self) -> Result<(), PilotError> {
        if !self.connected {
            debug!("Desktop cleanup: nothing to release");
            return Ok(());
        }
        self.connected = false;
        self.driver.disconnect().await.map_err(|e| {
            warn!(error = %e, "Desktop disconnect failed");
            PilotError::OperatorFault(format!("desktop disconnect failed: {e}"))
        })
    }
}
