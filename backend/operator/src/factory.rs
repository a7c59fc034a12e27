use std::sync::Arc;

use tracing::info;

use clawpilot_config::OperatorConfig;
use clawpilot_core::{Operator, OperatorKind, PilotError};

use crate::browser::BrowserOperator;
use crate::desktop::DesktopOperator;
use crate::driver::{BrowserDriver, DesktopDriver, LaunchOptions};
use crate::hybrid::HybridOperator;
use crate::simulated::{SimulatedBrowser, SimulatedDesktop};

pub type BrowserDriverBuilder =
    Arc<dyn Fn(&LaunchOptions) -> anyhow::Result<Box<dyn BrowserDriver>> + Send + Sync>;
pub type DesktopDriverBuilder =
    Arc<dyn Fn(&LaunchOptions) -> anyhow::Result<Box<dyn DesktopDriver>> + Send + Sync>;

/// Builds the operator named by `operator.type`.
///
/// Real backends are registered by the host. With `settings.simulated` the
/// in-memory drivers are used instead.
#[derive(Default)]
pub struct OperatorFactory {
    browser: Option<BrowserDriverBuilder>,
    desktop: Option<DesktopDriverBuilder>,
}

impl OperatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_browser_driver(mut self, builder: BrowserDriverBuilder) -> Self {
        self.browser = Some(builder);
        self
    }

    pub fn with_desktop_driver(mut self, builder: DesktopDriverBuilder) -> Self {
        self.desktop = Some(builder);
        self
    }

    pub fn build(&self, config: &OperatorConfig) -> Result<Box<dyn Operator>, PilotError> {
        let kind: OperatorKind = config.kind.parse()?;
        let settings = &config.settings;
        let simulated = settings.simulated.unwrap_or(false);
        let options = LaunchOptions::from(settings);

        info!(kind = %kind, simulated, "Building operator");
        let operator: Box<dyn Operator> = match kind {
            OperatorKind::Browser => Box::new(self.browser_operator(config, &options, simulated)?),
            OperatorKind::Desktop => Box::new(self.desktop_operator(&options, simulated)?),
            OperatorKind::Hybrid => Box::new(HybridOperator::new(
                self.browser_operator(config, &options, simulated)?,
                self.desktop_operator(&options, simulated)?,
            )),
        };
        Ok(operator)
    }

    fn browser_operator(
        &self,
        config: &OperatorConfig,
        options: &LaunchOptions,
        simulated: bool,
    ) -> Result<BrowserOperator, PilotError> {
        let driver: Box<dyn BrowserDriver> = if simulated {
            Box::new(SimulatedBrowser::new())
        } else {
            let builder = self.browser.as_ref().ok_or_else(|| {
                PilotError::Initialization(
                    "no browser driver available; set operator.settings.simulated for a dry run"
                        .to_string(),
                )
            })?;
            builder(options)
                .map_err(|e| PilotError::Initialization(format!("browser driver: {e}")))?
        };
        let operator = BrowserOperator::new(driver, options.clone());
        Ok(match &config.settings.start_url {
            Some(url) => operator.with_start_url(url.clone()),
            None => operator,
        })
    }

    fn desktop_operator(
        &self,
        options: &LaunchOptions,
        simulated: bool,
    ) -> Result<DesktopOperator, PilotError> {
        let driver: Box<dyn DesktopDriver> = if simulated {
            Box::new(SimulatedDesktop::new(options.viewport))
        } else {
            let builder = self.desktop.as_ref().ok_or_else(|| {
                PilotError::Initialization(
                    "no desktop driver available; set operator.settings.simulated for a dry run"
                        .to_string(),
                )
            })?;
            builder(options)
                .map_err(|e| PilotError::Initialization(format!("desktop driver: {e}")))?
        };
        Ok(DesktopOperator::new(driver))
    }
}
