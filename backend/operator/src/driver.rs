//! Driver ports
//!
//! The narrow interfaces a concrete browser or desktop backend implements.
//! Operators translate `Action`s into calls on these ports and classify the
//! resulting `DriverError`s.

use async_trait::async_trait;
use thiserror::Error;

use clawpilot_config::defaults::DEFAULT_VIEWPORT;
use clawpilot_config::OperatorSettings;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not supported on this surface: {0}")]
    Unsupported(String),
    #[error("driver disconnected: {0}")]
    Disconnected(String),
    #[error("driver crashed: {0}")]
    Crashed(String),
}

impl DriverError {
    /// Faults mean the surface itself is unusable; everything else is an
    /// ordinary failed step.
    pub fn is_fault(&self) -> bool {
        matches!(self, DriverError::Disconnected(_) | DriverError::Crashed(_))
    }
}

/// Where a pointer action lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Selector(String),
    Point { x: i64, y: i64 },
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Selector(s) => write!(f, "{s}"),
            Target::Point { x, y } => write!(f, "({x}, {y})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub navigation_timeout_ms: u64,
}

const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

impl From<&OperatorSettings> for LaunchOptions {
    fn from(settings: &OperatorSettings) -> Self {
        Self {
            headless: settings.headless.unwrap_or(true),
            viewport: (
                settings.viewport_width.unwrap_or(DEFAULT_VIEWPORT.0),
                settings.viewport_height.unwrap_or(DEFAULT_VIEWPORT.1),
            ),
            navigation_timeout_ms: settings
                .navigation_timeout
                .unwrap_or(DEFAULT_NAVIGATION_TIMEOUT_MS),
        }
    }
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::from(&OperatorSettings::default())
    }
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(&mut self, options: &LaunchOptions) -> Result<(), DriverError>;
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;
    async fn click(&mut self, target: &Target, count: u8) -> Result<(), DriverError>;
    /// Type into `target`, or into the focused element when `None`.
    async fn type_text(&mut self, target: Option<&Target>, text: &str) -> Result<(), DriverError>;
    async fn press_key(&mut self, key: &str) -> Result<(), DriverError>;
    async fn scroll(&mut self, dx: i64, dy: i64) -> Result<(), DriverError>;
    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;
    async fn current_url(&self) -> Result<Option<String>, DriverError>;
    async fn title(&self) -> Result<Option<String>, DriverError>;
    async fn close(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait DesktopDriver: Send + Sync {
    async fn connect(&mut self) -> Result<(), DriverError>;
    async fn click(&mut self, target: &Target, count: u8) -> Result<(), DriverError>;
    async fn type_text(&mut self, text: &str) -> Result<(), DriverError>;
    async fn press_key(&mut self, key: &str) -> Result<(), DriverError>;
    async fn scroll(&mut self, dx: i64, dy: i64) -> Result<(), DriverError>;
    /// PNG bytes of the primary display.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;
    async fn active_window(&self) -> Result<Option<String>, DriverError>;
    async fn disconnect(&mut self) -> Result<(), DriverError>;
}
