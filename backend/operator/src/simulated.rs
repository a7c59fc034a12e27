//! In-memory browser and desktop drivers.
//!
//! Used for dry runs (`operator.settings.simulated: true`) and tests. Every
//! call is recorded in a shared journal readable through `SimulatedHandle`,
//! and failures can be injected per selector or URL.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::driver::{BrowserDriver, DesktopDriver, DriverError, LaunchOptions, Target};
use crate::screenshot::placeholder_png;

#[derive(Debug, Default)]
struct SimState {
    journal: Vec<String>,
    url: Option<String>,
    window: Option<String>,
    viewport: (u32, u32),
    open: bool,
    disconnected: bool,
    close_calls: usize,
    missing: HashSet<String>,
    unreachable: HashSet<String>,
    launch_failure: Option<String>,
}

/// Read access to a simulated driver after it has been moved into an operator.
#[derive(Clone, Default)]
pub struct SimulatedHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every driver call so far, e.g. `"navigate https://example.com"`.
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Make every subsequent call fail as if the backend went away.
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    fn record(&self, entry: String) -> Result<MutexGuard<'_, SimState>, DriverError> {
        let mut state = self.lock();
        if state.disconnected {
            return Err(DriverError::Disconnected("simulated backend went away".into()));
        }
        if !state.open {
            return Err(DriverError::Disconnected("surface is not open".into()));
        }
        state.journal.push(entry);
        Ok(state)
    }

    fn check_target(state: &SimState, target: &Target) -> Result<(), DriverError> {
        match target {
            Target::Selector(s) if state.missing.contains(s) => {
                Err(DriverError::ElementNotFound(s.clone()))
            }
            Target::Point { x, y } => {
                let (w, h) = state.viewport;
                if *x < 0 || *y < 0 || *x >= i64::from(w) || *y >= i64::from(h) {
                    Err(DriverError::InvalidInput(format!(
                        "point ({x}, {y}) is outside the {w}x{h} surface"
                    )))
                } else {
                    Ok(())
                }
            }
            Target::Selector(_) => Ok(()),
        }
    }

    fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let state = self.lock();
        if state.disconnected || !state.open {
            return Err(DriverError::Disconnected("surface is not open".into()));
        }
        Ok(placeholder_png(state.viewport.0, state.viewport.1))
    }
}

pub struct SimulatedBrowser {
    handle: SimulatedHandle,
}

impl SimulatedBrowser {
    pub fn new() -> Self {
        Self {
            handle: SimulatedHandle::default(),
        }
    }

    pub fn handle(&self) -> SimulatedHandle {
        self.handle.clone()
    }

    /// Clicks and typing against `selector` fail with element-not-found.
    pub fn with_missing_selector(self, selector: impl Into<String>) -> Self {
        self.handle.lock().missing.insert(selector.into());
        self
    }

    /// Navigating to `url` times out.
    pub fn with_unreachable_url(self, url: impl Into<String>) -> Self {
        self.handle.lock().unreachable.insert(url.into());
        self
    }

    pub fn with_launch_failure(self, message: impl Into<String>) -> Self {
        self.handle.lock().launch_failure = Some(message.into());
        self
    }
}

impl Default for SimulatedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for SimulatedBrowser {
    async fn launch(&mut self, options: &LaunchOptions) -> Result<(), DriverError> {
        let mut state = self.handle.lock();
        if let Some(message) = state.launch_failure.clone() {
            return Err(DriverError::Crashed(message));
        }
        state.open = true;
        state.viewport = options.viewport;
        state.url = Some("about:blank".into());
        state.journal.push("launch".into());
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let mut state = self.handle.record(format!("navigate {url}"))?;
        if state.unreachable.contains(url) {
            return Err(DriverError::Timeout(30_000));
        }
        state.url = Some(url.to_string());
        Ok(())
    }

    async fn click(&mut self, target: &Target, count: u8) -> Result<(), DriverError> {
        let state = self.handle.record(format!("click {target} x{count}"))?;
        SimulatedHandle::check_target(&state, target)
    }

    async fn type_text(&mut self, target: Option<&Target>, text: &str) -> Result<(), DriverError> {
        let entry = match target {
            Some(t) => format!("type {t} {text}"),
            None => format!("type {text}"),
        };
        let state = self.handle.record(entry)?;
        match target {
            Some(t) => SimulatedHandle::check_target(&state, t),
            None => Ok(()),
        }
    }

    async fn press_key(&mut self, key: &str) -> Result<(), DriverError> {
        self.handle.record(format!("key {key}")).map(|_| ())
    }

    async fn scroll(&mut self, dx: i64, dy: i64) -> Result<(), DriverError> {
        self.handle.record(format!("scroll {dx} {dy}")).map(|_| ())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.handle.screenshot()
    }

    async fn current_url(&self) -> Result<Option<String>, DriverError> {
        Ok(self.handle.lock().url.clone())
    }

    async fn title(&self) -> Result<Option<String>, DriverError> {
        let state = self.handle.lock();
        Ok(state
            .url
            .as_deref()
            .and_then(|u| url::Url::parse(u).ok())
            .and_then(|u| u.host_str().map(str::to_string)))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let mut state = self.handle.lock();
        state.close_calls += 1;
        state.open = false;
        state.journal.push("close".into());
        Ok(())
    }
}

pub struct SimulatedDesktop {
    handle: SimulatedHandle,
    viewport: (u32, u32),
}

impl SimulatedDesktop {
    pub fn new(viewport: (u32, u32)) -> Self {
        Self {
            handle: SimulatedHandle::default(),
            viewport,
        }
    }

    pub fn handle(&self) -> SimulatedHandle {
        self.handle.clone()
    }

    pub fn with_launch_failure(self, message: impl Into<String>) -> Self {
        self.handle.lock().launch_failure = Some(message.into());
        self
    }
}

#[async_trait]
impl DesktopDriver for SimulatedDesktop {
    async fn connect(&mut self) -> Result<(), DriverError> {
        let mut state = self.handle.lock();
        if let Some(message) = state.launch_failure.clone() {
            return Err(DriverError::Crashed(message));
        }
        state.open = true;
        state.viewport = self.viewport;
        state.window = Some("Desktop".into());
        state.journal.push("connect".into());
        Ok(())
    }

    async fn click(&mut self, target: &Target, count: u8) -> Result<(), DriverError> {
        if let Target::Selector(s) = target {
            return Err(DriverError::Unsupported(format!(
                "desktop clicks need coordinates, got selector '{s}'"
            )));
        }
        let state = self.handle.record(format!("click {target} x{count}"))?;
        SimulatedHandle::check_target(&state, target)
    }

    async fn type_text(&mut self, text: &str) -> Result<(), DriverError> {
        self.handle.record(format!("type {text}")).map(|_| ())
    }

    async fn press_key(&mut self, key: &str) -> Result<(), DriverError> {
        self.handle.record(format!("key {key}")).map(|_| ())
    }

    async fn scroll(&mut self, dx: i64, dy: i64) -> Result<(), DriverError> {
        self.handle.record(format!("scroll {dx} {dy}")).map(|_| ())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.handle.screenshot()
    }

    async fn active_window(&self) -> Result<Option<String>, DriverError> {
        Ok(self.handle.lock().window.clone())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        let mut state = self.handle.lock();
        state.close_calls += 1;
        state.open = false;
        state.journal.push("disconnect".into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn browser_records_calls_and_injects_failures() {
        let mut browser = SimulatedBrowser::new()
            .with_missing_selector("#gone")
            .with_unreachable_url("https://down.example");
        let handle = browser.handle();
        browser.launch(&LaunchOptions::default()).await.unwrap();

        browser.navigate("https://example.com/a").await.unwrap();
        assert_eq!(browser.title().await.unwrap().as_deref(), Some("example.com"));
        assert_eq!(
            browser.navigate("https://down.example").await,
            Err(DriverError::Timeout(30_000))
        );
        assert!(matches!(
            browser.click(&Target::Selector("#gone".into()), 1).await,
            Err(DriverError::ElementNotFound(_))
        ));

        let journal = handle.journal();
        assert_eq!(journal[0], "launch");
        assert_eq!(journal[1], "navigate https://example.com/a");
    }

    #[tokio::test]
    async fn calls_after_disconnect_are_faults() {
        let mut browser = SimulatedBrowser::new();
        let handle = browser.handle();
        browser.launch(&LaunchOptions::default()).await.unwrap();
        handle.disconnect();
        let err = browser.press_key("Enter").await.unwrap_err();
        assert!(err.is_fault());
    }

    #[tokio::test]
    async fn desktop_rejects_selectors_and_offscreen_points() {
        let mut desktop = SimulatedDesktop::new((100, 100));
        desktop.connect().await.unwrap();
        assert!(matches!(
            desktop.click(&Target::Selector("#x".into()), 1).await,
            Err(DriverError::Unsupported(_))
        ));
        assert!(matches!(
            desktop.click(&Target::Point { x: 150, y: 5 }, 1).await,
            Err(DriverError::InvalidInput(_))
        ));
        desktop.click(&Target::Point { x: 5, y: 5 }, 1).await.unwrap();
    }
}
