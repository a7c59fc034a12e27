use async_trait::async_trait;
use tracing::debug;

use clawpilot_core::{
    Action, ActionResult, ActionType, Operator, OperatorKind, PilotError, Screenshot,
    SurfaceState,
};

use crate::browser::BrowserOperator;
use crate::desktop::DesktopOperator;

/// Action parameter selecting the desktop surface (`"surface": "desktop"`).
pub const SURFACE_PARAM: &str = "surface";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Browser,
    Desktop,
}

/// A browser and a desktop behind one operator.
///
/// Actions go to the browser unless they carry `surface: "desktop"`;
/// `NAVIGATE` always goes to the browser. Captures come from whichever
/// surface was used last.
pub struct HybridOperator {
    browser: BrowserOperator,
    desktop: DesktopOperator,
    active: Surface,
}

impl HybridOperator {
    pub fn new(browser: BrowserOperator, desktop: DesktopOperator) -> Self {
        Self {
            browser,
            desktop,
            active: Surface::Browser,
        }
    }

    fn route(action: &Action) -> Surface {
        if action.action_type == ActionType::Navigate {
            return Surface::Browser;
        }
        match action.str_param(SURFACE_PARAM) {
            Some(s) if s.eq_ignore_ascii_case("desktop") => Surface::Desktop,
            _ => Surface::Browser,
        }
    }
}

#[async_trait]
impl Operator for HybridOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Hybrid
    }

    async fn initialize(&mut self) -> Result<(), PilotError> {
        self.browser.initialize().await?;
        self.desktop.initialize().await
    }

    async fn capture(&self) -> Result<Screenshot, PilotError> {
        match self.active {
            Surface::Browser => self.browser.capture().await,
            Surface::Desktop => self.desktop.capture().await,
        }
    }

    async fn execute(&mut self, action: &Action) -> Result<ActionResult, PilotError> {
        let surface = Self::route(action);
        debug!(action_id = %action.id, ?surface, "Routing hybrid action");
        self.active = surface;
        match surface {
            Surface::Browser => self.browser.execute(action).await,
            Surface::Desktop => self.desktop.execute(action).await,
        }
    }

    async fn query_state(&self) -> SurfaceState {
        let browser = self.browser.query_state().await;
        let desktop = self.desktop.query_state().await;
        SurfaceState {
            url: browser.url,
            title: browser.title,
            window: desktop.window,
        }
    }

    async fn cleanup(&mut self) -> Result<(), PilotError> {
        // Both halves are released even if the first one fails.
        let browser = self.browser.cleanup().await;
        let desktop = self.desktop.cleanup().await;
        browser.and(desktop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::LaunchOptions;
    use crate::simulated::{SimulatedBrowser, SimulatedDesktop};

    #[tokio::test]
    async fn routes_by_surface_param_and_captures_last_used() {
        let browser = SimulatedBrowser::new();
        let desktop = SimulatedDesktop::new((320, 200));
        let (bh, dh) = (browser.handle(), desktop.handle());
        let mut op = HybridOperator::new(
            BrowserOperator::new(Box::new(browser), LaunchOptions::default()),
            DesktopOperator::new(Box::new(desktop)),
        );
        op.initialize().await.unwrap();

        op.execute(&Action::navigate("https://example.com")).await.unwrap();
        let shot = op.capture().await.unwrap();
        assert_eq!(shot.width, 1280);

        let key = Action::new(ActionType::Key)
            .with_param("key", "Escape")
            .with_param(SURFACE_PARAM, "desktop");
        assert!(op.execute(&key).await.unwrap().success);
        let shot = op.capture().await.unwrap();
        assert_eq!(shot.width, 320);

        assert!(bh.journal().contains(&"navigate https://example.com".to_string()));
        assert!(dh.journal().contains(&"key Escape".to_string()));

        let state = op.query_state().await;
        assert_eq!(state.url.as_deref(), Some("https://example.com"));
        assert_eq!(state.window.as_deref(), Some("Desktop"));
    }

    #[tokio::test]
    async fn cleanup_releases_both_surfaces() {
        let browser = SimulatedBrowser::new();
        let desktop = SimulatedDesktop::new((320, 200));
        let (bh, dh) = (browser.handle(), desktop.handle());
        let mut op = HybridOperator::new(
            BrowserOperator::new(Box::new(browser), LaunchOptions::default()),
            DesktopOperator::new(Box::new(desktop)),
        );
        op.initialize().await.unwrap();
        op.cleanup().await.unwrap();
        op.cleanup().await.unwrap();
        assert_eq!((bh.close_calls(), dh.close_calls()), (1, 1));
    }
}
