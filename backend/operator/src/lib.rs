pub mod browser;
pub mod command;
pub mod desktop;
pub mod driver;
pub mod factory;
pub mod hybrid;
pub mod screenshot;
pub mod simulated;

pub use browser::BrowserOperator;
pub use command::InputCommand;
pub use desktop::DesktopOperator;
pub use driver::{BrowserDriver, DesktopDriver, DriverError, LaunchOptions, Target};
pub use factory::{BrowserDriverBuilder, DesktopDriverBuilder, OperatorFactory};
pub use hybrid::{HybridOperator, SURFACE_PARAM};
pub use simulated::{SimulatedBrowser, SimulatedDesktop, SimulatedHandle};
