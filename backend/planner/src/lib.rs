pub mod canned;
pub mod factory;
pub mod model;
pub mod parse;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod scripted;

pub use canned::CannedModel;
pub use factory::{ModelBuilder, PlannerFactory};
pub use model::{VisionModel, VisionRequest, VisionResponse};
pub use parse::parse_analysis;
pub use planner::ModelPlanner;
pub use prompt::PromptBuilder;
pub use provider::ModelProvider;
pub use scripted::ScriptedPlanner;
