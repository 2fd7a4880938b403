//! 场景：配置、构建与运行

mod build;
mod config;
mod run;

pub use build::{Scenario, ScenarioPlan, plan_scenario};
pub use config::{ArtifactConfig, ScenarioConfig};
pub use run::RunSummary;
