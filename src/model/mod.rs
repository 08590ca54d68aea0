//! The full-system model built from transpiled equations.
pub mod config;
pub mod equations;
pub mod error;
pub mod init;
pub mod residuals;
pub mod scenario;
pub mod solver;

pub use config::{obr_preset, DefaultRule, DefaultValue, ModelConfig, RuleScope};
pub use equations::EquationSet;
pub use error::ModelError;
pub use init::InitReport;
pub use residuals::{ResidualMode, Residuals};
pub use scenario::{run_scenario, run_scenarios, ClosureSpec, Scenario, ScenarioResult, ScenarioRow};
pub use solver::{AppliedShock, ClosureSwap, FullSystemSolver};
