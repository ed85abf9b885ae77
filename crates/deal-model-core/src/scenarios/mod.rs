pub mod breakeven;
pub mod scenario;
pub mod sensitivity;
pub mod variables;

pub use breakeven::{solve_breakeven, BreakevenInput, BreakevenResult, BreakevenTarget};
pub use scenario::{run_scenarios, ScenarioInput, ScenarioOutput, ScenarioResult, ScenarioSpec};
pub use sensitivity::{analyze_sensitivity, SensitivityInput, SensitivityOutput, SensitivityResult};
pub use variables::{DealVariable, Polarity};
