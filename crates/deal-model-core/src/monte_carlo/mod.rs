pub mod risk_factors;
pub mod simulation;
pub mod statistics;

pub use risk_factors::{default_risk_factors, RiskCategory, RiskFactor};
pub use simulation::{
    run_risk_simulation, run_risk_simulation_with, run_risk_simulation_with_rng, ExecutionMode,
    RiskSimulationInput, RiskSimulationOutput, RunControl, SeededStreams, TrialRngFactory,
};
pub use statistics::{SimulationResult, SimulationSummary};
