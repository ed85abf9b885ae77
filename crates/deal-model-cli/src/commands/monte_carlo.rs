use clap::Args;
use serde_json::Value;
use std::time::Duration;

use deal_model_core::monte_carlo::{
    default_risk_factors, run_risk_simulation_with, ExecutionMode, RiskSimulationInput, RunControl,
};

use crate::input;

/// Arguments for Monte Carlo deal-risk simulation
#[derive(Args)]
pub struct RiskSimArgs {
    /// Path to JSON or YAML input file (flags below are applied on top)
    #[arg(long)]
    pub input: Option<String>,

    /// Base deal value the risk impacts apply to
    #[arg(long)]
    pub base_value: Option<f64>,

    /// Number of trials (clamped to 50,000)
    #[arg(long)]
    pub trials: Option<u32>,

    /// Seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run trials on the calling thread instead of the rayon pool
    #[arg(long)]
    pub sequential: bool,

    /// Abort the run after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

pub fn run_risk_sim(args: RiskSimArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut sim_input: RiskSimulationInput = match input::load(args.input.as_deref())? {
        Some(loaded) => loaded,
        None => {
            let base = args
                .base_value
                .ok_or("--base-value is required (or provide --input)")?;
            RiskSimulationInput::new(base)
        }
    };

    if let Some(base) = args.base_value {
        sim_input.base_deal_value = base;
    }
    if let Some(trials) = args.trials {
        sim_input.num_trials = trials;
    }
    if args.seed.is_some() {
        sim_input.seed = args.seed;
    }
    if args.sequential {
        sim_input.execution = ExecutionMode::Sequential;
    }

    let mut control = RunControl::new();
    if let Some(secs) = args.timeout_secs {
        control = control.with_timeout(Duration::from_secs(secs));
    }

    let result = run_risk_simulation_with(&sim_input, &control)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_default_risks() -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::to_value(default_risk_factors())?)
}
