use napi::Result as NapiResult;
use napi_derive::napi;

use deal_model_core::deal::{self, DealAnalysisInput};
use deal_model_core::monte_carlo::{self, RiskSimulationInput};
use deal_model_core::scenarios::{self, BreakevenInput, ScenarioInput, SensitivityInput};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Deal returns
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_deal(input_json: String) -> NapiResult<String> {
    let input: DealAnalysisInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = deal::analyze_deal(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios, sensitivity and breakeven
// ---------------------------------------------------------------------------

#[napi]
pub fn run_scenarios(input_json: String) -> NapiResult<String> {
    let input: ScenarioInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = scenarios::run_scenarios(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_sensitivity(input_json: String) -> NapiResult<String> {
    let input: SensitivityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = scenarios::analyze_sensitivity(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn solve_breakeven(input_json: String) -> NapiResult<String> {
    let input: BreakevenInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = scenarios::solve_breakeven(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Monte Carlo risk
// ---------------------------------------------------------------------------

#[napi]
pub fn run_risk_simulation(input_json: String) -> NapiResult<String> {
    let input: RiskSimulationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = monte_carlo::run_risk_simulation(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn default_risk_factors() -> NapiResult<String> {
    serde_json::to_string(&monte_carlo::default_risk_factors()).map_err(to_napi_error)
}
