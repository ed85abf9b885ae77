use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::deal::returns::push_return_warnings;
use crate::deal::{
    evaluate_returns, DealCase, DealReturns, ParameterOverrides, ParameterSet, ProjectionProfile,
};
use crate::types::*;
use crate::DealModelResult;

/// A named perturbation of the base case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioSpec {
    /// Growth x1.25, year-3 synergies x1.3, earnout probability x1.2 (capped at 100)
    Upside,
    /// Growth x0.5, year-3 synergies x0.6, earnout probability x0.5, integration costs x1.3
    Downside,
    /// No synergies in any year
    NoSynergies,
    /// 100% equity, no acquisition debt
    AllEquity,
    /// Arbitrary field overrides
    Custom {
        name: String,
        overrides: ParameterOverrides,
    },
}

impl ScenarioSpec {
    pub fn name(&self) -> &str {
        match self {
            ScenarioSpec::Upside => "Upside",
            ScenarioSpec::Downside => "Downside",
            ScenarioSpec::NoSynergies => "No Synergies",
            ScenarioSpec::AllEquity => "All Equity",
            ScenarioSpec::Custom { name, .. } => name,
        }
    }

    /// Derive the scenario's parameter set from `base`.
    pub fn apply(&self, base: &ParameterSet) -> DealModelResult<ParameterSet> {
        match self {
            ScenarioSpec::Upside => base.derive(|a| {
                a.revenue_growth_rate = a.revenue_growth_rate.saturating_mul(dec!(1.25));
                a.synergies_year3 = a.synergies_year3.saturating_mul(dec!(1.3));
                a.earnout_probability =
                    (a.earnout_probability * dec!(1.2)).min(Decimal::ONE_HUNDRED);
            }),
            ScenarioSpec::Downside => base.derive(|a| {
                a.revenue_growth_rate *= dec!(0.5);
                a.synergies_year3 *= dec!(0.6);
                a.earnout_probability *= dec!(0.5);
                a.integration_costs = a.integration_costs.saturating_mul(dec!(1.3));
            }),
            ScenarioSpec::NoSynergies => base.derive(|a| {
                a.synergies_year1 = Decimal::ZERO;
                a.synergies_year3 = Decimal::ZERO;
            }),
            ScenarioSpec::AllEquity => base.derive(|a| {
                a.equity_percentage = Decimal::ONE_HUNDRED;
                a.debt_percentage = Decimal::ZERO;
            }),
            ScenarioSpec::Custom { overrides, .. } => base.with_overrides(overrides),
        }
    }
}

fn default_scenarios() -> Vec<ScenarioSpec> {
    vec![
        ScenarioSpec::Upside,
        ScenarioSpec::Downside,
        ScenarioSpec::NoSynergies,
        ScenarioSpec::AllEquity,
    ]
}

/// Input for scenario analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInput {
    /// Base case assumptions
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default = "ProjectionProfile::deal_returns")]
    pub profile: ProjectionProfile,
    /// Scenarios to run against the base case (Upside, Downside, No Synergies, All Equity by default)
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<ScenarioSpec>,
}

impl Default for ScenarioInput {
    fn default() -> Self {
        Self {
            parameters: ParameterSet::default(),
            profile: ProjectionProfile::DEAL_RETURNS,
            scenarios: default_scenarios(),
        }
    }
}

/// Result for a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub parameters: ParameterSet,
    pub returns: DealReturns,
    /// Scenario IRR minus base IRR, in percentage points
    pub irr_deviation_pct: Percent,
    pub npv_deviation_from_base: Money,
    /// NPV deviation relative to |base NPV|
    pub npv_deviation_pct: Rate,
}

/// Output of scenario analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub base_case: DealReturns,
    pub results: Vec<ScenarioResult>,
}

/// Run the base case and every requested scenario through the projector
/// and IRR solver.
pub fn run_scenarios(input: &ScenarioInput) -> DealModelResult<ComputationOutput<ScenarioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let base = DealCase::new(input.parameters.clone(), input.profile)?;
    let base_case = evaluate_returns(&base.project()?, base.parameters.discount_rate)?;
    push_return_warnings("Base case", &base_case, &mut warnings);

    let mut results = Vec::with_capacity(input.scenarios.len());

    for scenario in &input.scenarios {
        let parameters = scenario.apply(&base.parameters)?;
        let case = DealCase::new(parameters, base.profile)?;
        let returns = evaluate_returns(&case.project()?, case.parameters.discount_rate)?;
        push_return_warnings(scenario.name(), &returns, &mut warnings);

        let npv_deviation = returns.npv - base_case.npv;
        let npv_deviation_pct = match npv_deviation.checked_div(base_case.npv.abs()) {
            Some(pct) => pct,
            None => {
                if !npv_deviation.is_zero() {
                    warnings.push(format!(
                        "Base case NPV is too close to zero; cannot compute npv_deviation_pct for scenario '{}'",
                        scenario.name()
                    ));
                }
                Decimal::ZERO
            }
        };

        debug!(
            scenario = scenario.name(),
            irr_pct = %returns.irr_pct,
            "scenario evaluated"
        );

        results.push(ScenarioResult {
            name: scenario.name().to_string(),
            irr_deviation_pct: returns.irr_pct - base_case.irr_pct,
            npv_deviation_from_base: npv_deviation,
            npv_deviation_pct,
            parameters: case.parameters,
            returns,
        });
    }

    let output = ScenarioOutput { base_case, results };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Deal Scenario Analysis (Upside / Downside / No Synergies / All Equity)",
        &serde_json::json!({
            "num_scenarios": input.scenarios.len(),
            "scenarios": input.scenarios.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "exit_multiple": input.profile.exit_multiple.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn default_input() -> ScenarioInput {
        ScenarioInput::default()
    }

    fn irr_of<'a>(out: &'a ScenarioOutput, name: &str) -> &'a DealReturns {
        &out.results.iter().find(|r| r.name == name).unwrap().returns
    }

    #[test]
    fn test_default_scenarios_run() {
        let result = run_scenarios(&default_input()).unwrap();
        let names: Vec<_> = result.result.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Upside", "Downside", "No Synergies", "All Equity"]);
    }

    #[test]
    fn test_upside_beats_base_beats_downside() {
        let out = run_scenarios(&default_input()).unwrap().result;
        let upside = irr_of(&out, "Upside").irr_pct;
        let downside = irr_of(&out, "Downside").irr_pct;
        assert!(upside >= out.base_case.irr_pct);
        assert!(out.base_case.irr_pct >= downside);
    }

    #[test]
    fn test_no_synergies_hurts_returns() {
        let out = run_scenarios(&default_input()).unwrap().result;
        let no_syn = irr_of(&out, "No Synergies");
        assert!(no_syn.npv < out.base_case.npv);
    }

    #[test]
    fn test_upside_caps_earnout_probability() {
        let base = ParameterSet::default()
            .derive(|a| a.earnout_probability = dec!(90))
            .unwrap();
        let upside = ScenarioSpec::Upside.apply(&base).unwrap();
        assert_eq!(upside.earnout_probability, dec!(100));
    }

    #[test]
    fn test_downside_perturbations() {
        let downside = ScenarioSpec::Downside.apply(&ParameterSet::default()).unwrap();
        assert_eq!(downside.revenue_growth_rate, dec!(4));
        assert_eq!(downside.synergies_year3, dec!(4800000));
        assert_eq!(downside.earnout_probability, dec!(35));
        assert_eq!(downside.integration_costs, dec!(6500000));
    }

    #[test]
    fn test_all_equity_removes_debt() {
        let all_equity = ScenarioSpec::AllEquity.apply(&ParameterSet::default()).unwrap();
        assert_eq!(all_equity.equity_percentage, dec!(100));
        assert_eq!(all_equity.debt_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_custom_override_is_validated() {
        let input = ScenarioInput {
            scenarios: vec![ScenarioSpec::Custom {
                name: "Broken".into(),
                overrides: ParameterOverrides {
                    tax_rate: Some(dec!(150)),
                    ..Default::default()
                },
            }],
            ..default_input()
        };
        assert!(run_scenarios(&input).is_err());
    }

    #[test]
    fn test_deviations_are_relative_to_base() {
        let out = run_scenarios(&default_input()).unwrap().result;
        for r in &out.results {
            assert_eq!(r.npv_deviation_from_base, r.returns.npv - out.base_case.npv);
            assert_eq!(r.irr_deviation_pct, r.returns.irr_pct - out.base_case.irr_pct);
        }
    }

    #[test]
    fn test_custom_scenario_from_json() {
        let input: ScenarioInput = serde_json::from_value(serde_json::json!({
            "scenarios": [
                { "kind": "custom", "name": "Cheaper", "overrides": { "purchase_price": "90000000" } }
            ]
        }))
        .unwrap();
        let out = run_scenarios(&input).unwrap().result;
        assert_eq!(out.results[0].name, "Cheaper");
        assert!(out.results[0].irr_deviation_pct > Decimal::ZERO);
    }
}
