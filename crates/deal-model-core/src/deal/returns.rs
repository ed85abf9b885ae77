use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::parameters::ParameterSet;
use super::projection::{CashFlowSchedule, DealCase, ProjectionProfile};
use crate::time_value::{self, IrrSolution, DEFAULT_IRR_GUESS};
use crate::types::*;
use crate::DealModelResult;

/// Returns metrics for one projected cash-flow schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealReturns {
    pub irr: IrrSolution,
    /// IRR in percentage points
    pub irr_pct: Percent,
    /// NPV at the deal's discount rate
    pub npv: Money,
    /// `None` when the equity investment is zero
    pub moic: Option<Multiple>,
    pub payback_year: Option<u32>,
    pub break_even_year: Option<u32>,
}

/// Solve IRR, NPV and MOIC for a schedule.
pub fn evaluate_returns(
    schedule: &CashFlowSchedule,
    discount_rate: Percent,
) -> DealModelResult<DealReturns> {
    let flows = schedule.flows();
    let irr = time_value::solve_irr(flows, DEFAULT_IRR_GUESS)?;
    let npv = time_value::npv(pct_to_rate(discount_rate), flows)?;

    Ok(DealReturns {
        irr_pct: irr.rate_pct(),
        irr,
        npv,
        moic: time_value::moic(flows, schedule.equity_investment()),
        payback_year: schedule.payback_year(),
        break_even_year: schedule.break_even_year(),
    })
}

/// Append the warnings a caller needs to treat `returns` as low-confidence.
pub(crate) fn push_return_warnings(label: &str, returns: &DealReturns, warnings: &mut Vec<String>) {
    if !returns.irr.converged {
        warnings.push(format!(
            "{label}: IRR did not converge after {} iterations (NPV residual {}); {}% is an estimate",
            returns.irr.iterations,
            returns.irr.npv_residual.round_dp(4),
            returns.irr_pct.round_dp(4),
        ));
    }
    if returns.moic.is_none() {
        warnings.push(format!(
            "{label}: equity investment is zero; MOIC is undefined"
        ));
    }
}

/// Input for a single-deal returns analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealAnalysisInput {
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default = "ProjectionProfile::deal_returns")]
    pub profile: ProjectionProfile,
}

impl Default for DealAnalysisInput {
    fn default() -> Self {
        Self {
            parameters: ParameterSet::default(),
            profile: ProjectionProfile::DEAL_RETURNS,
        }
    }
}

/// Output of a single-deal returns analysis
#[derive(Debug, Clone, Serialize)]
pub struct DealAnalysisOutput {
    pub cash_flows: CashFlowSchedule,
    pub returns: DealReturns,
}

/// Project a deal's cash flows and compute IRR, NPV, MOIC, payback and
/// break-even years.
pub fn analyze_deal(
    input: &DealAnalysisInput,
) -> DealModelResult<ComputationOutput<DealAnalysisOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let case = DealCase::new(input.parameters.clone(), input.profile)?;
    let schedule = case.project()?;
    let returns = evaluate_returns(&schedule, case.parameters.discount_rate)?;
    push_return_warnings("Deal", &returns, &mut warnings);

    debug!(
        irr_pct = %returns.irr_pct,
        npv = %returns.npv,
        converged = returns.irr.converged,
        "deal returns evaluated"
    );

    let output = DealAnalysisOutput {
        cash_flows: schedule,
        returns,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Deal Returns: 7-year FCF projection, Newton-Raphson IRR, NPV, MOIC",
        &serde_json::json!({
            "purchase_price": input.parameters.purchase_price.to_string(),
            "discount_rate_pct": input.parameters.discount_rate.to_string(),
            "base_ebitda_ratio": input.profile.base_ebitda_ratio.to_string(),
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
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn default_input() -> DealAnalysisInput {
        DealAnalysisInput::default()
    }

    #[test]
    fn test_default_deal_returns_are_finite() {
        let result = analyze_deal(&default_input()).unwrap();
        let r = &result.result.returns;
        assert!(r.irr.converged);
        assert!(r.irr_pct > dec!(-99) && r.irr_pct < dec!(1000));
        assert!(r.moic.unwrap() > Decimal::ZERO);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_npv_below_zero_when_discount_exceeds_irr() {
        let result = analyze_deal(&default_input()).unwrap();
        let r = &result.result.returns;
        // Default deal clears low single digits, well under the 12% hurdle
        assert!(r.irr_pct < dec!(12));
        assert!(r.npv < Decimal::ZERO);
    }

    #[test]
    fn test_all_debt_deal_has_no_moic() {
        let input = DealAnalysisInput {
            parameters: ParameterSet::default()
                .derive(|a| {
                    a.equity_percentage = Decimal::ZERO;
                    a.debt_percentage = dec!(100);
                })
                .unwrap(),
            profile: ProjectionProfile::DEAL_RETURNS,
        };
        let result = analyze_deal(&input).unwrap();
        assert!(result.result.returns.moic.is_none());
        assert!(result.warnings.iter().any(|w| w.contains("MOIC")));
    }

    #[test]
    fn test_metadata_precision_field() {
        let result = analyze_deal(&default_input()).unwrap();
        assert_eq!(result.metadata.precision, "rust_decimal_128bit");
    }
}
