use deal_model_core::deal::{
    analyze_deal, project_cash_flows, DealAnalysisInput, ParameterSet, ProjectionProfile,
};
use deal_model_core::scenarios::{run_scenarios, ScenarioInput, ScenarioSpec};
use deal_model_core::time_value::{npv, solve_irr, DEFAULT_IRR_GUESS, NPV_TOLERANCE};
use deal_model_core::DealModelError;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Deal returns
// ===========================================================================

#[test]
fn test_default_deal_has_finite_returns() {
    let result = analyze_deal(&DealAnalysisInput {
        parameters: ParameterSet::default(),
        profile: ProjectionProfile::DEAL_RETURNS,
    })
    .unwrap();
    let r = &result.result.returns;

    assert!(r.irr.converged, "base IRR should converge: {:?}", r.irr);
    assert!(r.irr_pct > dec!(-99) && r.irr_pct < dec!(1000));
    assert!(r.moic.unwrap() > Decimal::ZERO);
    // NPV must be a real number, not a sentinel
    assert_ne!(r.npv, Decimal::MAX);
    assert_ne!(r.npv, Decimal::MIN);
}

#[test]
fn test_default_deal_from_empty_json() {
    // Every assumption defaults, profile defaults to deal returns
    let input: DealAnalysisInput = serde_json::from_str("{}").unwrap();
    assert_eq!(input.parameters.purchase_price, dec!(100000000));
    assert_eq!(input.profile, ProjectionProfile::DEAL_RETURNS);
}

#[test]
fn test_invalid_capital_structure_rejected_from_json() {
    let parsed: Result<DealAnalysisInput, _> = serde_json::from_value(serde_json::json!({
        "parameters": { "equity_percentage": "50", "debt_percentage": "40" }
    }));
    assert!(parsed.is_err());
}

#[test]
fn test_negative_purchase_price_rejected() {
    let result = ParameterSet::default().derive(|a| a.purchase_price = dec!(-1));
    assert!(result.is_err());
}

#[test]
fn test_runaway_growth_is_an_input_error() {
    let parameters = ParameterSet::default()
        .derive(|a| a.revenue_growth_rate = dec!(1000000))
        .unwrap();
    let err = analyze_deal(&DealAnalysisInput {
        parameters,
        profile: ProjectionProfile::DEAL_RETURNS,
    })
    .unwrap_err();
    assert!(matches!(err, DealModelError::InvalidInput { .. }), "{err}");
}

#[test]
fn test_solved_irr_zeroes_npv_of_default_schedule() {
    let schedule =
        project_cash_flows(&ParameterSet::default(), &ProjectionProfile::DEAL_RETURNS).unwrap();
    let irr = solve_irr(schedule.flows(), DEFAULT_IRR_GUESS).unwrap();
    assert!(irr.converged);
    let residual = npv(irr.rate, schedule.flows()).unwrap();
    assert!(residual.abs() < NPV_TOLERANCE, "residual {residual}");
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn test_upside_base_downside_ordering() {
    let input = ScenarioInput {
        parameters: ParameterSet::default(),
        profile: ProjectionProfile::DEAL_RETURNS,
        scenarios: vec![ScenarioSpec::Upside, ScenarioSpec::Downside],
    };
    let out = run_scenarios(&input).unwrap().result;
    let upside = &out.results[0].returns;
    let downside = &out.results[1].returns;

    assert!(upside.irr_pct >= out.base_case.irr_pct);
    assert!(out.base_case.irr_pct >= downside.irr_pct);
    assert!(upside.npv >= out.base_case.npv);
    assert!(out.base_case.npv >= downside.npv);
}

#[test]
fn test_all_equity_scenario_removes_leverage() {
    let input = ScenarioInput {
        parameters: ParameterSet::default(),
        profile: ProjectionProfile::DEAL_RETURNS,
        scenarios: vec![ScenarioSpec::AllEquity],
    };
    let out = run_scenarios(&input).unwrap().result;
    let all_equity = &out.results[0];
    // Year 0 outlay grows from 45m to 105m once the whole price is equity
    assert_eq!(all_equity.parameters.equity_percentage, dec!(100));
    assert!(all_equity.returns.moic.unwrap() > Decimal::ZERO);
}

// ===========================================================================
// Solver properties
// ===========================================================================

proptest! {
    #[test]
    fn prop_converged_irr_has_zero_npv(
        outlay in 1_000i64..10_000_000,
        inflows in prop::collection::vec(0i64..5_000_000, 1..8),
    ) {
        let mut flows = vec![Decimal::from(-outlay)];
        flows.extend(inflows.into_iter().map(Decimal::from));

        let irr = solve_irr(&flows, DEFAULT_IRR_GUESS).unwrap();
        if irr.converged {
            let residual = npv(irr.rate, &flows).unwrap();
            prop_assert!(residual.abs() < NPV_TOLERANCE, "rate {} residual {}", irr.rate, residual);
        } else {
            // A non-converged answer must say how far off it is
            prop_assert!(irr.npv_residual.abs() >= NPV_TOLERANCE);
        }
    }
}
