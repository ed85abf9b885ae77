use deal_model_core::monte_carlo::{
    default_risk_factors, run_risk_simulation, ExecutionMode, RiskCategory, RiskFactor,
    RiskSimulationInput,
};
use deal_model_core::DealModelError;

const BASE: f64 = 100_000_000.0;

fn default_run(trials: u32, seed: u64) -> RiskSimulationInput {
    RiskSimulationInput {
        base_deal_value: BASE,
        risk_factors: default_risk_factors(),
        num_trials: trials,
        seed: Some(seed),
        execution: ExecutionMode::Parallel,
    }
}

/// Worst case is -55%, so no trial is floored at zero and the sample mean
/// is unbiased for the analytical expectation.
fn unfloored_risks() -> Vec<RiskFactor> {
    vec![
        RiskFactor::new("Litigation", RiskCategory::Legal, 0.25, -15.0, -5.0),
        RiskFactor::new("Customer loss", RiskCategory::Operational, 0.35, -12.0, -4.0),
        RiskFactor::new("Overrun", RiskCategory::Integration, 0.45, -8.0, -2.0),
        RiskFactor::new("Downturn", RiskCategory::Market, 0.20, -20.0, -10.0),
        RiskFactor::new("Cross-sell upside", "Commercial", 0.30, 2.0, 8.0),
    ]
}

// ===========================================================================
// Determinism
// ===========================================================================

#[test]
fn test_default_risks_fixed_seed_is_deterministic() {
    let first = run_risk_simulation(&default_run(10_000, 2024)).unwrap().result;
    let second = run_risk_simulation(&default_run(10_000, 2024)).unwrap().result;

    assert_eq!(first.summary.mean_value, second.summary.mean_value);
    assert_eq!(first.summary.median_value, second.summary.median_value);
    assert_eq!(first.risk_metrics.value_at_risk_95, second.risk_metrics.value_at_risk_95);
    assert_eq!(first.risk_metrics.value_at_risk_99, second.risk_metrics.value_at_risk_99);
    assert_eq!(first.seed, Some(2024));

    // Several default risks carry double-digit losses
    assert!(first.probabilities.prob_value_below_90 > 0.0);
}

#[test]
fn test_different_seeds_differ() {
    let a = run_risk_simulation(&default_run(2_000, 1)).unwrap().result;
    let b = run_risk_simulation(&default_run(2_000, 2)).unwrap().result;
    assert_ne!(a.summary.mean_value, b.summary.mean_value);
}

#[test]
fn test_sequential_and_parallel_agree() {
    let parallel = run_risk_simulation(&default_run(10_000, 7)).unwrap().result;
    let sequential = run_risk_simulation(&RiskSimulationInput {
        execution: ExecutionMode::Sequential,
        ..default_run(10_000, 7)
    })
    .unwrap()
    .result;

    assert_eq!(parallel.summary, sequential.summary);
    assert_eq!(parallel.risk_metrics, sequential.risk_metrics);
    assert_eq!(parallel.worst_scenarios, sequential.worst_scenarios);
}

// ===========================================================================
// Aggregate invariants
// ===========================================================================

#[test]
fn test_tail_ordering_and_histogram_total() {
    let out = run_risk_simulation(&default_run(10_000, 99)).unwrap().result;

    assert!(out.risk_metrics.value_at_risk_99 <= out.risk_metrics.value_at_risk_95);
    assert!(out.risk_metrics.value_at_risk_95 <= out.summary.median_value);

    let total: u64 = out.distribution.iter().map(|b| b.count).sum();
    assert_eq!(total, 10_000);
    assert_eq!(out.distribution.len(), 7);

    assert!(out.summary.min_value >= 0.0);
    assert!(out.summary.max_value <= BASE);
}

#[test]
fn test_worst_scenarios_are_the_five_lowest() {
    let out = run_risk_simulation(&default_run(5_000, 3)).unwrap().result;
    assert_eq!(out.worst_scenarios.len(), 5);
    assert_eq!(out.worst_scenarios[0].final_value, out.summary.min_value);
    for pair in out.worst_scenarios.windows(2) {
        assert!(pair[0].final_value <= pair[1].final_value);
    }
    assert!(out.worst_scenarios.iter().all(|s| !s.triggered_risks.is_empty()));
}

#[test]
fn test_top_contributors_ranked() {
    let out = run_risk_simulation(&default_run(10_000, 11)).unwrap().result;
    let top = &out.top_risk_contributors;
    assert_eq!(top.len(), 5);
    for pair in top.windows(2) {
        assert!(pair[0].contribution_score >= pair[1].contribution_score);
    }
}

// ===========================================================================
// Convergence
// ===========================================================================

#[test]
fn test_mean_converges_to_analytical_expectation() {
    let run = |trials: u32| {
        run_risk_simulation(&RiskSimulationInput {
            risk_factors: unfloored_risks(),
            ..default_run(trials, 314)
        })
        .unwrap()
        .result
    };
    let small = run(1_000);
    let large = run(50_000);
    let expected = large.summary.analytical_expected_value;

    let small_err = (small.summary.mean_value - expected).abs();
    let large_err = (large.summary.mean_value - expected).abs();

    assert!(small_err < 4.0 * small.summary.standard_error, "1k error {small_err}");
    assert!(large_err < 4.0 * large.summary.standard_error, "50k error {large_err}");
    assert!(large.summary.standard_error < small.summary.standard_error);
    // The 50k band is about sqrt(50) times tighter
    assert!(large_err < 4.0 * small.summary.standard_error / 5.0);
}

// ===========================================================================
// Limits and validation
// ===========================================================================

#[test]
fn test_trial_cap_is_reported() {
    let result = run_risk_simulation(&RiskSimulationInput {
        risk_factors: vec![],
        ..default_run(75_000, 5)
    })
    .unwrap();
    assert_eq!(result.result.trials_requested, 75_000);
    assert_eq!(result.result.trials_run, 50_000);
    assert!(!result.warnings.is_empty());
}

#[test]
fn test_inverted_impact_bounds_rejected() {
    let input = RiskSimulationInput {
        risk_factors: vec![RiskFactor::new("Bad", RiskCategory::Legal, 0.2, -1.0, -10.0)],
        ..default_run(100, 1)
    };
    let err = run_risk_simulation(&input).unwrap_err();
    assert!(matches!(err, DealModelError::InvalidInput { .. }));
}

#[test]
fn test_probability_outside_unit_interval_rejected() {
    let input = RiskSimulationInput {
        risk_factors: vec![RiskFactor::new("Bad", RiskCategory::Legal, 25.0, -10.0, -1.0)],
        ..default_run(100, 1)
    };
    assert!(run_risk_simulation(&input).is_err());
}

#[test]
fn test_json_input_uses_default_risks() {
    let input: RiskSimulationInput =
        serde_json::from_str(r#"{ "base_deal_value": 50000000, "seed": 9 }"#).unwrap();
    assert_eq!(input.risk_factors.len(), 8);
    assert_eq!(input.num_trials, 10_000);
    assert_eq!(input.execution, ExecutionMode::Parallel);
}
