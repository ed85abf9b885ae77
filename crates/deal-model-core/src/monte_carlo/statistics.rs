//! Reduction of simulated trials into summary statistics.
//!
//! Everything here is a pure function of the trial outcomes, so a run
//! aggregates to the same numbers whether its trials were produced in
//! parallel or sequentially.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use super::risk_factors::{RiskCategory, RiskFactor};
use crate::error::DealModelError;
use crate::DealModelResult;

pub const TOP_CONTRIBUTORS: usize = 5;
pub const WORST_SCENARIOS: usize = 5;

/// A risk that fired in one trial and the impact it drew.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggeredRisk {
    pub factor_index: usize,
    pub impact_percent: f64,
}

/// Raw result of one trial, before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub trial_id: u64,
    pub final_value: f64,
    pub total_impact_percent: f64,
    pub triggered: Vec<TriggeredRisk>,
}

/// One trial as reported back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trial_id: u64,
    pub base_value: f64,
    pub final_value: f64,
    pub total_impact_percent: f64,
    pub triggered_risks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub mean_value: f64,
    pub median_value: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min_value: f64,
    pub max_value: f64,
    /// Standard error of the mean
    pub standard_error: f64,
    pub mean_confidence_interval_95: (f64, f64),
    /// base * (1 + sum(p * midpoint) / 100), ignoring the floor at zero
    pub analytical_expected_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub value_at_risk_95: f64,
    pub value_at_risk_99: f64,
    pub expected_shortfall: f64,
    pub value_at_risk_95_pct_of_base: f64,
    pub value_at_risk_99_pct_of_base: f64,
    pub expected_shortfall_pct_of_base: f64,
}

/// Fractions of trials in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProbabilities {
    pub prob_value_below_80: f64,
    pub prob_value_below_90: f64,
    pub prob_value_above_110: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub label: String,
    pub count: u64,
    /// Share of trials, 0-100
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskContribution {
    pub name: String,
    pub category: RiskCategory,
    pub trigger_count: u64,
    /// trigger_count / trials
    pub frequency: f64,
    /// Mean |impact| over the trials where the risk fired
    pub average_impact_percent: f64,
    /// frequency * average |impact|
    pub contribution_score: f64,
}

/// All statistics derived from one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialStatistics {
    pub summary: SimulationSummary,
    pub risk_metrics: RiskMetrics,
    pub probabilities: ThresholdProbabilities,
    pub distribution: Vec<DistributionBucket>,
    pub top_risk_contributors: Vec<RiskContribution>,
    pub worst_scenarios: Vec<SimulationResult>,
}

/// Ratio-to-base bucket labels, lowest first.
pub const BUCKET_LABELS: [&str; 7] = [
    "<70%", "70-80%", "80-90%", "90-95%", "95-100%", "100-105%", ">105%",
];

/// Bucket index for a value's ratio to base. 100-105% is closed on both ends.
pub fn bucket_index(ratio: f64) -> usize {
    if ratio < 0.70 {
        0
    } else if ratio < 0.80 {
        1
    } else if ratio < 0.90 {
        2
    } else if ratio < 0.95 {
        3
    } else if ratio < 1.00 {
        4
    } else if ratio <= 1.05 {
        5
    } else {
        6
    }
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Value at the given lower-tail index, `floor(tail * n)`.
fn tail_index(n: usize, tail: f64) -> usize {
    ((tail * n as f64).floor() as usize).min(n - 1)
}

pub fn analytical_expected_value(base_value: f64, factors: &[RiskFactor]) -> f64 {
    let expected_impact: f64 = factors
        .iter()
        .map(|f| f.probability * f.impact_midpoint())
        .sum();
    base_value * (1.0 + expected_impact / 100.0)
}

fn risk_metrics(sorted: &[f64], base_value: f64) -> RiskMetrics {
    let n = sorted.len();
    let idx_95 = tail_index(n, 0.05);
    let idx_99 = tail_index(n, 0.01);
    let var_95 = sorted[idx_95];
    let var_99 = sorted[idx_99];

    let tail = &sorted[..idx_95];
    let expected_shortfall = if tail.is_empty() {
        var_95
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };

    let pct = |v: f64| v / base_value * 100.0;
    RiskMetrics {
        value_at_risk_95: var_95,
        value_at_risk_99: var_99,
        expected_shortfall,
        value_at_risk_95_pct_of_base: pct(var_95),
        value_at_risk_99_pct_of_base: pct(var_99),
        expected_shortfall_pct_of_base: pct(expected_shortfall),
    }
}

fn contributions(
    outcomes: &[TrialOutcome],
    factors: &[RiskFactor],
    trials: f64,
) -> Vec<RiskContribution> {
    let mut counts = vec![0u64; factors.len()];
    let mut abs_impact = vec![0.0f64; factors.len()];
    for outcome in outcomes {
        for hit in &outcome.triggered {
            counts[hit.factor_index] += 1;
            abs_impact[hit.factor_index] += hit.impact_percent.abs();
        }
    }

    let mut ranked: Vec<RiskContribution> = factors
        .iter()
        .enumerate()
        .map(|(i, factor)| {
            let frequency = counts[i] as f64 / trials;
            let average = if counts[i] == 0 {
                0.0
            } else {
                abs_impact[i] / counts[i] as f64
            };
            RiskContribution {
                name: factor.name.clone(),
                category: factor.category.clone(),
                trigger_count: counts[i],
                frequency,
                average_impact_percent: average,
                contribution_score: frequency * average,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.contribution_score.total_cmp(&a.contribution_score));
    ranked.truncate(TOP_CONTRIBUTORS);
    ranked
}

/// Reduce trial outcomes to summary, tail metrics, histogram and rankings.
///
/// `outcomes` must be non-empty and `base_value` positive.
pub fn aggregate(
    base_value: f64,
    factors: &[RiskFactor],
    mut outcomes: Vec<TrialOutcome>,
) -> DealModelResult<TrialStatistics> {
    if outcomes.is_empty() {
        return Err(DealModelError::InsufficientData(
            "At least one trial is required for aggregation".into(),
        ));
    }

    // Ties fall back to trial order so the worst-scenario list is stable
    outcomes.sort_by(|a, b| {
        a.final_value
            .total_cmp(&b.final_value)
            .then(a.trial_id.cmp(&b.trial_id))
    });
    let sorted: Vec<f64> = outcomes.iter().map(|o| o.final_value).collect();
    let n = sorted.len();
    let trials = n as f64;

    let mean = sorted.iter().sum::<f64>() / trials;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / trials;
    let std_dev = variance.sqrt();
    let standard_error = std_dev / trials.sqrt();

    let z = Normal::new(0.0, 1.0)
        .map_err(|e| DealModelError::invalid("normal", e.to_string()))?
        .inverse_cdf(0.975);

    let summary = SimulationSummary {
        mean_value: mean,
        median_value: median_sorted(&sorted),
        std_dev,
        min_value: sorted[0],
        max_value: sorted[n - 1],
        standard_error,
        mean_confidence_interval_95: (mean - z * standard_error, mean + z * standard_error),
        analytical_expected_value: analytical_expected_value(base_value, factors),
    };

    let share = |count: usize| count as f64 / trials;
    let probabilities = ThresholdProbabilities {
        prob_value_below_80: share(sorted.iter().filter(|v| **v < 0.8 * base_value).count()),
        prob_value_below_90: share(sorted.iter().filter(|v| **v < 0.9 * base_value).count()),
        prob_value_above_110: share(sorted.iter().filter(|v| **v > 1.1 * base_value).count()),
    };

    let mut counts = [0u64; BUCKET_LABELS.len()];
    for v in &sorted {
        counts[bucket_index(v / base_value)] += 1;
    }
    let distribution = BUCKET_LABELS
        .iter()
        .zip(counts)
        .map(|(label, count)| DistributionBucket {
            label: (*label).to_string(),
            count,
            percentage: count as f64 / trials * 100.0,
        })
        .collect();

    let worst_scenarios = outcomes
        .iter()
        .take(WORST_SCENARIOS)
        .map(|o| SimulationResult {
            trial_id: o.trial_id,
            base_value,
            final_value: o.final_value,
            total_impact_percent: o.total_impact_percent,
            triggered_risks: o
                .triggered
                .iter()
                .map(|t| factors[t.factor_index].name.clone())
                .collect(),
        })
        .collect();

    Ok(TrialStatistics {
        risk_metrics: risk_metrics(&sorted, base_value),
        top_risk_contributors: contributions(&outcomes, factors, trials),
        summary,
        probabilities,
        distribution,
        worst_scenarios,
    })
}
