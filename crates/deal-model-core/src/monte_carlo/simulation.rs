use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::risk_factors::{default_risk_factors, RiskFactor};
use super::statistics::{
    aggregate, DistributionBucket, RiskContribution, RiskMetrics, SimulationResult,
    SimulationSummary, ThresholdProbabilities, TrialOutcome, TriggeredRisk,
};
use crate::error::DealModelError;
use crate::types::{ComputationMetadata, ComputationOutput};
use crate::DealModelResult;

/// Upper bound on trials per run; larger requests are clamped.
pub const MAX_TRIALS: u32 = 50_000;
pub const DEFAULT_TRIALS: u32 = 10_000;

fn with_metadata_f64<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Source of one independent random stream per trial.
///
/// Trial `i` always receives the same stream from the same factory, which is
/// what makes parallel and sequential runs produce identical results.
pub trait TrialRngFactory: Sync {
    type Rng: RngCore;

    fn trial_rng(&self, trial_index: u64) -> Self::Rng;
}

/// ChaCha8 keyed by the run seed, one stream per trial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededStreams {
    base_seed: u64,
}

impl SeededStreams {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }
}

impl TrialRngFactory for SeededStreams {
    type Rng = ChaCha8Rng;

    fn trial_rng(&self, trial_index: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.base_seed);
        rng.set_stream(trial_index);
        rng
    }
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    #[default]
    Parallel,
}

/// Cooperative cancellation and deadline, checked before every trial.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort once `flag` is set to true.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    fn check(&self) -> DealModelResult<()> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(DealModelError::Cancelled(
                    "risk simulation cancelled by caller".into(),
                ));
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(DealModelError::Cancelled(
                    "risk simulation exceeded its deadline".into(),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn default_num_trials() -> u32 {
    DEFAULT_TRIALS
}

/// Input for a Monte Carlo deal-risk simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSimulationInput {
    /// Deal value the risk impacts are applied to (must be positive).
    pub base_deal_value: f64,
    /// Independent risks; the default deal-risk set when omitted.
    #[serde(default = "default_risk_factors")]
    pub risk_factors: Vec<RiskFactor>,
    /// Number of trials (1 to 50,000; larger values are clamped).
    #[serde(default = "default_num_trials")]
    pub num_trials: u32,
    /// Seed for reproducibility. Drawn from entropy and reported when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub execution: ExecutionMode,
}

impl RiskSimulationInput {
    pub fn new(base_deal_value: f64) -> Self {
        Self {
            base_deal_value,
            risk_factors: default_risk_factors(),
            num_trials: DEFAULT_TRIALS,
            seed: None,
            execution: ExecutionMode::default(),
        }
    }
}

/// Output of a Monte Carlo deal-risk simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSimulationOutput {
    pub trials_requested: u32,
    pub trials_run: u32,
    /// Seed that reproduces this run; `None` with a caller-supplied RNG factory
    pub seed: Option<u64>,
    pub base_deal_value: f64,
    pub summary: SimulationSummary,
    pub risk_metrics: RiskMetrics,
    pub probabilities: ThresholdProbabilities,
    pub distribution: Vec<DistributionBucket>,
    pub top_risk_contributors: Vec<RiskContribution>,
    pub worst_scenarios: Vec<SimulationResult>,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Run one trial: each factor fires on a uniform draw below its probability,
/// and a second draw places its impact inside [impact_low, impact_high].
pub fn run_trial<R: Rng>(
    rng: &mut R,
    trial_id: u64,
    base_value: f64,
    factors: &[RiskFactor],
) -> TrialOutcome {
    let mut total_impact_percent = 0.0;
    let mut triggered = Vec::new();

    for (factor_index, factor) in factors.iter().enumerate() {
        let draw: f64 = rng.gen();
        if draw < factor.probability {
            let impact_percent = factor.interpolate(rng.gen::<f64>());
            total_impact_percent += impact_percent;
            triggered.push(TriggeredRisk {
                factor_index,
                impact_percent,
            });
        }
    }

    TrialOutcome {
        trial_id,
        final_value: (base_value * (1.0 + total_impact_percent / 100.0)).max(0.0),
        total_impact_percent,
        triggered,
    }
}

fn validate(input: &RiskSimulationInput) -> DealModelResult<()> {
    if !input.base_deal_value.is_finite() || input.base_deal_value <= 0.0 {
        return Err(DealModelError::invalid(
            "base_deal_value",
            "Base deal value must be a positive, finite number",
        ));
    }
    if input.num_trials == 0 {
        return Err(DealModelError::invalid(
            "num_trials",
            "At least one trial is required",
        ));
    }
    for (i, factor) in input.risk_factors.iter().enumerate() {
        factor.validate(i)?;
    }
    Ok(())
}

fn simulate<F: TrialRngFactory>(
    input: &RiskSimulationInput,
    factory: &F,
    seed: Option<u64>,
    control: &RunControl,
) -> DealModelResult<ComputationOutput<RiskSimulationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate(input)?;

    let trials_run = input.num_trials.min(MAX_TRIALS);
    if trials_run < input.num_trials {
        warn!(
            requested = input.num_trials,
            cap = MAX_TRIALS,
            "trial count clamped"
        );
        warnings.push(format!(
            "Requested {} trials; clamped to the maximum of {MAX_TRIALS}",
            input.num_trials
        ));
    }
    if input.risk_factors.is_empty() {
        warnings.push("No risk factors supplied; every trial equals the base deal value".into());
    }

    let base = input.base_deal_value;
    let factors = input.risk_factors.as_slice();
    let one_trial = |trial_id: u64| -> DealModelResult<TrialOutcome> {
        control.check()?;
        let mut rng = factory.trial_rng(trial_id);
        Ok(run_trial(&mut rng, trial_id, base, factors))
    };

    debug!(
        trials = trials_run,
        factors = factors.len(),
        mode = ?input.execution,
        seed = ?seed,
        "starting risk simulation"
    );

    let outcomes: Vec<TrialOutcome> = match input.execution {
        ExecutionMode::Parallel => (0..trials_run as usize)
            .into_par_iter()
            .map(|i| one_trial(i as u64))
            .collect::<DealModelResult<_>>()?,
        ExecutionMode::Sequential => (0..trials_run as usize)
            .map(|i| one_trial(i as u64))
            .collect::<DealModelResult<_>>()?,
    };

    let stats = aggregate(base, factors, outcomes)?;

    info!(
        trials = trials_run,
        mean = stats.summary.mean_value,
        var_95 = stats.risk_metrics.value_at_risk_95,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "risk simulation complete"
    );

    let output = RiskSimulationOutput {
        trials_requested: input.num_trials,
        trials_run,
        seed,
        base_deal_value: base,
        summary: stats.summary,
        risk_metrics: stats.risk_metrics,
        probabilities: stats.probabilities,
        distribution: stats.distribution,
        top_risk_contributors: stats.top_risk_contributors,
        worst_scenarios: stats.worst_scenarios,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monte Carlo Deal Risk Simulation (independent Bernoulli triggers, uniform impacts)",
        &serde_json::json!({
            "base_deal_value": base,
            "num_trials": trials_run,
            "seed": seed,
            "execution": input.execution,
            "risk_factors": factors.iter().map(|f| &f.name).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Run a deal-risk simulation with no cancellation or deadline.
pub fn run_risk_simulation(
    input: &RiskSimulationInput,
) -> DealModelResult<ComputationOutput<RiskSimulationOutput>> {
    run_risk_simulation_with(input, &RunControl::default())
}

/// Run a deal-risk simulation under `control`.
///
/// Uses the input seed, or draws one from entropy and reports it in the
/// output so the run can be replayed.
pub fn run_risk_simulation_with(
    input: &RiskSimulationInput,
    control: &RunControl,
) -> DealModelResult<ComputationOutput<RiskSimulationOutput>> {
    let seed = input
        .seed
        .unwrap_or_else(|| StdRng::from_entropy().gen::<u64>());
    simulate(input, &SeededStreams::new(seed), Some(seed), control)
}

/// Run a deal-risk simulation drawing from a caller-supplied RNG factory.
/// The input seed is ignored.
pub fn run_risk_simulation_with_rng<F: TrialRngFactory>(
    input: &RiskSimulationInput,
    factory: &F,
    control: &RunControl,
) -> DealModelResult<ComputationOutput<RiskSimulationOutput>> {
    simulate(input, factory, None, control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::risk_factors::RiskCategory;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rand::rngs::mock::StepRng;

    /// Every trial gets the same constant stream.
    struct Constant(u64);

    impl TrialRngFactory for Constant {
        type Rng = StepRng;

        fn trial_rng(&self, _trial_index: u64) -> StepRng {
            StepRng::new(self.0, 0)
        }
    }

    fn seeded_input(trials: u32) -> RiskSimulationInput {
        RiskSimulationInput {
            num_trials: trials,
            seed: Some(42),
            ..RiskSimulationInput::new(100_000_000.0)
        }
    }

    #[test]
    fn test_zero_draws_trigger_every_risk_at_low_impact() {
        let factors = vec![
            RiskFactor::new("A", RiskCategory::Legal, 0.2, -10.0, -5.0),
            RiskFactor::new("B", RiskCategory::Market, 0.5, -3.0, 2.0),
        ];
        let mut rng = StepRng::new(0, 0);
        let outcome = run_trial(&mut rng, 7, 1000.0, &factors);
        assert_eq!(outcome.trial_id, 7);
        assert_eq!(outcome.triggered.len(), 2);
        assert_eq!(outcome.total_impact_percent, -13.0);
        assert_relative_eq!(outcome.final_value, 870.0, epsilon = 1e-9);
    }

    #[test]
    fn test_high_draws_trigger_nothing() {
        let mut rng = StepRng::new(u64::MAX, 0);
        let outcome = run_trial(&mut rng, 0, 1000.0, &default_risk_factors());
        assert!(outcome.triggered.is_empty());
        assert_eq!(outcome.final_value, 1000.0);
    }

    #[test]
    fn test_final_value_floored_at_zero() {
        let factors = vec![
            RiskFactor::new("Wipeout", RiskCategory::Legal, 1.0, -100.0, -100.0),
            RiskFactor::new("More", RiskCategory::Legal, 1.0, -50.0, -50.0),
        ];
        let outcome = run_trial(&mut StepRng::new(0, 0), 0, 1000.0, &factors);
        assert_eq!(outcome.total_impact_percent, -150.0);
        assert_eq!(outcome.final_value, 0.0);
    }

    #[test]
    fn test_injected_rng_drives_whole_run() {
        let input = RiskSimulationInput {
            num_trials: 50,
            ..RiskSimulationInput::new(1000.0)
        };
        let out = run_risk_simulation_with_rng(&input, &Constant(0), &RunControl::new())
            .unwrap()
            .result;
        assert_eq!(out.seed, None);
        // All eight risks fire at their low impact in every trial
        let total_low: f64 = default_risk_factors().iter().map(|f| f.impact_low).sum();
        let expected = (1000.0 * (1.0 + total_low / 100.0)).max(0.0);
        assert_eq!(out.summary.min_value, expected);
        assert_eq!(out.summary.max_value, expected);
        assert_eq!(out.probabilities.prob_value_below_80, 1.0);
        assert!(out.top_risk_contributors.iter().all(|c| c.frequency == 1.0));
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let a = run_risk_simulation(&seeded_input(2_000)).unwrap().result;
        let b = run_risk_simulation(&seeded_input(2_000)).unwrap().result;
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.risk_metrics, b.risk_metrics);
        assert_eq!(a.worst_scenarios, b.worst_scenarios);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let parallel = run_risk_simulation(&seeded_input(3_000)).unwrap().result;
        let sequential = run_risk_simulation(&RiskSimulationInput {
            execution: ExecutionMode::Sequential,
            ..seeded_input(3_000)
        })
        .unwrap()
        .result;
        assert_eq!(parallel.summary, sequential.summary);
        assert_eq!(parallel.distribution, sequential.distribution);
        assert_eq!(parallel.top_risk_contributors, sequential.top_risk_contributors);
    }

    #[test]
    fn test_unseeded_run_reports_its_seed() {
        let input = RiskSimulationInput {
            num_trials: 500,
            ..RiskSimulationInput::new(1_000_000.0)
        };
        let first = run_risk_simulation(&input).unwrap().result;
        let seed = first.seed.unwrap();
        let replay = run_risk_simulation(&RiskSimulationInput {
            seed: Some(seed),
            ..input
        })
        .unwrap()
        .result;
        assert_eq!(first.summary, replay.summary);
    }

    #[test]
    fn test_var_ordering_and_histogram_total() {
        let out = run_risk_simulation(&seeded_input(5_000)).unwrap().result;
        let m = &out.risk_metrics;
        assert!(m.value_at_risk_99 <= m.value_at_risk_95);
        assert!(m.value_at_risk_95 <= out.summary.median_value);
        assert!(m.expected_shortfall <= m.value_at_risk_95);
        let total: u64 = out.distribution.iter().map(|b| b.count).sum();
        assert_eq!(total, 5_000);
        assert!(out.top_risk_contributors.len() <= 5);
        assert_eq!(out.worst_scenarios.len(), 5);
    }

    #[test]
    fn test_trial_count_clamped() {
        let result = run_risk_simulation(&RiskSimulationInput {
            risk_factors: vec![],
            ..seeded_input(60_000)
        })
        .unwrap();
        assert_eq!(result.result.trials_requested, 60_000);
        assert_eq!(result.result.trials_run, MAX_TRIALS);
        assert!(result.warnings.iter().any(|w| w.contains("clamped")));
    }

    #[test]
    fn test_zero_trials_rejected() {
        assert!(run_risk_simulation(&seeded_input(0)).is_err());
    }

    #[test]
    fn test_non_positive_base_rejected() {
        let input = RiskSimulationInput {
            base_deal_value: 0.0,
            ..seeded_input(10)
        };
        assert!(run_risk_simulation(&input).is_err());
    }

    #[test]
    fn test_cancel_flag_aborts_run() {
        let flag = Arc::new(AtomicBool::new(true));
        let control = RunControl::new().with_cancel_flag(flag);
        let err = run_risk_simulation_with(&seeded_input(1_000), &control).unwrap_err();
        assert!(matches!(err, DealModelError::Cancelled(_)));
    }

    #[test]
    fn test_expired_deadline_aborts_run() {
        let control = RunControl::new().with_deadline(Instant::now());
        let err = run_risk_simulation_with(&seeded_input(1_000), &control).unwrap_err();
        assert!(matches!(err, DealModelError::Cancelled(_)));
    }

    #[test]
    fn test_metadata_precision_field() {
        let result = run_risk_simulation(&seeded_input(100)).unwrap();
        assert_eq!(result.metadata.precision, "ieee754_f64");
    }
}
