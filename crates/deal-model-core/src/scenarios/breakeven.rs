use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use super::variables::{DealVariable, Polarity};
use crate::deal::{DealCase, ParameterSet, ProjectionProfile};
use crate::types::*;
use crate::DealModelResult;

pub const BREAKEVEN_ITERATIONS: u32 = 20;
/// Accept a solved value once its IRR is this close to target, in percentage points.
pub const IRR_TOLERANCE_PCT: Decimal = dec!(0.1);
pub const DEFAULT_TARGET_IRR_PCT: Percent = dec!(15);

pub(crate) fn default_target_irr() -> Percent {
    DEFAULT_TARGET_IRR_PCT
}

/// A named breakeven question: what value of `variable` yields `target_irr_pct`?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakevenTarget {
    pub name: String,
    pub variable: DealVariable,
    pub target_irr_pct: Percent,
}

impl BreakevenTarget {
    /// Maximum price, required synergies and required exit multiple for `target_irr_pct`.
    pub fn standard_set(target_irr_pct: Percent) -> Vec<BreakevenTarget> {
        [
            ("max_purchase_price", DealVariable::PurchasePrice),
            ("required_synergies_year3", DealVariable::SynergiesYear3),
            ("required_exit_multiple", DealVariable::ExitMultiple),
        ]
        .into_iter()
        .map(|(name, variable)| BreakevenTarget {
            name: name.to_string(),
            variable,
            target_irr_pct,
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakevenResult {
    pub name: String,
    pub variable: DealVariable,
    pub label: String,
    pub target_irr_pct: Percent,
    pub solved_value: Decimal,
    pub achieved_irr_pct: Percent,
    /// Whether the IRR at `solved_value` came from a converged solve
    pub irr_converged: bool,
    pub iterations: u32,
    /// Whether the search range endpoints straddle the target IRR
    pub bracketed: bool,
    /// Direction the search assumed
    pub polarity: Polarity,
    /// False when the endpoint IRRs move against `polarity`
    pub polarity_consistent: bool,
    pub within_tolerance: bool,
    pub search_low: Decimal,
    pub search_high: Decimal,
}

struct Evaluation {
    value: Decimal,
    irr_pct: Percent,
    converged: bool,
}

fn evaluate_at(
    case: &DealCase,
    variable: DealVariable,
    value: Decimal,
) -> DealModelResult<Evaluation> {
    let moved = variable.descriptor().apply(case, value)?;
    let irr = moved.irr()?;
    Ok(Evaluation {
        value,
        irr_pct: irr.rate_pct(),
        converged: irr.converged,
    })
}

/// Bisect the variable's search range for the value whose IRR hits the target.
///
/// The search direction is the descriptor's declared polarity. If the IRRs at
/// the range endpoints move against it, the variable is not monotonic over
/// the range as declared: no search is run, `polarity_consistent` is false and
/// the endpoint closest to the target is returned. The same endpoint is
/// returned with `bracketed = false` when the endpoints do not straddle the
/// target.
pub fn find_breakeven(
    case: &DealCase,
    target: &BreakevenTarget,
) -> DealModelResult<BreakevenResult> {
    let descriptor = target.variable.descriptor();
    let (search_low, search_high) = descriptor.resolve(descriptor.search, case);
    let goal = target.target_irr_pct;

    let at_low = evaluate_at(case, target.variable, search_low)?;
    let at_high = evaluate_at(case, target.variable, search_high)?;

    let lowest = at_low.irr_pct.min(at_high.irr_pct);
    let highest = at_low.irr_pct.max(at_high.irr_pct);
    let bracketed = lowest - IRR_TOLERANCE_PCT <= goal && goal <= highest + IRR_TOLERANCE_PCT;

    let rising = descriptor.polarity == Polarity::Direct;
    let polarity_consistent = if rising {
        at_high.irr_pct >= at_low.irr_pct
    } else {
        at_high.irr_pct <= at_low.irr_pct
    };

    let (best, iterations) = if polarity_consistent && bracketed {
        let (mut lo, mut hi) = (search_low, search_high);
        let midpoint = |lo: Decimal, hi: Decimal| lo / dec!(2) + hi / dec!(2);
        let mut best = evaluate_at(case, target.variable, midpoint(lo, hi))?;
        let mut iterations = 1;

        while iterations < BREAKEVEN_ITERATIONS && (best.irr_pct - goal).abs() >= IRR_TOLERANCE_PCT
        {
            let move_up = if rising {
                best.irr_pct < goal
            } else {
                best.irr_pct > goal
            };
            if move_up {
                lo = best.value;
            } else {
                hi = best.value;
            }
            best = evaluate_at(case, target.variable, midpoint(lo, hi))?;
            iterations += 1;
        }
        (best, iterations)
    } else {
        if polarity_consistent {
            warn!(
                breakeven = %target.name,
                goal = %goal,
                "target IRR not reachable inside search range"
            );
        } else {
            warn!(
                breakeven = %target.name,
                polarity = ?descriptor.polarity,
                irr_at_low = %at_low.irr_pct,
                irr_at_high = %at_high.irr_pct,
                "IRR moves against declared polarity; search skipped"
            );
        }
        let nearest = if (at_low.irr_pct - goal).abs() <= (at_high.irr_pct - goal).abs() {
            at_low
        } else {
            at_high
        };
        (nearest, 0)
    };

    debug!(
        breakeven = %target.name,
        solved = %best.value,
        irr_pct = %best.irr_pct,
        iterations,
        "breakeven solved"
    );

    Ok(BreakevenResult {
        name: target.name.clone(),
        variable: target.variable,
        label: descriptor.label.to_string(),
        target_irr_pct: goal,
        solved_value: best.value,
        achieved_irr_pct: best.irr_pct,
        irr_converged: best.converged,
        iterations,
        bracketed,
        polarity: descriptor.polarity,
        polarity_consistent,
        within_tolerance: (best.irr_pct - goal).abs() < IRR_TOLERANCE_PCT,
        search_low,
        search_high,
    })
}

pub(crate) fn push_breakeven_warnings(result: &BreakevenResult, warnings: &mut Vec<String>) {
    if !result.polarity_consistent {
        let expected = match result.polarity {
            Polarity::Direct => "rise",
            Polarity::Inverse => "fall",
        };
        warnings.push(format!(
            "{}: IRR does not {expected} with {} over [{}, {}] as declared; breakeven search skipped and nearest endpoint returned",
            result.name,
            result.label,
            result.search_low.round_dp(2),
            result.search_high.round_dp(2),
        ));
    } else if !result.bracketed {
        warnings.push(format!(
            "{}: target IRR {}% lies outside the IRR range of the search interval [{}, {}]; nearest endpoint returned",
            result.name,
            result.target_irr_pct,
            result.search_low.round_dp(2),
            result.search_high.round_dp(2),
        ));
    } else if !result.within_tolerance {
        warnings.push(format!(
            "{}: search stopped {}pp from target after {} iterations",
            result.name,
            (result.achieved_irr_pct - result.target_irr_pct).abs().round_dp(4),
            result.iterations,
        ));
    }
    if !result.irr_converged {
        warnings.push(format!(
            "{}: IRR at the solved value did not converge",
            result.name
        ));
    }
}

/// Input for a standalone breakeven search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakevenInput {
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default = "ProjectionProfile::sensitivity")]
    pub profile: ProjectionProfile,
    pub variable: DealVariable,
    #[serde(default = "default_target_irr")]
    pub target_irr_pct: Percent,
}

/// Solve the value of one deal variable that produces the target IRR.
pub fn solve_breakeven(
    input: &BreakevenInput,
) -> DealModelResult<ComputationOutput<BreakevenResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let case = DealCase::new(input.parameters.clone(), input.profile)?;
    let target = BreakevenTarget {
        name: format!("{:?}", input.variable),
        variable: input.variable,
        target_irr_pct: input.target_irr_pct,
    };
    let result = find_breakeven(&case, &target)?;
    push_breakeven_warnings(&result, &mut warnings);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Breakeven Analysis: bisection on target IRR",
        &serde_json::json!({
            "variable": input.variable,
            "target_irr_pct": input.target_irr_pct.to_string(),
            "iterations": BREAKEVEN_ITERATIONS,
            "tolerance_pp": IRR_TOLERANCE_PCT.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}
