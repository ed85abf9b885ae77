use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::breakeven::{
    default_target_irr, find_breakeven, push_breakeven_warnings, BreakevenResult, BreakevenTarget,
};
use super::variables::DealVariable;
use crate::deal::{DealCase, ParameterSet, ProjectionProfile};
use crate::time_value::IrrSolution;
use crate::types::*;
use crate::DealModelResult;

fn default_variables() -> Vec<DealVariable> {
    DealVariable::ALL.to_vec()
}

/// Input for one-at-a-time sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default = "ProjectionProfile::sensitivity")]
    pub profile: ProjectionProfile,
    /// Variables to perturb, in table order (all nine by default)
    #[serde(default = "default_variables")]
    pub variables: Vec<DealVariable>,
    /// Hurdle for the breakeven targets
    #[serde(default = "default_target_irr")]
    pub target_irr_pct: Percent,
    /// Breakeven questions to answer; the standard three when absent
    #[serde(default)]
    pub breakeven_targets: Option<Vec<BreakevenTarget>>,
}

impl Default for SensitivityInput {
    fn default() -> Self {
        Self {
            parameters: ParameterSet::default(),
            profile: ProjectionProfile::SENSITIVITY,
            variables: default_variables(),
            target_irr_pct: default_target_irr(),
            breakeven_targets: None,
        }
    }
}

/// One tornado bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub variable: DealVariable,
    pub label: String,
    pub base_value: Decimal,
    pub low_value: Decimal,
    pub high_value: Decimal,
    pub base_irr_pct: Percent,
    pub low_irr_pct: Percent,
    pub high_irr_pct: Percent,
    /// |high IRR - low IRR| in percentage points
    pub irr_swing_pct: Percent,
    /// min(low IRR, high IRR) - base IRR
    pub downside_delta_pct: Percent,
    /// max(low IRR, high IRR) - base IRR
    pub upside_delta_pct: Percent,
    /// 1 = widest swing
    pub rank: usize,
    /// Whether both perturbed IRRs converged
    pub converged: bool,
}

/// Output of sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub base_irr: IrrSolution,
    pub base_irr_pct: Percent,
    /// Sorted by rank
    pub tornado_chart_data: Vec<SensitivityResult>,
    pub breakeven_analysis: Vec<BreakevenResult>,
}

fn tornado_bar(
    case: &DealCase,
    base_irr_pct: Percent,
    variable: DealVariable,
) -> DealModelResult<SensitivityResult> {
    let descriptor = variable.descriptor();
    let base_value = descriptor.read(case);
    let (low_value, high_value) = descriptor.resolve(descriptor.sensitivity, case);

    let low_irr = descriptor.apply(case, low_value)?.irr()?;
    let high_irr = descriptor.apply(case, high_value)?.irr()?;
    let low_irr_pct = low_irr.rate_pct();
    let high_irr_pct = high_irr.rate_pct();

    Ok(SensitivityResult {
        variable,
        label: descriptor.label.to_string(),
        base_value,
        low_value,
        high_value,
        base_irr_pct,
        low_irr_pct,
        high_irr_pct,
        irr_swing_pct: (high_irr_pct - low_irr_pct).abs(),
        downside_delta_pct: low_irr_pct.min(high_irr_pct) - base_irr_pct,
        upside_delta_pct: low_irr_pct.max(high_irr_pct) - base_irr_pct,
        rank: 0,
        converged: low_irr.converged && high_irr.converged,
    })
}

/// Perturb each variable to its low and high value with everything else at
/// base, rank the IRR swings, then solve the breakeven targets.
pub fn analyze_sensitivity(
    input: &SensitivityInput,
) -> DealModelResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let case = DealCase::new(input.parameters.clone(), input.profile)?;
    let base_irr = case.irr()?;
    let base_irr_pct = base_irr.rate_pct();
    if !base_irr.converged {
        warnings.push(format!(
            "Base case IRR did not converge; {}% is an estimate",
            base_irr_pct.round_dp(4)
        ));
    }

    let mut tornado = Vec::with_capacity(input.variables.len());
    for &variable in &input.variables {
        let bar = tornado_bar(&case, base_irr_pct, variable)?;
        if !bar.converged {
            warnings.push(format!(
                "{}: IRR did not converge at one end of the range",
                bar.label
            ));
        }
        tornado.push(bar);
    }

    // Stable sort keeps table order among equal swings
    tornado.sort_by(|a, b| b.irr_swing_pct.cmp(&a.irr_swing_pct));
    for (i, bar) in tornado.iter_mut().enumerate() {
        bar.rank = i + 1;
    }

    let targets = input
        .breakeven_targets
        .clone()
        .unwrap_or_else(|| BreakevenTarget::standard_set(input.target_irr_pct));
    let mut breakeven_analysis = Vec::with_capacity(targets.len());
    for target in &targets {
        let result = find_breakeven(&case, target)?;
        push_breakeven_warnings(&result, &mut warnings);
        breakeven_analysis.push(result);
    }

    debug!(
        base_irr_pct = %base_irr_pct,
        variables = tornado.len(),
        top = tornado.first().map(|t| t.label.as_str()).unwrap_or("-"),
        "sensitivity analysis complete"
    );

    let output = SensitivityOutput {
        base_irr,
        base_irr_pct,
        tornado_chart_data: tornado,
        breakeven_analysis,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "One-at-a-time IRR sensitivity (tornado) with bisection breakevens",
        &serde_json::json!({
            "base_ebitda_ratio": input.profile.base_ebitda_ratio.to_string(),
            "exit_multiple": input.profile.exit_multiple.to_string(),
            "target_irr_pct": input.target_irr_pct.to_string(),
            "variables": input.variables,
        }),
        warnings,
        elapsed,
        output,
    ))
}
