use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use deal_model_core::scenarios::{
    analyze_sensitivity, run_scenarios, solve_breakeven, BreakevenInput, DealVariable,
    ScenarioInput, SensitivityInput,
};

use crate::input;

/// Parse a variable name such as `purchase_price` or `exit_multiple`.
fn parse_variable(name: &str) -> Result<DealVariable, String> {
    serde_json::from_value(Value::String(name.to_string())).map_err(|_| {
        let known: Vec<String> = DealVariable::ALL
            .iter()
            .filter_map(|v| serde_json::to_value(v).ok())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        format!("unknown variable '{name}' (expected one of: {})", known.join(", "))
    })
}

/// Arguments for scenario analysis
#[derive(Args)]
pub struct ScenariosArgs {
    /// Path to JSON or YAML input file (base parameters and scenario list)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_scenarios_cmd(args: ScenariosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario_input: ScenarioInput = input::load(args.input.as_deref())?.unwrap_or_default();
    let result = run_scenarios(&scenario_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for tornado sensitivity analysis
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Target IRR for the breakeven section, in percent
    #[arg(long)]
    pub target_irr: Option<Decimal>,

    /// Restrict the tornado to these variables (comma-separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_variable)]
    pub variable: Option<Vec<DealVariable>>,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut sens_input: SensitivityInput =
        input::load(args.input.as_deref())?.unwrap_or_default();

    if let Some(target) = args.target_irr {
        sens_input.target_irr_pct = target;
    }
    if let Some(variables) = args.variable {
        sens_input.variables = variables;
    }

    let result = analyze_sensitivity(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a single breakeven search
#[derive(Args)]
pub struct BreakevenArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Variable to solve for
    #[arg(long, value_parser = parse_variable)]
    pub variable: Option<DealVariable>,

    /// Target IRR, in percent
    #[arg(long)]
    pub target_irr: Option<Decimal>,
}

pub fn run_breakeven(args: BreakevenArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded: Option<BreakevenInput> = input::load(args.input.as_deref())?;
    let breakeven_input = match loaded {
        Some(mut loaded) => {
            if let Some(variable) = args.variable {
                loaded.variable = variable;
            }
            if let Some(target) = args.target_irr {
                loaded.target_irr_pct = target;
            }
            loaded
        }
        None => {
            let variable = args
                .variable
                .ok_or("--variable is required (or provide --input)")?;
            let mut built: BreakevenInput =
                serde_json::from_value(serde_json::json!({ "variable": variable }))?;
            if let Some(target) = args.target_irr {
                built.target_irr_pct = target;
            }
            built
        }
    };

    let result = solve_breakeven(&breakeven_input)?;
    Ok(serde_json::to_value(result)?)
}
