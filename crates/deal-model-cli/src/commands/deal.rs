use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use deal_model_core::deal::{analyze_deal, DealAnalysisInput, ParameterOverrides};

use crate::input;

/// Arguments for deal returns analysis
#[derive(Args)]
pub struct DealArgs {
    /// Path to JSON or YAML input file (flags below are applied on top)
    #[arg(long)]
    pub input: Option<String>,

    /// Purchase price
    #[arg(long)]
    pub purchase_price: Option<Decimal>,

    /// Equity share of the purchase price, in percent (debt takes the rest)
    #[arg(long)]
    pub equity_pct: Option<Decimal>,

    /// Discount rate for NPV, in percent
    #[arg(long)]
    pub discount_rate: Option<Decimal>,
}

impl DealArgs {
    pub fn overrides(&self) -> ParameterOverrides {
        ParameterOverrides {
            purchase_price: self.purchase_price,
            equity_percentage: self.equity_pct,
            debt_percentage: self.equity_pct.map(|e| Decimal::ONE_HUNDRED - e),
            discount_rate: self.discount_rate,
            ..Default::default()
        }
    }
}

pub fn run_deal(args: DealArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut deal_input: DealAnalysisInput =
        input::load(args.input.as_deref())?.unwrap_or_default();

    let overrides = args.overrides();
    if !overrides.is_empty() {
        deal_input.parameters = deal_input.parameters.with_overrides(&overrides)?;
    }

    let result = analyze_deal(&deal_input)?;
    Ok(serde_json::to_value(result)?)
}
