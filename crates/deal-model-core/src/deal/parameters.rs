use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::error::DealModelError;
use crate::types::*;
use crate::DealModelResult;

/// Allowed drift between equity and debt percentages and 100.
const CAPITAL_STRUCTURE_TOLERANCE: Decimal = dec!(0.0001);

/// Raw deal assumptions as they arrive from callers.
///
/// Percent-denominated fields are percentage points (`discount_rate: 12`
/// means 12%). Omitted JSON fields take the defaults below. This type is not
/// validated; the engine only accepts a [`ParameterSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealAssumptions {
    pub purchase_price: Money,
    pub equity_percentage: Percent,
    pub debt_percentage: Percent,
    pub earnout_amount: Money,
    pub earnout_probability: Percent,
    pub synergies_year1: Money,
    pub synergies_year3: Money,
    pub integration_costs: Money,
    pub revenue_growth_rate: Percent,
    pub ebitda_margin: Percent,
    pub discount_rate: Percent,
    pub tax_rate: Percent,
}

impl Default for DealAssumptions {
    fn default() -> Self {
        Self {
            purchase_price: dec!(100000000),
            equity_percentage: dec!(40),
            debt_percentage: dec!(60),
            earnout_amount: dec!(10000000),
            earnout_probability: dec!(70),
            synergies_year1: dec!(2000000),
            synergies_year3: dec!(8000000),
            integration_costs: dec!(5000000),
            revenue_growth_rate: dec!(8),
            ebitda_margin: dec!(18),
            discount_rate: dec!(12),
            tax_rate: dec!(25),
        }
    }
}

/// Validated, immutable deal assumptions.
///
/// Read fields through `Deref` (`params.purchase_price`). Variants are
/// produced with [`ParameterSet::derive`] or [`ParameterSet::with_overrides`],
/// both of which re-run validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DealAssumptions", into = "DealAssumptions")]
pub struct ParameterSet(DealAssumptions);

impl ParameterSet {
    pub fn new(assumptions: DealAssumptions) -> DealModelResult<Self> {
        validate(&assumptions)?;
        Ok(Self(assumptions))
    }

    pub fn assumptions(&self) -> &DealAssumptions {
        &self.0
    }

    /// Copy the assumptions, apply `edit`, and validate the result.
    pub fn derive(&self, edit: impl FnOnce(&mut DealAssumptions)) -> DealModelResult<Self> {
        let mut assumptions = self.0.clone();
        edit(&mut assumptions);
        Self::new(assumptions)
    }

    pub fn with_overrides(&self, overrides: &ParameterOverrides) -> DealModelResult<Self> {
        self.derive(|a| overrides.apply(a))
    }

    /// Equity cheque written at close.
    pub fn equity_investment(&self) -> Money {
        self.0.purchase_price * pct_to_rate(self.0.equity_percentage)
    }

    /// Acquisition debt, serviced annually and repaid at exit.
    pub fn debt_amount(&self) -> Money {
        self.0.purchase_price * pct_to_rate(self.0.debt_percentage)
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self(DealAssumptions::default())
    }
}

impl Deref for ParameterSet {
    type Target = DealAssumptions;

    fn deref(&self) -> &DealAssumptions {
        &self.0
    }
}

impl TryFrom<DealAssumptions> for ParameterSet {
    type Error = DealModelError;

    fn try_from(assumptions: DealAssumptions) -> DealModelResult<Self> {
        Self::new(assumptions)
    }
}

impl From<ParameterSet> for DealAssumptions {
    fn from(params: ParameterSet) -> Self {
        params.0
    }
}

/// Partial replacement of deal assumptions. `None` keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity_percentage: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_percentage: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earnout_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earnout_probability: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synergies_year1: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synergies_year3: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration_costs: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_growth_rate: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ebitda_margin: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Percent>,
}

impl ParameterOverrides {
    fn apply(&self, a: &mut DealAssumptions) {
        let fields = [
            (self.purchase_price, &mut a.purchase_price),
            (self.equity_percentage, &mut a.equity_percentage),
            (self.debt_percentage, &mut a.debt_percentage),
            (self.earnout_amount, &mut a.earnout_amount),
            (self.earnout_probability, &mut a.earnout_probability),
            (self.synergies_year1, &mut a.synergies_year1),
            (self.synergies_year3, &mut a.synergies_year3),
            (self.integration_costs, &mut a.integration_costs),
            (self.revenue_growth_rate, &mut a.revenue_growth_rate),
            (self.ebitda_margin, &mut a.ebitda_margin),
            (self.discount_rate, &mut a.discount_rate),
            (self.tax_rate, &mut a.tax_rate),
        ];
        for (value, slot) in fields {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn check_percent(field: &str, value: Percent) -> DealModelResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(DealModelError::invalid(
            field,
            format!("Must be between 0 and 100 (got {value})"),
        ));
    }
    Ok(())
}

fn check_non_negative(field: &str, value: Money) -> DealModelResult<()> {
    if value < Decimal::ZERO {
        return Err(DealModelError::invalid(
            field,
            format!("Must be non-negative (got {value})"),
        ));
    }
    Ok(())
}

fn check_above_total_loss(field: &str, value: Percent) -> DealModelResult<()> {
    if value <= dec!(-100) {
        return Err(DealModelError::invalid(
            field,
            format!("Must be greater than -100% (got {value})"),
        ));
    }
    Ok(())
}

fn validate(a: &DealAssumptions) -> DealModelResult<()> {
    if a.purchase_price <= Decimal::ZERO {
        return Err(DealModelError::invalid(
            "purchase_price",
            "Purchase price must be positive",
        ));
    }

    check_percent("equity_percentage", a.equity_percentage)?;
    check_percent("debt_percentage", a.debt_percentage)?;
    check_percent("earnout_probability", a.earnout_probability)?;
    check_percent("tax_rate", a.tax_rate)?;

    let capital = a.equity_percentage + a.debt_percentage;
    if (capital - Decimal::ONE_HUNDRED).abs() > CAPITAL_STRUCTURE_TOLERANCE {
        return Err(DealModelError::invalid(
            "equity_percentage",
            format!("Equity and debt percentages must sum to 100 (got {capital})"),
        ));
    }

    check_non_negative("earnout_amount", a.earnout_amount)?;
    check_non_negative("synergies_year1", a.synergies_year1)?;
    check_non_negative("synergies_year3", a.synergies_year3)?;
    check_non_negative("integration_costs", a.integration_costs)?;

    check_above_total_loss("revenue_growth_rate", a.revenue_growth_rate)?;
    check_above_total_loss("discount_rate", a.discount_rate)?;

    if a.ebitda_margin < dec!(-100) || a.ebitda_margin > Decimal::ONE_HUNDRED {
        return Err(DealModelError::invalid(
            "ebitda_margin",
            format!("Must be between -100 and 100 (got {})", a.ebitda_margin),
        ));
    }

    Ok(())
}
