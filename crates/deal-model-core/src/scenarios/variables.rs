//! Descriptor table for the deal variables that sensitivity and breakeven
//! analysis can move.
//!
//! Each descriptor carries the variable's tornado range, its breakeven
//! search range, the direction in which it moves IRR and the functions that
//! read it from and write it into a [`DealCase`]. Analyses dispatch on
//! [`DealVariable`], never on display labels.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::deal::DealCase;
use crate::DealModelResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealVariable {
    PurchasePrice,
    EquityPercentage,
    SynergiesYear3,
    RevenueGrowthRate,
    EbitdaMargin,
    IntegrationCosts,
    EarnoutProbability,
    TaxRate,
    ExitMultiple,
}

/// How IRR responds when the variable increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Higher value, higher IRR.
    Direct,
    /// Higher value, lower IRR.
    Inverse,
}

/// Low/high bounds relative to the base case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bounds {
    /// `base * low` to `base * high`
    Scaled { low: Decimal, high: Decimal },
    /// `base - down` to `base + up`
    Shifted { down: Decimal, up: Decimal },
    /// Absolute values, independent of the base case
    Fixed { low: Decimal, high: Decimal },
    /// Fractions of the deal's purchase price
    ShareOfPrice { low: Decimal, high: Decimal },
}

pub struct VariableDescriptor {
    pub variable: DealVariable,
    pub label: &'static str,
    /// Tornado low/high range
    pub sensitivity: Bounds,
    /// Breakeven search interval
    pub search: Bounds,
    pub polarity: Polarity,
    /// Values outside this interval are invalid for the variable.
    pub domain: (Decimal, Decimal),
    read: fn(&DealCase) -> Decimal,
    apply: fn(&DealCase, Decimal) -> DealModelResult<DealCase>,
}

impl VariableDescriptor {
    pub fn read(&self, case: &DealCase) -> Decimal {
        (self.read)(case)
    }

    /// A copy of `case` with this variable set to `value`, re-validated.
    pub fn apply(&self, case: &DealCase, value: Decimal) -> DealModelResult<DealCase> {
        (self.apply)(case, value)
    }

    /// Resolve `bounds` against `case` as an ordered `(low, high)` pair,
    /// clamped to the variable's domain.
    pub fn resolve(&self, bounds: Bounds, case: &DealCase) -> (Decimal, Decimal) {
        let base = self.read(case);
        let (a, b) = match bounds {
            Bounds::Scaled { low, high } => (base.saturating_mul(low), base.saturating_mul(high)),
            Bounds::Shifted { down, up } => (base.saturating_sub(down), base.saturating_add(up)),
            Bounds::Fixed { low, high } => (low, high),
            Bounds::ShareOfPrice { low, high } => {
                let price = case.parameters.purchase_price;
                (price.saturating_mul(low), price.saturating_mul(high))
            }
        };
        // Scaling a negative base flips the pair
        let (low, high) = (a.min(b), a.max(b));
        let (min, max) = self.domain;
        (low.clamp(min, max), high.clamp(min, max))
    }
}

const PERCENT_DOMAIN: (Decimal, Decimal) = (Decimal::ZERO, Decimal::ONE_HUNDRED);
const NON_NEGATIVE: (Decimal, Decimal) = (Decimal::ZERO, Decimal::MAX);

static PURCHASE_PRICE: VariableDescriptor = VariableDescriptor {
    variable: DealVariable::PurchasePrice,
    label: "Purchase Price",
    sensitivity: Bounds::Scaled {
        low: dec!(0.8),
        high: dec!(1.2),
    },
    search: Bounds::Scaled {
        low: dec!(0.5),
        high: dec!(2.0),
    },
    polarity: Polarity::Inverse,
    domain: (dec!(0.01), Decimal::MAX),
    read: |case| case.parameters.purchase_price,
    apply: |case, v| case.with_parameters(|a| a.purchase_price = v),
};

static EQUITY_PERCENTAGE: VariableDescriptor = VariableDescriptor {
    variable: DealVariable::EquityPercentage,
    label: "Equity %",
    sensitivity: Bounds::Fixed {
        low: dec!(20),
        high: dec!(80),
    },
    // Thin equity cheques make IRR erratic, so the search starts at 20%
    search: Bounds::Fixed {
        low: dec!(20),
        high: Decimal::ONE_HUNDRED,
    },
    // Debt costs 6%; unless the deal out-earns that, more equity lifts IRR
    polarity: Polarity::Direct,
    domain: PERCENT_DOMAIN,
    read: |case| case.parameters.equity_percentage,
    // Debt takes the complement so the capital structure still sums to 100
    apply: |case, v| {
        case.with_parameters(|a| {
            a.equity_percentage = v;
            a.debt_percentage = Decimal::ONE_HUNDRED - v;
        })
    },
};

static SYNERGIES_YEAR3: VariableDescriptor = VariableDescriptor {
    variable: DealVariable::SynergiesYear3,
    label: "Year-3 Synergies",
    sensitivity: Bounds::Scaled {
        low: dec!(0.5),
        high: dec!(1.5),
    },
    search: Bounds::ShareOfPrice {
        low: Decimal::ZERO,
        high: dec!(0.5),
    },
    polarity: Polarity::Direct,
    domain: NON_NEGATIVE,
    read: |case| case.parameters.synergies_year3,
    apply: |case, v| case.with_parameters(|a| a.synergies_year3 = v),
};

static REVENUE_GROWTH_RATE: VariableDescriptor = VariableDescriptor {
    variable: DealVariable::RevenueGrowthRate,
    label: "Revenue Growth",
    sensitivity: Bounds::Scaled {
        low: dec!(0.5),
        high: dec!(1.5),
    },
    search: Bounds::Fixed {
        low: dec!(-20),
        high: dec!(50),
    },
    polarity: Polarity::Direct,
    domain: (dec!(-99), Decimal::MAX),
    read: |case| case.parameters.revenue_growth_rate,
    apply: |case, v| case.with_parameters(|a| a.revenue_growth_rate = v),
};

static EBITDA_MARGIN: VariableDescriptor = VariableDescriptor {
    variable: DealVariable::EbitdaMargin,
    label: "EBITDA Margin",
    sensitivity: Bounds::Scaled {
        low: dec!(0.8),
        high: dec!(1.2),
    },
    search: Bounds::Fixed {
        low: Decimal::ZERO,
        high: Decimal::ONE_HUNDRED,
    },
    polarity: Polarity::Direct,
    domain: (dec!(-100), Decimal::ONE_HUNDRED),
    read: |case| case.parameters.ebitda_margin,
    apply: |case, v| case.with_parameters(|a| a.ebitda_margin = v),
};

static INTEGRATION_COSTS: VariableDescriptor = VariableDescriptor {
    variable: DealVariable::IntegrationCosts,
    label: "Integration Costs",
    sensitivity: Bounds::Scaled {
        low: dec!(0.5),
        high: dec!(1.5),
    },
    search: Bounds::ShareOfPrice {
        low: Decimal::ZERO,
        high: dec!(0.5),
    },
    polarity: Polarity::Inverse,
    domain: NON_NEGATIVE,
    read: |case| case.parameters.integration_costs,
    apply: |case, v| case.with_parameters(|a| a.integration_costs = v),
};

static EARNOUT_PROBABILITY: VariableDescriptor = VariableDescriptor {
    variable: DealVariable::EarnoutProbability,
    label: "Earnout Probability",
    sensitivity: Bounds::Fixed {
        low: Decimal::ZERO,
        high: Decimal::ONE_HUNDRED,
    },
    search: Bounds::Fixed {
        low: Decimal::ZERO,
        high: Decimal::ONE_HUNDRED,
    },
    polarity: Polarity::Direct,
    domain: PERCENT_DOMAIN,
    read: |case| case.parameters.earnout_probability,
    apply: |case, v| case.with_parameters(|a| a.earnout_probability = v),
};

static TAX_RATE: VariableDescriptor = VariableDescriptor {
    variable: DealVariable::TaxRate,
    label: "Tax Rate",
    sensitivity: Bounds::Scaled {
        low: dec!(0.8),
        high: dec!(1.2),
    },
    search: Bounds::Fixed {
        low: Decimal::ZERO,
        high: Decimal::ONE_HUNDRED,
    },
    polarity: Polarity::Inverse,
    domain: PERCENT_DOMAIN,
    read: |case| case.parameters.tax_rate,
    apply: |case, v| case.with_parameters(|a| a.tax_rate = v),
};

static EXIT_MULTIPLE: VariableDescriptor = VariableDescriptor {
    variable: DealVariable::ExitMultiple,
    label: "Exit Multiple",
    sensitivity: Bounds::Shifted {
        down: Decimal::ONE,
        up: Decimal::ONE,
    },
    search: Bounds::Fixed {
        low: Decimal::ZERO,
        high: dec!(20),
    },
    polarity: Polarity::Direct,
    domain: NON_NEGATIVE,
    read: |case| case.profile.exit_multiple,
    apply: |case, v| {
        let mut profile = case.profile;
        profile.exit_multiple = v;
        case.with_profile(profile)
    },
};

impl DealVariable {
    /// Every variable, in tornado table order.
    pub const ALL: [DealVariable; 9] = [
        DealVariable::PurchasePrice,
        DealVariable::EquityPercentage,
        DealVariable::SynergiesYear3,
        DealVariable::RevenueGrowthRate,
        DealVariable::EbitdaMargin,
        DealVariable::IntegrationCosts,
        DealVariable::EarnoutProbability,
        DealVariable::TaxRate,
        DealVariable::ExitMultiple,
    ];

    pub fn descriptor(self) -> &'static VariableDescriptor {
        match self {
            DealVariable::PurchasePrice => &PURCHASE_PRICE,
            DealVariable::EquityPercentage => &EQUITY_PERCENTAGE,
            DealVariable::SynergiesYear3 => &SYNERGIES_YEAR3,
            DealVariable::RevenueGrowthRate => &REVENUE_GROWTH_RATE,
            DealVariable::EbitdaMargin => &EBITDA_MARGIN,
            DealVariable::IntegrationCosts => &INTEGRATION_COSTS,
            DealVariable::EarnoutProbability => &EARNOUT_PROBABILITY,
            DealVariable::TaxRate => &TAX_RATE,
            DealVariable::ExitMultiple => &EXIT_MULTIPLE,
        }
    }

    pub fn label(self) -> &'static str {
        self.descriptor().label
    }

    pub fn polarity(self) -> Polarity {
        self.descriptor().polarity
    }
}
