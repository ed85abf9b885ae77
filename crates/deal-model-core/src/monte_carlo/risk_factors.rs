use serde::{Deserialize, Serialize};

use crate::error::DealModelError;
use crate::DealModelResult;

/// Risk grouping. Accepts any text: the common categories are recognised
/// case-insensitively and anything else is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskCategory {
    Legal,
    Regulatory,
    Integration,
    Financial,
    Operational,
    Market,
    Reputation,
    /// No category supplied
    Unspecified,
    Other(String),
}

impl RiskCategory {
    pub fn as_str(&self) -> &str {
        match self {
            RiskCategory::Legal => "Legal",
            RiskCategory::Regulatory => "Regulatory",
            RiskCategory::Integration => "Integration",
            RiskCategory::Financial => "Financial",
            RiskCategory::Operational => "Operational",
            RiskCategory::Market => "Market",
            RiskCategory::Reputation => "Reputation",
            RiskCategory::Unspecified => "Unspecified",
            RiskCategory::Other(text) => text,
        }
    }
}

impl From<String> for RiskCategory {
    fn from(text: String) -> Self {
        let key = text.trim().to_ascii_lowercase();
        match key.as_str() {
            "legal" => RiskCategory::Legal,
            "regulatory" => RiskCategory::Regulatory,
            "integration" => RiskCategory::Integration,
            "financial" => RiskCategory::Financial,
            "operational" => RiskCategory::Operational,
            "market" => RiskCategory::Market,
            "reputation" | "reputational" => RiskCategory::Reputation,
            "" | "unspecified" => RiskCategory::Unspecified,
            _ => RiskCategory::Other(text),
        }
    }
}

impl From<&str> for RiskCategory {
    fn from(text: &str) -> Self {
        RiskCategory::from(text.to_string())
    }
}

impl From<RiskCategory> for String {
    fn from(category: RiskCategory) -> Self {
        category.as_str().to_string()
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An independent event that may move the deal value when it triggers.
///
/// `impact_low`/`impact_high` are percentage changes to the base deal value
/// (negative for losses). A triggered risk draws its impact uniformly from
/// that interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: RiskCategory,
    /// Trigger probability in [0, 1]
    pub probability: f64,
    pub impact_low: f64,
    pub impact_high: f64,
}

fn default_category() -> RiskCategory {
    RiskCategory::Unspecified
}

impl RiskFactor {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<RiskCategory>,
        probability: f64,
        impact_low: f64,
        impact_high: f64,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            probability,
            impact_low,
            impact_high,
        }
    }

    pub fn impact_midpoint(&self) -> f64 {
        (self.impact_low + self.impact_high) / 2.0
    }

    /// Impact at fraction `t` of the way from `impact_low` to `impact_high`.
    pub fn interpolate(&self, t: f64) -> f64 {
        self.impact_low + (self.impact_high - self.impact_low) * t
    }

    pub fn validate(&self, index: usize) -> DealModelResult<()> {
        let field = |name: &str| format!("risk_factors[{index}].{name}");

        if self.name.trim().is_empty() {
            return Err(DealModelError::invalid(field("name"), "Name must not be empty"));
        }
        if !self.probability.is_finite() || !(0.0..=1.0).contains(&self.probability) {
            return Err(DealModelError::invalid(
                field("probability"),
                format!("Probability must be in [0, 1], got {}", self.probability),
            ));
        }
        if !self.impact_low.is_finite() || !self.impact_high.is_finite() {
            return Err(DealModelError::invalid(
                field("impact_low"),
                "Impact bounds must be finite",
            ));
        }
        if self.impact_low > self.impact_high {
            return Err(DealModelError::invalid(
                field("impact_low"),
                format!(
                    "impact_low ({}) must not exceed impact_high ({})",
                    self.impact_low, self.impact_high
                ),
            ));
        }
        Ok(())
    }
}

/// Typical M&A deal risks, used when a request supplies none.
pub fn default_risk_factors() -> Vec<RiskFactor> {
    use RiskCategory::*;
    vec![
        RiskFactor::new("Pending litigation exposure", Legal, 0.25, -15.0, -5.0),
        RiskFactor::new("Regulatory approval delay", Regulatory, 0.30, -10.0, -3.0),
        RiskFactor::new("Antitrust block", Regulatory, 0.08, -100.0, -60.0),
        RiskFactor::new("Key customer attrition", Operational, 0.35, -12.0, -4.0),
        RiskFactor::new("Integration cost overrun", Integration, 0.45, -8.0, -2.0),
        RiskFactor::new("Undisclosed liabilities", Financial, 0.15, -20.0, -8.0),
        RiskFactor::new("Market downturn", Market, 0.20, -25.0, -10.0),
        RiskFactor::new("Key talent departure", Operational, 0.30, -7.0, -2.0),
    ]
}
