use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::parameters::ParameterSet;
use crate::error::DealModelError;
use crate::time_value::{self, IrrSolution, DEFAULT_IRR_GUESS};
use crate::types::*;
use crate::DealModelResult;

/// Projection horizon in years. The schedule holds `HORIZON_YEARS + 1` flows.
pub const HORIZON_YEARS: u32 = 7;
/// Assumed annual interest on acquisition debt.
pub const DEBT_INTEREST_RATE: Rate = dec!(0.06);
/// Year in which the probability-weighted earnout is received.
pub const EARNOUT_YEAR: u32 = 2;
/// Synergies ramp linearly from the year-1 level to full run-rate by this year.
pub const SYNERGY_RAMP_YEARS: u32 = 3;

const SCHEDULE_LEN: usize = HORIZON_YEARS as usize + 1;

/// Operating assumptions that differ between analyses.
///
/// Deal returns and scenarios use [`ProjectionProfile::DEAL_RETURNS`];
/// sensitivity and breakeven use [`ProjectionProfile::SENSITIVITY`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionProfile {
    /// Base EBITDA as a fraction of purchase price.
    pub base_ebitda_ratio: Rate,
    /// Exit multiple applied to terminal EBITDA plus synergies.
    pub exit_multiple: Multiple,
}

impl ProjectionProfile {
    pub const DEAL_RETURNS: Self = Self {
        base_ebitda_ratio: dec!(0.15),
        exit_multiple: dec!(5),
    };

    pub const SENSITIVITY: Self = Self {
        base_ebitda_ratio: dec!(0.12),
        exit_multiple: dec!(6),
    };

    /// Serde default helper.
    pub fn deal_returns() -> Self {
        Self::DEAL_RETURNS
    }

    /// Serde default helper.
    pub fn sensitivity() -> Self {
        Self::SENSITIVITY
    }

    pub fn validate(&self) -> DealModelResult<()> {
        if self.base_ebitda_ratio <= Decimal::ZERO {
            return Err(DealModelError::invalid(
                "base_ebitda_ratio",
                "Base EBITDA ratio must be positive",
            ));
        }
        if self.exit_multiple < Decimal::ZERO {
            return Err(DealModelError::invalid(
                "exit_multiple",
                "Exit multiple must be non-negative",
            ));
        }
        Ok(())
    }
}

/// One projected year, kept for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionYear {
    pub year: u32,
    pub revenue_multiplier: Decimal,
    pub ebitda: Money,
    pub synergies: Money,
    pub debt_service: Money,
    pub free_cash_flow: Money,
    pub earnout: Money,
    pub terminal_value: Money,
    pub net_cash_flow: Money,
}

/// Year 0 through year 7 cash flows to equity.
///
/// Year 0 is the (negative) equity cheque plus integration costs; the last
/// year includes the terminal value net of debt repayment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowSchedule {
    flows: [Money; SCHEDULE_LEN],
    equity_investment: Money,
    years: Vec<ProjectionYear>,
}

impl CashFlowSchedule {
    pub fn flows(&self) -> &[Money] {
        &self.flows
    }

    pub fn equity_investment(&self) -> Money {
        self.equity_investment
    }

    pub fn years(&self) -> &[ProjectionYear] {
        &self.years
    }

    /// First year whose cumulative cash flow (year 0 included) is >= 0.
    pub fn payback_year(&self) -> Option<u32> {
        let mut cumulative = Decimal::ZERO;
        for (year, cf) in self.flows.iter().enumerate() {
            cumulative += cf;
            if cumulative >= Decimal::ZERO {
                return Some(year as u32);
            }
        }
        None
    }

    /// First year whose cumulative distributions (years 1..=y) recover the
    /// equity investment.
    pub fn break_even_year(&self) -> Option<u32> {
        let mut distributed = Decimal::ZERO;
        for (year, cf) in self.flows.iter().enumerate().skip(1) {
            distributed += cf;
            if distributed >= self.equity_investment {
                return Some(year as u32);
            }
        }
        None
    }
}

fn overflow(item: &str, year: u32) -> DealModelError {
    DealModelError::invalid(
        "parameters",
        format!("{item} overflows decimal range in year {year}; assumptions are out of scale"),
    )
}

/// Build the 7-year cash-flow schedule for a deal.
///
/// Every step uses checked arithmetic. Assumptions large enough to overflow
/// the 96-bit mantissa, or to leave the schedule's cumulative sums without
/// headroom, are rejected as `InvalidInput`.
pub fn project_cash_flows(
    params: &ParameterSet,
    profile: &ProjectionProfile,
) -> DealModelResult<CashFlowSchedule> {
    let equity_investment = params.equity_investment();
    let debt = params.debt_amount();

    let base_ebitda = params
        .purchase_price
        .checked_mul(profile.base_ebitda_ratio)
        .ok_or_else(|| overflow("base EBITDA", 0))?;
    let growth = Decimal::ONE + pct_to_rate(params.revenue_growth_rate);
    let margin = pct_to_rate(params.ebitda_margin);
    let after_tax = Decimal::ONE - pct_to_rate(params.tax_rate);
    let debt_service = debt * DEBT_INTEREST_RATE;
    let expected_earnout = params.earnout_amount * pct_to_rate(params.earnout_probability);
    let ramp_years = Decimal::from(SYNERGY_RAMP_YEARS);

    let mut flows = [Decimal::ZERO; SCHEDULE_LEN];
    flows[0] = -equity_investment
        .checked_add(params.integration_costs)
        .ok_or_else(|| overflow("initial outlay", 0))?;

    let mut years = Vec::with_capacity(HORIZON_YEARS as usize);
    let mut revenue_multiplier = Decimal::ONE;

    for year in 1..=HORIZON_YEARS {
        revenue_multiplier = revenue_multiplier
            .checked_mul(growth)
            .ok_or_else(|| overflow("revenue multiplier", year))?;
        let ebitda = base_ebitda
            .checked_mul(revenue_multiplier)
            .and_then(|v| v.checked_mul(margin))
            .ok_or_else(|| overflow("EBITDA", year))?;

        let ramp = (Decimal::from(year) / ramp_years).min(Decimal::ONE);
        let synergies = (params.synergies_year3 - params.synergies_year1)
            .checked_mul(ramp)
            .and_then(|v| v.checked_add(params.synergies_year1))
            .ok_or_else(|| overflow("synergies", year))?;
        let operating = ebitda
            .checked_add(synergies)
            .ok_or_else(|| overflow("operating cash flow", year))?;

        let free_cash_flow = operating
            .checked_sub(debt_service)
            .and_then(|v| v.checked_mul(after_tax))
            .ok_or_else(|| overflow("free cash flow", year))?;

        let earnout = if year == EARNOUT_YEAR {
            expected_earnout
        } else {
            Decimal::ZERO
        };

        // Exit at the horizon: sell on a multiple and repay the acquisition debt
        let terminal_value = if year == HORIZON_YEARS {
            operating
                .checked_mul(profile.exit_multiple)
                .and_then(|v| v.checked_sub(debt))
                .ok_or_else(|| overflow("terminal value", year))?
        } else {
            Decimal::ZERO
        };

        let net_cash_flow = free_cash_flow
            .checked_add(earnout)
            .and_then(|v| v.checked_add(terminal_value))
            .ok_or_else(|| overflow("net cash flow", year))?;
        flows[year as usize] = net_cash_flow;

        years.push(ProjectionYear {
            year,
            revenue_multiplier,
            ebitda,
            synergies,
            debt_service,
            free_cash_flow,
            earnout,
            terminal_value,
            net_cash_flow,
        });
    }

    // Cumulative sums downstream (payback, MOIC, NPV deviations) stay in range
    flows
        .iter()
        .try_fold(Decimal::ZERO, |acc, cf| {
            acc.checked_add(cf.abs().checked_mul(dec!(4))?)
        })
        .ok_or_else(|| overflow("cumulative cash flow", HORIZON_YEARS))?;

    Ok(CashFlowSchedule {
        flows,
        equity_investment,
        years,
    })
}

/// A parameter set paired with the projection profile it is evaluated under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealCase {
    pub parameters: ParameterSet,
    pub profile: ProjectionProfile,
}

impl DealCase {
    pub fn new(parameters: ParameterSet, profile: ProjectionProfile) -> DealModelResult<Self> {
        profile.validate()?;
        Ok(Self {
            parameters,
            profile,
        })
    }

    pub fn project(&self) -> DealModelResult<CashFlowSchedule> {
        project_cash_flows(&self.parameters, &self.profile)
    }

    /// Project and solve IRR in one step.
    pub fn irr(&self) -> DealModelResult<IrrSolution> {
        time_value::solve_irr(self.project()?.flows(), DEFAULT_IRR_GUESS)
    }

    pub fn with_parameters(
        &self,
        edit: impl FnOnce(&mut super::parameters::DealAssumptions),
    ) -> DealModelResult<Self> {
        Ok(Self {
            parameters: self.parameters.derive(edit)?,
            profile: self.profile,
        })
    }

    pub fn with_profile(&self, profile: ProjectionProfile) -> DealModelResult<Self> {
        Self::new(self.parameters.clone(), profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn default_schedule() -> CashFlowSchedule {
        project_cash_flows(&ParameterSet::default(), &ProjectionProfile::DEAL_RETURNS).unwrap()
    }

    #[test]
    fn test_schedule_has_eight_flows() {
        assert_eq!(default_schedule().flows().len(), 8);
        assert_eq!(default_schedule().years().len(), 7);
    }

    #[test]
    fn test_year_zero_is_equity_plus_integration() {
        let schedule = default_schedule();
        // 40% of 100m plus 5m integration
        assert_eq!(schedule.flows()[0], dec!(-45000000));
        assert_eq!(schedule.equity_investment(), dec!(40000000));
    }

    #[test]
    fn test_year_one_cash_flow() {
        let schedule = default_schedule();
        let y1 = &schedule.years()[0];
        // EBITDA = 15m * 1.08 * 0.18 = 2.916m
        assert_eq!(y1.ebitda, dec!(2916000));
        // Synergies = 2m + 6m * 1/3 = 4m
        assert!((y1.synergies - dec!(4000000)).abs() < dec!(0.01));
        // Debt service = 60m * 6%
        assert_eq!(y1.debt_service, dec!(3600000));
        // FCF = (2.916m + 4m - 3.6m) * 0.75 = 2.487m
        assert!((y1.free_cash_flow - dec!(2487000)).abs() < dec!(0.01));
        assert_eq!(y1.earnout, Decimal::ZERO);
    }

    #[test]
    fn test_earnout_only_in_year_two() {
        let schedule = default_schedule();
        for y in schedule.years() {
            if y.year == EARNOUT_YEAR {
                // 10m * 70%
                assert_eq!(y.earnout, dec!(7000000));
            } else {
                assert_eq!(y.earnout, Decimal::ZERO);
            }
        }
    }

    #[test]
    fn test_synergies_reach_full_run_rate_by_year_three() {
        let schedule = default_schedule();
        for y in schedule.years().iter().skip(2) {
            assert_eq!(y.synergies, dec!(8000000));
        }
    }

    #[test]
    fn test_terminal_value_in_final_year_only() {
        let schedule = default_schedule();
        let last = schedule.years().last().unwrap();
        let expected = (last.ebitda + last.synergies) * dec!(5) - dec!(60000000);
        assert_eq!(last.terminal_value, expected);
        assert!(schedule.years()[..6]
            .iter()
            .all(|y| y.terminal_value.is_zero()));
    }

    #[test]
    fn test_sensitivity_profile_lowers_base_ebitda() {
        let params = ParameterSet::default();
        let deal = project_cash_flows(&params, &ProjectionProfile::DEAL_RETURNS).unwrap();
        let sens = project_cash_flows(&params, &ProjectionProfile::SENSITIVITY).unwrap();
        assert!(sens.years()[0].ebitda < deal.years()[0].ebitda);
    }

    #[test]
    fn test_payback_and_break_even_years() {
        let schedule = default_schedule();
        // Cumulative flow is still -6.66m after year 6 and turns positive with the exit
        assert_eq!(schedule.payback_year(), Some(7));
        // Distributions reach 38.3m by year 6, short of the 40m cheque
        assert_eq!(schedule.break_even_year(), Some(7));
    }

    #[test]
    fn test_payback_never_reached_without_exit_value() {
        let profile = ProjectionProfile {
            exit_multiple: Decimal::ZERO,
            ..ProjectionProfile::DEAL_RETURNS
        };
        let schedule = project_cash_flows(&ParameterSet::default(), &profile).unwrap();
        // Debt is repaid out of a zero exit, so the final year is deeply negative
        assert!(schedule.flows()[7] < Decimal::ZERO);
        assert_eq!(schedule.payback_year(), None);
        assert_eq!(schedule.break_even_year(), None);
    }

    #[test]
    fn test_out_of_scale_growth_is_rejected_not_panicking() {
        let params = ParameterSet::default()
            .derive(|a| a.revenue_growth_rate = dec!(1000000))
            .unwrap();
        let err = project_cash_flows(&params, &ProjectionProfile::DEAL_RETURNS).unwrap_err();
        assert!(matches!(err, DealModelError::InvalidInput { .. }));
    }

    #[test]
    fn test_out_of_scale_price_is_rejected_not_panicking() {
        let params = ParameterSet::default()
            .derive(|a| a.purchase_price = Decimal::MAX)
            .unwrap();
        let case = DealCase::new(params, ProjectionProfile::SENSITIVITY).unwrap();
        assert!(case.project().is_err());
        assert!(case.irr().is_err());
    }

    #[test]
    fn test_profile_validation() {
        let bad = ProjectionProfile {
            base_ebitda_ratio: Decimal::ZERO,
            exit_multiple: dec!(5),
        };
        assert!(DealCase::new(ParameterSet::default(), bad).is_err());
    }
}
