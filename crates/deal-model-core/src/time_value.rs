use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DealModelError;
use crate::types::{rate_to_pct, Money, Multiple, Percent, Rate};
use crate::DealModelResult;

/// IRR search stops once |NPV| falls below this many currency units.
pub const NPV_TOLERANCE: Decimal = dec!(0.001);
pub const MAX_IRR_ITERATIONS: u32 = 100;
pub const DEFAULT_IRR_GUESS: Rate = dec!(0.15);

const MIN_IRR: Rate = dec!(-0.99);
const MAX_IRR: Rate = dec!(10);

/// Outcome of the Newton-Raphson IRR search.
///
/// `rate` is always the last iterate. When `converged` is false the rate is
/// an estimate whose NPV residual never dropped below [`NPV_TOLERANCE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrSolution {
    pub rate: Rate,
    pub converged: bool,
    pub iterations: u32,
    pub npv_residual: Money,
}

impl IrrSolution {
    /// IRR in percentage points.
    pub fn rate_pct(&self) -> Percent {
        rate_to_pct(self.rate)
    }
}

/// NPV and dNPV/dr at `rate`. Returns `None` if any intermediate value
/// overflows the 96-bit mantissa.
fn npv_and_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Money, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        npv = npv.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let denom = discount.checked_mul(one_plus_r)?;
            let term = Decimal::from(t as u64)
                .checked_mul(*cf)?
                .checked_div(denom)?;
            dnpv = dnpv.checked_sub(term)?;
        }
    }

    Some((npv, dnpv))
}

/// Net Present Value of a series of cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> DealModelResult<Money> {
    if rate <= dec!(-1) {
        return Err(DealModelError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    npv_and_derivative(rate, cash_flows)
        .map(|(value, _)| value)
        .ok_or_else(|| {
            DealModelError::invalid("rate", format!("NPV overflowed at discount rate {rate}"))
        })
}

/// Internal Rate of Return using Newton-Raphson.
///
/// The iterate is clamped to [-0.99, 10] after every step. Non-convergence
/// is not an error: the last iterate is returned with `converged = false`.
pub fn solve_irr(cash_flows: &[Money], guess: Rate) -> DealModelResult<IrrSolution> {
    if cash_flows.len() < 2 {
        return Err(DealModelError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    let mut rate = guess.clamp(MIN_IRR, MAX_IRR);
    let mut residual = Decimal::MAX;

    for i in 0..MAX_IRR_ITERATIONS {
        let Some((npv_val, dnpv)) = npv_and_derivative(rate, cash_flows) else {
            return Ok(stalled(rate, i, residual, "arithmetic overflow"));
        };
        residual = npv_val;

        if npv_val.abs() < NPV_TOLERANCE {
            return Ok(IrrSolution {
                rate,
                converged: true,
                iterations: i,
                npv_residual: npv_val,
            });
        }

        if dnpv.is_zero() {
            return Ok(stalled(rate, i, residual, "zero derivative"));
        }

        let next = npv_val
            .checked_div(dnpv)
            .and_then(|step| rate.checked_sub(step));
        let Some(next) = next else {
            return Ok(stalled(rate, i, residual, "arithmetic overflow"));
        };

        // Guard against divergence
        rate = next.clamp(MIN_IRR, MAX_IRR);
    }

    let npv_residual = npv_and_derivative(rate, cash_flows)
        .map(|(value, _)| value)
        .unwrap_or(residual);
    let converged = npv_residual.abs() < NPV_TOLERANCE;
    if !converged {
        warn!(
            %rate,
            %npv_residual,
            "IRR did not converge after {MAX_IRR_ITERATIONS} iterations"
        );
    }

    Ok(IrrSolution {
        rate,
        converged,
        iterations: MAX_IRR_ITERATIONS,
        npv_residual,
    })
}

fn stalled(rate: Rate, iterations: u32, npv_residual: Money, cause: &str) -> IrrSolution {
    warn!(%rate, iterations, "IRR search stopped early: {cause}");
    IrrSolution {
        rate,
        converged: false,
        iterations,
        npv_residual,
    }
}

/// Multiple on Invested Capital: distributions after year 0 over the equity
/// cheque. `None` when no equity was invested or the multiple overflows.
pub fn moic(cash_flows: &[Money], equity_investment: Money) -> Option<Multiple> {
    if equity_investment.is_zero() {
        return None;
    }
    let distributions = cash_flows
        .iter()
        .skip(1)
        .try_fold(Decimal::ZERO, |acc, cf| acc.checked_add(*cf))?;
    distributions.checked_div(equity_investment)
}
