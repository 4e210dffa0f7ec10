use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::VentureFinanceError;
use crate::types::{with_metadata, CashFlowSeries, ComputationOutput, Money, Rate};
use crate::VentureFinanceResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a single deterministic exit analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitInput {
    /// Explicit-period cash flows; the first element is period 1.
    pub cash_flows: CashFlowSeries,
    pub discount_rate: Rate,
    /// Perpetual growth rate applied after the last explicit period.
    pub growth_rate: Rate,
    /// Investor's ownership fraction at exit, in [0, 1].
    pub investor_share: Rate,
    pub invested_amount: Money,
}

/// Result of the exit chain: PV, terminal value, exit valuation, ROI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitOutcome {
    /// Sum of discounted explicit-period cash flows
    pub pv_cash_flows: Money,
    /// Gordon growth terminal value (undiscounted)
    pub terminal_value: Money,
    /// PV of cash flows plus terminal value
    pub exit_valuation: Money,
    /// `(exit * share - invested) / invested`; None when nothing was invested
    pub investor_roi: Option<Rate>,
    /// Terminal value as a fraction of exit valuation
    pub terminal_value_pct: Rate,
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// `Σ cf_t / (1 + r)^t` for t = 1..N.
pub fn present_value(cash_flows: &[Money], discount_rate: Rate) -> VentureFinanceResult<Money> {
    if cash_flows.is_empty() {
        return Err(VentureFinanceError::invalid(
            "cash_flows",
            "At least one cash flow is required",
        ));
    }
    if discount_rate < Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "discount_rate",
            "Discount rate must not be negative",
        ));
    }

    let step = Decimal::ONE + discount_rate;
    let mut compound = Decimal::ONE;
    let mut pv = Decimal::ZERO;
    for (t, cf) in cash_flows.iter().enumerate() {
        // Past Decimal's range every remaining term is below its resolution.
        let Some(next) = compound.checked_mul(step) else {
            tracing::debug!(period = t + 1, "discount factor saturated; later flows ignored");
            break;
        };
        compound = next;
        pv = pv.checked_add(*cf / compound).ok_or_else(|| {
            VentureFinanceError::FinancialImpossibility(
                "Present value of cash flows exceeds decimal range".into(),
            )
        })?;
    }
    Ok(pv)
}

/// Gordon growth terminal value `last * (1 + g) / (r - g)`.
///
/// Returns `None` when `r <= g`; the perpetuity does not converge there.
pub fn terminal_value(
    last_cash_flow: Money,
    growth_rate: Rate,
    discount_rate: Rate,
) -> VentureFinanceResult<Option<Money>> {
    if growth_rate < Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "growth_rate",
            "Growth rate must not be negative",
        ));
    }
    if discount_rate <= growth_rate {
        return Ok(None);
    }
    let next = last_cash_flow * (Decimal::ONE + growth_rate);
    next.checked_div(discount_rate - growth_rate)
        .map(Some)
        .ok_or_else(|| {
            VentureFinanceError::FinancialImpossibility(format!(
                "Terminal value overflows: discount rate {discount_rate} too close to growth rate {growth_rate}"
            ))
        })
}

/// `pv + tv`. An undefined terminal value makes the exit unmodelable.
pub fn exit_valuation(pv: Money, terminal_value: Option<Money>) -> VentureFinanceResult<Money> {
    match terminal_value {
        Some(tv) => pv.checked_add(tv).ok_or_else(|| {
            VentureFinanceError::FinancialImpossibility(
                "Exit valuation exceeds decimal range".into(),
            )
        }),
        None => Err(VentureFinanceError::FinancialImpossibility(
            "Terminal value is undefined (growth rate must be below discount rate)".into(),
        )),
    }
}

/// Investor ROI on exit. `None` when `invested` is zero.
pub fn investor_roi(
    exit_value: Money,
    investor_share: Rate,
    invested: Money,
) -> VentureFinanceResult<Option<Rate>> {
    if exit_value < Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "exit_value",
            "Exit valuation must not be negative",
        ));
    }
    validate_share_and_investment(investor_share, invested)?;
    Ok(roi_unchecked(exit_value, investor_share, invested))
}

/// ROI without range checks; simulated exits may legitimately go negative.
pub(crate) fn roi_unchecked(exit_value: Money, investor_share: Rate, invested: Money) -> Option<Rate> {
    if invested.is_zero() {
        return None;
    }
    Some((exit_value * investor_share - invested) / invested)
}

pub(crate) fn validate_share_and_investment(
    investor_share: Rate,
    invested: Money,
) -> VentureFinanceResult<()> {
    if investor_share < Decimal::ZERO || investor_share > Decimal::ONE {
        return Err(VentureFinanceError::invalid(
            "investor_share",
            "Investor share must be between 0 and 1",
        ));
    }
    if invested < Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "invested_amount",
            "Invested amount must not be negative",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the full exit chain: PV → terminal value → exit valuation → ROI.
pub fn analyze_exit(input: &ExitInput) -> VentureFinanceResult<ComputationOutput<ExitOutcome>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_share_and_investment(input.investor_share, input.invested_amount)?;

    let pv = present_value(&input.cash_flows, input.discount_rate)?;
    let last = input.cash_flows.last().copied().unwrap_or_default();
    let tv = terminal_value(last, input.growth_rate, input.discount_rate)?.ok_or_else(|| {
        VentureFinanceError::FinancialImpossibility(format!(
            "Terminal value cannot be calculated: growth rate ({}) >= discount rate ({})",
            input.growth_rate, input.discount_rate
        ))
    })?;
    let ev = exit_valuation(pv, Some(tv))?;
    let roi = investor_roi(ev, input.investor_share, input.invested_amount)?;

    let tv_pct = if ev.is_zero() {
        Decimal::ZERO
    } else {
        tv / ev
    };
    if tv_pct > dec!(0.75) {
        warnings.push(format!(
            "Terminal value represents {:.1}% of exit valuation; consider extending the explicit forecast period",
            tv_pct * dec!(100)
        ));
    }
    if roi.is_none() {
        warnings.push("Invested amount is zero; ROI is undefined".into());
    }

    let output = ExitOutcome {
        pv_cash_flows: pv,
        terminal_value: tv,
        exit_valuation: ev,
        investor_roi: roi,
        terminal_value_pct: tv_pct,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "DCF Exit Valuation (Gordon growth terminal value)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
