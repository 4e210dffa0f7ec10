use rand::distributions::Distribution;
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::time::Instant;

use crate::error::VentureFinanceError;
use crate::types::{with_metadata_f64, CashFlowSeries, ComputationOutput, Money, Rate};
use crate::valuation::dcf::{
    exit_valuation, present_value, roi_unchecked, terminal_value, validate_share_and_investment,
};
use crate::VentureFinanceResult;

use super::simulation::{
    default_trials, mean, median_sorted, percentile_sorted, rng_from_seed, sort_values, std_dev,
};

fn default_volatility() -> Decimal {
    dec!(0.2)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a Monte Carlo exit-risk run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitRiskInput {
    /// Base-case cash flows, perturbed independently every trial.
    pub cash_flows: CashFlowSeries,
    pub discount_rate: Rate,
    pub growth_rate: Rate,
    pub investor_share: Rate,
    pub invested_amount: Money,
    #[serde(default = "default_trials")]
    pub trials: u32,
    /// Std-dev of the multiplicative noise `1 + N(0, σ)` on each period.
    #[serde(default = "default_volatility")]
    pub cf_volatility: Decimal,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Why a trial produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    TerminalValueUndefined,
    NonPositiveInvestment,
}

/// Per-reason count of discarded trials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardCounts {
    pub terminal_value_undefined: u32,
    pub non_positive_investment: u32,
}

impl DiscardCounts {
    fn record(&mut self, reason: DiscardReason) {
        match reason {
            DiscardReason::TerminalValueUndefined => self.terminal_value_undefined += 1,
            DiscardReason::NonPositiveInvestment => self.non_positive_investment += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.terminal_value_undefined + self.non_positive_investment
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p10: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitRiskSummary {
    pub exit_valuation: MetricStats,
    pub roi: MetricStats,
    /// Trials that survived and entered the statistics.
    pub trials_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitRiskOutput {
    pub trials_requested: u32,
    /// None when every trial was discarded.
    pub summary: Option<ExitRiskSummary>,
    pub discarded: DiscardCounts,
}

/// One surviving trial.
#[derive(Debug, Clone, Copy)]
struct TrialOutcome {
    exit_valuation: f64,
    roi: f64,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the exit-risk simulation, seeding from `input.seed` when present.
pub fn run_exit_risk(input: &ExitRiskInput) -> VentureFinanceResult<ComputationOutput<ExitRiskOutput>> {
    run_exit_risk_with_rng(input, &mut rng_from_seed(input.seed))
}

/// Perturb the base cash flows `trials` times and push each path through
/// the DCF exit chain.
///
/// Trials with an undefined terminal value or nothing invested are
/// discarded and counted; they are never retried. Statistics are computed
/// only after all trials have run.
pub fn run_exit_risk_with_rng<R: Rng + ?Sized>(
    input: &ExitRiskInput,
    rng: &mut R,
) -> VentureFinanceResult<ComputationOutput<ExitRiskOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_exit_risk_input(input)?;

    let sigma = input.cf_volatility.to_f64().ok_or_else(|| {
        VentureFinanceError::invalid("cf_volatility", "Volatility is not representable as f64")
    })?;
    let noise = if sigma > 0.0 {
        Some(Normal::new(0.0, sigma).map_err(|e| {
            VentureFinanceError::invalid("cf_volatility", format!("Invalid Normal parameters: {e}"))
        })?)
    } else {
        None
    };
    let base: Vec<f64> = input
        .cash_flows
        .iter()
        .map(|cf| cf.to_f64().unwrap_or_default())
        .collect();

    let mut outcomes: Vec<TrialOutcome> = Vec::with_capacity(input.trials as usize);
    let mut discarded = DiscardCounts::default();
    let mut simulated: CashFlowSeries = Vec::with_capacity(base.len());

    for _ in 0..input.trials {
        simulated.clear();
        for &cf in &base {
            let shock = match &noise {
                Some(dist) => dist.sample(rng),
                None => 0.0,
            };
            simulated.push(to_decimal(cf * (1.0 + shock))?);
        }

        match run_trial(input, &simulated)? {
            Ok(outcome) => outcomes.push(outcome),
            Err(reason) => discarded.record(reason),
        }
    }

    let summary = summarize_outcomes(&outcomes);
    match &summary {
        Some(s) => tracing::debug!(
            trials = input.trials,
            retained = s.trials_count,
            mean_exit = s.exit_valuation.mean,
            "exit risk simulation complete"
        ),
        None => {
            tracing::warn!(trials = input.trials, "every exit risk trial was discarded");
            warnings.push("No trial produced a usable exit valuation; no statistics available".into());
        }
    }
    if discarded.terminal_value_undefined > 0 {
        warnings.push(format!(
            "{} of {} trials discarded (growth rate >= discount rate)",
            discarded.terminal_value_undefined, input.trials
        ));
    }
    if discarded.non_positive_investment > 0 {
        warnings.push(format!(
            "{} of {} trials discarded (invested amount is not positive)",
            discarded.non_positive_investment, input.trials
        ));
    }

    let output = ExitRiskOutput {
        trials_requested: input.trials,
        summary,
        discarded,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monte Carlo Exit Risk (normal cash-flow shocks, DCF exit)",
        &serde_json::json!({
            "periods": input.cash_flows.len(),
            "discount_rate": input.discount_rate.to_string(),
            "growth_rate": input.growth_rate.to_string(),
            "investor_share": input.investor_share.to_string(),
            "invested_amount": input.invested_amount.to_string(),
            "trials": input.trials,
            "cf_volatility": input.cf_volatility.to_string(),
            "seed": input.seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_exit_risk_input(input: &ExitRiskInput) -> VentureFinanceResult<()> {
    if input.cash_flows.is_empty() {
        return Err(VentureFinanceError::invalid(
            "cash_flows",
            "At least one cash flow is required",
        ));
    }
    if input.discount_rate < Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "discount_rate",
            "Discount rate must not be negative",
        ));
    }
    if input.growth_rate < Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "growth_rate",
            "Growth rate must not be negative",
        ));
    }
    validate_share_and_investment(input.investor_share, input.invested_amount)?;
    if input.cf_volatility < Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "cf_volatility",
            "Volatility must not be negative",
        ));
    }
    if input.trials == 0 {
        return Err(VentureFinanceError::invalid(
            "trials",
            "At least one trial is required",
        ));
    }
    Ok(())
}

fn to_decimal(value: f64) -> VentureFinanceResult<Decimal> {
    Decimal::from_f64(value).ok_or_else(|| {
        VentureFinanceError::FinancialImpossibility(format!(
            "Simulated cash flow {value} is out of decimal range"
        ))
    })
}

/// One trial: outer error aborts the run, inner error discards the trial.
fn run_trial(
    input: &ExitRiskInput,
    flows: &[Money],
) -> VentureFinanceResult<Result<TrialOutcome, DiscardReason>> {
    let pv = present_value(flows, input.discount_rate)?;
    let last = flows.last().copied().unwrap_or_default();
    let tv = match terminal_value(last, input.growth_rate, input.discount_rate)? {
        Some(tv) => tv,
        None => return Ok(Err(DiscardReason::TerminalValueUndefined)),
    };
    if input.invested_amount <= Decimal::ZERO {
        return Ok(Err(DiscardReason::NonPositiveInvestment));
    }
    let ev = exit_valuation(pv, Some(tv))?;
    let roi = match roi_unchecked(ev, input.investor_share, input.invested_amount) {
        Some(r) => r,
        None => return Ok(Err(DiscardReason::NonPositiveInvestment)),
    };
    Ok(Ok(TrialOutcome {
        exit_valuation: ev.to_f64().unwrap_or_default(),
        roi: roi.to_f64().unwrap_or_default(),
    }))
}

fn metric_stats(values: &mut [f64]) -> MetricStats {
    sort_values(values);
    let m = mean(values);
    MetricStats {
        mean: m,
        median: median_sorted(values),
        std_dev: std_dev(values, m),
        p10: percentile_sorted(values, 10.0),
        p90: percentile_sorted(values, 90.0),
    }
}

fn summarize_outcomes(outcomes: &[TrialOutcome]) -> Option<ExitRiskSummary> {
    if outcomes.is_empty() {
        return None;
    }
    let mut exits: Vec<f64> = outcomes.iter().map(|o| o.exit_valuation).collect();
    let mut rois: Vec<f64> = outcomes.iter().map(|o| o.roi).collect();
    Some(ExitRiskSummary {
        exit_valuation: metric_stats(&mut exits),
        roi: metric_stats(&mut rois),
        trials_count: outcomes.len() as u32,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
