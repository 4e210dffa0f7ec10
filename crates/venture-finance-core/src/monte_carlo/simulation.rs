use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Normal, Triangular};
use std::time::Instant;

use crate::error::VentureFinanceError;
use crate::types::{with_metadata_f64, ComputationOutput};
use crate::VentureFinanceResult;

const HISTOGRAM_BINS: usize = 20;

pub(crate) fn default_trials() -> u32 {
    10_000
}

/// Seeded when `seed` is given, otherwise from OS entropy.
pub(crate) fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Project-delay simulation: triangular over (optimistic, likely, pessimistic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelaySimulationInput {
    #[serde(default = "default_trials")]
    pub trials: u32,
    pub optimistic: f64,
    pub likely: f64,
    pub pessimistic: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Revenue scenarios: normal around `base_revenue` with std `base * volatility`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueSimulationInput {
    #[serde(default = "default_trials")]
    pub trials: u32,
    pub base_revenue: f64,
    pub volatility: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Percentile summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// A single histogram bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
    pub frequency: f64,
}

/// Descriptive statistics for one simulated quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub trials: u32,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Percentiles,
    pub histogram: Vec<HistogramBin>,
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Compute the percentile value from a **sorted**, non-empty slice using
/// linear interpolation.
pub(crate) fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

pub(crate) fn sort_values(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn median_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Build a histogram with `num_bins` equal-width bins.
fn build_histogram(sorted: &[f64], num_bins: usize) -> Vec<HistogramBin> {
    let min_val = sorted[0];
    let max_val = sorted[sorted.len() - 1];

    // All values identical
    if (max_val - min_val).abs() < f64::EPSILON {
        return vec![HistogramBin {
            lower: min_val,
            upper: max_val,
            count: sorted.len() as u32,
            frequency: 1.0,
        }];
    }

    let bin_width = (max_val - min_val) / num_bins as f64;
    let n = sorted.len() as f64;

    let mut bins: Vec<HistogramBin> = (0..num_bins)
        .map(|i| HistogramBin {
            lower: min_val + i as f64 * bin_width,
            upper: if i == num_bins - 1 {
                max_val
            } else {
                min_val + (i + 1) as f64 * bin_width
            },
            count: 0,
            frequency: 0.0,
        })
        .collect();

    for &val in sorted {
        let idx = (((val - min_val) / bin_width).floor() as usize).min(num_bins - 1);
        bins[idx].count += 1;
    }

    for bin in &mut bins {
        bin.frequency = bin.count as f64 / n;
    }

    bins
}

/// Summarize a sample; sorts `values` in place. `None` for an empty sample.
pub fn summarize(values: &mut [f64]) -> Option<DistributionSummary> {
    if values.is_empty() {
        return None;
    }
    sort_values(values);

    let mean = mean(values);
    Some(DistributionSummary {
        trials: values.len() as u32,
        mean,
        median: median_sorted(values),
        std_dev: std_dev(values, mean),
        min: values[0],
        max: values[values.len() - 1],
        percentiles: Percentiles {
            p5: percentile_sorted(values, 5.0),
            p10: percentile_sorted(values, 10.0),
            p25: percentile_sorted(values, 25.0),
            p50: percentile_sorted(values, 50.0),
            p75: percentile_sorted(values, 75.0),
            p90: percentile_sorted(values, 90.0),
            p95: percentile_sorted(values, 95.0),
        },
        histogram: build_histogram(values, HISTOGRAM_BINS),
    })
}

// ---------------------------------------------------------------------------
// Samplers
// ---------------------------------------------------------------------------

fn require_trials(trials: u32) -> VentureFinanceResult<()> {
    if trials == 0 {
        return Err(VentureFinanceError::invalid(
            "trials",
            "At least one trial is required",
        ));
    }
    Ok(())
}

/// Draw `trials` delays from a triangular distribution.
pub fn sample_delays<R: Rng + ?Sized>(
    rng: &mut R,
    trials: u32,
    optimistic: f64,
    likely: f64,
    pessimistic: f64,
) -> VentureFinanceResult<Vec<f64>> {
    require_trials(trials)?;
    if !(optimistic <= likely && likely <= pessimistic) {
        return Err(VentureFinanceError::invalid(
            "likely",
            "Must have optimistic <= likely <= pessimistic",
        ));
    }
    // Degenerate range: every draw is the single point.
    if (pessimistic - optimistic).abs() < f64::EPSILON {
        return Ok(vec![likely; trials as usize]);
    }
    let dist = Triangular::new(optimistic, pessimistic, likely).map_err(|e| {
        VentureFinanceError::invalid("distribution", format!("Invalid Triangular parameters: {e}"))
    })?;
    Ok((0..trials).map(|_| dist.sample(rng)).collect())
}

/// Draw `trials` revenues from `N(base, base * volatility)`.
pub fn sample_revenues<R: Rng + ?Sized>(
    rng: &mut R,
    trials: u32,
    base_revenue: f64,
    volatility: f64,
) -> VentureFinanceResult<Vec<f64>> {
    require_trials(trials)?;
    if base_revenue <= 0.0 {
        return Err(VentureFinanceError::invalid(
            "base_revenue",
            "Base revenue must be positive",
        ));
    }
    if volatility < 0.0 {
        return Err(VentureFinanceError::invalid(
            "volatility",
            "Volatility must not be negative",
        ));
    }
    if volatility == 0.0 {
        return Ok(vec![base_revenue; trials as usize]);
    }
    let dist = Normal::new(base_revenue, base_revenue * volatility).map_err(|e| {
        VentureFinanceError::invalid("distribution", format!("Invalid Normal parameters: {e}"))
    })?;
    Ok((0..trials).map(|_| dist.sample(rng)).collect())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn run_delay_simulation(
    input: &DelaySimulationInput,
) -> VentureFinanceResult<ComputationOutput<DistributionSummary>> {
    run_delay_simulation_with_rng(input, &mut rng_from_seed(input.seed))
}

/// Triangular project-delay simulation with a caller-supplied RNG.
pub fn run_delay_simulation_with_rng<R: Rng + ?Sized>(
    input: &DelaySimulationInput,
    rng: &mut R,
) -> VentureFinanceResult<ComputationOutput<DistributionSummary>> {
    let start = Instant::now();
    let mut samples = sample_delays(
        rng,
        input.trials,
        input.optimistic,
        input.likely,
        input.pessimistic,
    )?;
    let summary = summarize(&mut samples).ok_or_else(|| {
        VentureFinanceError::InsufficientData("Delay simulation produced no samples".into())
    })?;

    tracing::debug!(trials = input.trials, mean = summary.mean, "delay simulation complete");

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monte Carlo Project Delay (triangular)",
        input,
        Vec::new(),
        elapsed,
        summary,
    ))
}

pub fn run_revenue_simulation(
    input: &RevenueSimulationInput,
) -> VentureFinanceResult<ComputationOutput<DistributionSummary>> {
    run_revenue_simulation_with_rng(input, &mut rng_from_seed(input.seed))
}

/// Normal revenue-scenario simulation with a caller-supplied RNG.
pub fn run_revenue_simulation_with_rng<R: Rng + ?Sized>(
    input: &RevenueSimulationInput,
    rng: &mut R,
) -> VentureFinanceResult<ComputationOutput<DistributionSummary>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut samples = sample_revenues(rng, input.trials, input.base_revenue, input.volatility)?;
    let negative = samples.iter().filter(|&&v| v < 0.0).count();
    if negative > 0 {
        warnings.push(format!(
            "{negative} of {} revenue scenarios are negative; volatility may be too high",
            input.trials
        ));
    }
    let summary = summarize(&mut samples).ok_or_else(|| {
        VentureFinanceError::InsufficientData("Revenue simulation produced no samples".into())
    })?;

    tracing::debug!(trials = input.trials, mean = summary.mean, "revenue simulation complete");

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monte Carlo Revenue Scenarios (normal)",
        input,
        warnings,
        elapsed,
        summary,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: u64 = 42;

    fn delay_input() -> DelaySimulationInput {
        DelaySimulationInput {
            trials: 10_000,
            optimistic: 2.0,
            likely: 4.0,
            pessimistic: 9.0,
            seed: Some(SEED),
        }
    }

    fn revenue_input() -> RevenueSimulationInput {
        RevenueSimulationInput {
            trials: 10_000,
            base_revenue: 1000.0,
            volatility: 0.1,
            seed: Some(SEED),
        }
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 50.0), 3.0);
        assert!((percentile_sorted(&sorted, 10.0) - 1.4).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 90.0) - 4.6).abs() < 1e-12);
    }

    #[test]
    fn test_median_even_length() {
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0, 10.0]), 2.5);
    }

    #[test]
    fn test_population_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values, mean(&values)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_empty_is_none() {
        assert!(summarize(&mut []).is_none());
    }

    #[test]
    fn test_delay_bounds_and_mean() {
        let out = run_delay_simulation(&delay_input()).unwrap().result;
        assert!(out.min >= 2.0);
        assert!(out.max <= 9.0);
        // Triangular mean = (a + b + c) / 3 = 5
        assert!((out.mean - 5.0).abs() < 0.1, "mean = {}", out.mean);
    }

    #[test]
    fn test_delay_seeded_reproducibility() {
        let a = run_delay_simulation(&delay_input()).unwrap().result;
        let b = run_delay_simulation(&delay_input()).unwrap().result;
        assert_eq!(a.mean, b.mean);
        assert_eq!(a.percentiles.p90, b.percentiles.p90);
    }

    #[test]
    fn test_delay_ordering_enforced() {
        let mut input = delay_input();
        input.likely = 10.0;
        assert!(run_delay_simulation(&input).is_err());
    }

    #[test]
    fn test_delay_degenerate_range() {
        let input = DelaySimulationInput {
            trials: 100,
            optimistic: 3.0,
            likely: 3.0,
            pessimistic: 3.0,
            seed: Some(SEED),
        };
        let out = run_delay_simulation(&input).unwrap().result;
        assert_eq!(out.std_dev, 0.0);
        assert_eq!(out.histogram.len(), 1);
    }

    #[test]
    fn test_revenue_statistics() {
        let out = run_revenue_simulation(&revenue_input()).unwrap().result;
        assert!((out.mean - 1000.0).abs() < 5.0, "mean = {}", out.mean);
        assert!((out.std_dev - 100.0).abs() < 5.0, "std = {}", out.std_dev);
        assert!(out.percentiles.p10 < out.percentiles.p50);
        assert!(out.percentiles.p50 < out.percentiles.p90);
    }

    #[test]
    fn test_revenue_zero_volatility_is_constant() {
        let mut input = revenue_input();
        input.volatility = 0.0;
        let out = run_revenue_simulation(&input).unwrap().result;
        assert_eq!(out.min, 1000.0);
        assert_eq!(out.max, 1000.0);
    }

    #[test]
    fn test_revenue_validation() {
        let mut input = revenue_input();
        input.base_revenue = 0.0;
        assert!(run_revenue_simulation(&input).is_err());

        let mut input = revenue_input();
        input.volatility = -0.1;
        assert!(run_revenue_simulation(&input).is_err());

        let mut input = revenue_input();
        input.trials = 0;
        assert!(run_revenue_simulation(&input).is_err());
    }

    #[test]
    fn test_histogram_has_twenty_bins() {
        let out = run_revenue_simulation(&revenue_input()).unwrap().result;
        assert_eq!(out.histogram.len(), 20);
        let total: u32 = out.histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, 10_000);
        let freq: f64 = out.histogram.iter().map(|b| b.frequency).sum();
        assert!((freq - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_injected_rng() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = sample_revenues(&mut rng, 50, 100.0, 0.2).unwrap();
        assert_eq!(samples.len(), 50);
    }
}
