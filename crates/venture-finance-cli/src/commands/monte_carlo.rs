use clap::Args;
use serde_json::Value;

use venture_finance_core::monte_carlo::exit_risk::{self, ExitRiskInput};
use venture_finance_core::monte_carlo::simulation::{
    self, DelaySimulationInput, RevenueSimulationInput,
};
use venture_finance_core::Assumptions;

use crate::input;

/// Arguments for Monte Carlo exit-risk simulation
#[derive(Args)]
pub struct ExitRiskArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the number of trials
    #[arg(long)]
    pub trials: Option<u32>,

    /// Seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for triangular project-delay simulation
#[derive(Args)]
pub struct DelaySimArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Best-case delay
    #[arg(long)]
    pub optimistic: Option<f64>,

    /// Most likely delay
    #[arg(long)]
    pub likely: Option<f64>,

    /// Worst-case delay
    #[arg(long)]
    pub pessimistic: Option<f64>,

    /// Number of trials (defaults to the assumptions file)
    #[arg(long)]
    pub trials: Option<u32>,

    /// Seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for normal revenue-scenario simulation
#[derive(Args)]
pub struct RevenueSimArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Mean revenue
    #[arg(long)]
    pub base_revenue: Option<f64>,

    /// Standard deviation as a fraction of base revenue
    #[arg(long)]
    pub volatility: Option<f64>,

    /// Number of trials (defaults to the assumptions file)
    #[arg(long)]
    pub trials: Option<u32>,

    /// Seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Flags win over file values; missing trials fall back to the assumptions.
fn apply_run_overrides(
    data: &mut Value,
    trials: Option<u32>,
    seed: Option<u64>,
    assumptions: &Assumptions,
) {
    if let Some(map) = data.as_object_mut() {
        if let Some(t) = trials {
            map.insert("trials".into(), Value::from(t));
        }
        if let Some(s) = seed {
            map.insert("seed".into(), Value::from(s));
        }
        map.entry("trials")
            .or_insert_with(|| Value::from(assumptions.montecarlo_trials));
    }
}

pub fn run_exit_risk(
    args: ExitRiskArgs,
    assumptions: &Assumptions,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut data = input::load(args.input.as_deref(), "exit-risk simulation")?;
    apply_run_overrides(&mut data, args.trials, args.seed, assumptions);
    assumptions.fill_exit_defaults(&mut data);
    let mc_input: ExitRiskInput = serde_json::from_value(data)?;
    let result = exit_risk::run_exit_risk(&mc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_delay_sim(
    args: DelaySimArgs,
    assumptions: &Assumptions,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut data = if let Some(ref path) = args.input {
        input::file::read_json_value(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        serde_json::json!({
            "optimistic": args.optimistic.ok_or("--optimistic is required (or provide --input)")?,
            "likely": args.likely.ok_or("--likely is required (or provide --input)")?,
            "pessimistic": args.pessimistic.ok_or("--pessimistic is required (or provide --input)")?,
        })
    };
    apply_run_overrides(&mut data, args.trials, args.seed, assumptions);
    let sim_input: DelaySimulationInput = serde_json::from_value(data)?;
    let result = simulation::run_delay_simulation(&sim_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_revenue_sim(
    args: RevenueSimArgs,
    assumptions: &Assumptions,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut data = if let Some(ref path) = args.input {
        input::file::read_json_value(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        serde_json::json!({
            "base_revenue": args.base_revenue.ok_or("--base-revenue is required (or provide --input)")?,
            "volatility": args.volatility.ok_or("--volatility is required (or provide --input)")?,
        })
    };
    apply_run_overrides(&mut data, args.trials, args.seed, assumptions);
    let sim_input: RevenueSimulationInput = serde_json::from_value(data)?;
    let result = simulation::run_revenue_simulation(&sim_input)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_trials_taken_from_assumptions() {
        let assumptions = Assumptions {
            montecarlo_trials: 250,
            ..Assumptions::default()
        };
        let mut data = serde_json::json!({ "base_revenue": 100.0, "volatility": 0.1 });
        apply_run_overrides(&mut data, None, None, &assumptions);
        assert_eq!(data["trials"], 250);
        assert!(data.get("seed").is_none());
    }

    #[test]
    fn test_flags_override_file_values() {
        let mut data = serde_json::json!({ "trials": 10, "seed": 1 });
        apply_run_overrides(&mut data, Some(99), Some(7), &Assumptions::default());
        assert_eq!(data["trials"], 99);
        assert_eq!(data["seed"], 7);
    }
}
