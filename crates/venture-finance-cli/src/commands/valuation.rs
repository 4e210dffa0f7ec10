use clap::Args;
use serde_json::Value;

use venture_finance_core::valuation::dcf::{self, ExitInput};
use venture_finance_core::Assumptions;

use crate::input;

/// Arguments for DCF exit valuation
#[derive(Args)]
pub struct ExitArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_exit(
    args: ExitArgs,
    assumptions: &Assumptions,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut data = input::load(args.input.as_deref(), "exit valuation")?;
    assumptions.fill_exit_defaults(&mut data);
    let exit_input: ExitInput = serde_json::from_value(data)?;
    let result = dcf::analyze_exit(&exit_input)?;
    Ok(serde_json::to_value(result)?)
}
