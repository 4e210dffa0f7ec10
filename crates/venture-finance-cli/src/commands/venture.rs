use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use venture_finance_core::venture::comparison::{self, ValuationComparisonInput};
use venture_finance_core::venture::dilution::{self, DilutionInput, JvDilutionInput};
use venture_finance_core::venture::equity_returns::{
    self, EquityReturnsInput, PartnerContributionInput,
};
use venture_finance_core::venture::resolver::{
    self, LockSet, ResolveRoundInput, RoundField, RoundValues,
};

use crate::input;

/// Arguments for single-round resolution
#[derive(Args)]
pub struct ResolveRoundArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Pre-money valuation
    #[arg(long)]
    pub pre_money: Option<Decimal>,

    /// Post-money valuation
    #[arg(long)]
    pub post_money: Option<Decimal>,

    /// Amount invested in the round
    #[arg(long)]
    pub investment: Option<Decimal>,

    /// New investor ownership, 0-100
    #[arg(long)]
    pub investor_pct: Option<Decimal>,

    /// Fields to hold fixed (pre_money, post_money, investment, investor_pct)
    #[arg(long = "lock", value_delimiter = ',')]
    pub locks: Vec<String>,
}

/// Arguments for the multi-round dilution ledger
#[derive(Args)]
pub struct DilutionArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for joint-venture dilution
#[derive(Args)]
pub struct JvDilutionArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for multi-round equity returns
#[derive(Args)]
pub struct EquityReturnsArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for partner contribution analysis
#[derive(Args)]
pub struct PartnerContributionArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for pre/post valuation comparison
#[derive(Args)]
pub struct ValuationComparisonArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_resolve_round(args: ResolveRoundArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let round_input: ResolveRoundInput = if let Some(ref path) = args.input {
        serde_json::from_value(input::file::read_json_value(path)?)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let mut locked = LockSet::new();
        for name in &args.locks {
            let field: RoundField = serde_json::from_value(Value::String(name.clone()))
                .map_err(|_| format!("Unknown field for --lock: '{name}'"))?;
            locked = locked.with(field);
        }
        ResolveRoundInput {
            values: RoundValues {
                pre_money: args.pre_money,
                post_money: args.post_money,
                investment: args.investment,
                investor_pct: args.investor_pct,
            },
            locked,
        }
    };

    let result = resolver::resolve_round_output(&round_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_dilution(args: DilutionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut data = input::load(args.input.as_deref(), "dilution analysis")?;

    // Rounds are parsed separately so a bad entry is reported by index.
    let rounds = match data.get("rounds") {
        Some(raw) => dilution::parse_rounds(raw)?,
        None => return Err("dilution input requires a 'rounds' list".into()),
    };
    if let Some(map) = data.as_object_mut() {
        map.insert("rounds".into(), Value::Array(Vec::new()));
    }
    let mut dil_input: DilutionInput = serde_json::from_value(data)?;
    dil_input.rounds = rounds;

    let result = dilution::run_dilution(&dil_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_jv_dilution(args: JvDilutionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let data = input::load(args.input.as_deref(), "joint-venture dilution")?;
    let jv_input: JvDilutionInput = serde_json::from_value(data)?;
    let result = dilution::run_jv_dilution(&jv_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_equity_returns(args: EquityReturnsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let data = input::load(args.input.as_deref(), "equity returns")?;
    let eq_input: EquityReturnsInput = serde_json::from_value(data)?;
    let result = equity_returns::run_equity_returns(&eq_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_partner_contribution(
    args: PartnerContributionArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let data = input::load(args.input.as_deref(), "partner contribution analysis")?;
    let pc_input: PartnerContributionInput = serde_json::from_value(data)?;
    let result = equity_returns::analyze_partner_contribution(&pc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_valuation_comparison(
    args: ValuationComparisonArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let data = input::load(args.input.as_deref(), "valuation comparison")?;
    let vc_input: ValuationComparisonInput = serde_json::from_value(data)?;
    let result = comparison::compare_valuations(&vc_input)?;
    Ok(serde_json::to_value(result)?)
}
