mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use commands::monte_carlo::{DelaySimArgs, ExitRiskArgs, RevenueSimArgs};
use commands::valuation::ExitArgs;
use commands::venture::{
    DilutionArgs, EquityReturnsArgs, JvDilutionArgs, PartnerContributionArgs, ResolveRoundArgs,
    ValuationComparisonArgs,
};

/// Venture round dilution, exit valuation and exit-risk analysis
#[derive(Parser)]
#[command(
    name = "vfa",
    version,
    about = "Venture round dilution, exit valuation and exit-risk analysis",
    long_about = "A CLI for venture financing analysis with decimal precision. Resolves \
                  partially specified funding rounds, tracks founder dilution across rounds, \
                  values exits with a DCF model and simulates exit risk with Monte Carlo."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// YAML file with default discount rate, growth rate, trials and volatility
    #[arg(long, global = true)]
    assumptions: Option<String>,

    /// Log resolver and simulation details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the missing fields of a single funding round
    ResolveRound(ResolveRoundArgs),
    /// Run a multi-round founder dilution ledger
    Dilution(DilutionArgs),
    /// Dilute sponsor, partner and grant holdings of a joint venture
    JvDilution(JvDilutionArgs),
    /// Dilute a partner map and split exit proceeds
    EquityReturns(EquityReturnsArgs),
    /// Compare contribution-based and equity-based partner returns
    PartnerContribution(PartnerContributionArgs),
    /// Compare pre- and post-money valuations
    ValuationComparison(ValuationComparisonArgs),
    /// Value an exit with a DCF model and compute investor ROI
    Exit(ExitArgs),
    /// Monte Carlo exit-risk simulation
    ExitRisk(ExitRiskArgs),
    /// Monte Carlo project-delay simulation (triangular)
    DelaySim(DelaySimArgs),
    /// Monte Carlo revenue scenarios (normal)
    RevenueSim(RevenueSimArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let assumptions = match config::load_assumptions(cli.assumptions.as_deref()) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::ResolveRound(args) => commands::venture::run_resolve_round(args),
        Commands::Dilution(args) => commands::venture::run_dilution(args),
        Commands::JvDilution(args) => commands::venture::run_jv_dilution(args),
        Commands::EquityReturns(args) => commands::venture::run_equity_returns(args),
        Commands::PartnerContribution(args) => commands::venture::run_partner_contribution(args),
        Commands::ValuationComparison(args) => commands::venture::run_valuation_comparison(args),
        Commands::Exit(args) => commands::valuation::run_exit(args, &assumptions),
        Commands::ExitRisk(args) => commands::monte_carlo::run_exit_risk(args, &assumptions),
        Commands::DelaySim(args) => commands::monte_carlo::run_delay_sim(args, &assumptions),
        Commands::RevenueSim(args) => commands::monte_carlo::run_revenue_sim(args, &assumptions),
        Commands::Version => {
            println!("vfa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
