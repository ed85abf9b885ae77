mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use commands::deal::DealArgs;
use commands::monte_carlo::RiskSimArgs;
use commands::scenarios::{BreakevenArgs, ScenariosArgs, SensitivityArgs};

/// Deal returns, scenario, sensitivity and Monte Carlo risk modelling
#[derive(Parser)]
#[command(
    name = "dealmodel",
    version,
    about = "Deal returns, scenario, sensitivity and Monte Carlo risk modelling",
    long_about = "A CLI for M&A deal modelling: 7-year cash-flow projection with \
                  Newton-Raphson IRR, NPV and MOIC, scenario comparison, tornado \
                  sensitivity with breakeven search, and Monte Carlo deal-risk \
                  simulation. Inputs are JSON or YAML files, or JSON on stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Project cash flows and compute IRR, NPV, MOIC, payback and break-even
    Deal(DealArgs),
    /// Compare Upside / Downside / No Synergies / All Equity (or custom) scenarios
    Scenarios(ScenariosArgs),
    /// Run a Monte Carlo deal-risk simulation
    RiskSim(RiskSimArgs),
    /// Tornado sensitivity of IRR plus breakeven targets
    Sensitivity(SensitivityArgs),
    /// Solve one variable for a target IRR
    Breakeven(BreakevenArgs),
    /// Print the default deal risk factors
    DefaultRisks,
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

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Deal(args) => commands::deal::run_deal(args),
        Commands::Scenarios(args) => commands::scenarios::run_scenarios_cmd(args),
        Commands::RiskSim(args) => commands::monte_carlo::run_risk_sim(args),
        Commands::Sensitivity(args) => commands::scenarios::run_sensitivity(args),
        Commands::Breakeven(args) => commands::scenarios::run_breakeven(args),
        Commands::DefaultRisks => commands::monte_carlo::run_default_risks(),
        Commands::Version => {
            println!("dealmodel {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
