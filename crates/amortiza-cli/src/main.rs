mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process;

use amortiza_core::config::AppConfig;
use amortiza_core::metrics::RateConvention;
use commands::calculate::CalculateArgs;
use commands::compare::CompareArgs;
use commands::metrics::MetricsArgs;
use commands::validate::ValidateArgs;
use commands::Context;

/// Loan amortization dashboard
#[derive(Parser)]
#[command(
    name = "amortiza",
    version,
    about = "Loan amortization dashboard",
    long_about = "Fetch loan amortization schedules from a calculation service, derive \
                  effective rates and financial cost (TEM, TEA, CFT, CFTNA, CFTEA), \
                  compare two banks and export the result to a spreadsheet."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    output: OutputFormat,

    /// JSON or YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Calculation service endpoint (overrides config and AMORTIZA_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Request timeout in seconds, 0 to wait indefinitely
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// How TEM/TEA are derived from the nominal rate
    #[arg(long, global = true)]
    convention: Option<ConventionArg>,

    /// Log requests and responses
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate a loan and show its dashboard
    Calculate(CalculateArgs),
    /// Compare the same loan across two banks
    Compare(CompareArgs),
    /// Derive TEM, TEA, CFT, CFTNA and CFTEA from known figures
    Metrics(MetricsArgs),
    /// Check loan input without contacting the service
    Validate(ValidateArgs),
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

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConventionArg {
    Compounding,
    Simple,
}

impl From<ConventionArg> for RateConvention {
    fn from(arg: ConventionArg) -> Self {
        match arg {
            ConventionArg::Compounding => RateConvention::Compounding,
            ConventionArg::Simple => RateConvention::Simple,
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(cli.config.as_deref())?
        .apply_env(|key| std::env::var(key).ok())?;
    if let Some(ref endpoint) = cli.endpoint {
        config.service.endpoint = endpoint.clone();
    }
    if let Some(secs) = cli.timeout {
        config.service.timeout_secs = (secs > 0).then_some(secs);
    }
    if let Some(convention) = cli.convention {
        config.convention = convention.into();
    }
    Ok(config)
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };
    let ctx = Context::new(config);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Calculate(args) => commands::calculate::run_calculate(args, &ctx),
        Commands::Compare(args) => commands::compare::run_compare(args, &ctx),
        Commands::Metrics(args) => commands::metrics::run_metrics(args, &ctx),
        Commands::Validate(args) => commands::validate::run_validate(args, &ctx),
        Commands::Version => {
            println!("amortiza {}", env!("CARGO_PKG_VERSION"));
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
