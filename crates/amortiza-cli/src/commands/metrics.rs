use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Instant;

use amortiza_core::metrics::{derive_metrics, MetricsInput};
use amortiza_core::with_metadata;

use super::Context;
use crate::input;

/// Arguments for deriving rates from known figures
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct MetricsArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Nominal annual rate, percent
    #[arg(long)]
    pub tna: Option<Decimal>,

    /// Amount borrowed
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Number of monthly installments
    #[arg(long)]
    pub installments: Option<u32>,

    /// Sum of all installments
    #[arg(long)]
    pub total_paid: Option<Decimal>,

    /// TEA published by the bank, percent
    #[arg(long)]
    pub tea: Option<Decimal>,

    /// CFTEA published by the bank, percent
    #[arg(long)]
    pub cftea: Option<Decimal>,
}

pub fn run_metrics(args: MetricsArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let metrics_input: MetricsInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        MetricsInput {
            nominal_annual_rate: args.tna.ok_or("--tna is required (or provide --input)")?,
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            installments: args
                .installments
                .ok_or("--installments is required (or provide --input)")?,
            total_paid: args
                .total_paid
                .ok_or("--total-paid is required (or provide --input)")?,
            backend_tea: args.tea,
            backend_cftea: args.cftea,
        }
    };

    let result = derive_metrics(&metrics_input, ctx.convention())?;

    let mut warnings = Vec::new();
    if result.tea_source.is_computed() {
        warnings.push("TEA computed from TNA; the bank did not publish one.".to_string());
    }
    if result.effective_annual_financial_cost.is_none() {
        warnings.push("CFTEA unavailable under the simple convention.".to_string());
    } else if result.cftea_source.is_computed() {
        warnings.push("CFTEA approximated as CFTNA compounded once a year.".to_string());
    }

    let assumptions = serde_json::json!({
        "rate_convention": ctx.convention(),
        "rates_in_percent": true,
        "cftna": "(CFT / principal) * (12 / installments) * 100",
    });
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(serde_json::to_value(with_metadata(
        "Derived loan rates and financial cost",
        &assumptions,
        warnings,
        elapsed,
        result,
    ))?)
}
