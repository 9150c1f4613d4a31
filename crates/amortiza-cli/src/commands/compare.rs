use clap::Args;
use serde_json::Value;
use std::time::Instant;

use amortiza_core::presentation::ComparisonView;
use amortiza_core::with_metadata;

use super::{with_manual_retry, Context, LoanArgs};

/// Arguments for a two-bank comparison
#[derive(Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// Bank to compare the main quote against
    #[arg(long)]
    pub against: String,

    /// Saved backend response for the main bank (skips the network)
    #[arg(long, requires = "against_response")]
    pub response: Option<String>,

    /// Saved backend response for the comparison bank
    #[arg(long, requires = "response")]
    pub against_response: Option<String>,
}

pub fn run_compare(args: CompareArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let raw = args.loan.raw_input()?;

    let mut saved = Vec::new();
    if let (Some(primary), Some(other)) = (args.response, args.against_response) {
        saved.push((raw.bank.trim().to_string(), primary));
        saved.push((args.against.trim().to_string(), other));
    }
    let mut dashboard = ctx.dashboard(saved)?;

    let outcome = dashboard.calculate(&raw).map(|_| ());
    with_manual_retry(&mut dashboard, outcome)?;
    let outcome = dashboard.compare_with(&args.against).map(|_| ());
    with_manual_retry(&mut dashboard, outcome)?;

    let session = dashboard.session();
    let (primary, other) = match (session.primary(), session.comparison()) {
        (Some(p), Some(c)) => (p, c),
        _ => return Err("comparison was not computed".into()),
    };
    let view = ComparisonView::build(primary, other, ctx.convention())?;

    let assumptions = serde_json::json!({
        "rate_convention": ctx.convention(),
        "difference": "comparison - primary",
        "verdict_basis": "total paid",
    });
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(serde_json::to_value(with_metadata(
        "Side-by-side bank comparison",
        &assumptions,
        Vec::new(),
        elapsed,
        view,
    ))?)
}
