use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;

use amortiza_core::export::export_workbook;
use amortiza_core::presentation::{ComparisonView, DashboardView};
use amortiza_core::with_metadata;

use super::{with_manual_retry, Context, LoanArgs};

/// Arguments for the loan dashboard
#[derive(Args)]
pub struct CalculateArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// Also quote the loan at this bank
    #[arg(long)]
    pub compare_with: Option<String>,

    /// Saved backend response for the main bank (skips the network)
    #[arg(long)]
    pub response: Option<String>,

    /// Saved backend response for the comparison bank
    #[arg(long, requires = "response")]
    pub compare_response: Option<String>,

    /// Write the schedule and summary to this .xlsx file
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Serialize)]
struct CalculateOutput {
    #[serde(flatten)]
    dashboard: DashboardView,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<ComparisonView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exported_to: Option<String>,
}

pub fn run_calculate(
    args: CalculateArgs,
    ctx: &Context,
) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let raw = args.loan.raw_input()?;

    let mut saved = Vec::new();
    if let Some(path) = args.response {
        saved.push((raw.bank.trim().to_string(), path));
    }
    if let (Some(bank), Some(path)) = (&args.compare_with, args.compare_response) {
        saved.push((bank.trim().to_string(), path));
    }
    let mut dashboard = ctx.dashboard(saved)?;

    let outcome = dashboard.calculate(&raw).map(|_| ());
    with_manual_retry(&mut dashboard, outcome)?;

    let mut warnings = Vec::new();
    if let Some(ref bank) = args.compare_with {
        let outcome = dashboard.compare_with(bank).map(|_| ());
        if let Err(e) = with_manual_retry(&mut dashboard, outcome) {
            log::warn!("comparison with {} failed: {}", bank, e);
            warnings.push(format!("Comparison with {bank} unavailable: {e}"));
        }
    }

    let session = dashboard.session();
    let primary = session.primary().ok_or("no loan was calculated")?;
    let view = DashboardView::build(primary, ctx.convention())?;
    let comparison = match session.comparison() {
        Some(other) => Some(
            ComparisonView::build(primary, other, ctx.convention())?
                .stale(session.is_comparison_stale()),
        ),
        None => None,
    };

    let exported_to = match args.export {
        Some(ref path) => {
            export_workbook(&view, path)?;
            Some(path.display().to_string())
        }
        None => None,
    };

    warnings.extend(view.warnings.iter().cloned());
    let assumptions = serde_json::json!({
        "rate_convention": ctx.convention(),
        "endpoint": ctx.config.service.endpoint,
        "max_installments": ctx.config.policy.max_installments,
    });
    let output = CalculateOutput {
        dashboard: view,
        comparison,
        exported_to,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(serde_json::to_value(with_metadata(
        "Backend amortization schedule with locally derived rates",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))?)
}
