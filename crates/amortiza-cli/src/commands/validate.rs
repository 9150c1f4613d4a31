use std::time::Instant;

use clap::Args;
use serde_json::{json, Value};

use amortiza_core::validation::{validate_loan, Severity};
use amortiza_core::with_metadata;

use super::{Context, LoanArgs};

/// Arguments for input validation
#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub loan: LoanArgs,
}

pub fn run_validate(
    args: ValidateArgs,
    ctx: &Context,
) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let raw = args.loan.raw_input()?;

    let mut warnings = Vec::new();
    let result = match validate_loan(&raw, &ctx.config.policy) {
        Ok(request) => json!({
            "valid": true,
            "principal": request.principal(),
            "installments": request.installments(),
            "bank": request.bank(),
            "system": request.system(),
        }),
        Err(e) => {
            if e.severity() == Severity::Warning {
                warnings.push(e.to_string());
            }
            json!({
                "valid": false,
                "field": e.field(),
                "title": e.title(),
                "message": e.to_string(),
                "severity": e.severity(),
            })
        }
    };

    let assumptions = json!({
        "max_principal": ctx.config.policy.max_principal,
        "min_installments": ctx.config.policy.min_installments,
        "max_installments": ctx.config.policy.max_installments,
    });
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(serde_json::to_value(with_metadata(
        "Loan input validation",
        &assumptions,
        warnings,
        elapsed,
        result,
    ))?)
}
