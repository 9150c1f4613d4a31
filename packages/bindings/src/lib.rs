//! Node bindings for a browser/Electron front-end that draws the dashboard
//! itself and only needs the validation, metrics and comparison logic.
//! Every function takes and returns JSON strings.

use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use amortiza_core::client::decode_response;
use amortiza_core::config::LoanPolicy;
use amortiza_core::metrics::{derive_metrics, MetricsInput, RateConvention};
use amortiza_core::presentation::{ComparisonView, DashboardView};
use amortiza_core::validation::{validate_loan, RawLoanInput};
use amortiza_core::LoanResult;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

#[derive(Deserialize)]
struct ValidateInput {
    #[serde(flatten)]
    loan: RawLoanInput,
    #[serde(default)]
    policy: LoanPolicy,
}

/// A loan as typed plus the backend's JSON body for it.
#[derive(Deserialize)]
struct QuotedLoan {
    #[serde(flatten)]
    loan: RawLoanInput,
    response: serde_json::Value,
}

#[derive(Deserialize)]
struct DashboardInput {
    #[serde(flatten)]
    quote: QuotedLoan,
    #[serde(default)]
    convention: RateConvention,
    #[serde(default)]
    policy: LoanPolicy,
}

#[derive(Deserialize)]
struct CompareInput {
    primary: QuotedLoan,
    comparison: QuotedLoan,
    #[serde(default)]
    convention: RateConvention,
    #[serde(default)]
    policy: LoanPolicy,
}

fn quoted_result(quote: &QuotedLoan, policy: &LoanPolicy) -> NapiResult<LoanResult> {
    let request = validate_loan(&quote.loan, policy).map_err(to_napi_error)?;
    let body = serde_json::to_string(&quote.response).map_err(to_napi_error)?;
    decode_response(200, &body, &request).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[napi]
pub fn validate_loan_input(input_json: String) -> NapiResult<String> {
    let input: ValidateInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = match validate_loan(&input.loan, &input.policy) {
        Ok(request) => serde_json::json!({ "valid": true, "request": request }),
        Err(e) => serde_json::json!({
            "valid": false,
            "field": e.field(),
            "title": e.title(),
            "message": e.to_string(),
            "severity": e.severity(),
        }),
    };
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[napi]
pub fn loan_metrics(input_json: String, convention: Option<String>) -> NapiResult<String> {
    let input: MetricsInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let convention: RateConvention = match convention {
        Some(name) => {
            serde_json::from_value(serde_json::Value::String(name)).map_err(to_napi_error)?
        }
        None => RateConvention::default(),
    };
    let output = derive_metrics(&input, convention).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[napi]
pub fn build_dashboard(input_json: String) -> NapiResult<String> {
    let input: DashboardInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let result = quoted_result(&input.quote, &input.policy)?;
    let view = DashboardView::build(&result, input.convention).map_err(to_napi_error)?;
    serde_json::to_string(&view).map_err(to_napi_error)
}

#[napi]
pub fn compare_banks(input_json: String) -> NapiResult<String> {
    let input: CompareInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let primary = quoted_result(&input.primary, &input.policy)?;
    let comparison = quoted_result(&input.comparison, &input.policy)?;
    let view =
        ComparisonView::build(&primary, &comparison, input.convention).map_err(to_napi_error)?;
    serde_json::to_string(&view).map_err(to_napi_error)
}
