use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::config::LoanPolicy;
use crate::{AmortizationSystem, LoanRequest, Money};

/// Loan parameters exactly as the user typed them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLoanInput {
    pub principal: String,
    pub installments: String,
    pub bank: String,
    #[serde(default)]
    pub system: AmortizationSystem,
}

impl RawLoanInput {
    pub fn new(
        principal: impl Into<String>,
        installments: impl Into<String>,
        bank: impl Into<String>,
        system: AmortizationSystem,
    ) -> Self {
        Self {
            principal: principal.into(),
            installments: installments.into(),
            bank: bank.into(),
            system,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Enter a numeric amount, e.g. 150000.")]
    PrincipalNotNumeric,

    #[error("The amount must be greater than 0.")]
    PrincipalNotPositive,

    #[error("The amount cannot exceed {max}.")]
    PrincipalAboveCeiling { max: Money },

    #[error("Enter a valid number of installments, e.g. 12.")]
    InstallmentsNotNumeric,

    #[error("The number of installments must be a whole number greater than 0.")]
    InstallmentsNotInteger,

    #[error("Enter at least {min} installments.")]
    TooFewInstallments { min: u32 },

    #[error("Enter {max} installments or fewer.")]
    TooManyInstallments { max: u32 },

    #[error("Please choose a bank.")]
    BankMissing,
}

impl ValidationError {
    /// Short heading for dialogs and error lines.
    pub fn title(&self) -> &'static str {
        match self {
            Self::PrincipalNotNumeric
            | Self::PrincipalNotPositive
            | Self::PrincipalAboveCeiling { .. } => "Invalid amount",
            Self::InstallmentsNotNumeric | Self::InstallmentsNotInteger => "Invalid installments",
            Self::TooFewInstallments { .. } => "Too few installments",
            Self::TooManyInstallments { .. } => "Too many installments",
            Self::BankMissing => "No bank selected",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::TooManyInstallments { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Name of the offending input field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::PrincipalNotNumeric
            | Self::PrincipalNotPositive
            | Self::PrincipalAboveCeiling { .. } => "principal",
            Self::InstallmentsNotNumeric
            | Self::InstallmentsNotInteger
            | Self::TooFewInstallments { .. }
            | Self::TooManyInstallments { .. } => "installments",
            Self::BankMissing => "bank",
        }
    }
}

/// Check raw input against the policy. The first failing rule wins; the
/// order is principal, installments, bank.
pub fn validate_loan(
    raw: &RawLoanInput,
    policy: &LoanPolicy,
) -> Result<LoanRequest, ValidationError> {
    let principal = parse_number(&raw.principal).ok_or(ValidationError::PrincipalNotNumeric)?;
    if principal <= Decimal::ZERO {
        return Err(ValidationError::PrincipalNotPositive);
    }
    if principal > policy.max_principal {
        return Err(ValidationError::PrincipalAboveCeiling {
            max: policy.max_principal,
        });
    }

    let installments =
        parse_number(&raw.installments).ok_or(ValidationError::InstallmentsNotNumeric)?;
    if !installments.fract().is_zero() || installments <= Decimal::ZERO {
        return Err(ValidationError::InstallmentsNotInteger);
    }
    // Anything beyond u32 is over any sane policy maximum anyway.
    let installments = installments.to_u32().unwrap_or(u32::MAX);
    if installments < policy.min_installments {
        return Err(ValidationError::TooFewInstallments {
            min: policy.min_installments,
        });
    }
    if installments > policy.max_installments {
        return Err(ValidationError::TooManyInstallments {
            max: policy.max_installments,
        });
    }

    let bank = raw.bank.trim();
    if bank.is_empty() {
        return Err(ValidationError::BankMissing);
    }

    Ok(LoanRequest::new(
        principal,
        installments,
        bank.to_string(),
        raw.system,
    ))
}

fn parse_number(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(principal: &str, installments: &str, bank: &str) -> RawLoanInput {
        RawLoanInput::new(principal, installments, bank, AmortizationSystem::French)
    }

    fn check(
        principal: &str,
        installments: &str,
        bank: &str,
    ) -> Result<LoanRequest, ValidationError> {
        validate_loan(&raw(principal, installments, bank), &LoanPolicy::default())
    }

    #[test]
    fn test_valid_request() {
        let req = check(" 150000 ", "12", " Nacion ").unwrap();
        assert_eq!(req.principal(), dec!(150000));
        assert_eq!(req.installments(), 12);
        assert_eq!(req.bank(), "Nacion");
        assert_eq!(req.system(), AmortizationSystem::French);
    }

    #[test]
    fn test_principal_rules() {
        assert_eq!(check("", "12", "Nacion"), Err(ValidationError::PrincipalNotNumeric));
        assert_eq!(check("abc", "12", "Nacion"), Err(ValidationError::PrincipalNotNumeric));
        assert_eq!(check("0", "12", "Nacion"), Err(ValidationError::PrincipalNotPositive));
        assert_eq!(check("-5", "12", "Nacion"), Err(ValidationError::PrincipalNotPositive));
        assert_eq!(
            check("50000000.01", "12", "Nacion"),
            Err(ValidationError::PrincipalAboveCeiling { max: dec!(50_000_000) })
        );
    }

    #[test]
    fn test_principal_at_ceiling_accepted() {
        assert!(check("50000000", "12", "Nacion").is_ok());
    }

    #[test]
    fn test_scientific_principal_accepted() {
        let req = check("1.5e5", "12", "Nacion").unwrap();
        assert_eq!(req.principal(), dec!(150000));
    }

    #[test]
    fn test_installment_rules() {
        assert_eq!(check("1000", " ", "Nacion"), Err(ValidationError::InstallmentsNotNumeric));
        assert_eq!(check("1000", "twelve", "Nacion"), Err(ValidationError::InstallmentsNotNumeric));
        assert_eq!(check("1000", "12.5", "Nacion"), Err(ValidationError::InstallmentsNotInteger));
        assert_eq!(check("1000", "0", "Nacion"), Err(ValidationError::InstallmentsNotInteger));
        assert_eq!(check("1000", "-3", "Nacion"), Err(ValidationError::InstallmentsNotInteger));
        assert_eq!(
            check("1000", "71", "Nacion"),
            Err(ValidationError::TooManyInstallments { max: 70 })
        );
        assert_eq!(
            check("1000", "99999999999", "Nacion"),
            Err(ValidationError::TooManyInstallments { max: 70 })
        );
    }

    #[test]
    fn test_installment_boundaries_accepted() {
        assert_eq!(check("1000", "1", "Nacion").unwrap().installments(), 1);
        assert_eq!(check("1000", "70", "Nacion").unwrap().installments(), 70);
        assert_eq!(check("1000", "12.0", "Nacion").unwrap().installments(), 12);
    }

    #[test]
    fn test_policy_minimum() {
        let policy = LoanPolicy {
            min_installments: 6,
            ..LoanPolicy::default()
        };
        let err = validate_loan(&raw("1000", "5", "Nacion"), &policy);
        assert_eq!(err, Err(ValidationError::TooFewInstallments { min: 6 }));
        assert!(validate_loan(&raw("1000", "6", "Nacion"), &policy).is_ok());
    }

    #[test]
    fn test_bank_required() {
        assert_eq!(check("1000", "12", ""), Err(ValidationError::BankMissing));
        assert_eq!(check("1000", "12", "   "), Err(ValidationError::BankMissing));
    }

    #[test]
    fn test_first_failure_wins() {
        assert_eq!(check("-1", "abc", ""), Err(ValidationError::PrincipalNotPositive));
        assert_eq!(check("1000", "abc", ""), Err(ValidationError::InstallmentsNotNumeric));
    }

    #[test]
    fn test_error_metadata() {
        let e = ValidationError::TooManyInstallments { max: 70 };
        assert_eq!(e.severity(), Severity::Warning);
        assert_eq!(e.field(), "installments");
        assert_eq!(e.to_string(), "Enter 70 installments or fewer.");
        assert_eq!(ValidationError::BankMissing.severity(), Severity::Error);
    }
}
