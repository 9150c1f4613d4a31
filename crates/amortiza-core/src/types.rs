use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::checked;
use crate::CoreResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates as the lending side quotes them: percentages (60 = 60%).
pub type Percent = Decimal;

/// How the backend spreads principal across installments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmortizationSystem {
    /// Constant installment, shifting interest/principal split.
    #[default]
    French,
    /// Constant principal portion, declining installment.
    German,
}

impl AmortizationSystem {
    /// Name understood by the calculation backend.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::French => "frances",
            Self::German => "aleman",
        }
    }
}

impl std::fmt::Display for AmortizationSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::French => "French",
            Self::German => "German",
        };
        write!(f, "{}", s)
    }
}

/// A validated loan request. Only `validation::validate_loan` builds one from
/// user input; once built it is never mutated, only derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanRequest {
    principal: Money,
    installments: u32,
    bank: String,
    system: AmortizationSystem,
}

impl LoanRequest {
    pub(crate) fn new(
        principal: Money,
        installments: u32,
        bank: String,
        system: AmortizationSystem,
    ) -> Self {
        Self {
            principal,
            installments,
            bank,
            system,
        }
    }

    pub fn principal(&self) -> Money {
        self.principal
    }

    pub fn installments(&self) -> u32 {
        self.installments
    }

    pub fn bank(&self) -> &str {
        &self.bank
    }

    pub fn system(&self) -> AmortizationSystem {
        self.system
    }

    /// Same terms, quoted by another bank.
    pub fn for_bank(&self, bank: &str) -> Self {
        Self {
            bank: bank.trim().to_string(),
            ..self.clone()
        }
    }

    /// Same terms under another amortization system.
    pub fn with_system(&self, system: AmortizationSystem) -> Self {
        Self {
            system,
            ..self.clone()
        }
    }

    /// Whether two requests describe the same principal and term.
    pub fn same_terms(&self, other: &LoanRequest) -> bool {
        self.principal == other.principal && self.installments == other.installments
    }
}

/// One installment of a schedule as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub installment: u32,
    pub payment: Money,
    pub interest: Money,
    pub principal_portion: Money,
    pub balance: Money,
}

/// A schedule computed by the backend for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanResult {
    request: LoanRequest,
    /// TNA, percent.
    nominal_annual_rate: Percent,
    schedule: Vec<ScheduleRow>,
    /// TEA as supplied by the backend, when it supplies one.
    effective_annual_rate: Option<Percent>,
    /// CFTEA as supplied by the backend, when it supplies one.
    financial_cost_effective: Option<Percent>,
}

impl LoanResult {
    pub fn new(
        request: LoanRequest,
        nominal_annual_rate: Percent,
        schedule: Vec<ScheduleRow>,
        effective_annual_rate: Option<Percent>,
        financial_cost_effective: Option<Percent>,
    ) -> Self {
        Self {
            request,
            nominal_annual_rate,
            schedule,
            effective_annual_rate,
            financial_cost_effective,
        }
    }

    pub fn request(&self) -> &LoanRequest {
        &self.request
    }

    pub fn bank(&self) -> &str {
        self.request.bank()
    }

    pub fn nominal_annual_rate(&self) -> Percent {
        self.nominal_annual_rate
    }

    pub fn schedule(&self) -> &[ScheduleRow] {
        &self.schedule
    }

    pub fn effective_annual_rate(&self) -> Option<Percent> {
        self.effective_annual_rate
    }

    pub fn financial_cost_effective(&self) -> Option<Percent> {
        self.financial_cost_effective
    }

    pub fn total_paid(&self) -> CoreResult<Money> {
        self.sum_of(|r| r.payment, "total paid")
    }

    pub fn total_interest(&self) -> CoreResult<Money> {
        self.sum_of(|r| r.interest, "total interest")
    }

    pub fn total_principal(&self) -> CoreResult<Money> {
        self.sum_of(|r| r.principal_portion, "total principal")
    }

    /// Payment of the first installment, zero for an empty schedule.
    pub fn first_installment(&self) -> Money {
        self.schedule
            .first()
            .map(|r| r.payment)
            .unwrap_or(Decimal::ZERO)
    }

    /// |Σ payment − (Σ interest + Σ principal)|. Non-zero only through
    /// per-row rounding on the backend side.
    pub fn reconciliation_gap(&self) -> CoreResult<Money> {
        let parts = checked(
            self.total_interest()?.checked_add(self.total_principal()?),
            "reconciliation",
        )?;
        Ok(checked(self.total_paid()?.checked_sub(parts), "reconciliation")?.abs())
    }

    fn sum_of(&self, field: impl Fn(&ScheduleRow) -> Money, context: &str) -> CoreResult<Money> {
        self.schedule.iter().try_fold(Decimal::ZERO, |acc, row| {
            checked(acc.checked_add(field(row)), context)
        })
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;
    use rust_decimal_macros::dec;

    fn row(
        n: u32,
        payment: Money,
        interest: Money,
        principal: Money,
        balance: Money,
    ) -> ScheduleRow {
        ScheduleRow {
            installment: n,
            payment,
            interest,
            principal_portion: principal,
            balance,
        }
    }

    fn sample() -> LoanResult {
        let request = LoanRequest::new(dec!(1000), 2, "Nacion".into(), AmortizationSystem::German);
        LoanResult::new(
            request,
            dec!(60),
            vec![
                row(1, dec!(550), dec!(50), dec!(500), dec!(500)),
                row(2, dec!(525), dec!(25), dec!(500), dec!(0)),
            ],
            None,
            None,
        )
    }

    #[test]
    fn test_totals_sum_schedule() {
        let r = sample();
        assert_eq!(r.total_paid().unwrap(), dec!(1075));
        assert_eq!(r.total_interest().unwrap(), dec!(75));
        assert_eq!(r.total_principal().unwrap(), dec!(1000));
        assert_eq!(r.first_installment(), dec!(550));
        assert_eq!(r.reconciliation_gap().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_totals_report_overflow() {
        let request = LoanRequest::new(dec!(1000), 2, "Nacion".into(), AmortizationSystem::French);
        let r = LoanResult::new(
            request,
            dec!(60),
            vec![
                row(1, Decimal::MAX, dec!(0), Decimal::MAX, dec!(0)),
                row(2, Decimal::MAX, dec!(0), Decimal::MAX, dec!(0)),
            ],
            None,
            None,
        );
        assert!(matches!(r.total_paid(), Err(CoreError::Overflow { .. })));
        assert!(r.reconciliation_gap().is_err());
    }

    #[test]
    fn test_empty_schedule_first_installment_is_zero() {
        let request = LoanRequest::new(dec!(1000), 2, "Nacion".into(), AmortizationSystem::French);
        let r = LoanResult::new(request, dec!(60), vec![], None, None);
        assert_eq!(r.first_installment(), Decimal::ZERO);
    }

    #[test]
    fn test_for_bank_keeps_terms() {
        let r = sample();
        let other = r.request().for_bank("  Galicia ");
        assert_eq!(other.bank(), "Galicia");
        assert!(other.same_terms(r.request()));
        assert_eq!(other.system(), AmortizationSystem::German);
    }

    #[test]
    fn test_system_wire_names() {
        assert_eq!(AmortizationSystem::French.wire_name(), "frances");
        assert_eq!(AmortizationSystem::German.wire_name(), "aleman");
    }
}
