use std::cell::Cell;

use serde::Serialize;
use thiserror::Error;

use crate::client::{CalculationService, ServiceError};
use crate::comparison::{compare, ComparisonReport};
use crate::config::LoanPolicy;
use crate::metrics::RateConvention;
use crate::validation::{validate_loan, RawLoanInput, ValidationError};
use crate::{AmortizationSystem, CoreResult, LoanRequest, LoanResult};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Calculate the main loan first")]
    NoPrimary,

    #[error("Choose a bank to compare with")]
    BankMissing,

    #[error("Choose a bank other than {0}")]
    SameBank(String),

    #[error("There is no failed request to retry")]
    NothingToRetry,
}

impl DashboardError {
    /// Network and service failures can be retried by hand.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Service(e) if e.is_retryable())
    }
}

/// What the user is looking at: a primary result and, optionally, a second
/// bank's quote for the same terms.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    primary: Option<LoanResult>,
    comparison: Option<LoanResult>,
    comparison_stale: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary(&self) -> Option<&LoanResult> {
        self.primary.as_ref()
    }

    pub fn comparison(&self) -> Option<&LoanResult> {
        self.comparison.as_ref()
    }

    /// The comparison was quoted for terms the primary no longer has.
    pub fn is_comparison_stale(&self) -> bool {
        self.comparison_stale
    }

    pub fn set_primary(&mut self, result: LoanResult) -> &LoanResult {
        self.primary.insert(result)
    }

    pub fn set_comparison(&mut self, result: LoanResult) -> Result<&LoanResult, DashboardError> {
        if self.primary.is_none() {
            return Err(DashboardError::NoPrimary);
        }
        self.comparison_stale = false;
        Ok(self.comparison.insert(result))
    }

    pub fn mark_comparison_stale(&mut self) {
        if self.comparison.is_some() {
            self.comparison_stale = true;
        }
    }

    pub fn clear_comparison(&mut self) {
        self.comparison = None;
        self.comparison_stale = false;
    }

    /// Drops the primary and, with it, any comparison.
    pub fn clear_primary(&mut self) {
        self.primary = None;
        self.clear_comparison();
    }

    /// Report for the live pair, if there is one.
    pub fn comparison_report(
        &self,
        convention: RateConvention,
    ) -> Option<CoreResult<ComparisonReport>> {
        match (&self.primary, &self.comparison) {
            (Some(p), Some(c)) => Some(compare(p, c, convention)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum PendingRequest {
    Primary(LoanRequest),
    Comparison(LoanRequest),
}

/// Clears the loading flag however the exchange ends.
struct BusyGuard<'a>(&'a Cell<bool>);

impl<'a> BusyGuard<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Handlers for the dashboard actions: calculate, compare, change system,
/// retry. Each action runs at most one exchange with the service at a time.
pub struct Dashboard<S: CalculationService> {
    service: S,
    policy: LoanPolicy,
    convention: RateConvention,
    session: Session,
    busy: Cell<bool>,
    pending: Option<PendingRequest>,
}

impl<S: CalculationService> Dashboard<S> {
    pub fn new(service: S, policy: LoanPolicy, convention: RateConvention) -> Self {
        Self {
            service,
            policy,
            convention,
            session: Session::new(),
            busy: Cell::new(false),
            pending: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn convention(&self) -> RateConvention {
        self.convention
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    /// A request is in flight.
    pub fn busy(&self) -> bool {
        self.busy.get()
    }

    /// Whether `retry` has something to re-send.
    pub fn can_retry(&self) -> bool {
        self.pending.is_some()
    }

    /// Validate, fetch and install a new primary result.
    pub fn calculate(&mut self, raw: &RawLoanInput) -> Result<&LoanResult, DashboardError> {
        let request = validate_loan(raw, &self.policy)?;
        self.run_primary(request)
    }

    /// Fetch the same terms from `bank` and install it as the comparison.
    pub fn compare_with(&mut self, bank: &str) -> Result<&LoanResult, DashboardError> {
        let primary = self.session.primary().ok_or(DashboardError::NoPrimary)?;
        let bank = bank.trim();
        if bank.is_empty() {
            return Err(DashboardError::BankMissing);
        }
        if bank.eq_ignore_ascii_case(primary.bank()) {
            return Err(DashboardError::SameBank(primary.bank().to_string()));
        }
        let request = primary.request().for_bank(bank);
        self.run_comparison(request)
    }

    /// Re-quote the primary (and comparison) under another system.
    pub fn change_system(
        &mut self,
        system: AmortizationSystem,
    ) -> Result<&LoanResult, DashboardError> {
        let primary = self.session.primary().ok_or(DashboardError::NoPrimary)?;
        let request = primary.request().with_system(system);
        self.run_primary(request)
    }

    /// Re-send the last request that failed at the service level.
    pub fn retry(&mut self) -> Result<&LoanResult, DashboardError> {
        match self.pending.take() {
            None => Err(DashboardError::NothingToRetry),
            Some(PendingRequest::Primary(request)) => {
                log::info!("retrying calculation for {}", request.bank());
                self.run_primary(request)
            }
            Some(PendingRequest::Comparison(request)) => {
                log::info!("retrying comparison with {}", request.bank());
                self.run_comparison(request)
            }
        }
    }

    pub fn clear_comparison(&mut self) {
        self.session.clear_comparison();
    }

    pub fn clear_primary(&mut self) {
        self.session.clear_primary();
        self.pending = None;
    }

    pub fn comparison_report(&self) -> Option<CoreResult<ComparisonReport>> {
        self.session.comparison_report(self.convention)
    }

    fn exchange(&self, request: &LoanRequest) -> Result<LoanResult, ServiceError> {
        let _busy = BusyGuard::raise(&self.busy);
        self.service.calculate(request)
    }

    fn run_primary(&mut self, request: LoanRequest) -> Result<&LoanResult, DashboardError> {
        let result = match self.exchange(&request) {
            Ok(result) => result,
            Err(e) => {
                self.remember_failure(&e, PendingRequest::Primary(request));
                return Err(e.into());
            }
        };
        self.pending = None;
        self.refresh_comparison(&request);
        Ok(self.session.set_primary(result))
    }

    fn run_comparison(&mut self, request: LoanRequest) -> Result<&LoanResult, DashboardError> {
        if self.session.primary().is_none() {
            return Err(DashboardError::NoPrimary);
        }
        match self.exchange(&request) {
            Ok(result) => {
                self.pending = None;
                self.session.set_comparison(result)
            }
            Err(e) => {
                self.remember_failure(&e, PendingRequest::Comparison(request));
                Err(e.into())
            }
        }
    }

    /// Re-quote a live comparison for the new primary terms. Failure keeps
    /// the previous comparison, flagged stale.
    fn refresh_comparison(&mut self, primary: &LoanRequest) {
        let Some(current) = self.session.comparison() else {
            return;
        };
        if current.bank().eq_ignore_ascii_case(primary.bank()) {
            log::info!(
                "dropping comparison: {} is now the primary bank",
                current.bank()
            );
            self.session.clear_comparison();
            return;
        }
        let request = primary.for_bank(current.bank());
        match self.exchange(&request) {
            Ok(result) => {
                self.session.comparison = Some(result);
                self.session.comparison_stale = false;
            }
            Err(e) => {
                log::warn!(
                    "could not refresh comparison with {}: {}",
                    request.bank(),
                    e
                );
                self.session.mark_comparison_stale();
            }
        }
    }

    fn remember_failure(&mut self, error: &ServiceError, request: PendingRequest) {
        self.pending = error.is_retryable().then_some(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScheduleRow;
    use rust_decimal_macros::dec;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Answers from a script; an exhausted script answers with a timeout.
    struct Scripted {
        answers: RefCell<VecDeque<Result<rust_decimal::Decimal, ServiceError>>>,
        seen: RefCell<Vec<LoanRequest>>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<rust_decimal::Decimal, ServiceError>>) -> Self {
            Self {
                answers: RefCell::new(answers.into()),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl CalculationService for Scripted {
        fn calculate(&self, request: &LoanRequest) -> Result<LoanResult, ServiceError> {
            self.seen.borrow_mut().push(request.clone());
            let tna = self
                .answers
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(ServiceError::Timeout))?;
            let interest = request.principal() * tna / dec!(1200);
            Ok(LoanResult::new(
                request.clone(),
                tna,
                vec![ScheduleRow {
                    installment: 1,
                    payment: request.principal() + interest,
                    interest,
                    principal_portion: request.principal(),
                    balance: dec!(0),
                }],
                None,
                None,
            ))
        }
    }

    fn raw(bank: &str) -> RawLoanInput {
        RawLoanInput::new("1000", "1", bank, AmortizationSystem::French)
    }

    fn dashboard(answers: Vec<Result<rust_decimal::Decimal, ServiceError>>) -> Dashboard<Scripted> {
        Dashboard::new(Scripted::new(answers), LoanPolicy::default(), RateConvention::Compounding)
    }

    #[test]
    fn test_validation_failure_never_calls_service() {
        let mut d = dashboard(vec![Ok(dec!(60))]);
        let err = d.calculate(&raw("")).unwrap_err();
        assert_eq!(err, DashboardError::Validation(ValidationError::BankMissing));
        assert!(d.service.seen.borrow().is_empty());
        assert!(!d.can_retry());
    }

    #[test]
    fn test_calculate_installs_primary() {
        let mut d = dashboard(vec![Ok(dec!(60))]);
        let r = d.calculate(&raw("Nacion")).unwrap();
        assert_eq!(r.nominal_annual_rate(), dec!(60));
        assert!(d.session().primary().is_some());
        assert!(!d.busy());
    }

    #[test]
    fn test_failure_keeps_previous_state_and_offers_retry() {
        let mut d = dashboard(vec![Ok(dec!(60)), Err(ServiceError::Status(502)), Ok(dec!(40))]);
        d.calculate(&raw("Nacion")).unwrap();
        let err = d.calculate(&raw("Galicia")).unwrap_err();
        assert!(err.is_retryable());
        assert!(!d.busy());
        assert_eq!(d.session().primary().unwrap().bank(), "Nacion");
        assert!(d.can_retry());

        let r = d.retry().unwrap();
        assert_eq!(r.bank(), "Galicia");
        assert_eq!(r.nominal_annual_rate(), dec!(40));
        assert!(!d.can_retry());
        assert_eq!(d.retry().unwrap_err(), DashboardError::NothingToRetry);
    }

    #[test]
    fn test_application_error_is_not_retryable() {
        let mut d = dashboard(vec![Err(ServiceError::Application("Banco inexistente".into()))]);
        let err = d.calculate(&raw("Nacion")).unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Banco inexistente");
        assert!(!d.can_retry());
    }

    #[test]
    fn test_compare_preconditions() {
        let mut d = dashboard(vec![Ok(dec!(60))]);
        assert_eq!(d.compare_with("Galicia").unwrap_err(), DashboardError::NoPrimary);
        d.calculate(&raw("Nacion")).unwrap();
        assert_eq!(d.compare_with("  ").unwrap_err(), DashboardError::BankMissing);
        assert_eq!(
            d.compare_with("nacion").unwrap_err(),
            DashboardError::SameBank("Nacion".into())
        );
    }

    #[test]
    fn test_compare_reuses_primary_terms() {
        let mut d = dashboard(vec![Ok(dec!(60)), Ok(dec!(48))]);
        d.calculate(&raw("Nacion")).unwrap();
        let c = d.compare_with("Galicia").unwrap();
        assert_eq!(c.bank(), "Galicia");
        assert_eq!(c.request().principal(), dec!(1000));
        let report = d.comparison_report().unwrap().unwrap();
        assert_eq!(report.comparison_bank, "Galicia");
    }

    #[test]
    fn test_recalculate_refreshes_comparison() {
        let mut d = dashboard(vec![Ok(dec!(60)), Ok(dec!(48)), Ok(dec!(50)), Ok(dec!(45))]);
        d.calculate(&raw("Nacion")).unwrap();
        d.compare_with("Galicia").unwrap();
        d.calculate(&RawLoanInput::new("2000", "1", "Nacion", AmortizationSystem::French))
            .unwrap();
        let c = d.session().comparison().unwrap();
        assert_eq!(c.request().principal(), dec!(2000));
        assert_eq!(c.nominal_annual_rate(), dec!(45));
        assert!(!d.session().is_comparison_stale());
    }

    #[test]
    fn test_failed_refresh_leaves_stale_comparison() {
        // third answer missing: the refresh times out
        let mut d = dashboard(vec![Ok(dec!(60)), Ok(dec!(48)), Ok(dec!(50))]);
        d.calculate(&raw("Nacion")).unwrap();
        d.compare_with("Galicia").unwrap();
        d.calculate(&RawLoanInput::new("2000", "1", "Nacion", AmortizationSystem::French))
            .unwrap();
        assert!(d.session().is_comparison_stale());
        assert_eq!(d.session().comparison().unwrap().request().principal(), dec!(1000));
        assert!(d.comparison_report().unwrap().is_err());
    }

    #[test]
    fn test_change_system_requotes() {
        let mut d = dashboard(vec![Ok(dec!(60)), Ok(dec!(62))]);
        assert_eq!(
            d.change_system(AmortizationSystem::German).unwrap_err(),
            DashboardError::NoPrimary
        );
        d.calculate(&raw("Nacion")).unwrap();
        let r = d.change_system(AmortizationSystem::German).unwrap();
        assert_eq!(r.request().system(), AmortizationSystem::German);
    }

    #[test]
    fn test_clearing_primary_clears_comparison() {
        let mut d = dashboard(vec![Ok(dec!(60)), Ok(dec!(48))]);
        d.calculate(&raw("Nacion")).unwrap();
        d.compare_with("Galicia").unwrap();
        d.clear_primary();
        assert!(d.session().primary().is_none());
        assert!(d.session().comparison().is_none());
        assert!(d.comparison_report().is_none());
    }

    #[test]
    fn test_session_rejects_comparison_without_primary() {
        let mut s = Session::new();
        let request =
            crate::validation::validate_loan(&raw("Nacion"), &LoanPolicy::default()).unwrap();
        let result = LoanResult::new(request, dec!(60), vec![], None, None);
        assert_eq!(s.set_comparison(result).unwrap_err(), DashboardError::NoPrimary);
    }
}
