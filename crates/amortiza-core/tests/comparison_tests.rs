use amortiza_core::client::{CalculationService, ReplayService};
use amortiza_core::comparison::{compare, ComparedField, Outcome, Verdict};
use amortiza_core::config::LoanPolicy;
use amortiza_core::metrics::{MetricSource, RateConvention};
use amortiza_core::validation::{validate_loan, RawLoanInput};
use amortiza_core::{AmortizationSystem, CoreError, LoanResult};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures: two banks quoting 120,000 over 3 installments (German system)
// ===========================================================================

const NACION: &str = r#"{
    "TNA": 60,
    "Tabla": [
        {"Cuota": 1, "Cuota_total": 46000, "Interes": 6000, "Amortizacion": 40000, "Saldo": 80000},
        {"Cuota": 2, "Cuota_total": 44000, "Interes": 4000, "Amortizacion": 40000, "Saldo": 40000},
        {"Cuota": 3, "Cuota_total": 42000, "Interes": 2000, "Amortizacion": 40000, "Saldo": 0}
    ]
}"#;

const GALICIA: &str = r#"{
    "TNA": 72,
    "Tabla": [
        {"Cuota": 1, "Cuota_total": 47200, "Interes": 7200, "Amortizacion": 40000, "Saldo": 80000},
        {"Cuota": 2, "Cuota_total": 44800, "Interes": 4800, "Amortizacion": 40000, "Saldo": 40000},
        {"Cuota": 3, "Cuota_total": 42400, "Interes": 2400, "Amortizacion": 40000, "Saldo": 0}
    ],
    "TEA": 101.22,
    "CFTEA": 120.5
}"#;

fn quote(bank: &str, principal: &str, installments: &str) -> LoanResult {
    let service = ReplayService::new()
        .with_response("Nacion", NACION)
        .with_response("Galicia", GALICIA);
    let request = validate_loan(
        &RawLoanInput::new(principal, installments, bank, AmortizationSystem::German),
        &LoanPolicy::default(),
    )
    .unwrap();
    service.calculate(&request).unwrap()
}

#[test]
fn test_schedule_reconciles() {
    for bank in ["Nacion", "Galicia"] {
        let r = quote(bank, "120000", "3");
        let parts = r.total_interest().unwrap() + r.total_principal().unwrap();
        assert_eq!(parts, r.total_paid().unwrap());
        assert_eq!(r.reconciliation_gap().unwrap(), Decimal::ZERO);
    }
}

#[test]
fn test_differences_are_comparison_minus_primary() {
    let nacion = quote("Nacion", "120000", "3");
    let galicia = quote("Galicia", "120000", "3");
    let report = compare(&nacion, &galicia, RateConvention::Compounding).unwrap();

    let total = report.diff(ComparedField::TotalPaid).unwrap();
    assert_eq!(total.primary, dec!(132000));
    assert_eq!(total.comparison, dec!(134400));
    assert_eq!(total.difference, dec!(2400));
    assert_eq!(total.outcome, Outcome::Unfavorable);

    let interest = report.diff(ComparedField::TotalInterest).unwrap();
    assert_eq!(interest.difference, dec!(2400));

    let first = report.diff(ComparedField::FirstInstallment).unwrap();
    assert_eq!(first.difference, dec!(1200));

    let tna = report.diff(ComparedField::NominalAnnualRate).unwrap();
    assert_eq!(tna.difference, dec!(12));

    // CFT = 12000 vs 14400
    let cft = report.diff(ComparedField::TotalFinancialCost).unwrap();
    assert_eq!(cft.primary, dec!(12000));
    assert_eq!(cft.difference, dec!(2400));

    // CFTNA = CFT / principal * 12/3 * 100 -> 40 vs 48
    let cftna = report.diff(ComparedField::NominalAnnualFinancialCost).unwrap();
    assert_eq!(cftna.primary, dec!(40));
    assert_eq!(cftna.comparison, dec!(48));
}

#[test]
fn test_backend_figures_flow_into_comparison() {
    let nacion = quote("Nacion", "120000", "3");
    let galicia = quote("Galicia", "120000", "3");
    let report = compare(&nacion, &galicia, RateConvention::Compounding).unwrap();

    assert_eq!(report.primary_metrics.tea_source, MetricSource::Computed);
    assert_eq!(report.comparison_metrics.tea_source, MetricSource::Backend);
    assert_eq!(report.comparison_metrics.annual_effective_rate, dec!(101.22));

    let cftea = report.diff(ComparedField::EffectiveAnnualFinancialCost).unwrap();
    assert_eq!(cftea.primary, dec!(40));
    assert_eq!(cftea.comparison, dec!(120.5));
}

#[test]
fn test_cftea_left_out_when_unavailable() {
    let nacion = quote("Nacion", "120000", "3");
    let galicia = quote("Galicia", "120000", "3");
    // Simple convention leaves Nacion's CFTEA unavailable.
    let report = compare(&nacion, &galicia, RateConvention::Simple).unwrap();
    assert!(report.diff(ComparedField::EffectiveAnnualFinancialCost).is_none());
    assert_eq!(report.differences.len(), 8);
}

#[test]
fn test_verdict() {
    let nacion = quote("Nacion", "120000", "3");
    let galicia = quote("Galicia", "120000", "3");

    let report = compare(&nacion, &galicia, RateConvention::Compounding).unwrap();
    assert_eq!(report.verdict, Verdict::PrimaryCheaper { savings: dec!(2400) });
    assert_eq!(
        report.recommendation(),
        "Choosing Nacion saves $ 2.400 compared with Galicia"
    );

    let reversed = compare(&galicia, &nacion, RateConvention::Compounding).unwrap();
    assert_eq!(reversed.verdict, Verdict::ComparisonCheaper { savings: dec!(2400) });
    assert_eq!(
        reversed.recommendation(),
        "Choosing Nacion saves $ 2.400 compared with Galicia"
    );
}

#[test]
fn test_equal_cost() {
    let a = quote("Nacion", "120000", "3");
    let b = quote("Nacion", "120000", "3");
    let report = compare(&a, &b, RateConvention::Compounding).unwrap();
    assert_eq!(report.verdict, Verdict::EqualCost);
    assert!(report.differences.iter().all(|d| d.outcome == Outcome::Even));
}

#[test]
fn test_differences_are_antisymmetric() {
    let nacion = quote("Nacion", "120000", "3");
    let galicia = quote("Galicia", "120000", "3");
    for convention in [RateConvention::Compounding, RateConvention::Simple] {
        let ab = compare(&nacion, &galicia, convention).unwrap();
        let ba = compare(&galicia, &nacion, convention).unwrap();
        assert_eq!(ab.differences.len(), ba.differences.len());
        for (x, y) in ab.differences.iter().zip(&ba.differences) {
            assert_eq!(x.field, y.field);
            assert_eq!(x.difference, -y.difference, "{:?}", x.field);
            let flipped = match x.outcome {
                Outcome::Favorable => Outcome::Unfavorable,
                Outcome::Unfavorable => Outcome::Favorable,
                Outcome::Even => Outcome::Even,
            };
            assert_eq!(y.outcome, flipped);
        }
    }
}

#[test]
fn test_terms_must_match() {
    let nacion = quote("Nacion", "120000", "3");
    let galicia = quote("Galicia", "120000", "4");
    let err = compare(&nacion, &galicia, RateConvention::Compounding).unwrap_err();
    assert!(matches!(err, CoreError::TermsMismatch(_)));

    let galicia = quote("Galicia", "150000", "3");
    assert!(compare(&nacion, &galicia, RateConvention::Compounding).is_err());
}
