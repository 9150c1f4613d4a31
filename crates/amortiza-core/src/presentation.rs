//! Plain data for whatever draws the dashboard: KPI cards, metric cards,
//! the schedule table, chart series and the comparison summary.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::comparison::{compare, ComparedField, ComparisonReport, Outcome};
use crate::metrics::{metrics_for, DerivedMetrics, MetricSource, RateConvention};
use crate::{AmortizationSystem, CoreResult, LoanResult, Money, Percent, ScheduleRow};

/// Per-installment slack allowed between Σ payment and Σ (interest + principal).
const RECONCILIATION_TOLERANCE_PER_ROW: Decimal = dec!(0.01);

/// Appended to figures approximated locally instead of published by the bank.
pub const COMPUTED_MARKER: &str = "*";

#[derive(Debug, Clone, Serialize)]
pub struct Kpis {
    pub total_paid: Money,
    pub total_interest: Money,
    pub first_installment: Money,
    pub nominal_annual_rate: Percent,
}

impl Kpis {
    pub fn of(result: &LoanResult) -> CoreResult<Self> {
        Ok(Self {
            total_paid: result.total_paid()?,
            total_interest: result.total_interest()?,
            first_installment: result.first_installment(),
            nominal_annual_rate: result.nominal_annual_rate(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Doughnut,
    Bar,
    StackedBar,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub label: String,
    pub values: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub id: &'static str,
    pub title: &'static str,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

impl ChartSeries {
    fn new(id: &'static str, title: &'static str, kind: ChartKind, labels: Vec<String>) -> Self {
        Self {
            id,
            title,
            kind,
            labels,
            datasets: Vec::new(),
        }
    }

    fn dataset(mut self, label: &str, values: Vec<Decimal>) -> Self {
        self.datasets.push(Dataset {
            label: label.to_string(),
            values,
        });
        self
    }
}

/// Everything the main dashboard shows for one result.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub bank: String,
    pub system: AmortizationSystem,
    pub principal: Money,
    pub installments: u32,
    pub kpis: Kpis,
    pub metrics: DerivedMetrics,
    pub schedule: Vec<ScheduleRow>,
    pub charts: Vec<ChartSeries>,
    pub warnings: Vec<String>,
}

impl DashboardView {
    pub fn build(result: &LoanResult, convention: RateConvention) -> CoreResult<Self> {
        let metrics = metrics_for(result, convention)?;
        let schedule = result.schedule().to_vec();

        let mut warnings = Vec::new();
        let gap = result.reconciliation_gap()?;
        let rows = Decimal::from(schedule.len().max(1) as u64);
        let tolerance = RECONCILIATION_TOLERANCE_PER_ROW * rows;
        if gap > tolerance {
            warnings.push(format!(
                "Schedule does not reconcile: payments differ from interest + principal by {gap}"
            ));
        }
        if schedule.len() != result.request().installments() as usize {
            warnings.push(format!(
                "Requested {} installments, schedule has {}",
                result.request().installments(),
                schedule.len()
            ));
        }
        if metrics.tea_source.is_computed() || metrics.cftea_source.is_computed() {
            warnings.push(format!(
                "Values marked {COMPUTED_MARKER} are computed locally; the rest come from the bank"
            ));
        }

        Ok(Self {
            bank: result.bank().to_string(),
            system: result.request().system(),
            principal: result.request().principal(),
            installments: result.request().installments(),
            kpis: Kpis::of(result)?,
            charts: primary_charts(result)?,
            metrics,
            schedule,
            warnings,
        })
    }

    pub fn chart(&self, id: &str) -> Option<&ChartSeries> {
        self.charts.iter().find(|c| c.id == id)
    }
}

fn primary_charts(result: &LoanResult) -> CoreResult<Vec<ChartSeries>> {
    let schedule = result.schedule();
    let installment_labels: Vec<String> = schedule
        .iter()
        .map(|r| format!("Installment {}", r.installment))
        .collect();
    let total_interest = result.total_interest()?;
    let total_principal = result.total_principal()?;

    Ok(vec![
        ChartSeries::new(
            "balance",
            "Balance evolution",
            ChartKind::Line,
            installment_labels.clone(),
        )
        .dataset("Balance", schedule.iter().map(|r| r.balance).collect()),
        ChartSeries::new(
            "composition",
            "Capital vs interest",
            ChartKind::Doughnut,
            vec!["Capital".into(), "Interest".into()],
        )
        .dataset("Total", vec![total_principal, total_interest]),
        ChartSeries::new(
            "distribution",
            "Installment breakdown",
            ChartKind::StackedBar,
            schedule.iter().map(|r| r.installment.to_string()).collect(),
        )
        .dataset("Interest", schedule.iter().map(|r| r.interest).collect())
        .dataset("Capital", schedule.iter().map(|r| r.principal_portion).collect()),
        ChartSeries::new("payments", "Monthly payments", ChartKind::Bar, installment_labels)
            .dataset("Installment", schedule.iter().map(|r| r.payment).collect()),
    ])
}

/// A row of the side-by-side summary table, already formatted.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub concept: String,
    pub primary: String,
    pub comparison: String,
    pub difference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonView {
    pub report: ComparisonReport,
    pub summary: Vec<SummaryRow>,
    pub recommendation: String,
    pub charts: Vec<ChartSeries>,
    pub stale: bool,
}

impl ComparisonView {
    pub fn build(
        primary: &LoanResult,
        comparison: &LoanResult,
        convention: RateConvention,
    ) -> CoreResult<Self> {
        let report = compare(primary, comparison, convention)?;
        let summary = summary_rows(&report);
        let charts = vec![
            ChartSeries::new(
                "comparison_total",
                "Total paid",
                ChartKind::Bar,
                vec![report.primary_bank.clone(), report.comparison_bank.clone()],
            )
            .dataset("Total paid", vec![primary.total_paid()?, comparison.total_paid()?]),
            ChartSeries::new(
                "comparison_installment",
                "Monthly installment",
                ChartKind::Bar,
                vec![report.primary_bank.clone(), report.comparison_bank.clone()],
            )
            .dataset(
                "Monthly installment",
                vec![primary.first_installment(), comparison.first_installment()],
            ),
        ];
        Ok(Self {
            recommendation: report.recommendation(),
            report,
            summary,
            charts,
            stale: false,
        })
    }

    pub fn stale(mut self, stale: bool) -> Self {
        self.stale = stale;
        self
    }
}

fn summary_rows(report: &ComparisonReport) -> Vec<SummaryRow> {
    let mut rows = vec![
        SummaryRow {
            concept: "Principal".into(),
            primary: format_pesos(report.principal),
            comparison: format_pesos(report.principal),
            difference: "-".into(),
            outcome: None,
        },
        SummaryRow {
            concept: "Installments".into(),
            primary: report.installments.to_string(),
            comparison: report.installments.to_string(),
            difference: "-".into(),
            outcome: None,
        },
    ];

    let order = [
        ComparedField::NominalAnnualRate,
        ComparedField::MonthlyEffectiveRate,
        ComparedField::AnnualEffectiveRate,
        ComparedField::FirstInstallment,
        ComparedField::TotalInterest,
        ComparedField::TotalPaid,
        ComparedField::TotalFinancialCost,
        ComparedField::NominalAnnualFinancialCost,
        ComparedField::EffectiveAnnualFinancialCost,
    ];
    for field in order {
        let Some(diff) = report.diff(field) else {
            continue;
        };
        let (m1, m2) = (marker(report, field, true), marker(report, field, false));
        let fmt = |v: Decimal| {
            if field.is_rate() {
                format_percent(v)
            } else {
                format_pesos(v)
            }
        };
        rows.push(SummaryRow {
            concept: field.label().into(),
            primary: format!("{}{}", fmt(diff.primary), m1),
            comparison: format!("{}{}", fmt(diff.comparison), m2),
            difference: fmt(diff.difference),
            outcome: Some(diff.outcome),
        });
    }
    rows
}

fn marker(report: &ComparisonReport, field: ComparedField, primary: bool) -> &'static str {
    let metrics = if primary {
        &report.primary_metrics
    } else {
        &report.comparison_metrics
    };
    let source = match field {
        ComparedField::AnnualEffectiveRate => metrics.tea_source,
        ComparedField::EffectiveAnnualFinancialCost => metrics.cftea_source,
        _ => MetricSource::Backend,
    };
    if source.is_computed() {
        COMPUTED_MARKER
    } else {
        ""
    }
}

/// Argentine peso formatting: `$ 1.234.567,89`. Two decimals at most, none
/// for whole amounts.
pub fn format_pesos(amount: Money) -> String {
    let rounded = amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = rounded.abs().to_string();
    let (whole, fraction) = match text.split_once('.') {
        Some((w, f)) => (w.to_string(), Some(f.to_string())),
        None => (text, None),
    };

    let digits = whole.len();
    let mut grouped = String::with_capacity(digits + digits / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let mut out = String::from(if negative { "-$ " } else { "$ " });
    out.push_str(&grouped);
    if let Some(f) = fraction {
        out.push(',');
        out.push_str(&f);
    }
    out
}

/// Two decimals and a percent sign: `3.99%`.
pub fn format_percent(value: Percent) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}%")
}
