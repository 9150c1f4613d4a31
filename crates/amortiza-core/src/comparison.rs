use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::checked;
use crate::metrics::{metrics_for, DerivedMetrics, RateConvention};
use crate::{CoreError, CoreResult, LoanResult, Money};

/// Compared quantities. Every one of them is a cost: lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparedField {
    TotalPaid,
    TotalInterest,
    FirstInstallment,
    NominalAnnualRate,
    MonthlyEffectiveRate,
    AnnualEffectiveRate,
    TotalFinancialCost,
    NominalAnnualFinancialCost,
    EffectiveAnnualFinancialCost,
}

impl ComparedField {
    pub fn label(&self) -> &'static str {
        match self {
            Self::TotalPaid => "Total paid",
            Self::TotalInterest => "Total interest",
            Self::FirstInstallment => "Monthly installment",
            Self::NominalAnnualRate => "TNA",
            Self::MonthlyEffectiveRate => "TEM",
            Self::AnnualEffectiveRate => "TEA",
            Self::TotalFinancialCost => "CFT",
            Self::NominalAnnualFinancialCost => "CFTNA",
            Self::EffectiveAnnualFinancialCost => "CFTEA",
        }
    }

    /// Percentages rather than amounts of money.
    pub fn is_rate(&self) -> bool {
        matches!(
            self,
            Self::NominalAnnualRate
                | Self::MonthlyEffectiveRate
                | Self::AnnualEffectiveRate
                | Self::NominalAnnualFinancialCost
                | Self::EffectiveAnnualFinancialCost
        )
    }
}

/// How the comparison bank fares on one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Comparison is cheaper.
    Favorable,
    /// Comparison is more expensive.
    Unfavorable,
    Even,
}

impl Outcome {
    fn of(difference: Decimal) -> Self {
        if difference < Decimal::ZERO {
            Self::Favorable
        } else if difference > Decimal::ZERO {
            Self::Unfavorable
        } else {
            Self::Even
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: ComparedField,
    pub primary: Decimal,
    pub comparison: Decimal,
    /// comparison − primary
    pub difference: Decimal,
    pub outcome: Outcome,
}

impl FieldDiff {
    fn new(field: ComparedField, primary: Decimal, comparison: Decimal) -> CoreResult<Self> {
        let difference = checked(comparison.checked_sub(primary), field.label())?;
        Ok(Self {
            field,
            primary,
            comparison,
            difference,
            outcome: Outcome::of(difference),
        })
    }
}

/// Which bank is cheaper overall, judged by total amount paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    PrimaryCheaper { savings: Money },
    ComparisonCheaper { savings: Money },
    EqualCost,
}

impl Verdict {
    /// One-line recommendation naming the banks.
    pub fn describe(&self, primary_bank: &str, comparison_bank: &str) -> String {
        match self {
            Self::PrimaryCheaper { savings } => format!(
                "Choosing {primary_bank} saves {} compared with {comparison_bank}",
                crate::presentation::format_pesos(*savings)
            ),
            Self::ComparisonCheaper { savings } => format!(
                "Choosing {comparison_bank} saves {} compared with {primary_bank}",
                crate::presentation::format_pesos(*savings)
            ),
            Self::EqualCost => format!("{primary_bank} and {comparison_bank} cost the same"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub primary_bank: String,
    pub comparison_bank: String,
    pub principal: Money,
    pub installments: u32,
    pub primary_metrics: DerivedMetrics,
    pub comparison_metrics: DerivedMetrics,
    pub differences: Vec<FieldDiff>,
    pub verdict: Verdict,
}

impl ComparisonReport {
    pub fn diff(&self, field: ComparedField) -> Option<&FieldDiff> {
        self.differences.iter().find(|d| d.field == field)
    }

    pub fn recommendation(&self) -> String {
        self.verdict
            .describe(&self.primary_bank, &self.comparison_bank)
    }
}

/// Compare two schedules quoted for the same principal and term.
pub fn compare(
    primary: &LoanResult,
    comparison: &LoanResult,
    convention: RateConvention,
) -> CoreResult<ComparisonReport> {
    if !primary.request().same_terms(comparison.request()) {
        return Err(CoreError::TermsMismatch(format!(
            "{} quotes {} over {} installments, {} quotes {} over {}",
            primary.bank(),
            primary.request().principal(),
            primary.request().installments(),
            comparison.bank(),
            comparison.request().principal(),
            comparison.request().installments(),
        )));
    }

    let m1 = metrics_for(primary, convention)?;
    let m2 = metrics_for(comparison, convention)?;

    let primary_paid = primary.total_paid()?;
    let comparison_paid = comparison.total_paid()?;
    let mut differences = vec![
        FieldDiff::new(ComparedField::TotalPaid, primary_paid, comparison_paid)?,
        FieldDiff::new(
            ComparedField::TotalInterest,
            primary.total_interest()?,
            comparison.total_interest()?,
        )?,
        FieldDiff::new(
            ComparedField::FirstInstallment,
            primary.first_installment(),
            comparison.first_installment(),
        )?,
        FieldDiff::new(
            ComparedField::NominalAnnualRate,
            primary.nominal_annual_rate(),
            comparison.nominal_annual_rate(),
        )?,
        FieldDiff::new(
            ComparedField::MonthlyEffectiveRate,
            m1.monthly_effective_rate,
            m2.monthly_effective_rate,
        )?,
        FieldDiff::new(
            ComparedField::AnnualEffectiveRate,
            m1.annual_effective_rate,
            m2.annual_effective_rate,
        )?,
        FieldDiff::new(
            ComparedField::TotalFinancialCost,
            m1.total_financial_cost,
            m2.total_financial_cost,
        )?,
        FieldDiff::new(
            ComparedField::NominalAnnualFinancialCost,
            m1.nominal_annual_financial_cost,
            m2.nominal_annual_financial_cost,
        )?,
    ];
    if let (Some(a), Some(b)) = (
        m1.effective_annual_financial_cost,
        m2.effective_annual_financial_cost,
    ) {
        differences.push(FieldDiff::new(
            ComparedField::EffectiveAnnualFinancialCost,
            a,
            b,
        )?);
    }

    let savings = checked(primary_paid.checked_sub(comparison_paid), "savings")?;
    let verdict = if savings > Decimal::ZERO {
        Verdict::ComparisonCheaper { savings }
    } else if savings < Decimal::ZERO {
        Verdict::PrimaryCheaper { savings: -savings }
    } else {
        Verdict::EqualCost
    };

    Ok(ComparisonReport {
        primary_bank: primary.bank().to_string(),
        comparison_bank: comparison.bank().to_string(),
        principal: primary.request().principal(),
        installments: primary.request().installments(),
        primary_metrics: m1,
        comparison_metrics: m2,
        differences,
        verdict,
    })
}
