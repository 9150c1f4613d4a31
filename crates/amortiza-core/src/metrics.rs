use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::checked;
use crate::{CoreError, CoreResult, LoanResult, Money, Percent};

const MONTHS_PER_YEAR: Decimal = dec!(12);
const HUNDRED: Decimal = dec!(100);

/// Which conversion turns the nominal annual rate into effective rates.
///
/// Both appear in lending dashboards: `Compounding` treats TNA as a yearly
/// effective figure and takes its twelfth root; `Simple` divides it by twelve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateConvention {
    #[default]
    Compounding,
    Simple,
}

/// Where a derived figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricSource {
    Backend,
    Computed,
    Unavailable,
}

impl MetricSource {
    /// True when the figure should be annotated as locally approximated.
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsInput {
    /// TNA, percent.
    pub nominal_annual_rate: Percent,
    pub principal: Money,
    pub installments: u32,
    pub total_paid: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_tea: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_cftea: Option<Percent>,
}

impl MetricsInput {
    pub fn from_result(result: &LoanResult) -> CoreResult<Self> {
        Ok(Self {
            nominal_annual_rate: result.nominal_annual_rate(),
            principal: result.request().principal(),
            installments: result.request().installments(),
            total_paid: result.total_paid()?,
            backend_tea: result.effective_annual_rate(),
            backend_cftea: result.financial_cost_effective(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// TEM, percent.
    pub monthly_effective_rate: Percent,
    /// TEA, percent.
    pub annual_effective_rate: Percent,
    /// CFT: total paid minus principal.
    pub total_financial_cost: Money,
    /// CFTNA, percent.
    pub nominal_annual_financial_cost: Percent,
    /// CFTEA, percent. `None` when the convention declines to approximate it.
    pub effective_annual_financial_cost: Option<Percent>,
    pub tea_source: MetricSource,
    pub cftea_source: MetricSource,
    pub convention: RateConvention,
}

/// Derive TEM, TEA, CFT, CFTNA and CFTEA, preferring backend-supplied TEA and
/// CFTEA over local approximations.
pub fn derive_metrics(
    input: &MetricsInput,
    convention: RateConvention,
) -> CoreResult<DerivedMetrics> {
    validate_input(input)?;

    let tna = input.nominal_annual_rate;
    let tna_fraction = checked(tna.checked_div(HUNDRED), "TNA")?;

    let monthly_effective_rate = match convention {
        RateConvention::Compounding => {
            let twelfth = Decimal::ONE / MONTHS_PER_YEAR;
            let growth = pow(Decimal::ONE + tna_fraction, twelfth, "TEM from TNA")?;
            percent(growth - Decimal::ONE, "TEM from TNA")?
        }
        RateConvention::Simple => checked(tna.checked_div(MONTHS_PER_YEAR), "TEM from TNA")?,
    };

    let (annual_effective_rate, tea_source) = match input.backend_tea {
        Some(tea) => (tea, MetricSource::Backend),
        None => {
            let monthly = match convention {
                RateConvention::Compounding => monthly_effective_rate / HUNDRED,
                RateConvention::Simple => tna_fraction / MONTHS_PER_YEAR,
            };
            let tea = percent(annualize(monthly, "TEA from TEM")? - Decimal::ONE, "TEA")?;
            (tea, MetricSource::Computed)
        }
    };

    let total_financial_cost = checked(input.total_paid.checked_sub(input.principal), "CFT")?;

    let periods = Decimal::from(input.installments);
    let cost_ratio = checked(total_financial_cost.checked_div(input.principal), "CFTNA")?;
    let annualized = checked(cost_ratio.checked_mul(MONTHS_PER_YEAR / periods), "CFTNA")?;
    let nominal_annual_financial_cost = percent(annualized, "CFTNA")?;

    let (effective_annual_financial_cost, cftea_source) = match (input.backend_cftea, convention) {
        (Some(cftea), _) => (Some(cftea), MetricSource::Backend),
        // Single-period compounding: the approximation equals CFTNA.
        (None, RateConvention::Compounding) => {
            let factor = Decimal::ONE + nominal_annual_financial_cost / HUNDRED;
            (
                Some(percent(factor - Decimal::ONE, "CFTEA")?),
                MetricSource::Computed,
            )
        }
        (None, RateConvention::Simple) => (None, MetricSource::Unavailable),
    };

    Ok(DerivedMetrics {
        monthly_effective_rate,
        annual_effective_rate,
        total_financial_cost,
        nominal_annual_financial_cost,
        effective_annual_financial_cost,
        tea_source,
        cftea_source,
        convention,
    })
}

/// Metrics for a backend result, using the request's principal and term.
pub fn metrics_for(result: &LoanResult, convention: RateConvention) -> CoreResult<DerivedMetrics> {
    derive_metrics(&MetricsInput::from_result(result)?, convention)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_input(input: &MetricsInput) -> CoreResult<()> {
    if input.principal <= Decimal::ZERO {
        return Err(CoreError::InvalidInput {
            field: "principal".into(),
            reason: "Principal must be positive.".into(),
        });
    }
    if input.installments == 0 {
        return Err(CoreError::InvalidInput {
            field: "installments".into(),
            reason: "At least one installment is required.".into(),
        });
    }
    if input.nominal_annual_rate <= dec!(-100) {
        return Err(CoreError::InvalidInput {
            field: "nominal_annual_rate".into(),
            reason: "Rate must be greater than -100%.".into(),
        });
    }
    Ok(())
}

fn pow(base: Decimal, exponent: Decimal, context: &str) -> CoreResult<Decimal> {
    checked(base.checked_powd(exponent), context)
}

/// Fraction to percent.
fn percent(fraction: Decimal, context: &str) -> CoreResult<Percent> {
    checked(fraction.checked_mul(HUNDRED), context)
}

/// (1 + monthly)^12
fn annualize(monthly: Decimal, context: &str) -> CoreResult<Decimal> {
    checked((Decimal::ONE + monthly).checked_powi(12), context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(tna: Decimal, principal: Decimal, n: u32, total: Decimal) -> MetricsInput {
        MetricsInput {
            nominal_annual_rate: tna,
            principal,
            installments: n,
            total_paid: total,
            backend_tea: None,
            backend_cftea: None,
        }
    }

    fn close(a: Decimal, b: Decimal, tol: Decimal) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_compounding_tem_for_sixty_percent() {
        let m = derive_metrics(
            &input(dec!(60), dec!(150000), 12, dec!(198000)),
            RateConvention::Compounding,
        )
        .unwrap();
        // 1.6^(1/12) = 1.039944...
        assert!(close(m.monthly_effective_rate, dec!(3.9944), dec!(0.001)));
        // Compounding TEM back over twelve months recovers TNA.
        assert!(close(m.annual_effective_rate, dec!(60), dec!(0.01)));
        assert_eq!(m.tea_source, MetricSource::Computed);
        assert_eq!(m.convention, RateConvention::Compounding);
    }

    #[test]
    fn test_simple_tem_for_sixty_percent() {
        let m = derive_metrics(
            &input(dec!(60), dec!(150000), 12, dec!(198000)),
            RateConvention::Simple,
        )
        .unwrap();
        assert_eq!(m.monthly_effective_rate, dec!(5));
        // 1.05^12 = 1.795856...
        assert!(close(m.annual_effective_rate, dec!(79.5856), dec!(0.001)));
        assert_eq!(m.effective_annual_financial_cost, None);
        assert_eq!(m.cftea_source, MetricSource::Unavailable);
    }

    #[test]
    fn test_cft_and_cftna() {
        let m = derive_metrics(
            &input(dec!(60), dec!(150000), 12, dec!(198000)),
            RateConvention::Compounding,
        )
        .unwrap();
        assert_eq!(m.total_financial_cost, dec!(48000));
        // 48000 / 150000 * 12/12 * 100 = 32
        assert_eq!(m.nominal_annual_financial_cost, dec!(32));
        assert_eq!(m.effective_annual_financial_cost, Some(dec!(32)));
        assert_eq!(m.cftea_source, MetricSource::Computed);
    }

    #[test]
    fn test_backend_values_preferred() {
        let mut i = input(dec!(60), dec!(150000), 12, dec!(198000));
        i.backend_tea = Some(dec!(79.59));
        i.backend_cftea = Some(dec!(95.1));
        for convention in [RateConvention::Compounding, RateConvention::Simple] {
            let m = derive_metrics(&i, convention).unwrap();
            assert_eq!(m.annual_effective_rate, dec!(79.59));
            assert_eq!(m.tea_source, MetricSource::Backend);
            assert_eq!(m.effective_annual_financial_cost, Some(dec!(95.1)));
            assert_eq!(m.cftea_source, MetricSource::Backend);
        }
    }

    #[test]
    fn test_cftna_scales_with_term() {
        let twelve = derive_metrics(
            &input(dec!(60), dec!(100000), 12, dec!(130000)),
            RateConvention::Compounding,
        )
        .unwrap();
        let twenty_four = derive_metrics(
            &input(dec!(60), dec!(100000), 24, dec!(130000)),
            RateConvention::Compounding,
        )
        .unwrap();
        assert_eq!(twelve.nominal_annual_financial_cost, dec!(30));
        assert_eq!(twenty_four.nominal_annual_financial_cost, dec!(15));
    }

    #[test]
    fn test_zero_rate() {
        let m = derive_metrics(
            &input(dec!(0), dec!(1000), 10, dec!(1000)),
            RateConvention::Compounding,
        )
        .unwrap();
        assert!(close(m.monthly_effective_rate, Decimal::ZERO, dec!(0.000001)));
        assert_eq!(m.total_financial_cost, Decimal::ZERO);
        assert_eq!(m.nominal_annual_financial_cost, Decimal::ZERO);
    }

    #[test]
    fn test_invalid_inputs() {
        let simple = RateConvention::Simple;
        assert!(derive_metrics(&input(dec!(60), dec!(0), 12, dec!(10)), simple).is_err());
        assert!(derive_metrics(&input(dec!(60), dec!(10), 0, dec!(10)), simple).is_err());
        assert!(derive_metrics(&input(dec!(-100), dec!(10), 1, dec!(10)), simple).is_err());
    }

    #[test]
    fn test_tiny_principal_reports_overflow() {
        let tiny = dec!(0.0000000000000000000001);
        for convention in [RateConvention::Compounding, RateConvention::Simple] {
            let err = derive_metrics(&input(dec!(60), tiny, 1, dec!(100000000)), convention)
                .unwrap_err();
            assert!(matches!(err, CoreError::Overflow { .. }), "{err}");
        }
    }
}
