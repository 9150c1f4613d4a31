//! Payload shapes exchanged with the calculation backend.
//!
//! The backend speaks Spanish field names (`monto`, `cuotas`, `Tabla`, ...);
//! nothing outside this module should see them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::client::ServiceError;
use crate::{LoanRequest, LoanResult, Money, Percent, ScheduleRow};

#[derive(Debug, Clone, Serialize)]
pub struct CalculationRequest {
    #[serde(rename = "monto", with = "rust_decimal::serde::float")]
    pub principal: Money,
    #[serde(rename = "cuotas")]
    pub installments: u32,
    #[serde(rename = "banco")]
    pub bank: String,
    #[serde(rename = "sistema", skip_serializing_if = "Option::is_none")]
    pub system: Option<&'static str>,
}

impl CalculationRequest {
    pub fn from_request(request: &LoanRequest, send_system: bool) -> Self {
        Self {
            principal: request.principal(),
            installments: request.installments(),
            bank: request.bank().to_string(),
            system: send_system.then(|| request.system().wire_name()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireRow {
    #[serde(rename = "Cuota")]
    pub installment: u32,
    #[serde(rename = "Cuota_total")]
    pub payment: Money,
    #[serde(rename = "Interes")]
    pub interest: Money,
    #[serde(rename = "Amortizacion")]
    pub principal_portion: Money,
    #[serde(rename = "Saldo")]
    pub balance: Money,
}

impl From<WireRow> for ScheduleRow {
    fn from(row: WireRow) -> Self {
        ScheduleRow {
            installment: row.installment,
            payment: row.payment,
            interest: row.interest,
            principal_portion: row.principal_portion,
            balance: row.balance,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceResponse {
    #[serde(rename = "TNA", default)]
    pub nominal_annual_rate: Option<Percent>,
    #[serde(rename = "Tabla", default)]
    pub schedule: Option<Vec<WireRow>>,
    #[serde(rename = "TEA", default)]
    pub effective_annual_rate: Option<Percent>,
    #[serde(rename = "CFTEA", default)]
    pub financial_cost_effective: Option<Percent>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ServiceResponse {
    pub fn parse(body: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(body).map_err(|e| ServiceError::Malformed(e.to_string()))
    }

    /// Application error reported by the service. Blank messages don't count.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }

    /// Turn the payload into a result for `request`. An application `error`
    /// takes precedence over everything else.
    pub fn into_result(self, request: &LoanRequest) -> Result<LoanResult, ServiceError> {
        if let Some(message) = self.error_message() {
            return Err(ServiceError::Application(message.to_string()));
        }
        let tna = self
            .nominal_annual_rate
            .ok_or_else(|| ServiceError::Malformed("response has no TNA".into()))?;
        let rows = self
            .schedule
            .ok_or_else(|| ServiceError::Malformed("response has no Tabla".into()))?;
        if rows.is_empty() {
            return Err(ServiceError::Malformed("response schedule is empty".into()));
        }

        Ok(LoanResult::new(
            request.clone(),
            tna,
            rows.into_iter().map(ScheduleRow::from).collect(),
            supplied(self.effective_annual_rate),
            supplied(self.financial_cost_effective),
        ))
    }
}

/// The backend sends 0 for figures it does not publish.
fn supplied(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| !v.is_zero())
}
