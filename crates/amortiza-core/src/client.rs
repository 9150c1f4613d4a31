use thiserror::Error;

use crate::wire::ServiceResponse;
use crate::{LoanRequest, LoanResult};

/// Network and service failures. Everything except `Application` is worth
/// offering a manual retry for.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("The calculation service did not answer in time")]
    Timeout,

    #[error("Could not reach the calculation service: {0}")]
    Transport(String),

    #[error("The calculation service answered with status {0}")]
    Status(u16),

    #[error("Unexpected response from the calculation service: {0}")]
    Malformed(String),

    #[error("{0}")]
    Application(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Application(_))
    }
}

/// One request/response exchange with whatever computes schedules.
pub trait CalculationService {
    fn calculate(&self, request: &LoanRequest) -> Result<LoanResult, ServiceError>;
}

impl<T: CalculationService + ?Sized> CalculationService for &T {
    fn calculate(&self, request: &LoanRequest) -> Result<LoanResult, ServiceError> {
        (**self).calculate(request)
    }
}

impl<T: CalculationService + ?Sized> CalculationService for Box<T> {
    fn calculate(&self, request: &LoanRequest) -> Result<LoanResult, ServiceError> {
        (**self).calculate(request)
    }
}

/// Map an HTTP status and body to a result. Application errors are honoured
/// even on non-success statuses since the backend reports them either way.
pub fn decode_response(
    status: u16,
    body: &str,
    request: &LoanRequest,
) -> Result<LoanResult, ServiceError> {
    let success = (200..300).contains(&status);
    match ServiceResponse::parse(body) {
        Ok(payload) if payload.error_message().is_some() || success => {
            payload.into_result(request)
        }
        Ok(_) => Err(ServiceError::Status(status)),
        Err(e) if success => Err(e),
        Err(_) => Err(ServiceError::Status(status)),
    }
}

/// Serves saved backend responses, keyed by bank. Lets a dashboard be
/// rendered offline from files captured earlier.
#[derive(Debug, Default)]
pub struct ReplayService {
    responses: Vec<(String, String)>,
}

impl ReplayService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the raw JSON body to answer for `bank`.
    pub fn with_response(mut self, bank: impl Into<String>, body: impl Into<String>) -> Self {
        self.responses.push((bank.into(), body.into()));
        self
    }
}

impl CalculationService for ReplayService {
    fn calculate(&self, request: &LoanRequest) -> Result<LoanResult, ServiceError> {
        let body = self
            .responses
            .iter()
            .find(|(bank, _)| bank.eq_ignore_ascii_case(request.bank()))
            .map(|(_, body)| body.as_str())
            .ok_or_else(|| {
                ServiceError::Transport(format!("no saved response for bank '{}'", request.bank()))
            })?;
        log::debug!("replaying saved response for {}", request.bank());
        decode_response(200, body, request)
    }
}

#[cfg(feature = "remote")]
pub use http::HttpCalculationClient;

#[cfg(feature = "remote")]
mod http {
    use std::time::Duration;

    use super::{decode_response, CalculationService, ServiceError};
    use crate::config::ServiceConfig;
    use crate::wire::CalculationRequest;
    use crate::{LoanRequest, LoanResult};

    /// Blocking JSON-over-HTTP client for the calculation backend.
    #[derive(Debug, Clone)]
    pub struct HttpCalculationClient {
        http: reqwest::blocking::Client,
        endpoint: String,
        send_system: bool,
    }

    impl HttpCalculationClient {
        pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
            let http = reqwest::blocking::Client::builder()
                .timeout(config.timeout_secs.map(Duration::from_secs))
                .build()
                .map_err(|e| ServiceError::Transport(e.to_string()))?;
            Ok(Self {
                http,
                endpoint: config.endpoint.clone(),
                send_system: config.send_system,
            })
        }

        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }
    }

    impl CalculationService for HttpCalculationClient {
        fn calculate(&self, request: &LoanRequest) -> Result<LoanResult, ServiceError> {
            let body = CalculationRequest::from_request(request, self.send_system);
            log::debug!(
                "POST {} bank={} principal={} installments={}",
                self.endpoint,
                request.bank(),
                request.principal(),
                request.installments()
            );

            let response = self
                .http
                .post(&self.endpoint)
                .json(&body)
                .send()
                .map_err(transport_error)?;
            let status = response.status().as_u16();
            let text = response.text().map_err(transport_error)?;

            let outcome = decode_response(status, &text, request);
            match &outcome {
                Ok(result) => log::info!(
                    "{} quoted TNA {}% over {} installments",
                    request.bank(),
                    result.nominal_annual_rate(),
                    result.schedule().len()
                ),
                Err(e) => log::info!("calculation for {} failed: {}", request.bank(), e),
            }
            outcome
        }
    }

    fn transport_error(e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Transport(e.to_string())
        }
    }

}
