use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::metrics::RateConvention;
use crate::{CoreError, CoreResult, Money};

pub const DEFAULT_ENDPOINT: &str = "https://amortizacionbackend.onrender.com/api/calcular";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_ENDPOINT: &str = "AMORTIZA_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "AMORTIZA_TIMEOUT_SECS";

/// Bounds user input must satisfy before anything is sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanPolicy {
    pub max_principal: Money,
    pub min_installments: u32,
    pub max_installments: u32,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            max_principal: dec!(50_000_000),
            min_installments: 1,
            max_installments: 70,
        }
    }
}

impl LoanPolicy {
    fn check(&self) -> CoreResult<()> {
        if self.max_principal <= Decimal::ZERO {
            return Err(CoreError::Config(
                "policy.max_principal must be positive".into(),
            ));
        }
        if self.min_installments == 0 || self.min_installments > self.max_installments {
            return Err(CoreError::Config(format!(
                "policy installments range [{}, {}] is empty or starts at zero",
                self.min_installments, self.max_installments
            )));
        }
        Ok(())
    }
}

/// Where and how the calculation backend is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
    /// `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// Older backends reject the `sistema` field.
    pub send_system: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            send_system: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub policy: LoanPolicy,
    pub convention: RateConvention,
}

impl AppConfig {
    /// Parse a JSON or YAML document.
    pub fn parse(contents: &str) -> CoreResult<Self> {
        let config: AppConfig = match serde_json::from_str(contents) {
            Ok(c) => c,
            Err(_) => serde_yaml::from_str(contents)?,
        };
        config.policy.check()?;
        Ok(config)
    }

    /// Load from an optional file; defaults when no file is given.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        log::debug!("loaded configuration from {}", path.display());
        Self::parse(&contents)
    }

    /// Apply overrides from a variable lookup (normally the process
    /// environment).
    pub fn apply_env<F>(mut self, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            if !endpoint.trim().is_empty() {
                self.service.endpoint = endpoint.trim().to_string();
            }
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                CoreError::Config(format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds"))
            })?;
            // 0 disables the timeout
            self.service.timeout_secs = if secs == 0 { None } else { Some(secs) };
        }
        Ok(self)
    }
}
