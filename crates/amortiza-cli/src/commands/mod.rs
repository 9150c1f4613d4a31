pub mod calculate;
pub mod compare;
pub mod metrics;
pub mod validate;

use clap::{Args, ValueEnum};

use amortiza_core::client::{CalculationService, HttpCalculationClient, ReplayService};
use amortiza_core::config::AppConfig;
use amortiza_core::metrics::RateConvention;
use amortiza_core::session::{Dashboard, DashboardError};
use amortiza_core::validation::RawLoanInput;
use amortiza_core::AmortizationSystem;

use crate::input;

/// Settings shared by every command.
pub struct Context {
    pub config: AppConfig,
}

impl Context {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn convention(&self) -> RateConvention {
        self.config.convention
    }

    /// A dashboard backed by the HTTP service, or by saved responses when
    /// any were given.
    pub fn dashboard(
        &self,
        saved: Vec<(String, String)>,
    ) -> Result<Dashboard<Box<dyn CalculationService>>, Box<dyn std::error::Error>> {
        let service: Box<dyn CalculationService> = if saved.is_empty() {
            let client = HttpCalculationClient::new(&self.config.service)?;
            log::debug!("using calculation service at {}", client.endpoint());
            Box::new(client)
        } else {
            let mut replay = ReplayService::new();
            for (bank, path) in saved {
                replay = replay.with_response(bank, input::file::read_text(&path)?);
            }
            Box::new(replay)
        };
        Ok(Dashboard::new(
            service,
            self.config.policy.clone(),
            self.config.convention,
        ))
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum SystemArg {
    #[default]
    French,
    German,
}

impl From<SystemArg> for AmortizationSystem {
    fn from(arg: SystemArg) -> Self {
        match arg {
            SystemArg::French => AmortizationSystem::French,
            SystemArg::German => AmortizationSystem::German,
        }
    }
}

/// Loan parameters as typed; validation happens in the core.
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct LoanArgs {
    /// Path to JSON loan input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount borrowed
    #[arg(long, alias = "monto")]
    pub principal: Option<String>,

    /// Number of monthly installments
    #[arg(long, alias = "cuotas")]
    pub installments: Option<String>,

    /// Lending bank
    #[arg(long, alias = "banco")]
    pub bank: Option<String>,

    /// Amortization system
    #[arg(long, value_enum, default_value = "french")]
    pub system: SystemArg,
}

impl LoanArgs {
    /// Empty flags are passed through so the validator reports them.
    pub fn raw_input(&self) -> Result<RawLoanInput, Box<dyn std::error::Error>> {
        if let Some(ref path) = self.input {
            return input::file::read_json(path);
        }
        if self.principal.is_none() && self.installments.is_none() && self.bank.is_none() {
            if let Some(data) = input::stdin::read_stdin()? {
                return Ok(serde_json::from_value(data)?);
            }
        }
        Ok(RawLoanInput::new(
            self.principal.clone().unwrap_or_default(),
            self.installments.clone().unwrap_or_default(),
            self.bank.clone().unwrap_or_default(),
            self.system.into(),
        ))
    }
}

/// Run an action, offering a manual retry for as long as it fails with a
/// retryable error and the user says yes.
pub fn with_manual_retry<S: CalculationService>(
    dashboard: &mut Dashboard<S>,
    mut outcome: Result<(), DashboardError>,
) -> Result<(), DashboardError> {
    loop {
        match outcome {
            Err(e) if e.is_retryable() && input::prompt::confirm_retry(&e.to_string()) => {
                outcome = dashboard.retry().map(|_| ());
            }
            other => return other,
        }
    }
}
