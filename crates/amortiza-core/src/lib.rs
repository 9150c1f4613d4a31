pub mod client;
pub mod comparison;
pub mod config;
pub mod error;
pub mod metrics;
pub mod presentation;
pub mod session;
pub mod types;
pub mod validation;
pub mod wire;

#[cfg(feature = "export")]
pub mod export;

pub use error::CoreError;
pub use types::*;

/// Standard result type for core computations
pub type CoreResult<T> = Result<T, CoreError>;
