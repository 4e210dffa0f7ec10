pub mod assumptions;
pub mod error;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "venture")]
pub mod venture;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use assumptions::Assumptions;
pub use error::VentureFinanceError;
pub use types::*;

/// Standard result type for all venture-finance operations
pub type VentureFinanceResult<T> = Result<T, VentureFinanceError>;
