pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "deal")]
pub mod deal;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use error::DealModelError;
pub use types::*;

/// Standard result type for all deal-model operations
pub type DealModelResult<T> = Result<T, DealModelError>;
