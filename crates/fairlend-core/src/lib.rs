pub mod error;
pub mod types;

#[cfg(feature = "disparity")]
pub mod disparity;

#[cfg(feature = "reporting")]
pub mod reporting;

pub use error::FairLendError;
pub use types::*;

/// Standard result type for all fairlend operations
pub type FairLendResult<T> = Result<T, FairLendError>;
