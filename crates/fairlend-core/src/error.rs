use thiserror::Error;

#[derive(Debug, Error)]
pub enum FairLendError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid aggregate record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Invalid geography mapping for {state}: {reason}")]
    InvalidMapping { state: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for FairLendError {
    fn from(e: serde_json::Error) -> Self {
        FairLendError::SerializationError(e.to_string())
    }
}

impl From<serde_yaml::Error> for FairLendError {
    fn from(e: serde_yaml::Error) -> Self {
        FairLendError::SerializationError(e.to_string())
    }
}
