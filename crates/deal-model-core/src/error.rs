use thiserror::Error;

#[derive(Debug, Error)]
pub enum DealModelError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Computation cancelled: {0}")]
    Cancelled(String),
}

impl DealModelError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DealModelError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
