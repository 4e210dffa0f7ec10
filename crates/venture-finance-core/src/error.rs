use thiserror::Error;

#[derive(Debug, Error)]
pub enum VentureFinanceError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Inputs are individually valid but jointly admit no stable model
    /// (e.g. perpetual growth at or above the discount rate).
    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl VentureFinanceError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        VentureFinanceError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for VentureFinanceError {
    fn from(e: serde_json::Error) -> Self {
        VentureFinanceError::SerializationError(e.to_string())
    }
}
