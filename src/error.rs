use crate::domain::limits::ValidationState;
use crate::domain::money::CurrencyType;
use thiserror::Error;

/// Errors returned by the remote collaborators behind the domain ports.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Request failed with status {status}: {message}")]
    Server { status: u16, message: String },
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Connection error: {0}")]
    Connection(String),
}

#[derive(Error, Debug)]
pub enum BuyError {
    #[error("Price error: {0}")]
    Price(NetworkError),
    #[error("Limits error: {0}")]
    Limits(NetworkError),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Transaction validation failed: {0:?}")]
    ValidationFailure(ValidationState),
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch {
        expected: CurrencyType,
        actual: CurrencyType,
    },
    #[error("Invalid exchange rate: {0}")]
    InvalidRate(String),
    #[error("Amount overflow: {0}")]
    AmountOverflow(String),
    #[error("Fees are fixed for buying crypto")]
    FeeLevelNotSupported,
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BuyError>;
