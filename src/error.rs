use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Out of order: {0}")]
    OutOfOrder(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Upstream authentication failed: {0}")]
    UpstreamAuthenticationError(String),
    #[error("Persistence error: {0}")]
    PersistenceError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WalletError {
    /// Wraps a storage-layer failure. The operation that hit it left no partial state.
    pub fn persistence<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::PersistenceError(err.into())
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::Unauthorized(_) => "unauthorized",
            Self::OutOfOrder(_) => "out_of_order",
            Self::Conflict(_) => "conflict",
            Self::UpstreamAuthenticationError(_) => "upstream_authentication_error",
            Self::PersistenceError(_) => "persistence_error",
            Self::CsvError(_) => "csv_error",
            Self::IoError(_) => "io_error",
        }
    }

    /// Conditions concurrent callers are expected to hit; not system faults.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::OutOfOrder(_) | Self::Conflict(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for WalletError {
    fn from(err: rocksdb::Error) -> Self {
        Self::PersistenceError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
