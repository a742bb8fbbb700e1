use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Cycle detected in account hierarchy at '{0}'")]
    AccountCycle(String),

    #[error("Duplicate account label: {0}")]
    DuplicateAccount(String),

    #[error("No entities found for {level} selector '{key}'")]
    NoMatchingEntities { level: String, key: String },

    #[error("Unknown {level} selector '{key}'")]
    UnknownSelector { level: String, key: String },

    #[error("Warehouse error: {0}")]
    WarehouseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
