use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage unavailable: no backend connection configured")]
    StorageUnavailable,

    #[error("Query error: {0}")]
    Query(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Vault error: {0}")]
    Vault(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn vault(message: impl Into<String>) -> Self {
        Self::Vault(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True for failures raised by the token vault rather than the primary table.
    pub fn is_vault(&self) -> bool {
        matches!(self, Self::Vault(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Vault(err.to_string())
    }
}
