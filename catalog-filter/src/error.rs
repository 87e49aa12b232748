use thiserror::Error;

/// Failure reported by a [`crate::DataSource`] while fetching the catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Fetch timed out after {0}ms")]
    Timeout(u64),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Malformed catalog payload: {0}")]
    Payload(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Payload(err.to_string())
    }
}

/// A single raw entry that could not be turned into a catalog entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("entry #{position} has no identifier")]
    MissingIdentifier { position: usize },

    #[error("entry #{position} has an unusable identifier: {reason}")]
    InvalidIdentifier { position: usize, reason: String },

    #[error("entry {id} duplicates an identifier already in this batch")]
    DuplicateIdentifier { id: String },

    #[error("entry {id} has no title")]
    MissingTitle { id: String },

    #[error("entry {id} has a non-numeric price: {value}")]
    NonNumericPrice { id: String, value: String },

    #[error("entry {id} has a negative price: {value}")]
    NegativePrice { id: String, value: String },

    #[error("entry {id} has an invalid installment count: {value}")]
    InvalidInstallments { id: String, value: String },

    #[error("entry {id} has a malformed attribute set: {reason}")]
    MalformedAttributes { id: String, reason: String },
}

/// Failure surfaced by [`crate::CatalogEngine::refresh`].
///
/// A superseded fetch is not an error; see [`crate::RefreshOutcome::Superseded`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Catalog fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("All {rejected} catalog entries failed validation")]
    AllEntriesRejected { rejected: usize },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
