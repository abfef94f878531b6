use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the upstream weather provider.
///
/// None of these are fatal: the cache logs them and serves whatever it has stored.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No OpenWeatherMap API key configured")]
    MissingApiKey,

    #[error("Upstream unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Malformed upstream payload: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Transport failures and non-2xx responses.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Status { .. })
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Location '{0}' not found")]
    LocationNotFound(String),
}
