// Error types for gh-bulk.
// Covers GitHub API errors, JSON decoding, configuration I/O, and pattern errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BulkError {
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Url not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("No access token configured; set one with `config` or GITHUB_TOKEN")]
    MissingToken,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid repository pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{0}")]
    Other(String),
}

impl BulkError {
    /// Whether this error came back from the server as an HTTP status.
    /// These are the errors a soft-failure handler is allowed to intercept.
    pub fn is_http_status(&self) -> bool {
        matches!(
            self,
            BulkError::Unauthorized
                | BulkError::NotFound(_)
                | BulkError::RateLimited { .. }
                | BulkError::Status { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BulkError>;
