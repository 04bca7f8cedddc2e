use thiserror::Error;

/// Application-wide error types for Hermes.
#[derive(Error, Debug)]
pub enum AppError {
    /// Credential rejected by the remote API (401/403). Fatal for the run.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Remote request-rate ceiling hit (429).
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    Network(String),

    /// Remote API returned a non-success status.
    #[error("API error (HTTP {status_code}): {message}")]
    Api {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// Input identifier is not a well-formed profile URL.
    #[error("Invalid identifier: {0}")]
    Validation(String),

    /// Match stage failed.
    #[error("Match lookup failed: {0}")]
    Resolution(#[source] Box<AppError>),

    /// Mobile enrichment stage failed.
    #[error("Mobile enrichment failed: {0}")]
    Enrichment(#[source] Box<AppError>),

    /// Remote returned a success status but the body could not be read
    /// or parsed. The request was processed server-side, so blindly
    /// re-issuing it is never safe for credit-consuming calls.
    #[error("Unreadable response from remote API: {0}")]
    MalformedResponse(String),

    /// Run was cancelled before this identifier was processed.
    #[error("Run cancelled")]
    Cancelled,
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::RateLimited | AppError::Timeout(_) | AppError::Network(_) => true,
            AppError::Api { retryable, .. } => *retryable,
            AppError::Resolution(inner) | AppError::Enrichment(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if this error invalidates the whole run, not just one
    /// identifier. A rejected credential would fail every remaining call.
    pub fn is_fatal(&self) -> bool {
        match self {
            AppError::Auth(_) => true,
            AppError::Resolution(inner) | AppError::Enrichment(inner) => inner.is_fatal(),
            _ => false,
        }
    }

    /// Wrap a client error as a match-stage failure.
    pub fn resolution(inner: AppError) -> Self {
        AppError::Resolution(Box::new(inner))
    }

    /// Wrap a client error as an enrichment-stage failure.
    pub fn enrichment(inner: AppError) -> Self {
        AppError::Enrichment(Box::new(inner))
    }
}
