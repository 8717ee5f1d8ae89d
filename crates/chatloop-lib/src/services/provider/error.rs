// Provider Error Types

use thiserror::Error;

/// Completion provider error
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Connection failed
    #[error("Cannot connect to provider: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Invalid or expired API key: {0}")]
    AuthFailed(String),

    /// Rate limited
    #[error("Provider rate limit exceeded, please try again later")]
    RateLimited,

    /// Request timeout
    #[error("Provider response timeout")]
    Timeout,

    /// Resource does not exist (yet)
    #[error("{0} not found")]
    NotFound(String),

    /// API error reported by the provider
    #[error("Provider error: {0}")]
    ApiError(String),

    /// Malformed response body or chunk
    #[error("Response parse error: {0}")]
    ParseError(String),

    /// The request context was cancelled
    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_connect() {
            ProviderError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            ProviderError::ParseError(err.to_string())
        } else {
            ProviderError::ApiError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}

impl From<reqwest_eventsource::Error> for ProviderError {
    fn from(err: reqwest_eventsource::Error) -> Self {
        match err {
            reqwest_eventsource::Error::Transport(err) => err.into(),
            reqwest_eventsource::Error::InvalidStatusCode(status, _) => {
                ProviderError::from_status(status.as_u16(), status.to_string())
            }
            other => ProviderError::ApiError(other.to_string()),
        }
    }
}

impl ProviderError {
    /// Map an HTTP failure status and message to an error
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => ProviderError::AuthFailed(message),
            404 => ProviderError::NotFound(message),
            408 | 504 => ProviderError::Timeout,
            429 => ProviderError::RateLimited,
            _ => ProviderError::ApiError(format!("({}) {}", status, message)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    ConnectionFailed,
    AuthFailed,
    RateLimited,
    Timeout,
    NotFound,
    ApiError,
    ParseError,
    Cancelled,
    InvalidConfig,
}

impl ProviderErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorCode::ConnectionFailed => "PROVIDER_CONNECTION_FAILED",
            ProviderErrorCode::AuthFailed => "PROVIDER_AUTH_FAILED",
            ProviderErrorCode::RateLimited => "PROVIDER_RATE_LIMITED",
            ProviderErrorCode::Timeout => "PROVIDER_TIMEOUT",
            ProviderErrorCode::NotFound => "PROVIDER_NOT_FOUND",
            ProviderErrorCode::ApiError => "PROVIDER_API_ERROR",
            ProviderErrorCode::ParseError => "PROVIDER_PARSE_ERROR",
            ProviderErrorCode::Cancelled => "PROVIDER_CANCELLED",
            ProviderErrorCode::InvalidConfig => "PROVIDER_INVALID_CONFIG",
        }
    }
}

impl ProviderError {
    pub fn code(&self) -> ProviderErrorCode {
        match self {
            ProviderError::ConnectionFailed(_) => ProviderErrorCode::ConnectionFailed,
            ProviderError::AuthFailed(_) => ProviderErrorCode::AuthFailed,
            ProviderError::RateLimited => ProviderErrorCode::RateLimited,
            ProviderError::Timeout => ProviderErrorCode::Timeout,
            ProviderError::NotFound(_) => ProviderErrorCode::NotFound,
            ProviderError::ApiError(_) => ProviderErrorCode::ApiError,
            ProviderError::ParseError(_) => ProviderErrorCode::ParseError,
            ProviderError::Cancelled => ProviderErrorCode::Cancelled,
            ProviderError::InvalidConfig(_) => ProviderErrorCode::InvalidConfig,
        }
    }
}
