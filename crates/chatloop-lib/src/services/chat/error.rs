// Chat Service Error Types

use thiserror::Error;

use crate::services::provider::ProviderError;
use crate::services::stream::StreamError;
use crate::services::tools::ToolError;

/// Chat service error
#[derive(Error, Debug)]
pub enum ChatError {
    /// Request body is not valid JSON for a chat request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown model: {0:?}")]
    UnknownModel(String),

    #[error("invalid iterations (1-{max}): {value}")]
    InvalidIterations { value: i64, max: i64 },

    #[error("invalid temperature (0-2): {0}")]
    InvalidTemperature(f64),

    #[error("invalid reasoning tokens (1-1048576): {0}")]
    InvalidReasoningTokens(i64),

    #[error("file {0} is invalid (name too long, max 512 characters)")]
    FileNameTooLong(usize),

    #[error("file {0} is invalid (too big, max 4MB)")]
    FileTooLarge(usize),

    #[error("too many files (max {max}): {count}")]
    TooManyFiles { count: usize, max: usize },

    #[error("unknown prompt: {0:?}")]
    UnknownPrompt(String),

    /// Prompt template failed to parse or render
    #[error("Template error: {0}")]
    Template(String),

    /// The provider round trip could not be opened
    #[error("stream.start: {0}")]
    StreamStart(ProviderError),

    /// The provider round trip failed while reading
    #[error("stream.receive: {0}")]
    StreamReceive(ProviderError),

    #[error("{0}")]
    Tool(#[from] ToolError),

    #[error("{0}")]
    Stream(#[from] StreamError),

    #[error("Request cancelled")]
    Cancelled,
}

impl From<tera::Error> for ChatError {
    fn from(err: tera::Error) -> Self {
        // tera nests the useful message in its source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);

        while let Some(inner) = source {
            message = format!("{}: {}", message, inner);
            source = std::error::Error::source(inner);
        }

        ChatError::Template(message)
    }
}

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat error codes for clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorCode {
    InvalidRequest,
    UnknownModel,
    InvalidIterations,
    InvalidTemperature,
    InvalidReasoningTokens,
    FileNameTooLong,
    FileTooLarge,
    TooManyFiles,
    UnknownPrompt,
    Template,
    Provider,
    Tool,
    Stream,
    Cancelled,
}

impl ChatErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatErrorCode::InvalidRequest => "CHAT_INVALID_REQUEST",
            ChatErrorCode::UnknownModel => "CHAT_UNKNOWN_MODEL",
            ChatErrorCode::InvalidIterations => "CHAT_INVALID_ITERATIONS",
            ChatErrorCode::InvalidTemperature => "CHAT_INVALID_TEMPERATURE",
            ChatErrorCode::InvalidReasoningTokens => "CHAT_INVALID_REASONING_TOKENS",
            ChatErrorCode::FileNameTooLong => "CHAT_FILE_NAME_TOO_LONG",
            ChatErrorCode::FileTooLarge => "CHAT_FILE_TOO_LARGE",
            ChatErrorCode::TooManyFiles => "CHAT_TOO_MANY_FILES",
            ChatErrorCode::UnknownPrompt => "CHAT_UNKNOWN_PROMPT",
            ChatErrorCode::Template => "CHAT_TEMPLATE_ERROR",
            ChatErrorCode::Provider => "CHAT_PROVIDER_ERROR",
            ChatErrorCode::Tool => "CHAT_TOOL_ERROR",
            ChatErrorCode::Stream => "CHAT_STREAM_ERROR",
            ChatErrorCode::Cancelled => "CHAT_CANCELLED",
        }
    }
}

impl ChatError {
    pub fn code(&self) -> ChatErrorCode {
        match self {
            ChatError::InvalidRequest(_) => ChatErrorCode::InvalidRequest,
            ChatError::UnknownModel(_) => ChatErrorCode::UnknownModel,
            ChatError::InvalidIterations { .. } => ChatErrorCode::InvalidIterations,
            ChatError::InvalidTemperature(_) => ChatErrorCode::InvalidTemperature,
            ChatError::InvalidReasoningTokens(_) => ChatErrorCode::InvalidReasoningTokens,
            ChatError::FileNameTooLong(_) => ChatErrorCode::FileNameTooLong,
            ChatError::FileTooLarge(_) => ChatErrorCode::FileTooLarge,
            ChatError::TooManyFiles { .. } => ChatErrorCode::TooManyFiles,
            ChatError::UnknownPrompt(_) => ChatErrorCode::UnknownPrompt,
            ChatError::Template(_) => ChatErrorCode::Template,
            ChatError::StreamStart(_) | ChatError::StreamReceive(_) => ChatErrorCode::Provider,
            ChatError::Tool(_) => ChatErrorCode::Tool,
            ChatError::Stream(_) => ChatErrorCode::Stream,
            ChatError::Cancelled => ChatErrorCode::Cancelled,
        }
    }

    /// Whether the error only reflects the client going away
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ChatError::Cancelled
                | ChatError::Stream(StreamError::Cancelled)
                | ChatError::Tool(ToolError::Cancelled)
                | ChatError::StreamStart(ProviderError::Cancelled)
                | ChatError::StreamReceive(ProviderError::Cancelled)
        )
    }

    /// Whether the error was caused by the request itself
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChatError::InvalidRequest(_)
                | ChatError::UnknownModel(_)
                | ChatError::InvalidIterations { .. }
                | ChatError::InvalidTemperature(_)
                | ChatError::InvalidReasoningTokens(_)
                | ChatError::FileNameTooLong(_)
                | ChatError::FileTooLarge(_)
                | ChatError::TooManyFiles { .. }
                | ChatError::UnknownPrompt(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_classification() {
        let err = ChatError::InvalidIterations { value: 0, max: 50 };
        assert_eq!(err.code().as_str(), "CHAT_INVALID_ITERATIONS");
        assert_eq!(err.to_string(), "invalid iterations (1-50): 0");
        assert!(err.is_validation());

        let err = ChatError::StreamReceive(ProviderError::RateLimited);
        assert_eq!(err.code(), ChatErrorCode::Provider);
        assert!(!err.is_validation());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancellation_is_recognized_through_wrappers() {
        assert!(ChatError::Cancelled.is_cancelled());
        assert!(ChatError::from(StreamError::Cancelled).is_cancelled());
        assert!(ChatError::from(ToolError::Cancelled).is_cancelled());
        assert!(!ChatError::from(ToolError::MissingQuery).is_cancelled());
    }

    #[test]
    fn test_template_error_includes_source() {
        let mut tera = tera::Tera::default();
        let err: ChatError = tera.add_raw_template("broken", "{{ oops").unwrap_err().into();

        assert!(matches!(err, ChatError::Template(_)));
        assert!(err.to_string().starts_with("Template error: "));
    }
}
