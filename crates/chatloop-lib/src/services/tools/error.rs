// Tool Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    /// Arguments could not be parsed into the tool's schema
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("No search query")]
    MissingQuery,

    #[error("No urls")]
    MissingUrls,

    #[error("Missing repository owner or name")]
    MissingRepository,

    /// Transport failure talking to the upstream API
    #[error("Request failed: {0}")]
    Http(String),

    /// Upstream API answered with a failure status
    #[error("{service} API error ({status}): {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Tool call cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ToolError::ParseError(err.to_string())
        } else {
            ToolError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::InvalidArguments(err.to_string())
    }
}

impl ToolError {
    /// Failures of the upstream service, reported to the model instead of aborting
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ToolError::Http(_) | ToolError::Api { .. } | ToolError::ParseError(_)
        )
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
