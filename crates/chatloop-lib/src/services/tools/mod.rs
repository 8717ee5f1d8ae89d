// Tool Handlers
// Tools the model may call during a chat, and the registry dispatching to them

pub mod error;
pub mod exa;
pub mod github;
pub mod search;

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;

pub use error::{ToolError, ToolResult};
pub use exa::ExaClient;
pub use github::{GitHubClient, GitHubRepositoryTool};
pub use search::{FetchContentsTool, SearchWebTool};

use crate::models::{ToolCall, ToolDefinition};
use crate::utils::AppConfig;

/// Result text of a call to a tool that does not exist
pub const INVALID_TOOL_RESULT: &str = "error: invalid tool call";

static QUOTED_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(\d+)""#).expect("Invalid quoted integer regex"));

/// Per-call context handed to tool handlers
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Run a future unless the request is cancelled first
    pub async fn run<F, T>(&self, future: F) -> ToolResult<T>
    where
        F: std::future::Future<Output = ToolResult<T>>,
    {
        self.cancel
            .run_until_cancelled(future)
            .await
            .unwrap_or(Err(ToolError::Cancelled))
    }
}

/// Trait for tools exposed to the model
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Function definition sent to the provider
    fn definition(&self) -> ToolDefinition;

    /// Parse the raw arguments and replace them with their canonical form
    fn normalize(&self, call: &mut ToolCall) -> ToolResult<()>;

    /// Run the tool, setting `result` and possibly `cost`.
    ///
    /// Upstream failures become an `error: ...` result; only argument and
    /// cancellation errors are returned.
    async fn handle(&self, ctx: &ToolContext, call: &mut ToolCall) -> ToolResult<()>;
}

impl std::fmt::Debug for dyn ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ToolHandler({})", self.definition().function.name)
    }
}

/// Parse tool arguments, unwrapping quoted integers ("6" -> 6) first, and
/// store the canonical re-serialization back into `args`
pub fn parse_and_update_args<T>(call: &mut ToolCall) -> ToolResult<T>
where
    T: DeserializeOwned + Serialize,
{
    let unquoted = QUOTED_INTEGER.replace_all(&call.args, "$1").into_owned();

    let arguments: T = serde_json::from_str(&unquoted)
        .map_err(|e| ToolError::InvalidArguments(format!("json.unmarshal: {}", e)))?;

    call.args = serde_json::to_string(&arguments)
        .map_err(|e| ToolError::InvalidArguments(format!("json.marshal: {}", e)))?;

    Ok(arguments)
}

/// Parse already-normalized arguments
pub fn parse_args<T: DeserializeOwned>(call: &ToolCall) -> ToolResult<T> {
    Ok(serde_json::from_str(&call.args)?)
}

/// Accept a JSON string or number as a string; quoted integers are unwrapped
/// before parsing, so text fields must tolerate numbers
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match Text::deserialize(deserializer)? {
        Text::String(text) => text,
        Text::Number(number) => number.to_string(),
    })
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard tool set; search tools need an Exa token
    pub fn from_config(config: &AppConfig) -> ToolResult<Self> {
        let timeout = Duration::from_secs(config.settings.timeout);
        let mut registry = Self::new();

        if !config.tokens.exa.is_empty() {
            let exa = Arc::new(ExaClient::new(config.tokens.exa.clone(), timeout)?);

            registry.register(Arc::new(SearchWebTool::new(exa.clone())));
            registry.register(Arc::new(FetchContentsTool::new(exa)));
        }

        let github = GitHubClient::new(config.tokens.github.clone(), timeout)?;
        registry.register(Arc::new(GitHubRepositoryTool::new(Arc::new(github))));

        Ok(registry)
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.definition().function.name;
        self.handlers
            .retain(|existing| existing.definition().function.name != name);
        self.handlers.push(handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers
            .iter()
            .find(|handler| handler.definition().function.name == name)
            .cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.handlers.iter().map(|handler| handler.definition()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ============================================================================
// Test support
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;
    use crate::models::FunctionDefinition;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub(crate) struct EchoArguments {
        #[serde(deserialize_with = "string_or_number")]
        pub(crate) query: String,
        #[serde(default)]
        pub(crate) num_results: i64,
    }

    /// Tool that records its calls and echoes the query
    pub(crate) struct RecordingTool {
        name: String,
        calls: Mutex<Vec<ToolCall>>,
        fail: bool,
    }

    impl RecordingTool {
        pub(crate) fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        pub(crate) fn failing(name: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(name)
            }
        }

        pub(crate) fn calls(&self) -> Vec<ToolCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolHandler for RecordingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::function(FunctionDefinition {
                name: self.name.clone(),
                description: "records calls".to_string(),
                parameters: serde_json::json!({"type": "object"}),
                strict: None,
            })
        }

        fn normalize(&self, call: &mut ToolCall) -> ToolResult<()> {
            parse_and_update_args::<EchoArguments>(call).map(|_| ())
        }

        async fn handle(&self, _ctx: &ToolContext, call: &mut ToolCall) -> ToolResult<()> {
            self.calls.lock().unwrap().push(call.clone());

            if self.fail {
                return Err(ToolError::MissingQuery);
            }

            let arguments: EchoArguments = parse_args(call)?;
            call.result = format!("results for {}", arguments.query);
            call.cost = 0.01;

            Ok(())
        }
    }
}
