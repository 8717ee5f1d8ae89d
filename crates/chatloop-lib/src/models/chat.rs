// Chat request models
// The JSON document posted by the client to start a streamed chat

use serde::{Deserialize, Serialize};

use super::tool_call::ToolCall;

/// Role of a message as sent by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A text file attached to a user message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextFile {
    pub name: String,
    pub content: String,
}

/// One message of the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub text: String,
    /// Tool call made by the assistant on this turn (assistant messages only)
    #[serde(default)]
    pub tool: Option<ToolCall>,
    #[serde(default)]
    pub files: Vec<TextFile>,
    /// Image URLs generated on this turn (assistant messages only)
    #[serde(default)]
    pub images: Vec<String>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            tool: None,
            files: Vec::new(),
            images: Vec::new(),
        }
    }
}

/// Reasoning configuration; `effort` wins over `tokens` when it is a known level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningOptions {
    #[serde(default)]
    pub effort: String,
    #[serde(default)]
    pub tokens: i64,
}

/// Feature toggles chosen by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolToggles {
    /// Request a JSON object response
    #[serde(default)]
    pub json: bool,
    /// Enable the web search / fetch / repository tools
    #[serde(default)]
    pub search: bool,
}

/// Per-user settings forwarded with each request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub prompt: String,
}

/// Client environment metadata used when rendering system prompts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub settings: UserSettings,
}

/// Inbound chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Key of the system prompt template, empty for none
    #[serde(default)]
    pub prompt: String,
    pub model: String,
    /// Provider routing preference: throughput, latency or price
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub temperature: f64,
    /// Maximum number of round trips with the provider
    #[serde(default = "default_iterations")]
    pub iterations: i64,
    #[serde(default)]
    pub tools: ToolToggles,
    #[serde(default)]
    pub reasoning: ReasoningOptions,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

fn default_iterations() -> i64 {
    1
}
