// Completion wire models
// OpenAI-compatible request and streaming chunk types spoken with the provider

use serde::{Deserialize, Deserializer, Serialize};

/// Finish reason reported when the provider's moderation stopped the response
pub const FINISH_REASON_CONTENT_FILTER: &str = "content_filter";

/// Reasoning detail type carrying an opaque encrypted continuation
pub const REASONING_ENCRYPTED: &str = "reasoning.encrypted";

/// Image part type used for both inbound and generated images
pub const IMAGE_URL_TYPE: &str = "image_url";

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One part of a multi-part user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: Some("auto".to_string()),
            },
        }
    }
}

/// Message content is either plain text or a list of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Text of a plain message, or the concatenated text parts of a multi-part one
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// An image attached to an assistant message or streamed in a delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageImage {
    #[serde(rename = "type")]
    pub kind: String,
    pub image_url: ImageUrl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl MessageImage {
    pub fn url(index: usize, url: impl Into<String>) -> Self {
        Self {
            kind: IMAGE_URL_TYPE.to_string(),
            image_url: ImageUrl {
                url: url.into(),
                detail: None,
            },
            index: Some(index),
        }
    }
}

/// Structured reasoning detail, either streamed or replayed to the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningDetail {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// A message in the provider-facing conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<FunctionToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<MessageImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_details: Vec<ReasoningDetail>,
}

impl ChatMessage {
    fn with_content(role: ChatRole, content: MessageContent) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            images: Vec::new(),
            reasoning_details: Vec::new(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_content(ChatRole::System, MessageContent::Text(text.into()))
    }

    pub fn user(content: MessageContent) -> Self {
        Self::with_content(ChatRole::User, content)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_content(ChatRole::Assistant, MessageContent::Text(text.into()))
    }

    pub fn tool(tool_call_id: impl Into<String>, result: impl Into<String>) -> Self {
        let mut message = Self::with_content(ChatRole::Tool, MessageContent::Text(result.into()));
        message.tool_call_id = Some(tool_call_id.into());
        message
    }
}

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    pub fn function(function: FunctionDefinition) -> Self {
        Self {
            kind: "function".to_string(),
            function,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPreferences {
    pub sort: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// The provider-facing request built once per chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modalities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

impl NormalizedRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: 0.0,
            stream: true,
            modalities: vec!["text".to_string()],
            transforms: Vec::new(),
            reasoning: None,
            provider: None,
            response_format: None,
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    pub fn tools_enabled(&self) -> bool {
        !self.tools.is_empty()
    }

    pub fn enable_tools(&mut self, tools: Vec<ToolDefinition>) {
        self.tools = tools;
        self.tool_choice = Some("auto".to_string());
    }

    /// Remove tool definitions and the tool choice policy
    pub fn disable_tools(&mut self) {
        self.tools.clear();
        self.tool_choice = None;
    }
}

// ============================================================================
// Streaming chunks
// ============================================================================

/// Providers send `null` for absent lists and ids; treat it like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// A fragment of a tool invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub function: FunctionCallDelta,
}

impl ToolCallDelta {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        let some = |value: &str| (!value.is_empty()).then(|| value.to_string());

        Self {
            index: 0,
            id: some(id),
            kind: None,
            function: FunctionCallDelta {
                name: some(name),
                arguments: some(arguments),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning_details: Vec<ReasoningDetail>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<MessageImage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// One server-sent chunk of a streaming completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<StreamChoice>,
}

impl ProviderEvent {
    pub fn with_delta(id: impl Into<String>, delta: StreamDelta) -> Self {
        Self {
            id: id.into(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
        }
    }

    pub fn is_content_filtered(&self) -> bool {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
            == Some(FINISH_REASON_CONTENT_FILTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openrouter_chunk() {
        let raw = r#"{
            "id": "gen-123",
            "choices": [{
                "index": 0,
                "delta": {
                    "role": "assistant",
                    "content": null,
                    "reasoning": "",
                    "reasoning_details": [{"type": "reasoning.text", "text": "", "format": "unknown", "index": 0}],
                    "tool_calls": [{"index": 0, "id": "call_1", "type": "function", "function": {"name": "search_web", "arguments": "{\"q"}}]
                },
                "finish_reason": null
            }]
        }"#;

        let event: ProviderEvent = serde_json::from_str(raw).unwrap();
        let delta = &event.choices[0].delta;

        assert_eq!(event.id, "gen-123");
        assert_eq!(delta.content, None);
        assert_eq!(delta.reasoning.as_deref(), Some(""));
        assert_eq!(delta.reasoning_details[0].kind, "reasoning.text");
        assert_eq!(delta.tool_calls[0].function.name.as_deref(), Some("search_web"));
        assert!(!event.is_content_filtered());
    }

    #[test]
    fn test_parse_chunk_with_null_fields() {
        let raw = r#"{
            "id": "gen-1",
            "choices": [{
                "index": null,
                "delta": {
                    "content": "hi",
                    "reasoning_details": null,
                    "images": null,
                    "tool_calls": null
                },
                "finish_reason": null
            }]
        }"#;

        let event: ProviderEvent = serde_json::from_str(raw).unwrap();
        let delta = &event.choices[0].delta;
        assert_eq!(delta.content.as_deref(), Some("hi"));
        assert!(delta.reasoning_details.is_empty());
        assert!(delta.images.is_empty());
        assert!(delta.tool_calls.is_empty());

        let event: ProviderEvent =
            serde_json::from_str(r#"{"id": null, "choices": null}"#).unwrap();
        assert!(event.id.is_empty());
        assert!(event.choices.is_empty());

        let event: ProviderEvent =
            serde_json::from_str(r#"{"id": "gen-2", "choices": [{"delta": null}]}"#).unwrap();
        assert_eq!(event.choices[0].delta, StreamDelta::default());
    }

    #[test]
    fn test_content_filter_detection() {
        let event: ProviderEvent = serde_json::from_str(
            r#"{"id":"gen-1","choices":[{"delta":{},"finish_reason":"content_filter"}]}"#,
        )
        .unwrap();

        assert!(event.is_content_filtered());
    }

    #[test]
    fn test_request_omits_empty_tooling() {
        let mut request = NormalizedRequest::new("openai/gpt-4o");
        request.messages.push(ChatMessage::system("be brief"));

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
        assert_eq!(value["messages"][0]["content"], "be brief");
        assert_eq!(value["stream"], true);
    }

    #[test]
    fn test_disable_tools_clears_choice() {
        let mut request = NormalizedRequest::new("m");
        request.enable_tools(vec![ToolDefinition::function(FunctionDefinition {
            name: "search_web".to_string(),
            description: String::new(),
            parameters: serde_json::json!({"type": "object"}),
            strict: None,
        })]);

        assert!(request.tools_enabled());
        assert_eq!(request.tool_choice.as_deref(), Some("auto"));

        request.disable_tools();
        assert!(!request.tools_enabled());
        assert!(request.tool_choice.is_none());
    }

    #[test]
    fn test_multipart_content_serialization() {
        let message = ChatMessage::user(MessageContent::Parts(vec![
            ContentPart::text("look"),
            ContentPart::image("https://example.com/a.png"),
        ]));

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][1]["type"], "image_url");
        assert_eq!(value["content"][1]["image_url"]["url"], "https://example.com/a.png");
        assert_eq!(message.content.as_text(), "look");
    }
}
