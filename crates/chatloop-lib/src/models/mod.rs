// Data models
// Client request types, provider wire types, tool calls and outbound events

pub mod chat;
pub mod completion;
pub mod event;
pub mod tool_call;

pub use chat::{
    ChatRequest, ConversationMessage, Metadata, MessageRole, ReasoningOptions, TextFile,
    ToolToggles, UserSettings,
};
pub use completion::{
    ChatMessage, ChatRole, ContentPart, FunctionCall, FunctionCallDelta, FunctionDefinition,
    FunctionToolCall, ImageUrl, MessageContent, MessageImage, NormalizedRequest, ProviderEvent,
    ProviderPreferences, ReasoningConfig, ReasoningDetail, ResponseFormat, StreamChoice,
    StreamDelta, ToolCallDelta, ToolDefinition, FINISH_REASON_CONTENT_FILTER, IMAGE_URL_TYPE,
    REASONING_ENCRYPTED,
};
pub use event::{Event, EventKind};
pub use tool_call::{ToolCall, ToolCallBuilder, ToolReasoning};
