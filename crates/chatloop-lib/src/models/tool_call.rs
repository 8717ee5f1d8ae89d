// Tool call models
// A single tool invocation assembled from streamed fragments

use serde::{Deserialize, Serialize};

use super::completion::{
    ChatMessage, FunctionCall, FunctionToolCall, ReasoningDetail, ToolCallDelta,
    REASONING_ENCRYPTED,
};

/// Opaque reasoning continuation carried verbatim across turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolReasoning {
    pub format: String,
    pub encrypted: String,
}

/// A tool invocation and its outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Raw JSON argument text
    #[serde(default)]
    pub args: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub result: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub done: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub invalid: bool,
    /// Dollar cost of any sub-request the tool made
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ToolReasoning>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

impl ToolCall {
    /// Assistant message announcing this call, preceded by the prose streamed before it
    pub fn as_assistant_message(&self, content: &str) -> ChatMessage {
        // Some providers reject empty assistant content
        let content = if content.is_empty() { " " } else { content };

        let mut message = ChatMessage::assistant(content);

        message.tool_calls.push(FunctionToolCall {
            id: self.id.clone(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: self.name.clone(),
                arguments: self.args.clone(),
            },
        });

        if let Some(reasoning) = &self.reasoning {
            message.reasoning_details.push(ReasoningDetail {
                kind: REASONING_ENCRYPTED.to_string(),
                data: Some(reasoning.encrypted.clone()),
                id: Some(self.id.clone()),
                format: Some(reasoning.format.clone()),
                index: Some(0),
                ..Default::default()
            });
        }

        message
    }

    /// Tool-role message carrying the result keyed by the call id
    pub fn as_tool_message(&self) -> ChatMessage {
        ChatMessage::tool(self.id.clone(), self.result.clone())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Accumulates the fragments of the first tool call in one round trip.
///
/// Argument completeness is guessed by counting braces, so a string value
/// containing `{` or `}` can close the call early.
#[derive(Debug, Default)]
pub struct ToolCallBuilder {
    call: Option<ToolCall>,
    open: usize,
    close: usize,
}

impl ToolCallBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any fragment has been applied
    pub fn is_started(&self) -> bool {
        self.call.is_some()
    }

    /// Whether the argument braces have balanced out
    pub fn is_closed(&self) -> bool {
        self.open > 0 && self.open == self.close
    }

    pub fn push(&mut self, fragment: &ToolCallDelta) {
        let call = self.call.get_or_insert_with(ToolCall::default);

        if let Some(id) = fragment.id.as_deref() {
            append_unless_repeated(&mut call.id, id);
        }

        if let Some(name) = fragment.function.name.as_deref() {
            append_unless_repeated(&mut call.name, name);
        }

        if let Some(arguments) = fragment.function.arguments.as_deref() {
            self.open += arguments.matches('{').count();
            self.close += arguments.matches('}').count();

            call.args.push_str(arguments);
        }
    }

    /// Capture the first encrypted reasoning detail, if none was captured yet
    pub fn capture_reasoning(&mut self, details: &[ReasoningDetail]) {
        let Some(call) = self.call.as_mut() else {
            return;
        };

        if call.reasoning.is_some() {
            return;
        }

        call.reasoning = details
            .iter()
            .find(|detail| detail.kind == REASONING_ENCRYPTED)
            .map(|detail| ToolReasoning {
                format: detail.format.clone().unwrap_or_default(),
                encrypted: detail.data.clone().unwrap_or_default(),
            });
    }

    pub fn build(self) -> Option<ToolCall> {
        self.call
    }
}

fn append_unless_repeated(target: &mut String, fragment: &str) {
    if !fragment.is_empty() && !target.ends_with(fragment) {
        target.push_str(fragment);
    }
}
