// Request normalization
// Validates a client chat request and builds the provider-facing request

use super::error::{ChatError, ChatResult};
use super::ChatService;
use crate::models::{
    ChatMessage, ChatRequest, ContentPart, ConversationMessage, MessageContent, MessageImage,
    MessageRole, NormalizedRequest, ProviderPreferences, ReasoningConfig, ResponseFormat,
    TextFile,
};
use crate::services::provider::Model;
use crate::utils::markdown::{contains_image, split_image_parts};

pub const MAX_FILE_NAME_LEN: usize = 512;
pub const MAX_FILE_SIZE: usize = 4 * 1024 * 1024;
pub const MAX_FILES: usize = 16;
pub const MAX_REASONING_TOKENS: i64 = 1024 * 1024;

const MAX_TEMPERATURE: f64 = 2.0;

impl ChatService {
    /// Validate `raw` and build the request sent on every round trip
    pub fn normalize(&self, raw: &ChatRequest) -> ChatResult<NormalizedRequest> {
        let model = self
            .catalog
            .get(&raw.model)
            .ok_or_else(|| ChatError::UnknownModel(raw.model.clone()))?;

        let mut request = NormalizedRequest::new(&model.id);

        if self.config.settings.image_generation && model.images {
            request.modalities.push("image".to_string());
        }

        let transformation = self.config.settings.transformation.trim();
        if !transformation.is_empty() {
            request.transforms.push(transformation.to_string());
        }

        let max_iterations = self.config.settings.iterations;
        if raw.iterations < 1 || raw.iterations > max_iterations {
            return Err(ChatError::InvalidIterations {
                value: raw.iterations,
                max: max_iterations,
            });
        }

        if !(0.0..=MAX_TEMPERATURE).contains(&raw.temperature) {
            return Err(ChatError::InvalidTemperature(raw.temperature));
        }

        request.temperature = raw.temperature;

        if model.reasoning {
            request.reasoning = Some(reasoning_config(raw)?);
        }

        request.provider = match raw.provider.as_str() {
            "throughput" | "latency" | "price" => Some(ProviderPreferences {
                sort: raw.provider.clone(),
            }),
            _ => None,
        };

        if model.json && raw.tools.json {
            request.response_format = Some(ResponseFormat::json_object());
        }

        if let Some(prompt) = self.prompts.render_system(&raw.prompt, &raw.metadata, model)? {
            request.messages.push(ChatMessage::system(prompt));
        }

        if model.tools
            && raw.tools.search
            && !self.config.tokens.exa.is_empty()
            && raw.iterations > 1
            && !self.tools.is_empty()
        {
            request.enable_tools(self.tools.definitions());
        }

        for message in &raw.messages {
            push_message(&mut request.messages, message, model)?;
        }

        log::debug!(
            "[chat] Normalized request for {} ({} messages, tools: {})",
            request.model,
            request.messages.len(),
            request.tools_enabled()
        );

        Ok(request)
    }

    /// The request as it would be sent on the first round trip
    pub fn dump(&self, raw: &ChatRequest) -> ChatResult<NormalizedRequest> {
        let mut request = self.normalize(raw)?;
        self.prepare_iteration(&mut request, 0, raw.iterations)?;
        Ok(request)
    }
}

fn reasoning_config(raw: &ChatRequest) -> ChatResult<ReasoningConfig> {
    match raw.reasoning.effort.as_str() {
        "high" | "medium" | "low" => Ok(ReasoningConfig {
            effort: Some(raw.reasoning.effort.clone()),
            max_tokens: None,
        }),
        _ => {
            let tokens = raw.reasoning.tokens;
            if tokens <= 0 || tokens > MAX_REASONING_TOKENS {
                return Err(ChatError::InvalidReasoningTokens(tokens));
            }

            Ok(ReasoningConfig {
                effort: None,
                max_tokens: Some(tokens),
            })
        }
    }
}

fn push_message(
    messages: &mut Vec<ChatMessage>,
    message: &ConversationMessage,
    model: &Model,
) -> ChatResult<()> {
    let text = message.text.replace('\r', "");

    match message.role {
        MessageRole::System => messages.push(ChatMessage::system(text)),
        MessageRole::User => messages.push(ChatMessage::user(user_content(
            &text,
            &message.files,
            model.vision,
        )?)),
        MessageRole::Assistant => {
            if let Some(tool) = &message.tool {
                messages.push(tool.as_assistant_message(&text));
                messages.push(tool.as_tool_message());
                return Ok(());
            }

            let mut assistant = ChatMessage::assistant(text);
            assistant.images = message
                .images
                .iter()
                .enumerate()
                .map(|(index, url)| MessageImage::url(index, url))
                .collect();

            messages.push(assistant);
        }
    }

    Ok(())
}

/// User text, split into image parts for vision models, followed by its files
fn user_content(text: &str, files: &[TextFile], vision: bool) -> ChatResult<MessageContent> {
    if files.len() > MAX_FILES {
        return Err(ChatError::TooManyFiles {
            count: files.len(),
            max: MAX_FILES,
        });
    }

    let mut entries = Vec::with_capacity(files.len());

    for (index, file) in files.iter().enumerate() {
        if file.name.len() > MAX_FILE_NAME_LEN {
            return Err(ChatError::FileNameTooLong(index));
        }
        if file.content.len() > MAX_FILE_SIZE {
            return Err(ChatError::FileTooLarge(index));
        }

        entries.push(file_entry(file));
    }

    if vision && contains_image(text) {
        let mut parts = split_image_parts(text);

        for entry in entries {
            match parts.last_mut() {
                Some(ContentPart::Text { text }) => append_entry(text, &entry),
                _ => parts.push(ContentPart::text(entry)),
            }
        }

        return Ok(MessageContent::Parts(parts));
    }

    let mut content = text.to_string();
    for entry in entries {
        append_entry(&mut content, &entry);
    }

    Ok(MessageContent::Text(content))
}

fn file_entry(file: &TextFile) -> String {
    let lines = file.content.matches('\n').count() + 1;

    format!(
        "FILE {:?} LINES {}\n<<CONTENT>>\n{}\n<<END>>",
        file.name, lines, file.content
    )
}

fn append_entry(text: &mut String, entry: &str) {
    if !text.is_empty() {
        text.push_str("\n\n");
    }
    text.push_str(entry);
}
