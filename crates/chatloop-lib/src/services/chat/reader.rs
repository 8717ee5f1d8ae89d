// Delta reader
// Drains one streaming round trip, forwarding content as it arrives and
// assembling at most one tool call from its fragments

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::error::{ChatError, ChatResult};
use crate::models::{Event, NormalizedRequest, ToolCall, ToolCallBuilder, IMAGE_URL_TYPE};
use crate::services::provider::CompletionProvider;
use crate::services::stream::EventSink;

/// Error text sent when the provider stops on moderation
pub const CONTENT_FILTER_MESSAGE: &str = "stopped due to content_filter";

/// How a round trip ended
#[derive(Debug, Clone, PartialEq)]
pub enum RoundTrip {
    /// The model answered without calling a tool
    Final { text: String },
    /// The model called a tool after streaming `text`
    ToolCall { call: ToolCall, text: String },
    /// The provider stopped on moderation; the error event was already written
    Filtered,
}

pub async fn read_round_trip(
    provider: &dyn CompletionProvider,
    request: &NormalizedRequest,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> ChatResult<RoundTrip> {
    let mut stream = cancel
        .run_until_cancelled(provider.start_stream(request))
        .await
        .ok_or(ChatError::Cancelled)?
        .map_err(ChatError::StreamStart)?;

    let mut id_sent = false;
    let mut kind_sent = false;
    let mut builder = ToolCallBuilder::new();
    let mut text = String::new();

    loop {
        let event = match cancel.run_until_cancelled(stream.next()).await {
            None => return Err(ChatError::Cancelled),
            Some(None) => break,
            Some(Some(Err(e))) => return Err(ChatError::StreamReceive(e)),
            Some(Some(Ok(event))) => event,
        };

        if !id_sent && !event.id.is_empty() {
            id_sent = true;
            sink.write(Event::Id(event.id.clone())).await?;
        }

        if event.is_content_filtered() {
            log::info!("[chat] Round trip stopped by content filter");
            sink.write(Event::error(CONTENT_FILTER_MESSAGE)).await?;
            return Ok(RoundTrip::Filtered);
        }

        let Some(choice) = event.choices.into_iter().next() else {
            continue;
        };
        let delta = choice.delta;

        if let Some(fragment) = delta.tool_calls.first() {
            if builder.is_closed() {
                continue;
            }

            builder.push(fragment);
            builder.capture_reasoning(&delta.reasoning_details);
        } else if builder.is_started() {
            // the call is complete once content resumes
            break;
        }

        if let Some(content) = delta.content.filter(|content| !content.is_empty()) {
            text.push_str(&content);
            sink.write(Event::Text(content)).await?;
        } else if let Some(reasoning) = delta.reasoning {
            if !kind_sent {
                if let Some(detail) = delta.reasoning_details.first() {
                    kind_sent = true;
                    sink.write(Event::ReasoningKind(detail.kind.clone())).await?;
                }
            }

            sink.write(Event::Reasoning(reasoning)).await?;
        } else {
            for image in delta.images {
                if image.kind != IMAGE_URL_TYPE {
                    continue;
                }

                sink.write(Event::Image(image.image_url.url)).await?;
            }
        }
    }

    Ok(match builder.build() {
        Some(call) => {
            log::debug!("[chat] Assembled {:?} tool call ({})", call.name, call.id);
            RoundTrip::ToolCall { call, text }
        }
        None => RoundTrip::Final { text },
    })
}
