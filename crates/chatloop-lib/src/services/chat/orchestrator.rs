// Tool orchestration loop
// Runs up to `iterations` round trips, dispatching tool calls between them

use tokio_util::sync::CancellationToken;

use super::error::{ChatError, ChatResult};
use super::reader::{read_round_trip, RoundTrip};
use super::ChatService;
use crate::models::{ChatMessage, Event, NormalizedRequest, ToolCall};
use crate::services::stream::EventSink;
use crate::services::tools::{ToolContext, INVALID_TOOL_RESULT};

/// Why a chat stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The model gave a final answer
    Answered,
    /// The provider stopped on moderation
    Filtered,
    /// An error event ended the chat
    Failed,
    /// The client went away
    Cancelled,
    /// Every iteration ended in a tool call
    Exhausted,
}

enum Step {
    Continue,
    Stop(ChatOutcome),
}

impl ChatService {
    /// Disable tools on the last iteration, otherwise append the budget message.
    /// Returns whether a budget message was appended.
    pub(crate) fn prepare_iteration(
        &self,
        request: &mut NormalizedRequest,
        iteration: i64,
        iterations: i64,
    ) -> ChatResult<bool> {
        if !request.tools_enabled() {
            return Ok(false);
        }

        if iteration >= iterations - 1 {
            log::debug!("[chat] Last iteration, disabling tools");
            request.disable_tools();
            return Ok(false);
        }

        let remaining = iterations - iteration - 1;
        let budget = self.prompts.render_budget(iterations, remaining)?;
        request.messages.push(ChatMessage::system(budget));

        Ok(true)
    }

    /// Run the conversation, writing every event to `sink`.
    ///
    /// Errors after this point are only reported in-band as an error event.
    pub async fn run(
        &self,
        iterations: i64,
        mut request: NormalizedRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> ChatOutcome {
        for iteration in 0..iterations {
            log::debug!("[chat] Iteration {} of {}", iteration + 1, iterations);

            let step = self
                .run_iteration(&mut request, iteration, iterations, sink, cancel)
                .await;

            match step {
                Ok(Step::Continue) => {}
                Ok(Step::Stop(outcome)) => return outcome,
                Err(e) => return fail(sink, e).await,
            }
        }

        log::info!("[chat] Iterations exhausted after {} round trips", iterations);
        ChatOutcome::Exhausted
    }

    async fn run_iteration(
        &self,
        request: &mut NormalizedRequest,
        iteration: i64,
        iterations: i64,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> ChatResult<Step> {
        sink.write(Event::Start).await?;

        let budget = self.prepare_iteration(request, iteration, iterations)?;

        let (mut call, text) =
            match read_round_trip(&*self.provider, request, sink, cancel).await? {
                RoundTrip::Final { .. } => {
                    log::debug!("[chat] No tool call, done");
                    sink.write(Event::End).await?;
                    return Ok(Step::Stop(ChatOutcome::Answered));
                }
                RoundTrip::Filtered => return Ok(Step::Stop(ChatOutcome::Filtered)),
                RoundTrip::ToolCall { call, text } => (call, text),
            };

        self.dispatch(&mut call, sink, cancel).await?;

        call.done = true;
        sink.write(Event::Tool(call.clone())).await?;

        if budget {
            request.messages.pop();
        }

        request.messages.push(call.as_assistant_message(&text));
        request.messages.push(call.as_tool_message());

        sink.write(Event::End).await?;

        Ok(Step::Continue)
    }

    /// Report the call in flight, then run its handler
    async fn dispatch(
        &self,
        call: &mut ToolCall,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let Some(handler) = self.tools.get(&call.name) else {
            log::warn!("[chat] Invalid tool call: {:?}", call.name);

            sink.write(Event::Tool(call.clone())).await?;

            call.invalid = true;
            call.result = INVALID_TOOL_RESULT.to_string();
            return Ok(());
        };

        handler.normalize(call)?;
        sink.write(Event::Tool(call.clone())).await?;

        let ctx = ToolContext::new(cancel.clone());
        handler.handle(&ctx, call).await?;

        log::info!(
            "[chat] Tool {} finished ({} bytes, ${:.4})",
            call.name,
            call.result.len(),
            call.cost
        );

        Ok(())
    }
}

async fn fail(sink: &dyn EventSink, err: ChatError) -> ChatOutcome {
    if err.is_cancelled() || sink.is_cancelled() {
        log::debug!("[chat] Request cancelled: {}", err);
        return ChatOutcome::Cancelled;
    }

    log::warn!("[chat] Chat failed: {}", err);

    if let Err(e) = sink.write(Event::error(&err)).await {
        log::debug!("[chat] Could not report error: {}", e);
    }

    ChatOutcome::Failed
}
