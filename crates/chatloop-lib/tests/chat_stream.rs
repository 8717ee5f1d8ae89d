// End-to-end chat over the HTTP router
// Drives /-/chat with a scripted provider and decodes the framed body

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;

use chatloop_lib::models::{
    EventKind, FunctionDefinition, NormalizedRequest, ProviderEvent, StreamDelta, ToolCall,
    ToolCallDelta, ToolDefinition,
};
use chatloop_lib::services::chat::{ChatService, PromptLibrary};
use chatloop_lib::services::provider::{
    CompletionProvider, CompletionStream, Generation, Model, ModelCatalog, ProviderError,
    ProviderModel, ProviderResult,
};
use chatloop_lib::services::server::{build_router, ServerState};
use chatloop_lib::services::stream::{parse_frames, Frame};
use chatloop_lib::services::tools::{parse_args, ToolContext, ToolHandler, ToolRegistry, ToolResult};
use chatloop_lib::utils::AppConfig;

/// Replays canned round trips
struct CannedProvider {
    rounds: Mutex<VecDeque<Vec<ProviderEvent>>>,
    requests: Mutex<Vec<NormalizedRequest>>,
}

impl CannedProvider {
    fn new(rounds: Vec<Vec<ProviderEvent>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn start_stream(&self, request: &NormalizedRequest) -> ProviderResult<CompletionStream> {
        self.requests.lock().unwrap().push(request.clone());

        let round = self
            .rounds
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::ApiError("no round left".to_string()))?;

        Ok(Box::pin(futures::stream::iter(round.into_iter().map(Ok))))
    }

    async fn list_models(&self) -> ProviderResult<Vec<ProviderModel>> {
        Ok(Vec::new())
    }

    async fn fetch_generation(&self, id: &str) -> ProviderResult<Generation> {
        Err(ProviderError::NotFound(id.to_string()))
    }
}

#[derive(Deserialize)]
struct LookupArguments {
    query: String,
}

/// Answers every lookup with a fixed sentence
struct LookupTool;

#[async_trait]
impl ToolHandler for LookupTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(FunctionDefinition {
            name: "lookup".to_string(),
            description: "Look something up".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
            strict: None,
        })
    }

    fn normalize(&self, call: &mut ToolCall) -> ToolResult<()> {
        parse_args::<LookupArguments>(call).map(|_| ())
    }

    async fn handle(&self, _ctx: &ToolContext, call: &mut ToolCall) -> ToolResult<()> {
        let arguments: LookupArguments = parse_args(call)?;
        call.result = format!("{} is a systems language", arguments.query);
        Ok(())
    }
}

fn text(id: &str, content: &str) -> ProviderEvent {
    ProviderEvent::with_delta(
        id,
        StreamDelta {
            content: Some(content.to_string()),
            ..Default::default()
        },
    )
}

fn fragment(id: &str, name: &str, args: &str) -> ProviderEvent {
    ProviderEvent::with_delta(
        "gen-1",
        StreamDelta {
            tool_calls: vec![ToolCallDelta::new(id, name, args)],
            ..Default::default()
        },
    )
}

fn router(provider: Arc<CannedProvider>) -> axum::Router {
    let mut config = AppConfig::default();
    config.tokens.openrouter = "sk-or-test".to_string();
    config.tokens.exa = "exa-test".to_string();

    let catalog = ModelCatalog::new(vec![Model {
        id: "m".to_string(),
        name: "Model".to_string(),
        tools: true,
        ..Default::default()
    }]);

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(LookupTool));

    let chat = ChatService::new(
        Arc::new(config),
        Arc::new(catalog),
        Arc::new(PromptLibrary::builtin().unwrap()),
        Arc::new(tools),
        provider,
    );

    build_router(Arc::new(ServerState::new(Arc::new(chat))))
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/-/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Post a chat and collect every frame except keepalives
async fn chat(provider: Arc<CannedProvider>, body: Value) -> Vec<Frame> {
    let response = router(provider).oneshot(chat_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    parse_frames(&bytes)
        .unwrap()
        .into_iter()
        .filter(|frame| frame.kind != EventKind::Alive)
        .collect()
}

fn kinds(frames: &[Frame]) -> Vec<EventKind> {
    frames.iter().map(|frame| frame.kind).collect()
}

#[tokio::test]
async fn test_plain_answer_streams_frames() {
    let provider = Arc::new(CannedProvider::new(vec![vec![
        text("gen-1", "Hel"),
        text("gen-1", "lo"),
    ]]));

    let frames = chat(
        provider,
        json!({
            "model": "m",
            "messages": [{ "role": "user", "text": "hi" }]
        }),
    )
    .await;

    assert_eq!(
        kinds(&frames),
        vec![
            EventKind::Start,
            EventKind::Id,
            EventKind::Text,
            EventKind::Text,
            EventKind::End
        ]
    );
    assert!(frames[0].payload.is_empty());
    assert_eq!(frames[1].text().unwrap(), "gen-1");
    assert_eq!(frames[2].text().unwrap(), "Hel");
    assert_eq!(frames[3].text().unwrap(), "lo");
}

#[tokio::test]
async fn test_tool_round_then_answer() {
    let provider = Arc::new(CannedProvider::new(vec![
        vec![
            fragment("call_1", "lookup", "{\"query\":"),
            fragment("", "", "\"rust\"}"),
        ],
        vec![text("gen-2", "Rust is a systems language.")],
    ]));

    let frames = chat(
        provider.clone(),
        json!({
            "model": "m",
            "iterations": 2,
            "tools": { "search": true },
            "messages": [{ "role": "user", "text": "what is rust?" }]
        }),
    )
    .await;

    assert_eq!(
        kinds(&frames),
        vec![
            EventKind::Start,
            EventKind::Id,
            EventKind::Tool,
            EventKind::Tool,
            EventKind::End,
            EventKind::Start,
            EventKind::Id,
            EventKind::Text,
            EventKind::End
        ]
    );

    let pending = frames[2].tool().unwrap();
    assert_eq!(pending.name, "lookup");
    assert!(!pending.done);

    let finished = frames[3].tool().unwrap();
    assert!(finished.done);
    assert_eq!(finished.result, "rust is a systems language");

    assert_eq!(frames[6].text().unwrap(), "gen-2");
    assert_eq!(frames[7].text().unwrap(), "Rust is a systems language.");

    // the last round trip has no budget message and replays the call and its result
    let requests = provider.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    let last = requests[1].messages.last().unwrap();
    assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_streaming() {
    let provider = Arc::new(CannedProvider::new(Vec::new()));

    let response = router(provider.clone())
        .oneshot(chat_request(json!({ "model": "unknown" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["code"], "CHAT_UNKNOWN_MODEL");

    assert!(provider.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_provider_failure_becomes_error_frame() {
    // no scripted round, so starting the stream fails
    let provider = Arc::new(CannedProvider::new(Vec::new()));

    let frames = chat(
        provider,
        json!({
            "model": "m",
            "messages": [{ "role": "user", "text": "hi" }]
        }),
    )
    .await;

    assert_eq!(kinds(&frames), vec![EventKind::Start, EventKind::Error]);
    assert!(frames[1].text().unwrap().starts_with("stream.start:"));
}
