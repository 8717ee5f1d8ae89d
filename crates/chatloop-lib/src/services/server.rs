// HTTP Server
// Routes for streamed chats, request dumps, generation statistics and
// the model listing

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::models::{ChatRequest, NormalizedRequest};
use crate::services::chat::{ChatError, ChatService};
use crate::services::provider::StatisticsLookup;
use crate::services::stream::{EventStream, KEEPALIVE_INTERVAL};
use crate::utils::CancelOnDrop;

/// Buffer between the chat task and the response body
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

const GENERATION_PREFIX: &str = "gen-";

/// Server shared state
pub struct ServerState {
    pub chat: Arc<ChatService>,
    pub stats: StatisticsLookup,
}

impl ServerState {
    pub fn new(chat: Arc<ChatService>) -> Self {
        let stats = StatisticsLookup::new(chat.provider().clone());
        Self { chat, stats }
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

fn error_response(status: StatusCode, error: impl ToString, code: Option<&'static str>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code,
        }),
    )
        .into_response()
}

fn chat_error_response(err: &ChatError) -> Response {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    error_response(status, err, Some(err.code().as_str()))
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/-/chat", post(handle_chat))
        .route("/-/dump", post(handle_dump))
        .route("/-/stats/{id}", get(handle_stats))
        .route("/-/data", get(handle_data))
        .with_state(state)
}

/// Serve `router` on `address` until `shutdown` resolves
pub async fn serve<F>(address: &str, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(address).await?;

    log::info!("[server] Listening at http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    log::info!("[server] Server stopped");

    Ok(())
}

fn parse_chat_request(
    chat: &ChatService,
    body: &[u8],
) -> Result<(ChatRequest, NormalizedRequest), ChatError> {
    let raw: ChatRequest =
        serde_json::from_slice(body).map_err(|e| ChatError::InvalidRequest(e.to_string()))?;

    let request = chat.normalize(&raw)?;

    Ok((raw, request))
}

/// Handle a chat
/// POST /-/chat
async fn handle_chat(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    let (raw, request) = match parse_chat_request(&state.chat, &body) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("[server] Rejected chat request: {}", e);
            return chat_error_response(&e);
        }
    };

    log::info!(
        "[server] Starting chat with {} ({} iterations)",
        raw.model,
        raw.iterations
    );

    let cancel = CancellationToken::new();
    let (writer, reader) = tokio::io::duplex(STREAM_BUFFER_SIZE);

    let stream = Arc::new(EventStream::new(
        writer,
        cancel.clone(),
        state.chat.config().settings.cleanup,
    ));
    stream.spawn_keepalive(KEEPALIVE_INTERVAL);

    let chat = state.chat.clone();
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        // ends the keepalive task and closes the body once the chat is over
        let _guard = task_cancel.clone().drop_guard();

        let outcome = chat
            .run(raw.iterations, request, &*stream, &task_cancel)
            .await;

        log::info!("[server] Chat finished: {:?}", outcome);
    });

    let body = Body::from_stream(CancelOnDrop::new(ReaderStream::new(reader), cancel));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Show the request the first round trip would send
/// POST /-/dump
async fn handle_dump(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    let dumped = serde_json::from_slice::<ChatRequest>(&body)
        .map_err(|e| ChatError::InvalidRequest(e.to_string()))
        .and_then(|raw| state.chat.dump(&raw));

    match dumped {
        Ok(request) => Json(json!({ "request": request })).into_response(),
        Err(e) => chat_error_response(&e),
    }
}

/// Usage statistics of a generation
/// GET /-/stats/{id}
async fn handle_stats(State(state): State<Arc<ServerState>>, Path(id): Path<String>) -> Response {
    if !id.starts_with(GENERATION_PREFIX) {
        return error_response(StatusCode::BAD_REQUEST, "invalid id", None);
    }

    match state.stats.lookup(&id).await {
        Ok(statistics) => Json(statistics).into_response(),
        Err(e) if e.is_not_found() => error_response(StatusCode::NOT_FOUND, "not found", None),
        Err(e) => {
            log::error!("[server] Statistics lookup for {} failed: {}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e, Some(e.code().as_str()))
        }
    }
}

/// Version, models and prompts for the client
/// GET /-/data
async fn handle_data(State(state): State<Arc<ServerState>>) -> Response {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "models": state.chat.catalog().models(),
        "prompts": state.chat.prompts().prompts(),
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::services::chat::testing::{capable_model, service};
    use crate::services::provider::testing::ScriptedProvider;
    use crate::services::provider::{Generation, ProviderError};
    use crate::services::tools::ToolRegistry;

    fn router(provider: ScriptedProvider) -> Router {
        let chat = service(
            Arc::new(provider),
            ToolRegistry::new(),
            vec![capable_model("m")],
        );
        build_router(Arc::new(ServerState::new(Arc::new(chat))))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_chat_validation_error() {
        let (status, body) = send(
            router(ScriptedProvider::new()),
            post("/-/chat", json!({ "model": "m", "iterations": 0 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CHAT_INVALID_ITERATIONS");
        assert_eq!(body["error"], "invalid iterations (1-50): 0");
    }

    #[tokio::test]
    async fn test_chat_malformed_json() {
        let request = Request::builder()
            .method("POST")
            .uri("/-/chat")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(router(ScriptedProvider::new()), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CHAT_INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_dump_returns_request() {
        let (status, body) = send(
            router(ScriptedProvider::new()),
            post(
                "/-/dump",
                json!({
                    "model": "m",
                    "temperature": 0.5,
                    "messages": [{ "role": "user", "text": "hi" }]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["request"]["model"], "m");
        assert_eq!(body["request"]["stream"], true);
        assert_eq!(body["request"]["messages"][0]["content"], "hi");
    }

    #[tokio::test]
    async fn test_stats_routes() {
        let (status, body) = send(router(ScriptedProvider::new()), get("/-/stats/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid id");

        let found = ScriptedProvider::new().generation(Ok(Generation {
            id: "gen-1".to_string(),
            model: "m".to_string(),
            total_cost: 0.002,
            ..Default::default()
        }));
        let (status, body) = send(router(found), get("/-/stats/gen-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "m");
        assert_eq!(body["cost"], 0.002);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_not_found_and_failure() {
        // an exhausted script answers NotFound on every attempt
        let missing = ScriptedProvider::new();
        let (status, _) = send(router(missing), get("/-/stats/gen-2")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let failing = ScriptedProvider::new()
            .generation(Err(ProviderError::AuthFailed("bad key".to_string())))
            .generation(Err(ProviderError::AuthFailed("bad key".to_string())))
            .generation(Err(ProviderError::AuthFailed("bad key".to_string())))
            .generation(Err(ProviderError::AuthFailed("bad key".to_string())));
        let (status, body) = send(router(failing), get("/-/stats/gen-3")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "PROVIDER_AUTH_FAILED");
    }

    #[tokio::test]
    async fn test_data_lists_models() {
        let (status, body) = send(router(ScriptedProvider::new()), get("/-/data")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["models"][0]["id"], "m");
        assert_eq!(body["models"][0]["tools"], true);
        assert!(body["prompts"].as_array().unwrap().is_empty());
    }
}
