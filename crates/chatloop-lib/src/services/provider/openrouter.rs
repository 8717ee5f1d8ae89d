// OpenRouter Provider Implementation
//
// OpenAI-compatible chat completions streamed over server-sent events.
// Default endpoint: https://openrouter.ai/api/v1

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use reqwest_eventsource::{retry, Event as SseEvent, EventSource};
use serde::Deserialize;

use super::{
    CompletionProvider, CompletionStream, Generation, ProviderError, ProviderModel,
    ProviderResult,
};
use crate::models::{NormalizedRequest, ProviderEvent};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

const DONE_MARKER: &str = "[DONE]";

/// OpenRouter Provider
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, timeout: Duration) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: OPENROUTER_API_URL.to_string(),
        })
    }

    /// Point the client at another OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}{}", base, path)
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .unwrap_or_else(|_| HeaderValue::from_static("")),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> ProviderResult<T> {
        let response = self
            .client
            .get(url)
            .headers(self.auth_headers())
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), error_message(&body)));
        }

        Ok(response.json().await?)
    }
}

// OpenRouter API types
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Best-effort extraction of the provider's error message from a body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if body.trim().is_empty() => "empty response".to_string(),
        _ => body.trim().to_string(),
    }
}

/// Parse one SSE data payload; errors can arrive mid-stream as a chunk
fn parse_chunk(data: &str) -> ProviderResult<ProviderEvent> {
    let value: serde_json::Value = serde_json::from_str(data)?;

    if value.get("error").is_some_and(|error| !error.is_null()) {
        let envelope: ErrorEnvelope = serde_json::from_value(value)?;
        let code = envelope
            .error
            .code
            .map(|code| match code {
                serde_json::Value::String(code) => code,
                other => other.to_string(),
            })
            .unwrap_or_default();

        return Err(match code.as_str() {
            "401" | "403" => ProviderError::AuthFailed(envelope.error.message),
            "429" => ProviderError::RateLimited,
            _ => ProviderError::ApiError(envelope.error.message),
        });
    }

    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "OpenRouter"
    }

    async fn start_stream(&self, request: &NormalizedRequest) -> ProviderResult<CompletionStream> {
        let url = self.api_url("/chat/completions");

        let builder = self
            .client
            .post(&url)
            .headers(self.auth_headers())
            .json(request);

        let mut source =
            EventSource::new(builder).map_err(|e| ProviderError::ApiError(e.to_string()))?;
        source.set_retry_policy(Box::new(retry::Never));

        log::debug!("[provider] stream opened for {}", request.model);

        let events = stream! {
            while let Some(item) = source.next().await {
                match item {
                    Ok(SseEvent::Open) => continue,
                    Ok(SseEvent::Message(message)) => {
                        let data = message.data.trim();

                        if data == DONE_MARKER {
                            break;
                        }

                        if data.is_empty() {
                            continue;
                        }

                        let parsed = parse_chunk(data);
                        let failed = parsed.is_err();

                        yield parsed;

                        if failed {
                            break;
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                        let body = response.text().await.unwrap_or_default();

                        yield Err(ProviderError::from_status(status.as_u16(), error_message(&body)));
                        break;
                    }
                    Err(e) => {
                        yield Err(ProviderError::from(e));
                        break;
                    }
                }
            }

            source.close();
        };

        Ok(Box::pin(events))
    }

    async fn list_models(&self) -> ProviderResult<Vec<ProviderModel>> {
        let envelope: DataEnvelope<Vec<ProviderModel>> =
            self.get_json(&self.api_url("/models")).await?;

        Ok(envelope.data)
    }

    async fn fetch_generation(&self, id: &str) -> ProviderResult<Generation> {
        let url = self.api_url(&format!("/generation?id={}", urlencoding::encode(id)));

        let envelope: DataEnvelope<Generation> = self.get_json(&url).await.map_err(|e| match e {
            ProviderError::NotFound(_) => ProviderError::NotFound(format!("generation {}", id)),
            other => other,
        })?;

        Ok(envelope.data)
    }
}
