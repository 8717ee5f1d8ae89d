// Completion Provider Module
// Streaming chat completions, the model listing and generation statistics

pub mod catalog;
pub mod error;
pub mod openrouter;
pub mod stats;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

pub use catalog::{Model, ModelCatalog};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use openrouter::OpenRouterProvider;
pub use stats::{Generation, Statistics, StatisticsLookup};

use crate::models::{NormalizedRequest, ProviderEvent};
use crate::utils::AppConfig;

/// Events of one streaming round trip; dropping the stream closes it
pub type CompletionStream = Pin<Box<dyn Stream<Item = ProviderResult<ProviderEvent>> + Send>>;

/// Model modalities as reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
}

/// One entry of the provider's model listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub supported_parameters: Vec<String>,
    #[serde(default)]
    pub architecture: Architecture,
}

/// Trait for completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Open one streaming round trip
    async fn start_stream(&self, request: &NormalizedRequest) -> ProviderResult<CompletionStream>;

    /// List the models available to this account
    async fn list_models(&self) -> ProviderResult<Vec<ProviderModel>>;

    /// Fetch the usage record of a finished generation
    async fn fetch_generation(&self, id: &str) -> ProviderResult<Generation>;
}

/// Shared provider handle
pub type SharedProvider = Arc<dyn CompletionProvider>;

/// Create the provider from static configuration
pub fn create_provider(config: &AppConfig) -> ProviderResult<SharedProvider> {
    let token = config.tokens.openrouter.trim();
    if token.is_empty() {
        return Err(ProviderError::InvalidConfig(
            "OpenRouter requires an API key".to_string(),
        ));
    }

    let provider = OpenRouterProvider::new(
        token.to_string(),
        Duration::from_secs(config.settings.timeout),
    )?;

    Ok(Arc::new(provider))
}

// ============================================================================
// Test support
// ============================================================================
