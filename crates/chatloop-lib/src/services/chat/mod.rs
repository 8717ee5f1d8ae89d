// Chat Service
// Turns one client request into a streamed, tool-augmented conversation

pub mod error;
pub mod orchestrator;
pub mod prompts;
pub mod reader;
pub mod request;

use std::sync::Arc;

pub use error::{ChatError, ChatErrorCode, ChatResult};
pub use orchestrator::ChatOutcome;
pub use prompts::{PromptInfo, PromptLibrary};
pub use reader::{read_round_trip, RoundTrip, CONTENT_FILTER_MESSAGE};
pub use request::{MAX_FILES, MAX_FILE_NAME_LEN, MAX_FILE_SIZE, MAX_REASONING_TOKENS};

use crate::services::provider::{ModelCatalog, SharedProvider};
use crate::services::tools::ToolRegistry;
use crate::utils::AppConfig;

/// Everything a chat needs, shared across requests
pub struct ChatService {
    config: Arc<AppConfig>,
    catalog: Arc<ModelCatalog>,
    prompts: Arc<PromptLibrary>,
    tools: Arc<ToolRegistry>,
    provider: SharedProvider,
}

impl ChatService {
    pub fn new(
        config: Arc<AppConfig>,
        catalog: Arc<ModelCatalog>,
        prompts: Arc<PromptLibrary>,
        tools: Arc<ToolRegistry>,
        provider: SharedProvider,
    ) -> Self {
        Self {
            config,
            catalog,
            prompts,
            tools,
            provider,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }
}

// ============================================================================
// Test support
// ============================================================================
