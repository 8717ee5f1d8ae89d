// Services module
// Chat orchestration, providers, tools, the framed event stream and the HTTP server

pub mod chat;
pub mod provider;
pub mod server;
pub mod stream;
pub mod tools;

pub use chat::{ChatError, ChatOutcome, ChatService, PromptLibrary};
pub use provider::{create_provider, CompletionProvider, ModelCatalog, SharedProvider};
pub use server::{build_router, serve, ServerState};
pub use stream::{EventSink, EventStream};
pub use tools::ToolRegistry;
