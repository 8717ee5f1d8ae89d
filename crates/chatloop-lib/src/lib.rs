// chatloop - shared library
// Tool-calling chat orchestration streamed over a framed binary protocol

pub mod models;
pub mod services;
pub mod utils;

// Re-export models for use by the server binary
pub use models::*;
