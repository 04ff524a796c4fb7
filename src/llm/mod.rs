pub mod backend;
pub mod client;

pub use backend::{BackendError, ChatBackend, ChatRequest, FinishReason, Response, Usage};
pub use client::OpenAiClient;
