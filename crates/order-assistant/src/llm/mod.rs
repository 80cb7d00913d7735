//! Language-model boundary: one request with ordered messages, one reply

pub mod ollama;

pub use ollama::OllamaClient;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BackendError;
use crate::memory::ConversationTurn;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ConversationTurn>,
    pub temperature: f32,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Generated text for the request. May be empty; callers decide what an
    /// empty answer means.
    async fn chat(&self, request: ChatRequest) -> Result<String, BackendError>;
}
