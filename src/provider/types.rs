use super::sse::SseFrame;
use crate::error::Result;
use crate::prompt::Prompt;
use futures_core::stream::BoxStream;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: Prompt,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(prompt: Prompt) -> Self {
        Self {
            prompt,
            max_tokens: 4000,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatChunk {
    pub text: String,
}

/// Decoded streaming event. Only `ContentDelta` carries text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    MessageStart,
    ContentDelta(String),
    ContentStop,
    MessageStop,
    Ping,
    Unknown,
}

/// Single-turn user message, shared by both request envelopes.
#[derive(Debug, Clone, Serialize)]
pub struct UserMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> UserMessage<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

pub type ChunkStream = BoxStream<'static, Result<ChatChunk>>;
pub type ProviderFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Provider interface: one request, answered whole or as a chunk stream.
pub trait Provider {
    fn name(&self) -> &'static str;

    /// Send the request and return the full, trimmed response text.
    fn complete(&self, req: ChatRequest) -> ProviderFuture<String>;

    /// Start streaming a response. Errors after the stream starts arrive as items.
    fn stream_chat(&self, req: ChatRequest) -> ProviderFuture<ChunkStream>;
}

/// Wire format of one HTTP backend.
pub trait Backend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Endpoint, auth headers and JSON body. `Accept` is added by the caller when streaming.
    fn request(
        &self,
        http: &reqwest::Client,
        req: &ChatRequest,
        stream: bool,
    ) -> reqwest::RequestBuilder;

    /// Text of a non-streaming response body.
    fn parse_batch(&self, body: &[u8]) -> Result<String>;

    fn parse_event(&self, frame: &SseFrame) -> Result<StreamEvent>;
}
