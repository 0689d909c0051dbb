#[cfg(feature = "azure")]
pub mod azure;
#[cfg(feature = "claude")]
pub mod claude;
mod http;
pub mod sse;
pub mod stub;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpProvider;
pub use types::{
    Backend, ChatChunk, ChatRequest, ChunkStream, Provider, ProviderFuture, StreamEvent,
    UserMessage,
};
