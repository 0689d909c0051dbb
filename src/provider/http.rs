use super::sse::{SseDecoder, SseFrame};
use super::{Backend, ChatChunk, ChatRequest, ChunkStream, Provider, ProviderFuture, StreamEvent};
use crate::error::{Error, Result};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Any [`Backend`] driven over HTTP.
#[derive(Debug)]
pub struct HttpProvider<B> {
    http: reqwest::Client,
    backend: Arc<B>,
}

impl<B: Backend> HttpProvider<B> {
    pub fn new(http: reqwest::Client, backend: B) -> Self {
        Self {
            http,
            backend: Arc::new(backend),
        }
    }
}

impl<B: Backend> Provider for HttpProvider<B> {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    fn complete(&self, req: ChatRequest) -> ProviderFuture<String> {
        let http = self.http.clone();
        let backend = Arc::clone(&self.backend);

        Box::pin(async move {
            let resp = backend.request(&http, &req, false).send().await?;
            let resp = require_ok(backend.name(), resp).await?;
            let body = resp.bytes().await?;
            let text = backend.parse_batch(&body)?;
            Ok(text.trim().to_string())
        })
    }

    fn stream_chat(&self, req: ChatRequest) -> ProviderFuture<ChunkStream> {
        let http = self.http.clone();
        let backend = Arc::clone(&self.backend);

        Box::pin(async move {
            let resp = backend
                .request(&http, &req, true)
                .header(ACCEPT, "text/event-stream")
                .send()
                .await?;
            let resp = require_ok(backend.name(), resp).await?;

            let (tx, rx) = mpsc::channel::<Result<ChatChunk>>(64);

            tokio::spawn(async move {
                if let Err(e) = forward(backend.as_ref(), resp, &tx).await {
                    let _ = tx.send(Err(e)).await;
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
        })
    }
}

async fn require_ok(provider: &'static str, resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status == StatusCode::OK {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
    Err(Error::Provider {
        provider,
        status,
        body,
    })
}

/// Producer side: decode the body and send text deltas until a stop event or EOF.
async fn forward<B: Backend>(
    backend: &B,
    resp: reqwest::Response,
    tx: &mpsc::Sender<Result<ChatChunk>>,
) -> Result<()> {
    let mut body = resp.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(bytes) = body.next().await {
        let bytes = bytes?;
        for frame in decoder.push(&bytes) {
            if deliver(backend, frame?, tx).await?.is_break() {
                return Ok(());
            }
        }
    }

    if let Some(frame) = decoder.finish() {
        deliver(backend, frame?, tx).await?;
    }
    Ok(())
}

async fn deliver<B: Backend>(
    backend: &B,
    frame: SseFrame,
    tx: &mpsc::Sender<Result<ChatChunk>>,
) -> Result<ControlFlow<()>> {
    match backend.parse_event(&frame)? {
        StreamEvent::ContentDelta(text) if !text.is_empty() => {
            if tx.send(Ok(ChatChunk { text })).await.is_err() {
                // Consumer went away.
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        }
        StreamEvent::MessageStop => Ok(ControlFlow::Break(())),
        _ => Ok(ControlFlow::Continue(())),
    }
}
