use super::{ChatChunk, ChatRequest, ChunkStream, Provider, ProviderFuture};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Offline provider that replays canned chunks. Counts how often it was asked.
#[derive(Debug, Clone)]
pub struct StubProvider {
    chunks: Vec<String>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn new() -> Self {
        let chunks = [
            "--------------------------------------------------\nSUMMARY:\n",
            "  - Files modified: 1\n  - Stub explanation, no model was called\n",
            "  - Insertions: [AD",
            "D]1[/ADD]\n  - Deletions: [DEL]0[/D",
            "EL]\n--------------------------------------------------",
        ];
        Self {
            chunks: chunks.iter().map(|s| s.to_string()).collect(),
            delay: Duration::from_millis(120),
            calls: Arc::default(),
        }
    }

    pub fn with_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay: Duration::ZERO,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn complete(&self, _req: ChatRequest) -> ProviderFuture<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.chunks.concat().trim().to_string();
        Box::pin(async move { Ok(text) })
    }

    fn stream_chat(&self, _req: ChatRequest) -> ProviderFuture<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks = self.chunks.clone();
        let delay = self.delay;

        Box::pin(async move {
            let (tx, rx) = mpsc::channel(32);

            tokio::spawn(async move {
                for text in chunks {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if tx.send(Ok(ChatChunk { text })).await.is_err() {
                        break;
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
        })
    }
}
