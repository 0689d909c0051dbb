use super::sse::SseFrame;
use super::{Backend, ChatRequest, StreamEvent, UserMessage};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-latest";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct ClaudeBackend {
    api_key: String,
    model: String,
    api_url: String,
}

impl ClaudeBackend {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url: API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

impl Backend for ClaudeBackend {
    fn name(&self) -> &'static str {
        "Claude"
    }

    fn request(
        &self,
        http: &reqwest::Client,
        req: &ChatRequest,
        stream: bool,
    ) -> reqwest::RequestBuilder {
        let body = MessagesRequest {
            model: &self.model,
            messages: vec![UserMessage::new(req.prompt.as_str())],
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            stream,
        };

        http.post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
    }

    fn parse_batch(&self, body: &[u8]) -> Result<String> {
        let resp: MessagesResponse = serde_json::from_slice(body)
            .map_err(|e| Error::decode(&String::from_utf8_lossy(body), e))?;

        let text: String = resp
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(Error::decode(
                &String::from_utf8_lossy(body),
                "no text content in Claude response",
            ));
        }
        Ok(text)
    }

    fn parse_event(&self, frame: &SseFrame) -> Result<StreamEvent> {
        let payload: EventPayload =
            serde_json::from_str(&frame.data).map_err(|e| Error::decode(&frame.data, e))?;

        // The `event:` line wins; the payload's own `type` covers streams without one.
        let kind = frame.event.as_deref().or(payload.kind.as_deref());

        let ev = match kind {
            Some("message_start") => StreamEvent::MessageStart,
            Some("content_block_delta") => match payload.delta {
                Some(Delta {
                    kind: Some(k),
                    text: Some(text),
                }) if k == "text_delta" => StreamEvent::ContentDelta(text),
                _ => StreamEvent::Unknown,
            },
            Some("content_block_stop") => StreamEvent::ContentStop,
            Some("message_stop") => StreamEvent::MessageStop,
            Some("ping") => StreamEvent::Ping,
            Some("error") => {
                return Err(Error::Provider {
                    provider: self.name(),
                    status: reqwest::StatusCode::OK,
                    body: frame.data.clone(),
                })
            }
            _ => StreamEvent::Unknown,
        };
        Ok(ev)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<UserMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Prompt;
    use crate::provider::testing::{client, serve_once, SSE};
    use crate::provider::{HttpProvider, Provider};
    use crate::render::MarkupScheme;
    use tokio_stream::StreamExt;

    fn backend() -> ClaudeBackend {
        ClaudeBackend::new("test-key".into(), None)
    }

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.into()),
            data: data.into(),
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::new(Prompt::build("diff --git a/f b/f\n+x\n", MarkupScheme::Brackets))
    }

    #[test]
    fn batch_concatenates_text_blocks() {
        let body = br#"{"id":"m","type":"message","content":[
            {"type":"text","text":"  first "},
            {"type":"tool_use","id":"t"},
            {"type":"text","text":"second  "}]}"#;
        assert_eq!(backend().parse_batch(body).unwrap(), "  first second  ");
    }

    #[test]
    fn batch_without_text_is_a_decode_error() {
        let err = backend().parse_batch(br#"{"content":[]}"#).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));

        let err = backend().parse_batch(b"<html>").unwrap_err();
        assert!(err.to_string().contains("<html>"));
    }

    #[test]
    fn events_dispatch_on_event_type() {
        let b = backend();
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#;
        assert_eq!(
            b.parse_event(&frame("content_block_delta", delta)).unwrap(),
            StreamEvent::ContentDelta("hi".into())
        );

        let json_delta = r#"{"type":"content_block_delta","delta":{"type":"input_json_delta","partial_json":"{"}}"#;
        assert_eq!(
            b.parse_event(&frame("content_block_delta", json_delta)).unwrap(),
            StreamEvent::Unknown
        );

        assert_eq!(
            b.parse_event(&frame("message_start", r#"{"type":"message_start","message":{}}"#))
                .unwrap(),
            StreamEvent::MessageStart
        );
        assert_eq!(
            b.parse_event(&frame("message_stop", r#"{"type":"message_stop"}"#)).unwrap(),
            StreamEvent::MessageStop
        );
        assert_eq!(
            b.parse_event(&frame("message_delta", r#"{"delta":{"stop_reason":"end_turn"}}"#))
                .unwrap(),
            StreamEvent::Unknown
        );
    }

    #[test]
    fn malformed_event_json_is_fatal() {
        let err = backend()
            .parse_event(&frame("content_block_delta", "{\"delta\":"))
            .unwrap_err();
        assert!(matches!(err, Error::Decode { ref fragment, .. } if fragment == "{\"delta\":"));
    }

    #[test]
    fn error_event_surfaces_as_provider_error() {
        let data = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = backend().parse_event(&frame("error", data)).unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[tokio::test]
    async fn streams_text_deltas_and_stops_at_message_stop() {
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"m\"}}\n\n",
            "event: ping\n",
            "data: {\"type\": \"ping\"}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"[ADD]hel\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo[/ADD]\"}}\n\n",
            "event: content_block_stop\n",
            "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"after stop\"}}\n\n",
        );
        let (url, server) = serve_once("200 OK", SSE, body).await;

        let provider = HttpProvider::new(client(), backend().with_api_url(url));
        let mut stream = provider.stream_chat(request()).await.unwrap();

        let mut texts = Vec::new();
        while let Some(chunk) = stream.next().await {
            texts.push(chunk.unwrap().text);
        }
        assert_eq!(texts, vec!["[ADD]hel", "lo[/ADD]"]);

        let raw = server.await.unwrap();
        let lower = raw.to_lowercase();
        assert!(lower.contains("x-api-key: test-key"));
        assert!(lower.contains("anthropic-version: 2023-06-01"));
        assert!(lower.contains("accept: text/event-stream"));
        assert!(raw.contains("\"stream\":true"));
        assert!(raw.contains("\"model\":\"claude-3-7-sonnet-latest\""));
        assert!(raw.contains("\"max_tokens\":4000"));
    }

    #[tokio::test]
    async fn malformed_stream_json_ends_with_error() {
        let body = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"ok\"}}\n\n",
            "event: content_block_delta\n",
            "data: {not json\n\n",
        );
        let (url, _server) = serve_once("200 OK", SSE, body).await;

        let provider = HttpProvider::new(client(), backend().with_api_url(url));
        let mut stream = provider.stream_chat(request()).await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap().text, "ok");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn complete_trims_and_rejects_non_200() {
        let body = r#"{"content":[{"type":"text","text":"\n  explained \n"}]}"#;
        let (url, server) = serve_once("200 OK", "application/json", body).await;
        let provider = HttpProvider::new(client(), backend().with_api_url(url));
        assert_eq!(provider.complete(request()).await.unwrap(), "explained");
        assert!(server.await.unwrap().contains("\"stream\":false"));

        let (url, _server) =
            serve_once("529 Overloaded", "application/json", r#"{"error":"busy"}"#).await;
        let provider = HttpProvider::new(client(), backend().with_api_url(url));
        match provider.complete(request()).await.unwrap_err() {
            Error::Provider { status, body, .. } => {
                assert_eq!(status.as_u16(), 529);
                assert_eq!(body, r#"{"error":"busy"}"#);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
