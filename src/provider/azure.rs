use super::sse::SseFrame;
use super::{Backend, ChatRequest, StreamEvent, UserMessage};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Stream terminator sent as a bare data line.
const DONE: &str = "[DONE]";
const TOP_P: f32 = 0.95;

#[derive(Debug, Clone)]
pub struct AzureBackend {
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
}

impl AzureBackend {
    pub fn new(
        api_key: String,
        endpoint: String,
        deployment: Option<String>,
        api_version: Option<String>,
    ) -> Self {
        Self {
            api_key,
            endpoint,
            deployment: deployment.unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string()),
            api_version: api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

impl Backend for AzureBackend {
    fn name(&self) -> &'static str {
        "Azure OpenAI"
    }

    fn request(
        &self,
        http: &reqwest::Client,
        req: &ChatRequest,
        stream: bool,
    ) -> reqwest::RequestBuilder {
        let body = ChatCompletionsRequest {
            messages: vec![UserMessage::new(req.prompt.as_str())],
            temperature: req.temperature,
            top_p: TOP_P,
            max_tokens: req.max_tokens,
            stream,
        };

        http.post(self.url())
            .header("api-key", &self.api_key)
            .json(&body)
    }

    fn parse_batch(&self, body: &[u8]) -> Result<String> {
        let resp: ChatCompletionsResponse = serde_json::from_slice(body)
            .map_err(|e| Error::decode(&String::from_utf8_lossy(body), e))?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                Error::decode(
                    &String::from_utf8_lossy(body),
                    "no content in Azure OpenAI response",
                )
            })
    }

    fn parse_event(&self, frame: &SseFrame) -> Result<StreamEvent> {
        if frame.data.trim() == DONE {
            return Ok(StreamEvent::MessageStop);
        }

        let chunk: StreamChunk =
            serde_json::from_str(&frame.data).map_err(|e| Error::decode(&frame.data, e))?;

        let text: String = chunk
            .choices
            .iter()
            .filter_map(|c| c.delta.as_ref()?.content.as_deref())
            .collect();

        if !text.is_empty() {
            return Ok(StreamEvent::ContentDelta(text));
        }

        let finished = chunk
            .choices
            .iter()
            .any(|c| c.finish_reason.as_deref().is_some_and(|r| !r.is_empty()));
        Ok(if finished {
            StreamEvent::MessageStop
        } else {
            StreamEvent::Unknown
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    messages: Vec<UserMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
