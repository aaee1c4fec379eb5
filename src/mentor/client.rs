//! Streaming chat completion client
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint with
//! `stream: true` and hands each content delta to a callback.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::MentorError;
use crate::config::AiSettings;

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A model that streams its reply
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send `messages`, call `on_token` per delta, return the full reply
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<String, MentorError>;
}

#[derive(Debug, Serialize)]
struct StreamingRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct StreamingResponse {
    #[serde(default)]
    choices: Vec<StreamingChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamingChoice {
    delta: StreamingDelta,
}

#[derive(Debug, Deserialize)]
struct StreamingDelta {
    content: Option<String>,
}

/// Splits a server-sent-event byte stream into `data:` payloads
#[derive(Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes, get back the payloads of every event completed by them
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();

        while let Some(end) = find_event_end(&self.buffer) {
            let (event_len, sep_len) = end;
            let event: Vec<u8> = self.buffer.drain(..event_len + sep_len).collect();
            let event = String::from_utf8_lossy(&event[..event_len]);
            payloads.extend(data_lines(&event));
        }
        payloads
    }

    /// Payloads of a trailing event the server never terminated
    pub(crate) fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_lines(&String::from_utf8_lossy(&rest))
    }
}

/// (event length, separator length) of the first complete event
fn find_event_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn data_lines(event: &str) -> Vec<String> {
    event
        .lines()
        .filter_map(|line| line.trim_end_matches('\r').strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .filter(|data| !data.is_empty())
        .collect()
}

/// Content delta carried by one payload, if any
fn delta_content(payload: &str) -> Option<String> {
    match serde_json::from_str::<StreamingResponse>(payload) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty()),
        Err(e) => {
            // Some servers send keep-alive or empty chunks
            debug!("Failed to parse SSE chunk: {}", e);
            None
        }
    }
}

pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    /// Client for the configured endpoint; `None` when no key is set and the
    /// endpoint is the public OpenAI one
    pub fn from_settings(settings: &AiSettings) -> Option<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() && settings.base_url.contains("api.openai.com") {
            return None;
        }
        Some(Self::new(&settings.base_url, &settings.model, api_key))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<String, MentorError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = StreamingRequest {
            model: &self.model,
            messages,
            stream: true,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to send chat request");
            MentorError::Request(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, url = %url, "Chat endpoint returned an error");
            return Err(MentorError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut reply = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MentorError::Stream(e.to_string()))?;
            for payload in decoder.push(&chunk) {
                if payload.trim() == "[DONE]" {
                    return Ok(reply);
                }
                if let Some(content) = delta_content(&payload) {
                    on_token(content.as_str());
                    reply.push_str(&content);
                }
            }
        }

        for payload in decoder.finish() {
            if let Some(content) = delta_content(&payload) {
                on_token(content.as_str());
                reply.push_str(&content);
            }
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_splits_events_across_pushes() {
        let mut decoder = SseDecoder::default();
        let first = decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel");
        assert!(first.is_empty());

        let second = decoder.push(b"lo\"}}]}\n\ndata: [DONE]\n\n");
        assert_eq!(second.len(), 2);
        assert_eq!(delta_content(&second[0]).as_deref(), Some("Hello"));
        assert_eq!(second[1], "[DONE]");
    }

    #[test]
    fn test_decoder_handles_crlf_and_comments() {
        let mut decoder = SseDecoder::default();
        let payloads = decoder.push(b": keep-alive\r\n\r\ndata: {\"choices\":[]}\r\n\r\n");
        assert_eq!(payloads, vec!["{\"choices\":[]}".to_string()]);
        assert_eq!(delta_content(&payloads[0]), None);
    }

    #[test]
    fn test_decoder_keeps_split_multibyte_text() {
        let mut decoder = SseDecoder::default();
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"}}]}\n\n".as_bytes();
        let split = event.iter().position(|b| *b == 0xC3).unwrap() + 1;

        assert!(decoder.push(&event[..split]).is_empty());
        let payloads = decoder.push(&event[split..]);
        assert_eq!(delta_content(&payloads[0]).as_deref(), Some("héllo"));
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder
            .push(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
            .is_empty());
        let rest = decoder.finish();
        assert_eq!(delta_content(&rest[0]).as_deref(), Some("tail"));
    }

    #[test]
    fn test_invalid_json_is_skipped() {
        assert_eq!(delta_content("not json"), None);
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("be nice"), ChatMessage::user("hi")];
        let body = StreamingRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            stream: true,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAiChatClient::new("http://localhost:11434/v1/", "llama3.2", None);
        assert_eq!(client.base_url, "http://localhost:11434/v1");
        assert_eq!(client.model(), "llama3.2");
    }
}
