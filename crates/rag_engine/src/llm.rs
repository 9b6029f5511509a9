//! Streaming chat model client for Gemini `streamGenerateContent`.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use rag_logging::rag_debug;
use serde::{Deserialize, Serialize};

use crate::config::{required, GeminiSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0}")]
    NotConfigured(String),
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat model rejected credentials: {0}")]
    Auth(String),
    #[error("chat model rate limited: {0}")]
    RateLimited(String),
    #[error("chat model returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("chat stream malformed: {0}")]
    Malformed(String),
    #[error("prompt blocked: {0}")]
    Blocked(String),
}

/// Ordered text fragments; the stream ending is the completion signal.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream(&self, request: ChatRequest) -> Result<TextStream, LlmError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<WireContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireSystem<'a>>,
}

#[derive(Serialize)]
struct WireContent<'a> {
    role: ChatRole,
    parts: [WirePart<'a>; 1],
}

#[derive(Serialize)]
struct WireSystem<'a> {
    parts: [WirePart<'a>; 1],
}

#[derive(Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiChat {
    pub fn new(settings: &GeminiSettings) -> Result<Self, LlmError> {
        let api_key = required(settings.api_key.as_deref(), "GOOGLE_API_KEY")
            .map_err(LlmError::NotConfigured)?
            .to_string();
        let endpoint = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            settings.base_url.trim_end_matches('/'),
            settings.chat_model
        );
        // No overall timeout: answers stream for as long as the model writes.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl ChatModel for GeminiChat {
    async fn stream(&self, request: ChatRequest) -> Result<TextStream, LlmError> {
        let body = GenerateRequest {
            contents: request
                .messages
                .iter()
                .map(|m| WireContent {
                    role: m.role,
                    parts: [WirePart { text: &m.text }],
                })
                .collect(),
            system_instruction: request.system.as_deref().map(|text| WireSystem {
                parts: [WirePart { text }],
            }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(unreadable body)".to_string());
            return Err(map_status(status.as_u16(), body));
        }

        rag_debug!("chat stream opened ({} messages)", request.messages.len());
        Ok(sse_text_stream(response.bytes_stream().boxed()))
    }
}

fn map_status(status: u16, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::Auth(body),
        429 => LlmError::RateLimited(body),
        _ => LlmError::Status { status, body },
    }
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    lines: SseLineBuffer,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

impl SseState {
    fn queue_line(&mut self, line: &str) {
        if let Some(item) = parse_sse_line(line) {
            let failed = item.is_err();
            self.pending.push_back(item);
            if failed {
                self.finished = true;
            }
        }
    }
}

/// Turns an SSE response body into text fragments. The stream stops after the
/// first error.
fn sse_text_stream(body: BoxStream<'static, reqwest::Result<Bytes>>) -> TextStream {
    let state = SseState {
        body,
        lines: SseLineBuffer::default(),
        pending: VecDeque::new(),
        finished: false,
    };
    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    for line in state.lines.push(&bytes) {
                        state.queue_line(&line);
                        if state.finished {
                            break;
                        }
                    }
                }
                Some(Err(err)) => {
                    state.pending.push_back(Err(LlmError::Http(err)));
                    state.finished = true;
                }
                None => {
                    if let Some(line) = state.lines.finish() {
                        state.queue_line(&line);
                    }
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

/// Splits a byte stream into lines, holding partial lines (and partial UTF-8
/// sequences) until the rest arrives.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Returns any unterminated trailing line.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
        Some(line)
    }
}

/// Interprets one SSE line. Only `data:` lines with text produce output.
pub fn parse_sse_line(line: &str) -> Option<Result<String, LlmError>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    let chunk: GenerateChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(err) => return Some(Err(LlmError::Malformed(err.to_string()))),
    };
    if let Some(error) = chunk.error {
        let message = error.message.unwrap_or_else(|| "unknown error".to_string());
        return Some(Err(LlmError::Malformed(message)));
    }
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Some(Err(LlmError::Blocked(reason)));
    }
    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();
    if text.is_empty() {
        None
    } else {
        Some(Ok(text))
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_sse_line, LlmError, SseLineBuffer};

    #[test]
    fn line_buffer_joins_across_chunks() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        assert_eq!(buffer.push(b":1}\r\n\r\nda"), vec!["data: {\"a\":1}", ""]);
        assert_eq!(buffer.finish().as_deref(), Some("da"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn line_buffer_keeps_split_utf8_intact() {
        let mut buffer = SseLineBuffer::default();
        let bytes = "data: é\n".as_bytes();
        assert!(buffer.push(&bytes[..7]).is_empty());
        assert_eq!(buffer.push(&bytes[7..]), vec!["data: é"]);
    }

    #[test]
    fn data_line_yields_joined_parts() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}],"role":"model"}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap().unwrap(), "Hello");
    }

    #[test]
    fn non_data_and_empty_chunks_are_skipped() {
        assert!(parse_sse_line("event: ping").is_none());
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(r#"data: {"candidates":[{"finishReason":"STOP"}]}"#).is_none());
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let line = r#"data: {"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(matches!(
            parse_sse_line(line),
            Some(Err(LlmError::Blocked(reason))) if reason == "SAFETY"
        ));
    }
}
