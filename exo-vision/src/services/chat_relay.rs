//! Chat relay to a local inference server
//!
//! Speaks the Ollama `/api/chat` streaming protocol: the request carries the
//! role-tagged transcript, the response is newline-delimited JSON frames with
//! `message.content` tokens and a final `done: true`.
//!
//! A reply is exposed as a stream of [`ChatChunk`]s. `Done` and `Error` are
//! terminal. Dropping the stream aborts the HTTP request.

use exo_common::config::ChatConfig;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("ExoVision/", env!("CARGO_PKG_VERSION"));

/// System prompt prepended to every transcript
pub const SYSTEM_PROMPT: &str = "You are the ExoVision assistant. Answer questions about \
exoplanets, the transit method, light curves and the Kepler confirmed/false-positive \
classifier. Keep answers short and accurate.";

/// Assistant message used when the relay fails
pub const FALLBACK_MESSAGE: &str = "The assistant is unavailable right now. \
Check that the local model server is running and try again.";

/// Chat relay errors
#[derive(Debug, Error)]
pub enum ChatRelayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Inference server error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Speaker of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One transcript message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Incremental piece of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum ChatChunk {
    Token(String),
    Done,
    Error(String),
}

#[derive(Debug, Deserialize)]
struct FrameMessage {
    #[serde(default)]
    content: String,
}

/// One NDJSON line of the response
#[derive(Debug, Deserialize)]
struct Frame {
    message: Option<FrameMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

/// Splits a byte stream into complete, non-empty lines
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        (!text.is_empty()).then_some(text)
    }
}

/// Translate one frame into the chunks it carries
fn frame_chunks(line: &str) -> Vec<ChatChunk> {
    let frame: Frame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(e) => {
            return vec![ChatChunk::Error(
                ChatRelayError::Parse(e.to_string()).to_string(),
            )]
        }
    };

    if let Some(error) = frame.error {
        return vec![ChatChunk::Error(error)];
    }

    let mut chunks = Vec::new();
    if let Some(message) = frame.message {
        if !message.content.is_empty() {
            chunks.push(ChatChunk::Token(message.content));
        }
    }
    if frame.done {
        chunks.push(ChatChunk::Done);
    }
    chunks
}

/// HTTP client for the local inference server
#[derive(Debug, Clone)]
pub struct ChatRelay {
    http_client: reqwest::Client,
    config: ChatConfig,
}

impl ChatRelay {
    pub fn new(config: ChatConfig) -> Result<Self, ChatRelayError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatRelayError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.config.host.trim_end_matches('/'))
    }

    fn request_body(&self, transcript: &[ChatMessage]) -> serde_json::Value {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(json!({ "role": ChatRole::System, "content": SYSTEM_PROMPT }));
        messages.extend(
            transcript
                .iter()
                .map(|m| json!({ "role": m.role, "content": m.content })),
        );

        json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens,
            },
        })
    }

    /// Stream the assistant reply to `transcript`
    ///
    /// Always terminates with exactly one `Done` or `Error` chunk.
    pub fn stream_reply(
        &self,
        transcript: &[ChatMessage],
    ) -> impl Stream<Item = ChatChunk> + Send + 'static {
        let client = self.http_client.clone();
        let url = self.endpoint();
        let body = self.request_body(transcript);
        let model = self.config.model.clone();

        async_stream::stream! {
            tracing::debug!(url = %url, model = %model, "Sending chat request");

            let response = match client.post(&url).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    yield ChatChunk::Error(ChatRelayError::Network(e.to_string()).to_string());
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                yield ChatChunk::Error(ChatRelayError::Api(status.as_u16(), text).to_string());
                return;
            }

            let mut decoder = LineDecoder::default();
            let mut bytes = Box::pin(response.bytes_stream());
            while let Some(item) = bytes.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield ChatChunk::Error(ChatRelayError::Network(e.to_string()).to_string());
                        return;
                    }
                };
                for line in decoder.push(&chunk) {
                    for out in frame_chunks(&line) {
                        let terminal = !matches!(out, ChatChunk::Token(_));
                        yield out;
                        if terminal {
                            return;
                        }
                    }
                }
            }

            if let Some(line) = decoder.finish() {
                for out in frame_chunks(&line) {
                    let terminal = !matches!(out, ChatChunk::Token(_));
                    yield out;
                    if terminal {
                        return;
                    }
                }
            }

            // Server closed the stream without a done frame
            yield ChatChunk::Done;
        }
    }
}
