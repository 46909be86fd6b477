//! Anthropic Messages API as an inference capability
//!
//! Requests are always streamed. The response body is server-sent events;
//! text deltas become chunks and `message_stop` ends the stream.
use async_trait::async_trait;
use futures::StreamExt;
use offerlab_core::InferenceError;
use offerlab_stages::{ChunkStream, InferenceCapability, InferenceRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicInference {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicInference {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| InferenceError::InvalidRequest(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[async_trait]
impl InferenceCapability for AnthropicInference {
    async fn infer(&self, request: InferenceRequest) -> Result<ChunkStream, InferenceError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
            stream: true,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InferenceError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(InferenceError::Stream(e.to_string()));
                        return;
                    }
                };
                for data in decoder.push(&chunk) {
                    match interpret(&data) {
                        Frame::Text(text) => yield Ok(text),
                        Frame::Skip => {}
                        Frame::Stop => return,
                        Frame::Fail(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
            }
            yield Err(InferenceError::Stream("connection closed before message_stop".to_string()));
        };

        Ok(Box::pin(stream))
    }
}

/// Splits a byte stream into the payloads of `data:` lines. Bytes are
/// buffered until a full line arrives, so multibyte characters split
/// across network chunks survive.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, PartialEq)]
enum Frame {
    Text(String),
    Skip,
    Stop,
    Fail(InferenceError),
}

fn interpret(data: &str) -> Frame {
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(StreamEvent::ContentBlockDelta { delta }) => match delta.text {
            Some(text) if !text.is_empty() => Frame::Text(text),
            _ => Frame::Skip,
        },
        Ok(StreamEvent::MessageStop) => Frame::Stop,
        Ok(StreamEvent::Error { error }) => Frame::Fail(InferenceError::Stream(format!("{}: {}", error.kind, error.message))),
        Ok(StreamEvent::Other) => Frame::Skip,
        Err(e) => Frame::Fail(InferenceError::Stream(format!("undecodable event: {}", e))),
    }
}
