//! Inference seam
//!
//! The executor never talks to a provider directly. It asks an
//! [`InferenceCapability`] for a stream of text chunks and accumulates them.

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use offerlab_core::{InferenceError, StageId};
use serde::Serialize;
use std::pin::Pin;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferenceRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub stream: bool,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, InferenceError>> + Send>>;

/// Model provider
#[async_trait]
pub trait InferenceCapability: Send + Sync {
    /// Start a generation. Errors before the first chunk (connect, non-2xx)
    /// are returned directly; errors mid-way arrive on the stream.
    async fn infer(&self, request: InferenceRequest) -> Result<ChunkStream, InferenceError>;
}

/// Receives raw chunks as they arrive, for live display
pub trait ChunkSink: Send + Sync {
    fn on_chunk(&self, stage: StageId, chunk: &str);
}

pub struct NoopSink;

impl ChunkSink for NoopSink {
    fn on_chunk(&self, _stage: StageId, _chunk: &str) {}
}

/// Forwards chunks to a channel; a closed receiver is ignored
pub struct ChannelSink(pub mpsc::UnboundedSender<String>);

impl ChunkSink for ChannelSink {
    fn on_chunk(&self, _stage: StageId, chunk: &str) {
        let _ = self.0.send(chunk.to_string());
    }
}

/// Drain a chunk stream into one string, forwarding every chunk to `sink`
pub async fn collect_stream(
    mut stream: ChunkStream,
    stage: StageId,
    sink: &dyn ChunkSink,
) -> Result<String, InferenceError> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        sink.on_chunk(stage, &chunk);
        text.push_str(&chunk);
    }
    Ok(text)
}
