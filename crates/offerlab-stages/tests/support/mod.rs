//! Test doubles shared by the integration tests.
//!
//! Prompts are rendered as `STAGE:<id>` so the stub provider knows which
//! stage it is answering. Unscripted stages answer with the fixture files
//! under `testing/fixtures/stages/`.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use offerlab_core::{InferenceError, PipelineContext, PromptBuilder, PromptError, StageDefinition, StageId, StageOutputs};
use offerlab_stages::{ChunkStream, InferenceCapability, InferenceRequest};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub fn fixtures_dir() -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = std::path::Path::new(&manifest_dir).parent().unwrap().parent().unwrap();
    workspace_root.join("testing/fixtures/stages")
}

/// Raw fixture text for a stage, if one exists
pub fn fixture(stage: u32) -> Option<String> {
    let dir = fixtures_dir();
    ["json", "md"]
        .iter()
        .map(|ext| dir.join(format!("stage_{:02}.{}", stage, ext)))
        .find(|path| path.exists())
        .map(|path| std::fs::read_to_string(path).unwrap())
}

/// Parsed fixture outputs for the given stages, as an upstream import
pub fn fixture_outputs(stages: &[u32]) -> StageOutputs {
    StageOutputs::from_pairs(stages.iter().map(|id| {
        let raw = fixture(*id).unwrap();
        let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        (StageId(*id), value)
    }))
}

pub fn stage_prompts() -> Arc<dyn PromptBuilder> {
    Arc::new(
        |stage: &StageDefinition, _ctx: &PipelineContext| -> Result<String, PromptError> {
            Ok(format!("STAGE:{}", stage.id))
        },
    )
}

pub enum Reply {
    Text(String),
    Fail(InferenceError),
    /// Some text, then a transport error mid-stream
    Broken(String, InferenceError),
    /// Never produces a chunk
    Hang,
}

#[derive(Default)]
pub struct StubInference {
    scripted: Mutex<HashMap<StageId, VecDeque<Reply>>>,
    calls: Mutex<Vec<InferenceRequest>>,
}

impl StubInference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next call to `stage`; later calls fall back to the fixture
    pub fn script(self, stage: u32, reply: Reply) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .entry(StageId(stage))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<StageId> {
        self.calls.lock().unwrap().iter().map(|r| stage_of(r)).collect()
    }

    pub fn calls_for(&self, stage: u32) -> usize {
        self.calls().iter().filter(|id| **id == StageId(stage)).count()
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.calls.lock().unwrap().clone()
    }
}

fn stage_of(request: &InferenceRequest) -> StageId {
    request
        .prompt
        .strip_prefix("STAGE:")
        .and_then(|id| id.parse().ok())
        .map(StageId)
        .unwrap()
}

/// Split text into a few chunks, as a provider would stream it
fn chunked(text: String) -> Vec<Result<String, InferenceError>> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(64)
        .map(|c| Ok(c.iter().collect::<String>()))
        .collect()
}

#[async_trait]
impl InferenceCapability for StubInference {
    async fn infer(&self, request: InferenceRequest) -> Result<ChunkStream, InferenceError> {
        let stage = stage_of(&request);
        self.calls.lock().unwrap().push(request);

        let reply = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&stage)
            .and_then(|queue| queue.pop_front());
        let reply = match reply {
            Some(reply) => reply,
            None => match fixture(stage.get()) {
                Some(text) => Reply::Text(text),
                None => Reply::Fail(InferenceError::InvalidRequest(format!("no fixture for stage {}", stage))),
            },
        };

        match reply {
            Reply::Text(text) => Ok(Box::pin(stream::iter(chunked(text)))),
            Reply::Fail(err) => Err(err),
            Reply::Broken(text, err) => Ok(Box::pin(stream::iter(vec![Ok(text), Err(err)]))),
            Reply::Hang => Ok(Box::pin(stream::pending())),
        }
    }
}
