//! Progress reporting
use offerlab_core::{ProgressEvent, StageId, StageStatus};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _event: &ProgressEvent) {}
}

/// Logs every event
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: &ProgressEvent) {
        tracing::info!(
            run_id = %event.run_id,
            pipeline = %event.pipeline,
            stage = %event.stage,
            status = event.status.as_str(),
            detail = event.message.as_deref().unwrap_or(""),
            "{}",
            event.stage_name
        );
    }
}

/// Keeps events in memory
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Status transitions seen for one stage, in order
    pub fn statuses(&self, stage: StageId) -> Vec<StageStatus> {
        self.events()
            .into_iter()
            .filter(|e| e.stage == stage)
            .map(|e| e.status)
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: &ProgressEvent) {
        let _ = self.send(event.clone());
    }
}

/// Sends every event to each inner sink
#[derive(Default, Clone)]
pub struct FanOut(Vec<Arc<dyn ProgressSink>>);

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.0.push(sink);
        self
    }
}

impl ProgressSink for FanOut {
    fn emit(&self, event: &ProgressEvent) {
        for sink in &self.0 {
            sink.emit(event);
        }
    }
}
