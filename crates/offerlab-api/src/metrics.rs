//! Prometheus counters for stage progress and run outcomes
use offerlab_core::ProgressEvent;
use offerlab_stages::{ProgressSink, RunReport};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct ApiMetrics {
    registry: Registry,
    stage_events: IntCounterVec,
    stage_failures: IntCounterVec,
    runs: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let stage_events = IntCounterVec::new(
            Opts::new("offerlab_stage_events_total", "Stage status transitions"),
            &["stage", "status"],
        )?;
        let stage_failures = IntCounterVec::new(
            Opts::new("offerlab_stage_failures_total", "Runs stopped at a stage, by failure kind"),
            &["stage", "kind"],
        )?;
        let runs = IntCounterVec::new(
            Opts::new("offerlab_runs_total", "Finished runs by pipeline and outcome"),
            &["pipeline", "outcome"],
        )?;
        registry.register(Box::new(stage_events.clone()))?;
        registry.register(Box::new(stage_failures.clone()))?;
        registry.register(Box::new(runs.clone()))?;
        Ok(Self {
            registry,
            stage_events,
            stage_failures,
            runs,
        })
    }

    pub fn record_run(&self, report: &RunReport) {
        let outcome = match &report.failure {
            None => "completed",
            Some(failure) => {
                let stage = failure.stage.to_string();
                self.stage_failures
                    .with_label_values(&[stage.as_str(), failure.kind.as_str()])
                    .inc();
                failure.kind.as_str()
            }
        };
        self.runs.with_label_values(&[report.pipeline.as_str(), outcome]).inc();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

impl ProgressSink for ApiMetrics {
    fn emit(&self, event: &ProgressEvent) {
        let stage = event.stage.to_string();
        self.stage_events
            .with_label_values(&[stage.as_str(), event.status.as_str()])
            .inc();
    }
}
