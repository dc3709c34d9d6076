use crate::core::{FetchOutcome, PipelineError, Sink, Source, map_items};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Consecutive failed cycles per source; reset by any successful cycle.
#[derive(Debug, Default)]
pub struct FailureTracker {
    counts: HashMap<String, u32>,
}

impl FailureTracker {
    pub fn record_success(&mut self, line: &str) {
        self.counts.remove(line);
    }

    pub fn record_failure(&mut self, line: &str) -> u32 {
        let count = self.counts.entry(line.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn consecutive_failures(&self, line: &str) -> u32 {
        self.counts.get(line).copied().unwrap_or(0)
    }
}

/// Runs one fetch/map/write cycle over every configured source.
pub struct Pipeline {
    source: Arc<dyn Source>,
    sink: Arc<dyn Sink>,
    lines: Vec<String>,
    failures: FailureTracker,
    failure_threshold: u32,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn Source>, sink: Arc<dyn Sink>, lines: Vec<String>) -> Self {
        Self {
            source,
            sink,
            lines,
            failures: FailureTracker::default(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            shutdown: None,
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Stop between sources once the receiver reads `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }

    /// Returns the number of records the sink accepted across all sources.
    pub async fn run_once(&mut self) -> usize {
        tracing::info!(sources = self.lines.len(), "starting ingestion run");
        let mut total = 0;

        for line in &self.lines {
            if self.shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
                tracing::info!(line = %line, "shutdown requested, skipping remaining sources");
                break;
            }

            match process_source(self.source.as_ref(), self.sink.as_ref(), line).await {
                Ok(written) => {
                    self.failures.record_success(line);
                    if written > 0 {
                        tracing::info!(line = %line, written, "wrote positions");
                    }
                    total += written;
                }
                Err(failure) => {
                    let failures = self.failures.record_failure(line);
                    match &failure {
                        // Already reported by the source client.
                        CycleError::Fetch(e) => {
                            tracing::debug!(line = %line, kind = e.kind(), failures, "fetch failed, nothing written")
                        }
                        CycleError::Write(e) => {
                            tracing::error!(line = %line, kind = e.kind(), error = %e, failures, "write failed")
                        }
                    }
                    if failures == self.failure_threshold {
                        tracing::error!(
                            line = %line,
                            failures,
                            "source has failed {} consecutive runs",
                            failures
                        );
                    }
                }
            }
        }

        tracing::info!(total, "ingestion run completed");
        total
    }
}

/// Which stage of a source cycle failed.
enum CycleError {
    Fetch(PipelineError),
    Write(PipelineError),
}

async fn process_source(
    source: &dyn Source,
    sink: &dyn Sink,
    line: &str,
) -> std::result::Result<usize, CycleError> {
    let items = match source.fetch(line).await {
        FetchOutcome::Failed(e) => return Err(CycleError::Fetch(e)),
        outcome => outcome.into_items(),
    };
    if items.is_empty() {
        return Ok(0);
    }

    let records = map_items(line, &items);
    if records.len() < items.len() {
        tracing::warn!(line = %line, rejected = items.len() - records.len(), "dropped unmappable items");
    }
    if records.is_empty() {
        return Ok(0);
    }

    sink.write(&records).await.map_err(CycleError::Write)
}
