use crate::core::{CanonicalPosition, PipelineError, RawPositionItem, Result};
use async_trait::async_trait;

/// GET-with-timeout capability the source client is built on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the response body of a successful (2xx) GET.
    async fn get(&self, url: &str) -> Result<String>;
}

/// Classified result of fetching one source. Never an error: failures are carried as a value
/// so callers can count them while still treating the source as empty.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The upstream list field was present; it may be empty.
    Items(Vec<RawPositionItem>),
    /// Informational success status without a list field.
    NoData,
    /// Transport failure, undecodable body or non-success upstream status.
    Failed(PipelineError),
}

impl FetchOutcome {
    pub fn into_items(self) -> Vec<RawPositionItem> {
        match self {
            FetchOutcome::Items(items) => items,
            FetchOutcome::NoData | FetchOutcome::Failed(_) => Vec::new(),
        }
    }
}

#[async_trait]
pub trait Source: Send + Sync {
    async fn fetch(&self, line: &str) -> FetchOutcome;
}

#[async_trait]
pub trait Sink: Send + Sync {
    /// Writes the whole batch in one operation and returns how many records were accepted.
    /// An empty batch is a no-op.
    async fn write(&self, records: &[CanonicalPosition]) -> Result<usize>;
}
