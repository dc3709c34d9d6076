use crate::core::{CanonicalPosition, PipelineError, Result, Sink};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;

pub const DEFAULT_TABLE: &str = "subway_realtime_positions";

/// Batch-inserts positions through the PostgREST endpoint of a Supabase project.
pub struct SupabaseSink {
    client: Client,
    endpoint: Option<Url>,
    key: String,
}

impl SupabaseSink {
    /// An empty `base_url` builds an unconfigured sink whose writes fail with a config error.
    pub fn new(base_url: &str, key: &str, table: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = if base_url.trim().is_empty() {
            None
        } else {
            Some(table_endpoint(base_url, table)?)
        };

        Ok(Self {
            client,
            endpoint,
            key: key.to_string(),
        })
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }
}

fn table_endpoint(base_url: &str, table: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| PipelineError::Config(format!("invalid storage url {base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| PipelineError::Config(format!("storage url {base_url} cannot carry a path")))?
        .pop_if_empty()
        .extend(["rest", "v1", table]);
    Ok(url)
}

#[async_trait]
impl Sink for SupabaseSink {
    async fn write(&self, records: &[CanonicalPosition]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let Some(endpoint) = &self.endpoint else {
            return Err(PipelineError::Config("storage endpoint is not configured".to_string()));
        };

        let response = self
            .client
            .post(endpoint.clone())
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(records)
            .send()
            .await
            .map_err(|e| PipelineError::Write(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Write(format!("{status}: {body}")));
        }

        Ok(records.len())
    }
}
