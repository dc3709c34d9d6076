use crate::core::{FetchOutcome, PipelineError, RawPositionItem, Result, Source, Transport};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "http://swopenAPI.seoul.go.kr/api/subway";
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upstream code for "request succeeded".
const INFO_OK: &str = "INFO-000";

#[derive(Debug, Deserialize)]
struct PositionResponse {
    #[serde(rename = "realtimePositionList")]
    list: Option<Vec<Value>>,
    #[serde(rename = "RESULT")]
    result: Option<ResultStatus>,
    // Error bodies sometimes carry the status at the top level instead.
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultStatus {
    #[serde(rename = "CODE")]
    code: Option<String>,
    #[serde(rename = "MESSAGE")]
    message: Option<String>,
}

/// Source client for the `realtimePosition` service.
pub struct RealtimePositionClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: String,
    page_size: u32,
}

impl RealtimePositionClient {
    pub fn new(transport: Arc<dyn Transport>, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// `<base>/<key>/json/realtimePosition/0/<page_size>/<line>`, with every
    /// segment percent-encoded.
    pub fn endpoint(&self, line: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PipelineError::Config(format!("invalid base url {}: {e}", self.base_url)))?;
        let page_end = self.page_size.to_string();
        url.path_segments_mut()
            .map_err(|_| PipelineError::Config(format!("base url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend([
                self.api_key.as_str(),
                "json",
                "realtimePosition",
                "0",
                page_end.as_str(),
                line,
            ]);
        Ok(url)
    }

    async fn request(&self, line: &str) -> Result<FetchOutcome> {
        let url = self.endpoint(line)?;
        let body = self.transport.get(url.as_str()).await?;
        let response: PositionResponse = serde_json::from_str(&body)?;

        if let Some(list) = response.list {
            return Ok(FetchOutcome::Items(into_items(line, list)));
        }

        let (code, message) = match response.result {
            Some(status) => (status.code, status.message),
            None => (response.code, response.message),
        };
        match code.as_deref() {
            Some(INFO_OK) => Ok(FetchOutcome::NoData),
            _ => Err(PipelineError::UpstreamStatus {
                code: code.unwrap_or_else(|| "UNKNOWN".to_string()),
                message: message.unwrap_or_else(|| "response carried no position list".to_string()),
            }),
        }
    }
}

fn into_items(line: &str, list: Vec<Value>) -> Vec<RawPositionItem> {
    list.into_iter()
        .filter_map(|value| match value {
            Value::Object(data) => Some(RawPositionItem::with_data(data)),
            other => {
                tracing::warn!(line = %line, item = %other, "skipping non-object position item");
                None
            }
        })
        .collect()
}

#[async_trait]
impl Source for RealtimePositionClient {
    async fn fetch(&self, line: &str) -> FetchOutcome {
        tracing::debug!(line = %line, "fetching realtime positions");
        match self.request(line).await {
            Ok(FetchOutcome::Items(items)) => {
                tracing::info!(line = %line, count = items.len(), "fetched positions");
                FetchOutcome::Items(items)
            }
            Ok(outcome) => {
                tracing::info!(line = %line, "no positions reported");
                outcome
            }
            Err(e) => {
                tracing::warn!(line = %line, kind = e.kind(), error = %e, "fetch failed");
                FetchOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    enum Reply {
        Body(&'static str),
        Fail,
    }

    struct FakeTransport {
        reply: Reply,
        urls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                urls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get(&self, url: &str) -> Result<String> {
            self.urls.lock().unwrap().push(url.to_string());
            match self.reply {
                Reply::Body(body) => Ok(body.to_string()),
                Reply::Fail => Err(PipelineError::Transport("operation timed out".to_string())),
            }
        }
    }

    fn client(transport: Arc<FakeTransport>) -> RealtimePositionClient {
        RealtimePositionClient::new(transport, "KEY").with_base_url("http://upstream.test/api/subway")
    }

    #[test]
    fn endpoint_embeds_key_window_and_line() {
        let url = client(FakeTransport::new(Reply::Fail)).endpoint("GTX-A").unwrap();
        assert_eq!(
            url.as_str(),
            "http://upstream.test/api/subway/KEY/json/realtimePosition/0/100/GTX-A"
        );
    }

    #[test]
    fn endpoint_percent_encodes_line_name() {
        let url = client(FakeTransport::new(Reply::Fail)).endpoint("1호선").unwrap();
        assert!(url.as_str().ends_with("/0/100/1%ED%98%B8%EC%84%A0"));
    }

    #[test]
    fn endpoint_respects_page_size_and_trailing_slash() {
        let url = RealtimePositionClient::new(FakeTransport::new(Reply::Fail), "KEY")
            .with_base_url("http://upstream.test/api/subway/")
            .with_page_size(50)
            .endpoint("GTX-A")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://upstream.test/api/subway/KEY/json/realtimePosition/0/50/GTX-A"
        );
    }

    #[tokio::test]
    async fn returns_list_contents() {
        let transport = FakeTransport::new(Reply::Body(
            r#"{"realtimePositionList":[{"subwayId":"1001","trainNo":"1234"},{"subwayId":"1001"}]}"#,
        ));
        let outcome = client(transport.clone()).fetch("GTX-A").await;

        let items = outcome.into_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get_field("trainNo"), Some(&Value::from("1234")));
        assert_eq!(transport.urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_list_is_success() {
        let outcome = client(FakeTransport::new(Reply::Body(r#"{"realtimePositionList":[]}"#)))
            .fetch("GTX-A")
            .await;
        assert!(matches!(outcome, FetchOutcome::Items(ref items) if items.is_empty()));
    }

    #[tokio::test]
    async fn informational_status_without_list_is_no_data() {
        let outcome = client(FakeTransport::new(Reply::Body(
            r#"{"RESULT":{"CODE":"INFO-000","MESSAGE":"ok"}}"#,
        )))
        .fetch("GTX-A")
        .await;
        assert!(matches!(outcome, FetchOutcome::NoData));
    }

    #[tokio::test]
    async fn other_status_is_failure_with_empty_items() {
        let outcome = client(FakeTransport::new(Reply::Body(
            r#"{"RESULT":{"CODE":"INFO-200","MESSAGE":"no data"}}"#,
        )))
        .fetch("GTX-A")
        .await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failed(PipelineError::UpstreamStatus { ref code, .. }) if code == "INFO-200"
        ));
        assert!(outcome.into_items().is_empty());
    }

    #[tokio::test]
    async fn top_level_error_status_is_failure() {
        let outcome = client(FakeTransport::new(Reply::Body(
            r#"{"status":500,"code":"ERROR-337","message":"limit exceeded"}"#,
        )))
        .fetch("GTX-A")
        .await;
        assert!(matches!(
            outcome,
            FetchOutcome::Failed(PipelineError::UpstreamStatus { ref code, .. }) if code == "ERROR-337"
        ));
    }

    #[tokio::test]
    async fn transport_failure_yields_empty() {
        let outcome = client(FakeTransport::new(Reply::Fail)).fetch("GTX-A").await;
        assert!(matches!(outcome, FetchOutcome::Failed(PipelineError::Transport(_))));
        assert!(outcome.into_items().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_yields_empty() {
        let outcome = client(FakeTransport::new(Reply::Body("<html>busy</html>")))
            .fetch("GTX-A")
            .await;
        assert!(matches!(outcome, FetchOutcome::Failed(PipelineError::Parse(_))));
    }

    #[tokio::test]
    async fn skips_non_object_items() {
        let outcome = client(FakeTransport::new(Reply::Body(
            r#"{"realtimePositionList":[{"subwayId":"1001"},"junk",3]}"#,
        )))
        .fetch("GTX-A")
        .await;
        assert_eq!(outcome.into_items().len(), 1);
    }
}
