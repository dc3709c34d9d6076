use crate::core::{PipelineError, Result, Transport};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// reqwest-backed transport; every request is bounded by `timeout`.
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            PipelineError::Transport(format!("request timed out after {:?}", self.timeout))
        } else {
            PipelineError::Http(err)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| self.classify(e))?;
        response.text().await.map_err(|e| self.classify(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn silent_upstream_times_out_as_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection without ever answering.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
        let err = transport.get(&format!("http://{addr}/")).await.unwrap_err();

        assert!(matches!(err, PipelineError::Transport(ref msg) if msg.contains("timed out")));
        assert_eq!(err.kind(), "transport");
        server.abort();
    }

    #[tokio::test]
    async fn refused_connection_is_http_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        let err = transport.get(&format!("http://{addr}/")).await.unwrap_err();

        assert!(matches!(err, PipelineError::Http(_)));
        assert_eq!(err.kind(), "transport");
    }
}
