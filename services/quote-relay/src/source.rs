//! Upstream quote feed

use crate::error::RelayError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Fetches one raw quote payload per call.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self) -> Result<String, RelayError>;
}

/// HTTP GET against the configured feed URL.
pub struct HttpQuoteSource {
    http_client: Client,
    url: String,
}

impl HttpQuoteSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch(&self) -> Result<String, RelayError> {
        let res = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("Quote feed error: {}", e)))?;

        if res.status() != StatusCode::OK {
            return Err(RelayError::Transport(format!(
                "Quote feed responded with status {}",
                res.status()
            )));
        }

        res.text()
            .await
            .map_err(|e| RelayError::Transport(format!("Quote feed body error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rates"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null({\"Rates\":[]});"))
            .mount(&server)
            .await;

        let source =
            HttpQuoteSource::new(format!("{}/rates", server.uri()), Duration::from_secs(5)).unwrap();
        let body = source.fetch().await.unwrap();
        assert_eq!(body, "null({\"Rates\":[]});");
    }

    #[tokio::test]
    async fn test_non_200_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpQuoteSource::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        // Reserved port on loopback; nothing listens there
        let source =
            HttpQuoteSource::new("http://127.0.0.1:9/rates", Duration::from_secs(2)).unwrap();
        assert!(matches!(source.fetch().await, Err(RelayError::Transport(_))));
    }
}
