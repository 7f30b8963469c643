use async_trait::async_trait;
use ledgerlink_core::{ExchangeError, HttpResponse, HttpTransport};
use std::time::Duration;

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ledgerlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExchangeError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// `url?query`, or `url` alone when there is no query.
fn request_url(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_string()
    } else {
        format!("{}?{}", url, query)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        query: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, ExchangeError> {
        let url = request_url(url, query);
        let mut request = self.client.get(&url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(format!("GET {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Transport(format!("Reading body from {} failed: {}", url, e)))?;

        Ok(HttpResponse {
            status,
            body,
            url: final_url,
        })
    }
}
