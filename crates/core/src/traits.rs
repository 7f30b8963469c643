use crate::models::*;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to an exchange or interpreting its data.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Exchange metadata is missing required fields.
    #[error("Malformed exchange metadata: {0}")]
    MalformedMetadata(String),
    /// A raw trade references a symbol absent from the symbol map.
    #[error("Unknown pair for exchange symbol {0}")]
    UnknownPair(String),
    /// A non-recoverable HTTP/API failure, including backoff exhaustion.
    #[error("Remote error on {endpoint} (status {}): {message}", fmt_status(.status))]
    Remote {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },
    /// The HTTP capability itself failed (DNS, TLS, connection reset).
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "n/a".to_string(),
    }
}

impl ExchangeError {
    pub fn remote(endpoint: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        ExchangeError::Remote {
            endpoint: endpoint.to_string(),
            status,
            message: message.into(),
        }
    }
}

/// Errors that can occur while exporting trade data.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(String),
}

// ---------------------------------------------------------------------------
// HTTP Transport
// ---------------------------------------------------------------------------

/// A completed HTTP exchange: status code, body text, and the final URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub url: String,
}

/// The "send GET, get status + body back" capability the exchange clients are
/// built on. Injected so tests can script responses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET request.
    ///
    /// `query` is an already url-encoded query string (no leading `?`), sent
    /// byte for byte so that signed requests match their signature. `headers`
    /// are sent as-is. Any received status code is a successful transport
    /// result; `Err` is only for failures to obtain a response at all.
    async fn get(
        &self,
        url: &str,
        query: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, ExchangeError>;
}

// ---------------------------------------------------------------------------
// Exchange Trait
// ---------------------------------------------------------------------------

/// An exchange whose trade history can be imported.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Which exchange this is.
    fn location(&self) -> Location;

    /// All trades with `start_ts <= timestamp <= end_ts`, sorted by timestamp.
    async fn query_trade_history(
        &self,
        start_ts: Timestamp,
        end_ts: Timestamp,
    ) -> Result<Vec<Trade>, ExchangeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_names_endpoint_and_status() {
        let err = ExchangeError::remote("exchangeInfo", Some(429), "Too many requests");
        let msg = err.to_string();
        assert!(msg.contains("exchangeInfo"));
        assert!(msg.contains("429"));
        assert!(msg.contains("Too many requests"));
    }

    #[test]
    fn test_remote_error_display_without_status() {
        let err = ExchangeError::remote("myTrades", None, "malformed body");
        assert!(err.to_string().contains("n/a"));
    }
}
