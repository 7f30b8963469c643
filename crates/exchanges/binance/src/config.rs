use crate::auth::Credentials;
use ledgerlink_core::ExchangeError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Configuration for the Binance client. Read once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub api_key: String,
    pub api_secret: String,
    /// REST root, without the `/api/v3` suffix.
    pub base_url: String,
    /// First wait after a rate-limit rejection, in seconds.
    pub initial_backoff_secs: f64,
    /// Maximum cumulative wait for a single call before giving up, in seconds.
    pub backoff_limit_secs: f64,
    /// `recvWindow` sent with signed requests, in milliseconds.
    pub recv_window_ms: u64,
    /// Restrict history queries to these exchange symbols. Empty means all.
    pub markets: Vec<String>,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            initial_backoff_secs: 1.0,
            backoff_limit_secs: 10.0,
            recv_window_ms: 5000,
            markets: Vec::new(),
        }
    }
}

impl BinanceConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Default::default()
        }
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ExchangeError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExchangeError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ExchangeError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ExchangeError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_backoff(mut self, initial: Duration, limit: Duration) -> Self {
        self.initial_backoff_secs = initial.as_secs_f64();
        self.backoff_limit_secs = limit.as_secs_f64();
        self
    }

    pub fn validate(&self) -> Result<(), ExchangeError> {
        let initial = self.initial_backoff()?;
        let limit = self.backoff_limit()?;
        if initial > limit {
            return Err(ExchangeError::Config(format!(
                "initial_backoff_secs ({}) exceeds backoff_limit_secs ({})",
                self.initial_backoff_secs, self.backoff_limit_secs
            )));
        }
        if self.base_url.is_empty() {
            return Err(ExchangeError::Config("base_url must not be empty".into()));
        }
        Ok(())
    }

    pub fn initial_backoff(&self) -> Result<Duration, ExchangeError> {
        positive_duration("initial_backoff_secs", self.initial_backoff_secs)
    }

    pub fn backoff_limit(&self) -> Result<Duration, ExchangeError> {
        positive_duration("backoff_limit_secs", self.backoff_limit_secs)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.api_key.clone(), self.api_secret.clone().into_bytes())
    }
}

/// Seconds as a non-zero `Duration`. Values that round down to zero or do not
/// fit in a `Duration` are rejected.
fn positive_duration(name: &str, secs: f64) -> Result<Duration, ExchangeError> {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(d),
        Ok(_) => Err(ExchangeError::Config(format!(
            "{} must be at least one nanosecond, got {}",
            name, secs
        ))),
        Err(e) => Err(ExchangeError::Config(format!(
            "{} must be a positive number of seconds, got {} ({})",
            name, secs, e
        ))),
    }
}
