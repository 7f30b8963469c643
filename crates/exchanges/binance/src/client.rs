use crate::auth::{query_string, Credentials};
use crate::config::BinanceConfig;
use crate::normalize::{parse_raw_trades, trade_from_binance, RawTrade};
use crate::symbols::SymbolMap;
use crate::transport::ReqwestTransport;
use async_trait::async_trait;
use chrono::Utc;
use ledgerlink_core::{
    Exchange, ExchangeError, HttpResponse, HttpTransport, Location, Timestamp, Trade,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

pub const API_PATH: &str = "/api/v3";
pub const EXCHANGE_INFO: &str = "exchangeInfo";
pub const MY_TRADES: &str = "myTrades";

/// Endpoints that need a timestamp, `recvWindow` and HMAC signature.
const SIGNED_ENDPOINTS: &[&str] = &[MY_TRADES];

/// `-1003 TOO_MANY_REQUESTS`, `-1015 TOO_MANY_ORDERS`
const RATE_LIMIT_CODES: &[i64] = &[-1003, -1015];

const BACKOFF_FACTOR: u32 = 2;

/// Floor for the first delay so doubling always makes progress toward the limit.
const MIN_BACKOFF: Duration = Duration::from_nanos(1);

/// Largest page `myTrades` will return.
pub const MY_TRADES_PAGE_LIMIT: usize = 1000;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Retry bookkeeping for a single `api_query` call.
///
/// Created fresh for every call so concurrent calls on the same client never
/// share retry counts.
#[derive(Debug, Clone)]
pub struct Backoff {
    retries: u32,
    next_delay: Duration,
    waited: Duration,
    limit: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, limit: Duration) -> Self {
        Self {
            retries: 0,
            next_delay: initial.max(MIN_BACKOFF),
            waited: Duration::ZERO,
            limit,
        }
    }

    /// The next delay to sleep for, or `None` if sleeping it would push the
    /// cumulative wait past the limit. Overflow counts as past the limit.
    pub fn next_wait(&mut self) -> Option<Duration> {
        let delay = self.next_delay;
        let waited = self.waited.checked_add(delay).filter(|w| *w <= self.limit)?;
        self.waited = waited;
        self.retries += 1;
        self.next_delay = delay.checked_mul(BACKOFF_FACTOR).unwrap_or(Duration::MAX);
        Some(delay)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn waited(&self) -> Duration {
        self.waited
    }
}

// ---------------------------------------------------------------------------
// Response classification
// ---------------------------------------------------------------------------

/// What to do with the response of one attempt.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    Success(Value),
    /// Rate limited; worth trying again after a wait.
    Retryable { status: u16, text: String },
    Terminal(ExchangeError),
}

pub(crate) fn classify_response(endpoint: &str, response: &HttpResponse) -> AttemptOutcome {
    match response.status {
        200 => match serde_json::from_str::<Value>(&response.body) {
            Ok(value) => match api_error(&value) {
                Some((code, _)) if RATE_LIMIT_CODES.contains(&code) => AttemptOutcome::Retryable {
                    status: response.status,
                    text: response.body.clone(),
                },
                Some((code, msg)) => AttemptOutcome::Terminal(ExchangeError::remote(
                    endpoint,
                    Some(response.status),
                    format!("Binance error {}: {}", code, msg),
                )),
                None => AttemptOutcome::Success(value),
            },
            Err(e) => AttemptOutcome::Terminal(ExchangeError::remote(
                endpoint,
                Some(response.status),
                format!("malformed response body ({}): {}", e, response.body),
            )),
        },
        429 => AttemptOutcome::Retryable {
            status: response.status,
            text: response.body.clone(),
        },
        status => AttemptOutcome::Terminal(ExchangeError::remote(
            endpoint,
            Some(status),
            response.body.clone(),
        )),
    }
}

/// `{"code": <int>, "msg": <string>}`
fn api_error(value: &Value) -> Option<(i64, &str)> {
    let obj = value.as_object()?;
    let code = obj.get("code")?.as_i64()?;
    let msg = obj.get("msg")?.as_str()?;
    Some((code, msg))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Binance REST client for trade-history import.
pub struct BinanceClient {
    config: BinanceConfig,
    credentials: Credentials,
    initial_backoff: Duration,
    backoff_limit: Duration,
    transport: Arc<dyn HttpTransport>,
    first_connection_made: AtomicBool,
    symbols: OnceCell<SymbolMap>,
}

impl BinanceClient {
    /// Create a client that talks HTTP through `reqwest`.
    pub fn new(config: BinanceConfig) -> Result<Self, ExchangeError> {
        let transport = ReqwestTransport::new(HTTP_TIMEOUT)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: BinanceConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ExchangeError> {
        config.validate()?;
        let credentials = config.credentials();
        let initial_backoff = config.initial_backoff()?;
        let backoff_limit = config.backoff_limit()?;
        Ok(Self {
            config,
            credentials,
            initial_backoff,
            backoff_limit,
            transport,
            first_connection_made: AtomicBool::new(false),
            symbols: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &BinanceConfig {
        &self.config
    }

    /// Whether exchange metadata has been fetched successfully at least once.
    pub fn first_connection_made(&self) -> bool {
        self.first_connection_made.load(Ordering::Acquire)
    }

    /// The symbol map, if [`first_connection`](Self::first_connection) has run.
    pub fn symbols(&self) -> Option<&SymbolMap> {
        self.symbols.get()
    }

    /// Query an `/api/v3` endpoint, backing off while rate limited.
    ///
    /// Returns the parsed JSON body on a 200 response. A 429 response, or a
    /// 200 body carrying a too-many-requests error code, is retried after a
    /// wait that starts at `initial_backoff` and doubles each time, until the
    /// total wait would exceed `backoff_limit`. Anything else fails at once.
    pub async fn api_query(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ExchangeError> {
        let url = format!(
            "{}{}/{}",
            self.config.base_url.trim_end_matches('/'),
            API_PATH,
            endpoint
        );
        let mut backoff = Backoff::new(self.initial_backoff, self.backoff_limit);

        loop {
            // Signed requests are re-signed per attempt so the timestamp stays inside recvWindow.
            let (query, headers) = self.prepare_request(endpoint, params)?;
            debug!(endpoint = %endpoint, attempt = backoff.retries() + 1, "Querying Binance");

            let response = self
                .transport
                .get(&url, &query, &headers)
                .await
                .map_err(|e| ExchangeError::remote(endpoint, None, e.to_string()))?;

            match classify_response(endpoint, &response) {
                AttemptOutcome::Success(value) => {
                    if endpoint == EXCHANGE_INFO
                        && !self.first_connection_made.swap(true, Ordering::AcqRel)
                    {
                        info!("First connection to Binance established");
                    }
                    return Ok(value);
                }
                AttemptOutcome::Retryable { status, text } => match backoff.next_wait() {
                    Some(delay) => {
                        warn!(
                            endpoint = %endpoint,
                            status = status,
                            retry = backoff.retries(),
                            delay_ms = %delay.as_millis(),
                            "Rate limited by Binance, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(
                            endpoint = %endpoint,
                            status = status,
                            retries = backoff.retries(),
                            waited_ms = %backoff.waited().as_millis(),
                            "Backoff limit reached, giving up"
                        );
                        return Err(ExchangeError::remote(
                            endpoint,
                            Some(status),
                            format!(
                                "backoff limit of {:?} exceeded after {} retries (url {}): {}",
                                self.backoff_limit,
                                backoff.retries(),
                                response.url,
                                text
                            ),
                        ));
                    }
                },
                AttemptOutcome::Terminal(err) => {
                    error!(endpoint = %endpoint, url = %response.url, error = %err, "Binance query failed");
                    return Err(err);
                }
            }
        }
    }

    /// [`api_query`](Self::api_query) for endpoints that answer with a JSON object.
    pub async fn api_query_object(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Map<String, Value>, ExchangeError> {
        match self.api_query(endpoint, params).await? {
            Value::Object(map) => Ok(map),
            other => Err(ExchangeError::remote(
                endpoint,
                Some(200),
                format!("expected a JSON object, got: {}", other),
            )),
        }
    }

    /// [`api_query`](Self::api_query) for endpoints that answer with a JSON array.
    pub async fn api_query_list(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<Value>, ExchangeError> {
        match self.api_query(endpoint, params).await? {
            Value::Array(items) => Ok(items),
            other => Err(ExchangeError::remote(
                endpoint,
                Some(200),
                format!("expected a JSON array, got: {}", other),
            )),
        }
    }

    /// Fetch exchange metadata and build the symbol map, once per client.
    pub async fn first_connection(&self) -> Result<&SymbolMap, ExchangeError> {
        self.symbols
            .get_or_try_init(|| async {
                let info = Value::Object(self.api_query_object(EXCHANGE_INFO, &[]).await?);
                let map = SymbolMap::from_exchange_info(&info)?;
                info!(symbols = map.len(), "Loaded Binance symbol map");
                Ok::<_, ExchangeError>(map)
            })
            .await
    }

    /// All fills for one exchange symbol, following `fromId` pagination.
    pub async fn query_raw_trades(&self, symbol: &str) -> Result<Vec<RawTrade>, ExchangeError> {
        let mut trades = Vec::new();
        let mut from_id: Option<u64> = None;

        loop {
            let mut params = vec![
                ("symbol", symbol.to_string()),
                ("limit", MY_TRADES_PAGE_LIMIT.to_string()),
            ];
            if let Some(id) = from_id {
                params.push(("fromId", id.to_string()));
            }

            let page = parse_raw_trades(&self.api_query_list(MY_TRADES, &params).await?)?;
            let full_page = page.len() >= MY_TRADES_PAGE_LIMIT;
            let last_id = page.iter().filter_map(|t| t.id).max();
            trades.extend(page);

            match (full_page, last_id) {
                (true, Some(id)) => from_id = Some(id + 1),
                _ => break,
            }
        }

        debug!(symbol = %symbol, trades = trades.len(), "Fetched raw trades");
        Ok(trades)
    }

    fn prepare_request(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<(String, Vec<(String, String)>), ExchangeError> {
        let mut pairs: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        if !SIGNED_ENDPOINTS.contains(&endpoint) {
            return Ok((query_string(&pairs), Vec::new()));
        }

        if self.credentials.is_empty() {
            return Err(ExchangeError::Config(format!(
                "{} requires an API key and secret",
                endpoint
            )));
        }

        pairs.push(("recvWindow".to_string(), self.config.recv_window_ms.to_string()));
        pairs.push(("timestamp".to_string(), Utc::now().timestamp_millis().to_string()));
        let query = self.credentials.sign_query(&query_string(&pairs))?;

        Ok((query, self.credentials.auth_headers()))
    }

    /// The exchange symbols history is pulled for.
    fn history_markets<'a>(&'a self, symbols: &'a SymbolMap) -> Vec<&'a str> {
        if self.config.markets.is_empty() {
            return symbols.symbols();
        }
        self.config
            .markets
            .iter()
            .filter(|market| {
                let known = symbols.contains(market);
                if !known {
                    warn!(market = %market, "Configured market is not listed on Binance, skipping");
                }
                known
            })
            .map(String::as_str)
            .collect()
    }
}

#[async_trait]
impl Exchange for BinanceClient {
    fn location(&self) -> Location {
        Location::Binance
    }

    async fn query_trade_history(
        &self,
        start_ts: Timestamp,
        end_ts: Timestamp,
    ) -> Result<Vec<Trade>, ExchangeError> {
        let symbols = self.first_connection().await?;
        let markets = self.history_markets(symbols);
        info!(markets = markets.len(), start_ts, end_ts, "Querying Binance trade history");

        let mut trades = Vec::new();
        for symbol in markets {
            for raw in self.query_raw_trades(symbol).await? {
                match trade_from_binance(&raw, symbols) {
                    Ok(trade) => {
                        if trade.timestamp >= start_ts && trade.timestamp <= end_ts {
                            trades.push(trade);
                        }
                    }
                    Err(ExchangeError::UnknownPair(pair)) => {
                        warn!(symbol = %pair, "Skipping trade with unknown pair");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        trades.sort_by_key(|t| t.timestamp);
        info!(trades = trades.len(), "Binance trade history loaded");
        Ok(trades)
    }
}
