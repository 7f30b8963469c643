use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

// ---------------------------------------------------------------------------
// Assets & Pairs
// ---------------------------------------------------------------------------

/// An ordered (base, quote) combination identifying a market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetPair {
    /// The asset being bought or sold.
    pub base: String,
    /// The asset used to price / pay for the base asset.
    pub quote: String,
}

impl AssetPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }
}

/// Formats as `BASE_QUOTE`.
impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// Direction of a trade from the account's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "buy",
            TradeType::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The exchange a trade was executed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Binance,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Binance => "binance",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An exchange-agnostic trade, as consumed by the accounting engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: Timestamp,
    /// `BASE_QUOTE`
    pub pair: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    /// Price of one unit of base, in quote.
    #[serde(with = "rust_decimal::serde::str")]
    pub rate: Decimal,
    /// `rate * amount`, always denominated in `cost_currency`.
    #[serde(with = "rust_decimal::serde::str")]
    pub cost: Decimal,
    pub cost_currency: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub fee: Decimal,
    pub fee_currency: String,
    /// Quantity of the base asset traded.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub location: Location,
}

impl Trade {
    /// Split the `BASE_QUOTE` pair string back into its assets.
    pub fn assets(&self) -> Option<AssetPair> {
        self.pair
            .split_once('_')
            .map(|(base, quote)| AssetPair::new(base, quote))
    }
}
