use ledgerlink_core::{AssetPair, ExchangeError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// One tradable market as described by `exchangeInfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
}

/// Lookup from exchange-native symbol (e.g. `ETHBTC`) to its base/quote pair.
///
/// Built once from exchange metadata and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMap {
    pairs: HashMap<String, AssetPair>,
}

impl SymbolMap {
    /// Build the map from a full `exchangeInfo` payload.
    ///
    /// Entries missing `symbol`, `baseAsset` or `quoteAsset` are skipped with a
    /// warning. Fails if there is no `symbols` array or nothing usable in it.
    pub fn from_exchange_info(info: &Value) -> Result<Self, ExchangeError> {
        let entries = info
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ExchangeError::MalformedMetadata("exchange info has no symbols array".into())
            })?;
        Self::from_entries(entries)
    }

    /// Build the map from the individual symbol definitions.
    pub fn from_entries(entries: &[Value]) -> Result<Self, ExchangeError> {
        let mut pairs = HashMap::with_capacity(entries.len());
        let mut skipped = 0usize;

        for (idx, entry) in entries.iter().enumerate() {
            match parse_entry(entry) {
                Ok(info) => {
                    pairs.insert(info.symbol, AssetPair::new(info.base_asset, info.quote_asset));
                }
                Err(e) => {
                    skipped += 1;
                    warn!(index = idx, error = %e, "Skipping symbol entry");
                }
            }
        }

        if pairs.is_empty() {
            return Err(ExchangeError::MalformedMetadata(format!(
                "no usable symbol entries ({} skipped)",
                skipped
            )));
        }

        Ok(Self { pairs })
    }

    /// Resolve an exchange symbol to its pair.
    pub fn get(&self, symbol: &str) -> Option<&AssetPair> {
        self.pairs.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.pairs.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Exchange symbols in lexical order.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.pairs.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetPair)> {
        self.pairs.iter().map(|(symbol, pair)| (symbol.as_str(), pair))
    }
}

fn parse_entry(entry: &Value) -> Result<SymbolInfo, ExchangeError> {
    let info = SymbolInfo::deserialize(entry)
        .map_err(|e| ExchangeError::MalformedMetadata(e.to_string()))?;
    if info.symbol.is_empty() || info.base_asset.is_empty() || info.quote_asset.is_empty() {
        return Err(ExchangeError::MalformedMetadata(format!(
            "empty field in symbol entry {:?}",
            info.symbol
        )));
    }
    Ok(info)
}
