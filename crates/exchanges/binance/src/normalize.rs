use crate::symbols::SymbolMap;
use ledgerlink_core::{ExchangeError, Location, Timestamp, Trade, TradeType};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// A single fill as returned by `GET /api/v3/myTrades`.
///
/// Binance sends decimals as strings (`"4.00000100"`); plain JSON numbers are
/// accepted too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrade {
    pub symbol: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub order_id: Option<i64>,
    pub price: Decimal,
    pub qty: Decimal,
    pub commission: Decimal,
    pub commission_asset: String,
    /// Milliseconds since the Unix epoch.
    pub time: i64,
    pub is_buyer: bool,
    pub is_maker: bool,
}

/// Parse the items of a `myTrades` response into raw trade records.
pub fn parse_raw_trades(items: &[Value]) -> Result<Vec<RawTrade>, ExchangeError> {
    items
        .iter()
        .map(|item| {
            RawTrade::deserialize(item).map_err(|e| {
                ExchangeError::remote("myTrades", None, format!("malformed trade record: {}", e))
            })
        })
        .collect()
}

/// Convert a raw Binance fill into a normalized [`Trade`].
///
/// `isBuyer` means the account acquired base by paying quote. Cost is always
/// expressed in the quote asset, whichever the direction. The commission asset
/// is passed through untouched since Binance may charge fees in a third asset
/// such as BNB.
pub fn trade_from_binance(raw: &RawTrade, symbols: &SymbolMap) -> Result<Trade, ExchangeError> {
    let pair = symbols
        .get(&raw.symbol)
        .ok_or_else(|| ExchangeError::UnknownPair(raw.symbol.clone()))?;

    let trade_type = if raw.is_buyer {
        TradeType::Buy
    } else {
        TradeType::Sell
    };

    Ok(Trade {
        timestamp: millis_to_secs(raw.time),
        pair: pair.to_string(),
        trade_type,
        rate: raw.price,
        cost: raw.price * raw.qty,
        cost_currency: pair.quote.clone(),
        fee: raw.commission,
        fee_currency: raw.commission_asset.clone(),
        amount: raw.qty,
        location: Location::Binance,
    })
}

fn millis_to_secs(millis: i64) -> Timestamp {
    millis / 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlink_core::AssetPair;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn symbol_map() -> SymbolMap {
        let entries = vec![
            json!({"symbol": "RDNETH", "baseAsset": "RDN", "quoteAsset": "ETH"}),
            json!({"symbol": "ETHUSDT", "baseAsset": "ETH", "quoteAsset": "USDT"}),
            json!({"symbol": "BTCUSDT", "baseAsset": "BTC", "quoteAsset": "USDT"}),
            json!({"symbol": "ADAUSDT", "baseAsset": "ADA", "quoteAsset": "USDT"}),
        ];
        SymbolMap::from_entries(&entries).unwrap()
    }

    fn raw(value: Value) -> RawTrade {
        RawTrade::deserialize(&value).unwrap()
    }

    #[test]
    fn test_buy_trade_with_numeric_fields() {
        let trade = raw(json!({
            "symbol": "BTCUSDT",
            "price": 6376.39,
            "qty": 0.051942,
            "commission": 0.00005194,
            "commissionAsset": "BTC",
            "time": 1531728338000i64,
            "isBuyer": true,
            "isMaker": false,
        }));

        let ours = trade_from_binance(&trade, &symbol_map()).unwrap();
        assert_eq!(
            ours,
            Trade {
                timestamp: 1531728338,
                pair: "BTC_USDT".to_string(),
                trade_type: TradeType::Buy,
                rate: dec!(6376.39),
                cost: dec!(331.20244938),
                cost_currency: "USDT".to_string(),
                fee: dec!(0.00005194),
                fee_currency: "BTC".to_string(),
                amount: dec!(0.051942),
                location: Location::Binance,
            }
        );
    }

    #[test]
    fn test_buy_trade_cost_is_exact() {
        let trade = raw(json!({
            "symbol": "RDNETH",
            "id": 1,
            "orderId": 1,
            "price": "0.0063213",
            "qty": "5.0",
            "commission": "0.005",
            "commissionAsset": "RDN",
            "time": 1512561941000i64,
            "isBuyer": true,
            "isMaker": false,
            "isBestMatch": true,
        }));

        let ours = trade_from_binance(&trade, &symbol_map()).unwrap();
        assert_eq!(ours.pair, "RDN_ETH");
        assert_eq!(ours.trade_type, TradeType::Buy);
        assert_eq!(ours.cost, dec!(0.0316065));
        assert_eq!(ours.cost.to_string(), "0.03160650");
        assert_eq!(ours.cost_currency, "ETH");
        assert_eq!(ours.fee_currency, "RDN");
        assert_eq!(ours.timestamp, 1512561941);
    }

    #[test]
    fn test_sell_trade_cost_still_in_quote() {
        let trade = raw(json!({
            "symbol": "ETHUSDT",
            "price": "481.0",
            "qty": "0.505",
            "commission": "0.242905",
            "commissionAsset": "USDT",
            "time": 1531117990000i64,
            "isBuyer": false,
            "isMaker": true,
        }));

        let ours = trade_from_binance(&trade, &symbol_map()).unwrap();
        assert_eq!(ours.trade_type, TradeType::Sell);
        assert_eq!(ours.pair, "ETH_USDT");
        assert_eq!(ours.cost, dec!(242.905));
        assert_eq!(ours.cost_currency, "USDT");
        assert_eq!(ours.fee, dec!(0.242905));
        assert_eq!(ours.amount, dec!(0.505));
    }

    #[test]
    fn test_fee_in_third_asset_passes_through() {
        let trade = raw(json!({
            "symbol": "ADAUSDT",
            "price": "0.17442",
            "qty": "285.2",
            "commission": "0.00180015",
            "commissionAsset": "BNB",
            "time": 1531871806000i64,
            "isBuyer": false,
            "isMaker": true,
        }));

        let ours = trade_from_binance(&trade, &symbol_map()).unwrap();
        assert_eq!(ours.cost, dec!(49.744584));
        assert_eq!(ours.cost_currency, "USDT");
        assert_eq!(ours.fee_currency, "BNB");
        assert_eq!(ours.assets(), Some(AssetPair::new("ADA", "USDT")));
    }

    #[test]
    fn test_timestamp_truncates_millis() {
        let trade = raw(json!({
            "symbol": "BTCUSDT",
            "price": "1",
            "qty": "1",
            "commission": "0",
            "commissionAsset": "BNB",
            "time": 1531728338999i64,
            "isBuyer": true,
            "isMaker": true,
        }));
        let ours = trade_from_binance(&trade, &symbol_map()).unwrap();
        assert_eq!(ours.timestamp, 1531728338);
    }

    #[test]
    fn test_unknown_symbol_fails() {
        let trade = raw(json!({
            "symbol": "ETHBTC",
            "price": "0.07",
            "qty": "1",
            "commission": "0.001",
            "commissionAsset": "ETH",
            "time": 1531728338000i64,
            "isBuyer": true,
            "isMaker": false,
        }));
        match trade_from_binance(&trade, &symbol_map()) {
            Err(ExchangeError::UnknownPair(symbol)) => assert_eq!(symbol, "ETHBTC"),
            other => panic!("Expected UnknownPair, got {:?}", other),
        }
    }

    #[test]
    fn test_normalizing_twice_is_identical() {
        let trade = raw(json!({
            "symbol": "RDNETH",
            "price": "0.0063213",
            "qty": "5.0",
            "commission": "0.005",
            "commissionAsset": "RDN",
            "time": 1512561941000i64,
            "isBuyer": true,
            "isMaker": false,
        }));
        let map = symbol_map();
        let first = trade_from_binance(&trade, &map).unwrap();
        let second = trade_from_binance(&trade, &map).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.cost.to_string(), second.cost.to_string());
    }

    #[test]
    fn test_parse_raw_trades_rejects_missing_fields() {
        let items = vec![json!({"symbol": "BTCUSDT", "price": "1"})];
        assert!(matches!(
            parse_raw_trades(&items),
            Err(ExchangeError::Remote { .. })
        ));
    }

    #[test]
    fn test_parse_raw_trades_rejects_mistyped_fields() {
        let items = vec![json!({
            "symbol": "BTCUSDT",
            "price": "not-a-number",
            "qty": "1",
            "commission": "0",
            "commissionAsset": "BNB",
            "time": 1531728338000i64,
            "isBuyer": "yes",
            "isMaker": false,
        })];
        assert!(parse_raw_trades(&items).is_err());
    }

    #[test]
    fn test_parse_raw_trades_list() {
        let items = vec![
            json!({
                "symbol": "BNBBTC",
                "id": 28457,
                "orderId": 100234,
                "price": "4.00000100",
                "qty": "12.00000000",
                "quoteQty": "48.000012",
                "commission": "10.10000000",
                "commissionAsset": "BNB",
                "time": 1499865549590i64,
                "isBuyer": true,
                "isMaker": false,
                "isBestMatch": true
            }),
        ];
        let trades = parse_raw_trades(&items).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(4.00000100));
        assert_eq!(trades[0].id, Some(28457));
        assert!(trades[0].is_buyer);
    }
}
