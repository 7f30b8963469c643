//! Binance exchange adapter.
//!
//! Imports account trade history over the Binance REST API and normalizes it
//! into [`ledgerlink_core::Trade`] values.

pub mod auth;
pub mod client;
pub mod config;
pub mod normalize;
pub mod symbols;
pub mod transport;

pub use client::BinanceClient;
pub use config::BinanceConfig;
pub use normalize::{trade_from_binance, RawTrade};
pub use symbols::SymbolMap;
pub use transport::ReqwestTransport;
