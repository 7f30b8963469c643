//! Request signing for Binance `USER_DATA` endpoints.
//!
//! Signed requests carry the API key in the `X-MBX-APIKEY` header and an
//! HMAC-SHA256 hex digest of the url-encoded query string in the `signature`
//! parameter. The string that is signed is the string that is sent.

use hmac::{Hmac, Mac};
use ledgerlink_core::ExchangeError;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// API credentials. Both values are treated as opaque.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    secret: Vec<u8>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_empty() || self.secret.is_empty()
    }

    /// Hex HMAC-SHA256 of `payload` keyed with the secret.
    pub fn sign(&self, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ExchangeError::Config(format!("Invalid API secret: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Append `&signature=<hex>` to an encoded query string, signing it as is.
    pub fn sign_query(&self, query: &str) -> Result<String, ExchangeError> {
        let signature = self.sign(query)?;
        if query.is_empty() {
            Ok(format!("signature={}", signature))
        } else {
            Ok(format!("{}&signature={}", query, signature))
        }
    }

    pub fn auth_headers(&self) -> Vec<(String, String)> {
        vec![(API_KEY_HEADER.to_string(), self.api_key.clone())]
    }
}

// Never print the secret.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// `k1=v1&k2=v2` in the given order, keys and values percent-encoded.
pub fn query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
