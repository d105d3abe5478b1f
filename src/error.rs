//! Failures surfaced by the exchange transport. Every variant is plain data so
//! callers can record it in a result instead of unwinding.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    /// DNS, connect, timeout or body read failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// 2xx response carrying `success: false`.
    #[error("exchange rejected request: {0}")]
    Rejected(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        ExchangeError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        ExchangeError::Decode(e.to_string())
    }
}
