//! Spot price, same-day option chains and ATM selection.

use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::ExchangeCfg;
use crate::error::ExchangeError;
use crate::transport::Transport;
use crate::types::Ticker;
use crate::utils::{as_f64, expiry_date};

/// Absolute tolerance when matching the put strike to the chosen call strike.
pub const STRIKE_TOLERANCE: f64 = 0.01;

pub struct MarketData {
    api: Arc<dyn Transport>,
    cfg: ExchangeCfg,
}

impl MarketData {
    pub fn new(api: Arc<dyn Transport>, cfg: ExchangeCfg) -> Self {
        Self { api, cfg }
    }

    /// Current spot price of the configured underlying, `0.0` when it cannot be fetched.
    pub async fn spot_price(&self) -> f64 {
        let path = format!("/v2/tickers/{}", self.cfg.spot_symbol);
        match self.api.request(Method::GET, &path, &[], None).await {
            Ok(result) => match result.get("spot_price").and_then(as_f64) {
                Some(p) => p,
                None => {
                    warn!("{} ticker has no spot_price", self.cfg.spot_symbol);
                    0.0
                }
            },
            Err(e) => {
                error!("spot price fetch failed: {}", e);
                0.0
            }
        }
    }

    /// Calls and puts of the underlying expiring today (exchange calendar).
    pub async fn same_day_options(&self) -> (Vec<Ticker>, Vec<Ticker>) {
        let expiry = expiry_date(Utc::now(), self.cfg.expiry_utc_offset_minutes);
        let calls = self.chain("call_options", &expiry).await;
        let puts = self.chain("put_options", &expiry).await;
        info!(
            "{} options expiring {}: {} calls, {} puts",
            self.cfg.underlying,
            expiry,
            calls.len(),
            puts.len()
        );
        (calls, puts)
    }

    async fn chain(&self, contract_type: &str, expiry: &str) -> Vec<Ticker> {
        let params = [
            ("contract_types", contract_type.to_string()),
            ("underlying_asset_symbols", self.cfg.underlying.clone()),
            ("expiry_date", expiry.to_string()),
        ];
        match self.api.request(Method::GET, "/v2/tickers", &params, None).await {
            Ok(result) => parse_tickers(result).unwrap_or_else(|e| {
                error!("{} chain decode failed: {}", contract_type, e);
                Vec::new()
            }),
            Err(e) => {
                error!("{} chain fetch failed: {}", contract_type, e);
                Vec::new()
            }
        }
    }
}

fn parse_tickers(result: Value) -> Result<Vec<Ticker>, ExchangeError> {
    if result.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(result)?)
}

/// Call with the strike closest to `spot` (first strict minimum in input order),
/// and the first put whose strike matches it within `STRIKE_TOLERANCE`.
pub fn find_atm_strikes<'a>(
    spot: f64,
    calls: &'a [Ticker],
    puts: &'a [Ticker],
) -> (Option<&'a Ticker>, Option<&'a Ticker>) {
    let mut atm_call: Option<(&Ticker, f64)> = None;
    for c in calls {
        let Some(strike) = c.strike_price else { continue };
        let diff = (strike - spot).abs();
        if atm_call.map_or(true, |(_, best)| diff < best) {
            atm_call = Some((c, diff));
        }
    }
    let Some((call, _)) = atm_call else {
        return (None, None);
    };
    let call_strike = call.strike_price.unwrap_or_default();
    let put = puts.iter().find(|p| {
        p.strike_price
            .map_or(false, |s| (s - call_strike).abs() < STRIKE_TOLERANCE)
    });
    (Some(call), put)
}
