//! Entry + protective-stop policies for a short option leg.
//!
//! Two interchangeable strategies, chosen by `strategy.protection`:
//! - `MarketBracket`: market sell, confirm the fill by polling the order, then attach
//!   an exchange bracket whose stop-limit leg triggers off mark price.
//! - `LimitStop`: limit sell at mark, then a separate reduce-only stop-limit buy.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{FillWaitCfg, ProtectionMode, StrategyCfg};
use crate::error::ExchangeError;
use crate::risk::StopPolicy;
use crate::transport::Transport;
use crate::types::{
    BracketRequest, Entry, EntryState, LegKind, LegPlan, OrderRequest, ProtectiveKind,
    ProtectiveOutcome,
};
use crate::utils::{as_id, price_str};

#[async_trait]
pub trait ProtectiveOrderStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open the short position. `Err` means the leg never went live.
    async fn enter(&self, api: &dyn Transport, leg: &LegPlan) -> Result<Entry, ExchangeError>;

    /// Shield an entered leg. Never fails outright; failures are recorded in the outcome.
    async fn protect(&self, api: &dyn Transport, leg: &LegPlan, entry: &Entry)
        -> ProtectiveOutcome;
}

pub fn from_config(cfg: &StrategyCfg) -> Box<dyn ProtectiveOrderStrategy> {
    let stops = StopPolicy::new(cfg.stop_loss_pct, cfg.limit_buffer_pct);
    match cfg.protection {
        ProtectionMode::MarketBracket => Box::new(MarketBracket::new(stops, cfg.fill_wait)),
        ProtectionMode::LimitStop => Box::new(LimitStop::new(stops)),
    }
}

pub struct MarketBracket {
    stops: StopPolicy,
    fill_wait: FillWaitCfg,
}

impl MarketBracket {
    pub fn new(stops: StopPolicy, fill_wait: FillWaitCfg) -> Self {
        Self { stops, fill_wait }
    }

    fn kind(leg: LegKind) -> ProtectiveKind {
        match leg {
            LegKind::Call => ProtectiveKind::CallBracket,
            LegKind::Put => ProtectiveKind::PutBracket,
        }
    }
}

#[async_trait]
impl ProtectiveOrderStrategy for MarketBracket {
    fn name(&self) -> &'static str {
        "market entry + bracket stop"
    }

    async fn enter(&self, api: &dyn Transport, leg: &LegPlan) -> Result<Entry, ExchangeError> {
        let order = OrderRequest::market_sell(leg.product_id, leg.size);
        let ack = place_order(api, &order).await?;
        let order_id = ack_id(&ack)?;
        info!(
            "Placed market sell {} x{} (order id={})",
            leg.symbol, leg.size, order_id
        );
        let state = if order_state(&ack) == "closed" {
            EntryState::Filled
        } else {
            poll_until_filled(api, &order_id, self.fill_wait).await?
        };
        Ok(Entry { order_id, state })
    }

    async fn protect(
        &self,
        api: &dyn Transport,
        leg: &LegPlan,
        entry: &Entry,
    ) -> ProtectiveOutcome {
        let kind = Self::kind(leg.kind);
        let (stop, limit) = self.stops.levels(leg.mark_price);
        if entry.state == EntryState::Pending {
            warn!(
                "{} entry {} not confirmed filled; bracket not placed",
                leg.symbol, entry.order_id
            );
            return ProtectiveOutcome::failed(
                kind,
                stop,
                limit,
                format!(
                    "entry order {} not confirmed filled within {}ms; bracket not placed",
                    entry.order_id, self.fill_wait.timeout_ms
                ),
            );
        }

        let bracket = BracketRequest::stop_loss(leg.product_id, price_str(stop), price_str(limit));
        let body = match serde_json::to_value(&bracket) {
            Ok(b) => b,
            Err(e) => return ProtectiveOutcome::failed(kind, stop, limit, e.to_string()),
        };
        match api
            .request(Method::POST, "/v2/orders/bracket", &[], Some(body))
            .await
        {
            Ok(ack) => {
                info!("Bracket stop for {} active @ {:.2}", leg.symbol, stop);
                ProtectiveOutcome::active(kind, ack.get("id").and_then(as_id), stop, limit)
            }
            Err(e) => {
                warn!("Bracket stop for {} failed: {}", leg.symbol, e);
                ProtectiveOutcome::failed(kind, stop, limit, e.to_string())
            }
        }
    }
}

pub struct LimitStop {
    stops: StopPolicy,
}

impl LimitStop {
    pub fn new(stops: StopPolicy) -> Self {
        Self { stops }
    }

    fn kind(leg: LegKind) -> ProtectiveKind {
        match leg {
            LegKind::Call => ProtectiveKind::CallStopLoss,
            LegKind::Put => ProtectiveKind::PutStopLoss,
        }
    }
}

#[async_trait]
impl ProtectiveOrderStrategy for LimitStop {
    fn name(&self) -> &'static str {
        "limit entry + reduce-only stop"
    }

    async fn enter(&self, api: &dyn Transport, leg: &LegPlan) -> Result<Entry, ExchangeError> {
        let order = OrderRequest::limit_sell(leg.product_id, leg.size, price_str(leg.mark_price));
        let ack = place_order(api, &order).await?;
        let order_id = ack_id(&ack)?;
        info!(
            "Placed limit sell {} x{} @ {:.2} (order id={})",
            leg.symbol, leg.size, leg.mark_price, order_id
        );
        let state = if order_state(&ack) == "closed" {
            EntryState::Filled
        } else {
            EntryState::Resting
        };
        Ok(Entry { order_id, state })
    }

    async fn protect(
        &self,
        api: &dyn Transport,
        leg: &LegPlan,
        _entry: &Entry,
    ) -> ProtectiveOutcome {
        let kind = Self::kind(leg.kind);
        let (stop, limit) = self.stops.levels(leg.mark_price);
        let order =
            OrderRequest::stop_limit_buy(leg.product_id, leg.size, price_str(stop), price_str(limit));
        let result = match place_order(api, &order).await {
            Ok(ack) => ack_id(&ack),
            Err(e) => Err(e),
        };
        match result {
            Ok(id) => {
                info!("Stop-loss for {} active @ {:.2} (order id={})", leg.symbol, stop, id);
                ProtectiveOutcome::active(kind, Some(id), stop, limit)
            }
            Err(e) => {
                warn!("Stop-loss for {} failed: {}", leg.symbol, e);
                ProtectiveOutcome::failed(kind, stop, limit, e.to_string())
            }
        }
    }
}

async fn place_order(api: &dyn Transport, order: &OrderRequest) -> Result<Value, ExchangeError> {
    let body = serde_json::to_value(order)?;
    api.request(Method::POST, "/v2/orders", &[], Some(body)).await
}

fn ack_id(ack: &Value) -> Result<String, ExchangeError> {
    ack.get("id")
        .and_then(as_id)
        .ok_or_else(|| ExchangeError::Decode("order acknowledgement has no id".into()))
}

fn order_state(v: &Value) -> &str {
    v.get("state").and_then(Value::as_str).unwrap_or("")
}

/// Poll `GET /v2/orders/{id}` until the order closes, is cancelled, or the wait runs out.
async fn poll_until_filled(
    api: &dyn Transport,
    order_id: &str,
    wait: FillWaitCfg,
) -> Result<EntryState, ExchangeError> {
    let path = format!("/v2/orders/{}", order_id);
    let start = Instant::now();
    loop {
        match api.request(Method::GET, &path, &[], None).await {
            Ok(order) => match order_state(&order) {
                "closed" => return Ok(EntryState::Filled),
                "cancelled" | "rejected" => {
                    return Err(ExchangeError::Rejected(format!(
                        "entry order {} was {}",
                        order_id,
                        order_state(&order)
                    )))
                }
                _ => {}
            },
            Err(e) => warn!("fill check for order {} failed: {}", order_id, e),
        }
        if start.elapsed() >= Duration::from_millis(wait.timeout_ms) {
            return Ok(EntryState::Pending);
        }
        tokio::time::sleep(Duration::from_millis(wait.poll_interval_ms)).await;
    }
}
