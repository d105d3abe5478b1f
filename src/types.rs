//! Core domain types: tickers, order requests, execution outcomes and account views.

use serde::{Deserialize, Serialize};

use crate::utils::{de_f64, de_id, de_opt_f64};

/// Ticker snapshot as returned by `/v2/tickers`. Never cached across executions.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Ticker {
    #[serde(default)]
    pub symbol: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub strike_price: Option<f64>,
    #[serde(default, deserialize_with = "de_f64")]
    pub mark_price: f64,
    #[serde(default)]
    pub product_id: i64,
    #[serde(default)]
    pub contract_type: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    MarketOrder,
    LimitOrder,
    StopLimitOrder,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Gtc,
    Ioc,
}

/// Body of `POST /v2/orders`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderRequest {
    pub product_id: i64,
    pub side: Side,
    pub size: u32,
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    pub time_in_force: TimeInForce,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reduce_only: bool,
}

impl OrderRequest {
    pub fn market_sell(product_id: i64, size: u32) -> Self {
        Self {
            product_id,
            side: Side::Sell,
            size,
            order_type: OrderType::MarketOrder,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::Ioc,
            reduce_only: false,
        }
    }

    pub fn limit_sell(product_id: i64, size: u32, limit_price: String) -> Self {
        Self {
            product_id,
            side: Side::Sell,
            size,
            order_type: OrderType::LimitOrder,
            limit_price: Some(limit_price),
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
            reduce_only: false,
        }
    }

    /// Reduce-only stop-limit buy that closes a short leg.
    pub fn stop_limit_buy(product_id: i64, size: u32, stop_price: String, limit_price: String) -> Self {
        Self {
            product_id,
            side: Side::Buy,
            size,
            order_type: OrderType::StopLimitOrder,
            limit_price: Some(limit_price),
            stop_price: Some(stop_price),
            time_in_force: TimeInForce::Gtc,
            reduce_only: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StopLossLeg {
    pub order_type: OrderType,
    pub stop_price: String,
    pub limit_price: String,
}

/// Body of `POST /v2/orders/bracket`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BracketRequest {
    pub product_id: i64,
    pub stop_loss_order: StopLossLeg,
    pub bracket_stop_trigger_method: String,
}

impl BracketRequest {
    pub fn stop_loss(product_id: i64, stop_price: String, limit_price: String) -> Self {
        Self {
            product_id,
            stop_loss_order: StopLossLeg {
                order_type: OrderType::LimitOrder,
                stop_price,
                limit_price,
            },
            bracket_stop_trigger_method: "mark_price".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegKind {
    Call,
    Put,
}

impl LegKind {
    pub fn label(self) -> &'static str {
        match self {
            LegKind::Call => "call",
            LegKind::Put => "put",
        }
    }
}

/// One resolved short leg, ready for entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LegPlan {
    pub kind: LegKind,
    pub product_id: i64,
    pub symbol: String,
    pub size: u32,
    pub mark_price: f64,
}

impl LegPlan {
    pub fn from_ticker(kind: LegKind, t: &Ticker, size: u32) -> Self {
        Self {
            kind,
            product_id: t.product_id,
            symbol: t.symbol.clone(),
            size,
            mark_price: t.mark_price,
        }
    }
}

/// Where an entry order stands when protection is about to be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Exchange confirmed the fill.
    Filled,
    /// Accepted and resting on the book (limit entry).
    Resting,
    /// Market entry accepted but the fill was not confirmed in time.
    Pending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub order_id: String,
    pub state: EntryState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegOutcomeKind {
    ShortCall,
    ShortPut,
}

impl From<LegKind> for LegOutcomeKind {
    fn from(k: LegKind) -> Self {
        match k {
            LegKind::Call => LegOutcomeKind::ShortCall,
            LegKind::Put => LegOutcomeKind::ShortPut,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegOutcome {
    pub kind: LegOutcomeKind,
    pub order_id: String,
    pub symbol: String,
    pub price: f64,
    pub size: u32,
    pub executed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectiveKind {
    CallBracket,
    PutBracket,
    CallStopLoss,
    PutStopLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectiveStatus {
    Active,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectiveOutcome {
    pub kind: ProtectiveKind,
    pub status: ProtectiveStatus,
    pub order_id: Option<String>,
    pub stop_price: f64,
    pub limit_price: f64,
    pub error: Option<String>,
}

impl ProtectiveOutcome {
    pub fn active(kind: ProtectiveKind, order_id: Option<String>, stop: f64, limit: f64) -> Self {
        Self {
            kind,
            status: ProtectiveStatus::Active,
            order_id,
            stop_price: stop,
            limit_price: limit,
            error: None,
        }
    }

    pub fn failed(kind: ProtectiveKind, stop: f64, limit: f64, error: impl Into<String>) -> Self {
        Self {
            kind,
            status: ProtectiveStatus::Failed,
            order_id: None,
            stop_price: stop,
            limit_price: limit,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskMetrics {
    pub max_profit: f64,
    pub call_stop_trigger: f64,
    pub put_stop_trigger: f64,
    pub max_loss_per_leg: f64,
    pub profit_target: f64,
    pub break_even_upper: f64,
    pub break_even_lower: f64,
}

/// Aggregate result of one straddle execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionResult {
    pub success: bool,
    pub spot_price: Option<f64>,
    pub strike_price: Option<f64>,
    pub call_premium: Option<f64>,
    pub put_premium: Option<f64>,
    pub orders: Vec<LegOutcome>,
    pub protective_orders: Vec<ProtectiveOutcome>,
    pub risk: Option<RiskMetrics>,
    pub error: Option<String>,
    /// The run died midway; orders may be live even though none are listed.
    pub aborted: bool,
}

impl ExecutionResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// A run that stopped at an unknown point after setup may have started.
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            aborted: true,
            ..Self::failed(error)
        }
    }

    /// Legs that were planned but never entered. Empty unless exactly one leg went in.
    pub fn missing_legs(&self) -> Vec<LegOutcomeKind> {
        if !self.success || self.orders.is_empty() {
            return Vec::new();
        }
        [LegOutcomeKind::ShortCall, LegOutcomeKind::ShortPut]
            .into_iter()
            .filter(|k| !self.orders.iter().any(|o| o.kind == *k))
            .collect()
    }

    /// Orders went out but at least one leg is not protected.
    pub fn is_partially_protected(&self) -> bool {
        self.success
            && !self.orders.is_empty()
            && (self.protective_orders.len() < self.orders.len()
                || self
                    .protective_orders
                    .iter()
                    .any(|p| p.status == ProtectiveStatus::Failed))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Position {
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub product_symbol: String,
    #[serde(default, deserialize_with = "de_f64")]
    pub size: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub entry_price: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub mark_price: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OpenOrder {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub product_symbol: String,
    #[serde(default)]
    pub side: String,
    #[serde(default, deserialize_with = "de_f64")]
    pub size: f64,
    #[serde(default)]
    pub order_type: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub limit_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub stop_price: Option<f64>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub reduce_only: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WalletBalance {
    #[serde(default)]
    pub asset_symbol: String,
    #[serde(default, deserialize_with = "de_f64")]
    pub balance: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub available_balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioSummary {
    pub positions: Vec<Position>,
    pub orders: Vec<OpenOrder>,
    pub wallet: Vec<WalletBalance>,
    /// Per-section fetch failures; the summary is still returned.
    pub errors: Vec<String>,
}
