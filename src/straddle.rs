//! Short-straddle orchestration.
//!
//! Strictly sequential: spot -> same-day chains -> ATM pair -> call leg (enter, protect)
//! -> put leg (enter, protect). Setup failures abort before any order is placed; leg
//! and protection failures are recorded and never roll back or stop the next leg.
//! There is no atomicity across legs: a live, partially protected straddle is reported
//! as such so it can be handled by hand.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::StrategyCfg;
use crate::market_data::{find_atm_strikes, MarketData};
use crate::protection::ProtectiveOrderStrategy;
use crate::risk::StopPolicy;
use crate::transport::Transport;
use crate::types::{ExecutionResult, LegKind, LegOutcome, LegPlan};

pub const ERR_SPOT: &str = "Unable to fetch BTC spot price";
pub const ERR_NO_CHAIN: &str = "No same day expiry options available";
pub const ERR_NO_ATM: &str = "Unable to find ATM options";
pub const ERR_BAD_PRICES: &str = "Invalid option prices";
pub const ERR_LOT_SIZE: &str = "Lot size must be at least 1";

pub struct StraddleEngine {
    api: Arc<dyn Transport>,
    market: Arc<MarketData>,
    protection: Box<dyn ProtectiveOrderStrategy>,
    stops: StopPolicy,
}

impl StraddleEngine {
    pub fn new(
        api: Arc<dyn Transport>,
        market: Arc<MarketData>,
        cfg: &StrategyCfg,
    ) -> Self {
        Self::with_protection(api, market, cfg, crate::protection::from_config(cfg))
    }

    pub fn with_protection(
        api: Arc<dyn Transport>,
        market: Arc<MarketData>,
        cfg: &StrategyCfg,
        protection: Box<dyn ProtectiveOrderStrategy>,
    ) -> Self {
        Self {
            api,
            market,
            protection,
            stops: StopPolicy::new(cfg.stop_loss_pct, cfg.limit_buffer_pct),
        }
    }

    pub fn protection_name(&self) -> &'static str {
        self.protection.name()
    }

    /// Run one straddle. Always returns a result; a panic inside the run is reported as
    /// `Strategy execution failed: ...` instead of taking the caller down.
    pub async fn execute(self: Arc<Self>, lot_size: u32) -> ExecutionResult {
        let engine = Arc::clone(&self);
        match tokio::spawn(async move { engine.run(lot_size).await }).await {
            Ok(result) => result,
            Err(e) => {
                error!("straddle execution aborted: {}", e);
                ExecutionResult::aborted(format!("Strategy execution failed: {}", e))
            }
        }
    }

    async fn run(&self, lot_size: u32) -> ExecutionResult {
        if lot_size == 0 {
            return ExecutionResult::failed(ERR_LOT_SIZE);
        }
        info!(
            "Executing short straddle: lots={}, protection={}",
            lot_size,
            self.protection.name()
        );

        let spot = self.market.spot_price().await;
        if !(spot > 0.0) {
            warn!("spot price unavailable ({})", spot);
            return ExecutionResult::failed(ERR_SPOT);
        }

        let (calls, puts) = self.market.same_day_options().await;
        if calls.is_empty() || puts.is_empty() {
            return ExecutionResult {
                spot_price: Some(spot),
                ..ExecutionResult::failed(ERR_NO_CHAIN)
            };
        }

        let (Some(atm_call), Some(atm_put)) = find_atm_strikes(spot, &calls, &puts) else {
            return ExecutionResult {
                spot_price: Some(spot),
                ..ExecutionResult::failed(ERR_NO_ATM)
            };
        };
        let strike = atm_call.strike_price.unwrap_or_default();
        info!(
            "ATM pair: spot={:.2} strike={:.2} call={} ({:.2}) put={} ({:.2})",
            spot, strike, atm_call.symbol, atm_call.mark_price, atm_put.symbol, atm_put.mark_price
        );

        if !(atm_call.mark_price > 0.0) || !(atm_put.mark_price > 0.0) {
            return ExecutionResult {
                spot_price: Some(spot),
                strike_price: Some(strike),
                ..ExecutionResult::failed(ERR_BAD_PRICES)
            };
        }

        let mut result = ExecutionResult {
            success: true,
            spot_price: Some(spot),
            strike_price: Some(strike),
            call_premium: Some(atm_call.mark_price),
            put_premium: Some(atm_put.mark_price),
            risk: Some(
                self.stops
                    .metrics(strike, atm_call.mark_price, atm_put.mark_price),
            ),
            ..Default::default()
        };

        // Call before put, always.
        for plan in [
            LegPlan::from_ticker(LegKind::Call, atm_call, lot_size),
            LegPlan::from_ticker(LegKind::Put, atm_put, lot_size),
        ] {
            self.run_leg(&plan, &mut result).await;
        }

        info!(
            "Straddle done: {} legs entered, {} protective orders ({} failed)",
            result.orders.len(),
            result.protective_orders.len(),
            result
                .protective_orders
                .iter()
                .filter(|p| p.error.is_some())
                .count()
        );
        result
    }

    async fn run_leg(&self, plan: &LegPlan, result: &mut ExecutionResult) {
        let entry = match self.protection.enter(self.api.as_ref(), plan).await {
            Ok(e) => e,
            Err(e) => {
                warn!("{} leg entry failed for {}: {}", plan.kind.label(), plan.symbol, e);
                return;
            }
        };
        result.orders.push(LegOutcome {
            kind: plan.kind.into(),
            order_id: entry.order_id.clone(),
            symbol: plan.symbol.clone(),
            price: plan.mark_price,
            size: plan.size,
            executed: entry.state == crate::types::EntryState::Filled,
        });
        let outcome = self
            .protection
            .protect(self.api.as_ref(), plan, &entry)
            .await;
        result.protective_orders.push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExchangeCfg, FillWaitCfg, ProtectionMode};
    use crate::error::ExchangeError;
    use crate::testing::ScriptedTransport;
    use crate::types::{Entry, LegOutcomeKind, ProtectiveKind, ProtectiveOutcome, ProtectiveStatus};
    use reqwest::Method;
    use serde_json::{json, Value};

    fn cfg(mode: ProtectionMode) -> StrategyCfg {
        StrategyCfg {
            protection: mode,
            fill_wait: FillWaitCfg {
                poll_interval_ms: 1,
                timeout_ms: 20,
            },
            ..StrategyCfg::default()
        }
    }

    fn engine(api: &Arc<ScriptedTransport>, mode: ProtectionMode) -> Arc<StraddleEngine> {
        let api: Arc<dyn Transport> = api.clone();
        let market = Arc::new(MarketData::new(api.clone(), ExchangeCfg::default()));
        Arc::new(StraddleEngine::new(api, market, &cfg(mode)))
    }

    fn chain(api: &ScriptedTransport, calls: Value, puts: Value) {
        api.ok(Method::GET, "/v2/tickers", &[("contract_types", "call_options")], calls);
        api.ok(Method::GET, "/v2/tickers", &[("contract_types", "put_options")], puts);
    }

    fn happy_market(api: &ScriptedTransport) {
        api.ok(Method::GET, "/v2/tickers/BTCUSD", &[], json!({"spot_price": "50000"}));
        chain(
            api,
            json!([
                {"symbol": "C-BTC-49000", "strike_price": "49000", "mark_price": "1700", "product_id": 10},
                {"symbol": "C-BTC-50000", "strike_price": "50000", "mark_price": "1200", "product_id": 11},
                {"symbol": "C-BTC-51000", "strike_price": "51000", "mark_price": "800", "product_id": 12}
            ]),
            json!([
                {"symbol": "P-BTC-49000", "strike_price": "49000", "mark_price": "700", "product_id": 20},
                {"symbol": "P-BTC-50000", "strike_price": "50000", "mark_price": "1150", "product_id": 21}
            ]),
        );
    }

    fn order_calls(api: &ScriptedTransport) -> usize {
        api.count(Method::POST, "/v2/orders") + api.count(Method::POST, "/v2/orders/bracket")
    }

    #[tokio::test]
    async fn end_to_end_market_bracket() {
        let api = Arc::new(ScriptedTransport::new());
        happy_market(&api);
        api.ok(Method::POST, "/v2/orders", &[("product_id", "11")], json!({"id": 1001, "state": "closed"}));
        api.ok(Method::POST, "/v2/orders", &[("product_id", "21")], json!({"id": 1002, "state": "closed"}));
        api.ok(Method::POST, "/v2/orders/bracket", &[], json!({"id": 2001}));

        let r = engine(&api, ProtectionMode::MarketBracket).execute(1).await;
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.spot_price, Some(50000.0));
        assert_eq!(r.strike_price, Some(50000.0));
        assert_eq!(r.orders.len(), 2);
        assert_eq!(r.orders[0].kind, LegOutcomeKind::ShortCall);
        assert_eq!(r.orders[0].order_id, "1001");
        assert_eq!(r.orders[0].price, 1200.0);
        assert!(r.orders[0].executed);
        assert_eq!(r.orders[1].kind, LegOutcomeKind::ShortPut);
        assert_eq!(r.protective_orders.len(), 2);
        assert!(r
            .protective_orders
            .iter()
            .all(|p| p.status == ProtectiveStatus::Active));
        assert_eq!(r.protective_orders[0].kind, ProtectiveKind::CallBracket);
        assert!((r.protective_orders[0].stop_price - 1500.0).abs() < 1e-9);
        assert!((r.protective_orders[1].stop_price - 1437.5).abs() < 1e-9);
        assert!(!r.is_partially_protected());
        assert!((r.risk.unwrap().max_profit - 2350.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn end_to_end_limit_stop() {
        let api = Arc::new(ScriptedTransport::new());
        happy_market(&api);
        api.ok(Method::POST, "/v2/orders", &[("order_type", "limit_order")], json!({"id": 1, "state": "open"}));
        api.ok(Method::POST, "/v2/orders", &[("order_type", "stop_limit_order")], json!({"id": 2}));

        let r = engine(&api, ProtectionMode::LimitStop).execute(2).await;
        assert!(r.success);
        assert_eq!(r.orders.len(), 2);
        assert!(!r.orders[0].executed);
        assert_eq!(r.orders[0].size, 2);
        assert_eq!(r.protective_orders[0].kind, ProtectiveKind::CallStopLoss);
        assert_eq!(r.protective_orders[1].kind, ProtectiveKind::PutStopLoss);
        assert!((r.protective_orders[1].stop_price - 1437.5).abs() < 1e-9);
        assert_eq!(api.count(Method::POST, "/v2/orders"), 4);

        // Calls go out in call-entry, call-stop, put-entry, put-stop order.
        let products: Vec<Value> = api
            .calls()
            .iter()
            .filter(|c| c.method == Method::POST)
            .map(|c| c.body.clone().unwrap()["product_id"].clone())
            .collect();
        assert_eq!(products, vec![json!(11), json!(11), json!(21), json!(21)]);
    }

    #[tokio::test]
    async fn zero_spot_skips_chain_fetch() {
        for spot in ["0", "-1"] {
            let api = Arc::new(ScriptedTransport::new());
            api.ok(Method::GET, "/v2/tickers/BTCUSD", &[], json!({"spot_price": spot}));
            let r = engine(&api, ProtectionMode::MarketBracket).execute(1).await;
            assert!(!r.success, "spot {}", spot);
            assert_eq!(r.error.as_deref(), Some(ERR_SPOT));
            assert_eq!(api.count(Method::GET, "/v2/tickers"), 0);
            assert_eq!(order_calls(&api), 0);
        }
    }

    #[tokio::test]
    async fn spot_transport_failure_is_setup_failure() {
        let api = Arc::new(ScriptedTransport::new());
        api.fail(Method::GET, "/v2/tickers/BTCUSD", &[], ExchangeError::Network("dns".into()));
        let r = engine(&api, ProtectionMode::MarketBracket).execute(1).await;
        assert_eq!(r.error.as_deref(), Some(ERR_SPOT));
        assert_eq!(api.count(Method::GET, "/v2/tickers"), 0);
    }

    #[tokio::test]
    async fn empty_chain_places_no_orders() {
        let api = Arc::new(ScriptedTransport::new());
        api.ok(Method::GET, "/v2/tickers/BTCUSD", &[], json!({"spot_price": 50000}));
        chain(
            &api,
            json!([{"symbol": "C", "strike_price": "50000", "mark_price": "1200", "product_id": 1}]),
            json!([]),
        );
        let r = engine(&api, ProtectionMode::MarketBracket).execute(1).await;
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some(ERR_NO_CHAIN));
        assert!(r.orders.is_empty());
        assert_eq!(order_calls(&api), 0);
    }

    #[tokio::test]
    async fn unmatched_put_strike_is_no_atm() {
        let api = Arc::new(ScriptedTransport::new());
        api.ok(Method::GET, "/v2/tickers/BTCUSD", &[], json!({"spot_price": 50000}));
        chain(
            &api,
            json!([{"symbol": "C", "strike_price": "50000", "mark_price": "1200", "product_id": 1}]),
            json!([{"symbol": "P", "strike_price": "50000.02", "mark_price": "1100", "product_id": 2}]),
        );
        let r = engine(&api, ProtectionMode::MarketBracket).execute(1).await;
        assert_eq!(r.error.as_deref(), Some(ERR_NO_ATM));
        assert_eq!(order_calls(&api), 0);
    }

    #[tokio::test]
    async fn zero_mark_price_is_rejected_before_orders() {
        let api = Arc::new(ScriptedTransport::new());
        api.ok(Method::GET, "/v2/tickers/BTCUSD", &[], json!({"spot_price": 50000}));
        chain(
            &api,
            json!([{"symbol": "C", "strike_price": "50000", "mark_price": "0", "product_id": 1}]),
            json!([{"symbol": "P", "strike_price": "50000", "mark_price": "1100", "product_id": 2}]),
        );
        let r = engine(&api, ProtectionMode::LimitStop).execute(1).await;
        assert_eq!(r.error.as_deref(), Some(ERR_BAD_PRICES));
        assert_eq!(order_calls(&api), 0);
    }

    #[tokio::test]
    async fn zero_lot_size_is_rejected() {
        let api = Arc::new(ScriptedTransport::new());
        let r = engine(&api, ProtectionMode::LimitStop).execute(0).await;
        assert_eq!(r.error.as_deref(), Some(ERR_LOT_SIZE));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_protection_keeps_success_and_continues_to_put() {
        let api = Arc::new(ScriptedTransport::new());
        happy_market(&api);
        api.ok(Method::POST, "/v2/orders", &[("product_id", "11")], json!({"id": 1001, "state": "closed"}));
        api.ok(Method::POST, "/v2/orders", &[("product_id", "21")], json!({"id": 1002, "state": "closed"}));
        api.fail(
            Method::POST,
            "/v2/orders/bracket",
            &[("product_id", "11")],
            ExchangeError::Status {
                status: 400,
                message: "no_position_for_bracket".into(),
            },
        );
        api.ok(Method::POST, "/v2/orders/bracket", &[("product_id", "21")], json!({"id": 3}));

        let r = engine(&api, ProtectionMode::MarketBracket).execute(1).await;
        assert!(r.success);
        assert_eq!(r.orders.len(), 2);
        assert_eq!(r.protective_orders.len(), 2);
        assert_eq!(r.protective_orders[0].status, ProtectiveStatus::Failed);
        assert!(r.protective_orders[0]
            .error
            .as_deref()
            .unwrap()
            .contains("no_position_for_bracket"));
        assert_eq!(r.protective_orders[1].status, ProtectiveStatus::Active);
        assert!(r.is_partially_protected());
        // Put leg was still attempted after the call's bracket failed.
        assert_eq!(api.count(Method::POST, "/v2/orders"), 2);
    }

    #[tokio::test]
    async fn call_entry_rejected_put_still_runs() {
        let api = Arc::new(ScriptedTransport::new());
        happy_market(&api);
        api.fail(
            Method::POST,
            "/v2/orders",
            &[("product_id", "11")],
            ExchangeError::Rejected("insufficient_margin".into()),
        );
        api.ok(Method::POST, "/v2/orders", &[("product_id", "21")], json!({"id": 1002, "state": "closed"}));
        api.ok(Method::POST, "/v2/orders/bracket", &[], json!({"id": 3}));

        let r = engine(&api, ProtectionMode::MarketBracket).execute(1).await;
        assert!(r.success);
        assert_eq!(r.orders.len(), 1);
        assert_eq!(r.orders[0].kind, LegOutcomeKind::ShortPut);
        // No protection attempted for the call that never entered.
        assert_eq!(r.protective_orders.len(), 1);
        assert_eq!(r.protective_orders[0].kind, ProtectiveKind::PutBracket);
        assert_eq!(api.count(Method::POST, "/v2/orders/bracket"), 1);

        let text = crate::render::execution(&r);
        assert!(!text.contains("Short straddle executed"));
        assert!(text.contains("ONE LEG ONLY: short call entry failed"));
    }

    struct PanicOnPut(Box<dyn ProtectiveOrderStrategy>);

    #[async_trait::async_trait]
    impl ProtectiveOrderStrategy for PanicOnPut {
        fn name(&self) -> &'static str {
            "panics on put"
        }

        async fn enter(&self, api: &dyn Transport, leg: &LegPlan) -> Result<Entry, ExchangeError> {
            if leg.kind == LegKind::Put {
                panic!("put entry blew up");
            }
            self.0.enter(api, leg).await
        }

        async fn protect(&self, api: &dyn Transport, leg: &LegPlan, entry: &Entry) -> ProtectiveOutcome {
            self.0.protect(api, leg, entry).await
        }
    }

    #[tokio::test]
    async fn panic_after_call_leg_is_reported_as_aborted() {
        let api = Arc::new(ScriptedTransport::new());
        happy_market(&api);
        api.ok(Method::POST, "/v2/orders", &[], json!({"id": 1001, "state": "closed"}));
        api.ok(Method::POST, "/v2/orders/bracket", &[], json!({"id": 2001}));

        let cfg = cfg(ProtectionMode::MarketBracket);
        let dyn_api: Arc<dyn Transport> = api.clone();
        let market = Arc::new(MarketData::new(dyn_api.clone(), ExchangeCfg::default()));
        let inner = crate::protection::from_config(&cfg);
        let engine = Arc::new(StraddleEngine::with_protection(
            dyn_api,
            market,
            &cfg,
            Box::new(PanicOnPut(inner)),
        ));

        let r = engine.execute(1).await;
        assert!(!r.success);
        assert!(r.aborted);
        assert!(r.error.as_deref().unwrap().starts_with("Strategy execution failed"));
        // The call leg really went out before the panic.
        assert_eq!(api.count(Method::POST, "/v2/orders"), 1);

        let text = crate::render::execution(&r);
        assert!(!text.contains("no orders placed"));
        assert!(text.contains("Orders may have been placed"));
    }

    #[tokio::test]
    async fn pending_fill_recorded_without_bracket() {
        let api = Arc::new(ScriptedTransport::new());
        happy_market(&api);
        api.ok(Method::POST, "/v2/orders", &[("product_id", "11")], json!({"id": 1001, "state": "open"}));
        api.ok(Method::GET, "/v2/orders/1001", &[], json!({"state": "open"}));
        api.ok(Method::POST, "/v2/orders", &[("product_id", "21")], json!({"id": 1002, "state": "closed"}));
        api.ok(Method::POST, "/v2/orders/bracket", &[], json!({"id": 3}));

        let r = engine(&api, ProtectionMode::MarketBracket).execute(1).await;
        assert!(r.success);
        assert_eq!(r.orders.len(), 2);
        assert!(!r.orders[0].executed);
        assert!(r.orders[1].executed);
        assert_eq!(r.protective_orders[0].status, ProtectiveStatus::Failed);
        assert_eq!(r.protective_orders[1].status, ProtectiveStatus::Active);
        assert_eq!(api.count(Method::POST, "/v2/orders/bracket"), 1);
    }
}
