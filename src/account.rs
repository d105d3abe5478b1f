//! Read and cancel endpoints used by the chat front end (never by the orchestrator).

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ExchangeError;
use crate::transport::Transport;
use crate::types::{OpenOrder, PortfolioSummary, Position, WalletBalance};

pub struct Account {
    api: Arc<dyn Transport>,
    underlying: String,
}

impl Account {
    pub fn new(api: Arc<dyn Transport>, underlying: impl Into<String>) -> Self {
        Self {
            api,
            underlying: underlying.into(),
        }
    }

    /// Positions on the underlying with a non-zero size.
    pub async fn open_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let params = [("underlying_asset_symbol", self.underlying.clone())];
        let all: Vec<Position> = self.get_list("/v2/positions", &params).await?;
        Ok(all.into_iter().filter(|p| p.size != 0.0).collect())
    }

    pub async fn open_orders(&self) -> Result<Vec<OpenOrder>, ExchangeError> {
        self.get_list("/v2/orders", &[("state", "open".to_string())])
            .await
    }

    pub async fn bracket_orders(&self) -> Result<Vec<OpenOrder>, ExchangeError> {
        self.get_list("/v2/orders/bracket", &[]).await
    }

    pub async fn wallet(&self) -> Result<Vec<WalletBalance>, ExchangeError> {
        self.get_list("/v2/wallet/balances", &[]).await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        let path = format!("/v2/orders/{}", order_id);
        self.api.request(Method::DELETE, &path, &[], None).await?;
        info!("Cancelled order {}", order_id);
        Ok(())
    }

    pub async fn cancel_bracket(&self, product_id: i64) -> Result<(), ExchangeError> {
        let body = json!({ "product_id": product_id });
        self.api
            .request(Method::DELETE, "/v2/orders/bracket", &[], Some(body))
            .await?;
        info!("Cancelled bracket on product {}", product_id);
        Ok(())
    }

    /// Positions, open orders and wallet in one view. A section that fails is left
    /// empty and its error is listed; only a total failure is an `Err`.
    pub async fn portfolio_summary(&self) -> Result<PortfolioSummary, ExchangeError> {
        let mut summary = PortfolioSummary::default();
        let mut last_err = None;

        match self.open_positions().await {
            Ok(p) => summary.positions = p,
            Err(e) => {
                summary.errors.push(format!("positions: {}", e));
                last_err = Some(e);
            }
        }
        match self.open_orders().await {
            Ok(o) => summary.orders = o,
            Err(e) => {
                summary.errors.push(format!("orders: {}", e));
                last_err = Some(e);
            }
        }
        match self.wallet().await {
            Ok(w) => summary.wallet = w,
            Err(e) => {
                summary.errors.push(format!("wallet: {}", e));
                last_err = Some(e);
            }
        }

        match last_err {
            Some(e) if summary.errors.len() == 3 => Err(e),
            _ => {
                if !summary.errors.is_empty() {
                    warn!("portfolio summary incomplete: {:?}", summary.errors);
                }
                Ok(summary)
            }
        }
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, ExchangeError> {
        let v = self.api.request(Method::GET, path, params, None).await?;
        match v {
            Value::Null => Ok(Vec::new()),
            // Some endpoints answer a single object instead of a list.
            obj @ Value::Object(_) => Ok(vec![serde_json::from_value(obj)?]),
            other => Ok(serde_json::from_value(other)?),
        }
    }
}
