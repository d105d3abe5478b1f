//! Command dispatch. One `Bot` is owned by the main loop, so commands (and straddle
//! executions) run one at a time in arrival order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::account::Account;
use crate::config::StrategyCfg;
use crate::market_data::MarketData;
use crate::parser::BotCommand;
use crate::render;
use crate::straddle::StraddleEngine;

struct PendingStraddle {
    asked_at: Instant,
    lots: u32,
}

pub struct Bot {
    market: Arc<MarketData>,
    engine: Arc<StraddleEngine>,
    account: Arc<Account>,
    strategy: StrategyCfg,
    confirm_timeout: Duration,
    pending: HashMap<String, PendingStraddle>,
}

impl Bot {
    pub fn new(
        market: Arc<MarketData>,
        engine: Arc<StraddleEngine>,
        account: Arc<Account>,
        strategy: StrategyCfg,
        confirm_timeout: Duration,
    ) -> Self {
        Self {
            market,
            engine,
            account,
            strategy,
            confirm_timeout,
            pending: HashMap::new(),
        }
    }

    pub async fn handle(&mut self, author: &str, cmd: BotCommand) -> String {
        match cmd {
            BotCommand::Help => render::help(),
            BotCommand::Info => render::strategy_info(&self.strategy, self.engine.protection_name()),
            BotCommand::Price => render::spot_price(self.market.spot_price().await),
            BotCommand::Positions => match self.account.open_positions().await {
                Ok(ps) => render::positions(&ps),
                Err(e) => render::error("Fetching positions", e),
            },
            BotCommand::Orders => match self.account.open_orders().await {
                Ok(os) => render::orders("Open orders", &os),
                Err(e) => render::error("Fetching orders", e),
            },
            BotCommand::Brackets => match self.account.bracket_orders().await {
                Ok(os) => render::orders("Bracket orders", &os),
                Err(e) => render::error("Fetching bracket orders", e),
            },
            BotCommand::Portfolio => match self.account.portfolio_summary().await {
                Ok(p) => render::portfolio(&p),
                Err(e) => render::error("Fetching portfolio", e),
            },
            BotCommand::CancelOrder(id) => match self.account.cancel_order(&id).await {
                Ok(()) => format!("Order {} cancelled.", id),
                Err(e) => render::error(&format!("Cancelling order {}", id), e),
            },
            BotCommand::CancelBracket(pid) => match self.account.cancel_bracket(pid).await {
                Ok(()) => format!("Bracket on product {} cancelled.", pid),
                Err(e) => render::error(&format!("Cancelling bracket on product {}", pid), e),
            },
            BotCommand::Straddle(lots) => {
                let lots = lots.unwrap_or(self.strategy.lot_size);
                self.pending.insert(
                    author.to_string(),
                    PendingStraddle {
                        asked_at: Instant::now(),
                        lots,
                    },
                );
                info!("{} requested a straddle of {} lot(s), awaiting confirm", author, lots);
                render::confirm_prompt(lots, &self.strategy, self.confirm_timeout.as_secs())
            }
            BotCommand::Cancel => match self.pending.remove(author) {
                Some(_) => "Straddle request cancelled.".to_string(),
                None => "Nothing to cancel.".to_string(),
            },
            BotCommand::Confirm => {
                let Some(p) = self.pending.remove(author) else {
                    return "No pending straddle. Send `!straddle` first.".to_string();
                };
                if p.asked_at.elapsed() > self.confirm_timeout {
                    warn!("{} confirmed an expired straddle request", author);
                    return "Confirmation expired. Send `!straddle` again.".to_string();
                }
                info!("{} confirmed straddle of {} lot(s)", author, p.lots);
                let result = Arc::clone(&self.engine).execute(p.lots).await;
                render::execution(&result)
            }
        }
    }
}
