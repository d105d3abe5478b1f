//! Plain-text (Discord markdown) rendering of engine results.

use std::fmt::Write;

use crate::config::StrategyCfg;
use crate::types::{
    ExecutionResult, LegOutcomeKind, OpenOrder, PortfolioSummary, Position, ProtectiveKind,
    ProtectiveStatus,
};

/// Discord rejects messages longer than this.
const MAX_MESSAGE: usize = 1900;
const MAX_ROWS: usize = 10;

pub fn help() -> String {
    [
        "**Delta Exchange Short Straddle Bot**",
        "",
        "`!straddle [lots]` sell ATM same-day call + put with protective stops (asks to confirm)",
        "`!confirm` / `!cancel` answer a pending straddle request",
        "`!price` BTC spot price",
        "`!positions` open positions",
        "`!orders` open orders",
        "`!brackets` bracket orders",
        "`!portfolio` positions, orders and wallet summary",
        "`!cancelorder <id>` cancel one order",
        "`!cancelbracket <product_id>` remove a bracket",
        "`!info` strategy parameters",
    ]
    .join("\n")
}

pub fn strategy_info(cfg: &StrategyCfg, protection: &str) -> String {
    format!(
        "**Short Straddle Strategy**\n\
         Sells the ATM call and put of today's expiry, closest strike to spot.\n\
         Lots per leg: {}\n\
         Protection: {}\n\
         Stop trigger: premium +{}% (limit +{}% beyond the trigger)\n\
         Legs are placed call first, then put. A failed stop does not undo the entry.",
        cfg.lot_size, protection, cfg.stop_loss_pct, cfg.limit_buffer_pct
    )
}

pub fn confirm_prompt(lots: u32, cfg: &StrategyCfg, timeout_sec: u64) -> String {
    format!(
        "**Confirm short straddle**\n\
         - Sell {lots} lot(s) ATM BTC call\n\
         - Sell {lots} lot(s) ATM BTC put\n\
         - Stop-loss at +{}% premium\n\
         Reply `!confirm` within {}s or `!cancel`.\n\
         Options selling carries unlimited risk.",
        cfg.stop_loss_pct, timeout_sec
    )
}

pub fn spot_price(p: f64) -> String {
    if p > 0.0 {
        format!("**BTC spot:** ${:.2}", p)
    } else {
        "Unable to fetch BTC spot price.".to_string()
    }
}

pub fn execution(r: &ExecutionResult) -> String {
    let mut s = String::new();
    if r.aborted {
        let _ = writeln!(
            s,
            "**Straddle run aborted. Orders may have been placed: check `!positions` and `!orders`.**"
        );
        let _ = write!(s, "{}", r.error.as_deref().unwrap_or("Unknown error"));
        return s;
    }
    if !r.success {
        let _ = writeln!(s, "**Setup failed, no orders placed**");
        let _ = write!(s, "{}", r.error.as_deref().unwrap_or("Unknown error"));
        return s;
    }

    let missing = r.missing_legs();
    if r.orders.is_empty() {
        let _ = writeln!(s, "**No legs entered**: both entry orders were rejected.");
    } else if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|k| leg_name(*k)).collect();
        let _ = writeln!(
            s,
            "**ONE LEG ONLY: {} entry failed. Position is not a straddle, intervene manually.**",
            names.join(", ").to_lowercase()
        );
    } else if r.is_partially_protected() {
        let _ = writeln!(s, "**Straddle placed, PARTIALLY PROTECTED. Check stops manually.**");
    } else {
        let _ = writeln!(s, "**Short straddle executed**");
    }
    if let Some(spot) = r.spot_price {
        let _ = writeln!(s, "Spot: ${:.2}", spot);
    }
    if let Some(k) = r.strike_price {
        let _ = writeln!(s, "Strike: ${:.2}", k);
    }

    for o in &r.orders {
        let name = leg_name(o.kind);
        let fill = if o.executed { "filled" } else { "not confirmed filled" };
        let _ = writeln!(
            s,
            "- {} {} x{}: id {} @ ${:.2} ({})",
            name, o.symbol, o.size, o.order_id, o.price, fill
        );
    }
    for p in &r.protective_orders {
        let name = match p.kind {
            ProtectiveKind::CallBracket => "Call bracket",
            ProtectiveKind::PutBracket => "Put bracket",
            ProtectiveKind::CallStopLoss => "Call stop-loss",
            ProtectiveKind::PutStopLoss => "Put stop-loss",
        };
        match p.status {
            ProtectiveStatus::Active => {
                let _ = writeln!(
                    s,
                    "- {}: stop ${:.2} / limit ${:.2}{}",
                    name,
                    p.stop_price,
                    p.limit_price,
                    p.order_id
                        .as_deref()
                        .map(|id| format!(" (id {})", id))
                        .unwrap_or_default()
                );
            }
            ProtectiveStatus::Failed => {
                let _ = writeln!(
                    s,
                    "- {} FAILED (stop would be ${:.2}): {}",
                    name,
                    p.stop_price,
                    p.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
    if let Some(m) = &r.risk {
        let _ = writeln!(
            s,
            "Max profit ${:.2}, target ${:.2}, break-even ${:.2} - ${:.2}",
            m.max_profit, m.profit_target, m.break_even_lower, m.break_even_upper
        );
    }
    truncate(s)
}

fn leg_name(k: LegOutcomeKind) -> &'static str {
    match k {
        LegOutcomeKind::ShortCall => "Short call",
        LegOutcomeKind::ShortPut => "Short put",
    }
}

pub fn positions(ps: &[Position]) -> String {
    if ps.is_empty() {
        return "No active positions.".to_string();
    }
    let mut s = String::from("**Active positions**\n");
    let mut total = 0.0;
    for (i, p) in ps.iter().take(MAX_ROWS).enumerate() {
        total += p.unrealized_pnl;
        let _ = write!(s, "{}. {} size {}", i + 1, p.product_symbol, p.size);
        if p.entry_price > 0.0 {
            let _ = write!(s, ", entry ${:.2}", p.entry_price);
        }
        if p.mark_price > 0.0 {
            let _ = write!(s, ", mark ${:.2}", p.mark_price);
        }
        let _ = writeln!(s, ", PnL ${:.2}", p.unrealized_pnl);
    }
    let _ = write!(s, "Total PnL: ${:.2}", total);
    truncate(s)
}

pub fn orders(title: &str, os: &[OpenOrder]) -> String {
    if os.is_empty() {
        return format!("No {}.", title.to_lowercase());
    }
    let mut s = format!("**{}**\n", title);
    for (i, o) in os.iter().take(MAX_ROWS).enumerate() {
        let kind = if o.reduce_only { "stop" } else { "regular" };
        let _ = write!(
            s,
            "{}. [{}] id {} {} {} x{}",
            i + 1,
            kind,
            o.id,
            o.product_symbol,
            o.side.to_uppercase(),
            o.size
        );
        if let Some(lp) = o.limit_price {
            let _ = write!(s, " limit ${:.2}", lp);
        }
        if let Some(sp) = o.stop_price {
            let _ = write!(s, " stop ${:.2}", sp);
        }
        let _ = writeln!(s, " ({})", o.state);
    }
    if os.len() > MAX_ROWS {
        let _ = writeln!(s, "... and {} more", os.len() - MAX_ROWS);
    }
    truncate(s)
}

pub fn portfolio(p: &PortfolioSummary) -> String {
    let mut s = String::from("**Portfolio summary**\n");
    if !p.positions.is_empty() {
        let pnl: f64 = p.positions.iter().map(|x| x.unrealized_pnl).sum();
        let _ = writeln!(s, "Positions: {} (PnL ${:.2})", p.positions.len(), pnl);
    }
    if !p.orders.is_empty() {
        let stops = p.orders.iter().filter(|o| o.reduce_only).count();
        let _ = writeln!(s, "Orders: {} ({} stop orders)", p.orders.len(), stops);
    }
    for w in p.wallet.iter().filter(|w| w.balance != 0.0).take(MAX_ROWS) {
        let _ = writeln!(
            s,
            "{}: {:.4} (available {:.4})",
            w.asset_symbol, w.balance, w.available_balance
        );
    }
    if p.positions.is_empty() && p.orders.is_empty() {
        let _ = writeln!(s, "No active positions or orders.");
    }
    if !p.errors.is_empty() {
        let _ = writeln!(s, "Warnings:");
        for e in p.errors.iter().take(3) {
            let _ = writeln!(s, "  {}", e);
        }
    }
    truncate(s)
}

pub fn error(context: &str, e: impl std::fmt::Display) -> String {
    format!("**{} failed**: {}", context, e)
}

fn truncate(mut s: String) -> String {
    if s.len() > MAX_MESSAGE {
        let mut cut = MAX_MESSAGE;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("\n...");
    }
    s.trim_end().to_string()
}
