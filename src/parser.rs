//! Parse bot commands from chat messages.
//! Supported: `!help`, `!start`, `!price`, `!positions`, `!orders`, `!brackets`,
//! `!portfolio`, `!info`, `!straddle [lots]`, `!confirm`, `!cancel`,
//! `!cancelorder <id>`, `!cancelbracket <product_id>`.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    Price,
    Positions,
    Orders,
    Brackets,
    Portfolio,
    Info,
    /// Ask to run a straddle; `None` uses the configured lot size.
    Straddle(Option<u32>),
    Confirm,
    Cancel,
    CancelOrder(String),
    CancelBracket(i64),
}

fn command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^!([a-z]+)(?:\s+(\S+))?$").expect("command regex is valid")
    })
}

pub fn parse_command(text: &str) -> Option<BotCommand> {
    let t = text.trim();
    let c = command_re().captures(t)?;
    let name = c[1].to_ascii_lowercase();
    let arg = c.get(2).map(|m| m.as_str());

    let cmd = match (name.as_str(), arg) {
        ("help" | "start", None) => BotCommand::Help,
        ("price" | "status", None) => BotCommand::Price,
        ("positions", None) => BotCommand::Positions,
        ("orders", None) => BotCommand::Orders,
        ("brackets", None) => BotCommand::Brackets,
        ("portfolio", None) => BotCommand::Portfolio,
        ("info", None) => BotCommand::Info,
        ("straddle", None) => BotCommand::Straddle(None),
        ("straddle", Some(n)) => {
            let lots: u32 = n.parse().ok()?;
            if lots == 0 {
                return None;
            }
            BotCommand::Straddle(Some(lots))
        }
        ("confirm", None) => BotCommand::Confirm,
        ("cancel", None) => BotCommand::Cancel,
        ("cancelorder", Some(id)) if id.chars().all(|ch| ch.is_ascii_alphanumeric()) => {
            BotCommand::CancelOrder(id.to_string())
        }
        ("cancelbracket", Some(pid)) => BotCommand::CancelBracket(pid.parse().ok()?),
        _ => return None,
    };
    Some(cmd)
}
