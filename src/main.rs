//! Entry point. Wires Discord -> Parser -> Bot -> StraddleEngine / Account -> Delta Exchange.

mod account;
mod bot;
mod config;
mod discord;
mod error;
mod market_data;
mod parser;
mod protection;
mod render;
mod risk;
mod signer;
mod straddle;
#[cfg(test)]
mod testing;
mod transport;
mod types;
mod utils;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Credentials};
use crate::discord::BotRequest;
use crate::transport::{DeltaTransport, Transport};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    // Load config
    let cfg_path = std::env::var("STRADDLE_CONFIG").unwrap_or_else(|_| "config.yaml".into());
    let cfg = if Path::new(&cfg_path).exists() {
        AppConfig::load(&cfg_path)?
    } else {
        warn!("{} not found, using defaults", cfg_path);
        let cfg = AppConfig::default();
        cfg.validate()?;
        cfg
    };
    let creds = Credentials::from_env()?;
    let discord_token = std::env::var("DISCORD_USER_TOKEN")?;
    info!("Credentials loaded: {:?}", creds);

    let api: Arc<dyn Transport> = Arc::new(DeltaTransport::new(&cfg.exchange, creds)?);
    let market = Arc::new(market_data::MarketData::new(
        Arc::clone(&api),
        cfg.exchange.clone(),
    ));
    let account = Arc::new(account::Account::new(
        Arc::clone(&api),
        cfg.exchange.underlying.clone(),
    ));
    let engine = Arc::new(straddle::StraddleEngine::new(
        Arc::clone(&api),
        Arc::clone(&market),
        &cfg.strategy,
    ));

    // Connectivity check (once at startup); a failure here is not fatal.
    let spot = market.spot_price().await;
    if spot > 0.0 {
        info!("{} spot at startup: {:.2}", cfg.exchange.underlying, spot);
    } else {
        error!("Startup spot price check failed; check API credentials and base_url");
    }

    // Discord channel -> internal MPSC
    let (tx, mut rx) = tokio::sync::mpsc::channel::<BotRequest>(64);
    let discord_handle = tokio::spawn({
        let token = discord_token.clone();
        let dcfg = cfg.discord.clone();
        async move {
            if let Err(e) = discord::run(&token, dcfg, tx).await {
                error!("Discord run error: {:#}", e);
            }
        }
    });

    info!(
        "Straddle bot started. base_url={}, lots={}, stop={}%, buffer={}%, protection={}",
        cfg.exchange.base_url,
        cfg.strategy.lot_size,
        cfg.strategy.stop_loss_pct,
        cfg.strategy.limit_buffer_pct,
        engine.protection_name()
    );

    let mut bot = bot::Bot::new(
        market,
        engine,
        account,
        cfg.strategy.clone(),
        Duration::from_secs(cfg.discord.confirm_timeout_sec),
    );

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                let Some(req) = maybe else { break; };
                info!("Command from {}: {:?}", req.author, req.command);
                let text = bot.handle(&req.author, req.command).await;
                if req.reply.send(text).is_err() {
                    warn!("reply receiver dropped for {}", req.author);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    discord_handle.abort();
    let _ = discord_handle.await;
    Ok(())
}
