//! Load and validate runtime configuration.
//!
//! Non-secret settings come from a YAML file; credentials come from the
//! environment (see `Credentials::from_env`).

use anyhow::{bail, Context};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExchangeCfg {
    pub base_url: String,
    pub underlying: String,  // e.g. "BTC"
    pub spot_symbol: String, // e.g. "BTCUSD"
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    /// Offset of the exchange's calendar day from UTC, used for `expiry_date`.
    pub expiry_utc_offset_minutes: i32,
}

impl Default for ExchangeCfg {
    fn default() -> Self {
        Self {
            base_url: "https://api.india.delta.exchange".to_string(),
            underlying: "BTC".to_string(),
            spot_symbol: "BTCUSD".to_string(),
            connect_timeout_ms: 3_000,
            read_timeout_ms: 27_000,
            expiry_utc_offset_minutes: 330,
        }
    }
}

impl ExchangeCfg {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionMode {
    /// Market entry, then an exchange bracket once the fill is confirmed.
    MarketBracket,
    /// Limit entry at mark, then a reduce-only stop-limit buy.
    LimitStop,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct FillWaitCfg {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for FillWaitCfg {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StrategyCfg {
    pub lot_size: u32,
    pub stop_loss_pct: f64,
    pub limit_buffer_pct: f64,
    pub protection: ProtectionMode,
    pub fill_wait: FillWaitCfg,
}

impl Default for StrategyCfg {
    fn default() -> Self {
        Self {
            lot_size: 1,
            stop_loss_pct: 25.0,
            limit_buffer_pct: 2.0,
            protection: ProtectionMode::MarketBracket,
            fill_wait: FillWaitCfg::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiscordCfg {
    pub channel_ids: Vec<String>,
    pub allowed_users: Vec<String>,
    pub confirm_timeout_sec: u64,
}

impl Default for DiscordCfg {
    fn default() -> Self {
        Self {
            channel_ids: Vec::new(),
            allowed_users: Vec::new(),
            confirm_timeout_sec: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub exchange: ExchangeCfg,
    pub strategy: StrategyCfg,
    pub discord: DiscordCfg,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml(&s)
    }

    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_yaml::from_str(s).context("parse config yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.exchange.base_url.trim().is_empty() {
            bail!("exchange.base_url must not be empty");
        }
        if self.exchange.connect_timeout_ms == 0 || self.exchange.read_timeout_ms == 0 {
            bail!("exchange.connect_timeout_ms and exchange.read_timeout_ms must be non-zero");
        }
        if self.strategy.lot_size == 0 {
            bail!("strategy.lot_size must be at least 1");
        }
        if !(self.strategy.stop_loss_pct > 0.0) {
            bail!(
                "strategy.stop_loss_pct must be positive (got {})",
                self.strategy.stop_loss_pct
            );
        }
        if self.strategy.limit_buffer_pct < 0.0 {
            bail!("strategy.limit_buffer_pct must not be negative");
        }
        Ok(())
    }
}

/// API credentials. Kept out of `AppConfig` so the YAML file never holds secrets.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("DELTA_API_KEY").context("DELTA_API_KEY not set")?;
        let api_secret = std::env::var("DELTA_API_SECRET").context("DELTA_API_SECRET not set")?;
        Ok(Self {
            api_key,
            api_secret,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &crate::utils::mask_key(&self.api_key))
            .field("api_secret", &"****")
            .finish()
    }
}
