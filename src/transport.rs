//! Authenticated HTTP transport for the Delta Exchange REST API.
//!
//! Every call is signed (see `signer`), carries the `api-key`/`timestamp`/`signature`
//! headers and returns the envelope's `result` value. Failures of any kind come back
//! as `ExchangeError` values; nothing here panics or retries.

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Method};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Credentials, ExchangeCfg};
use crate::error::ExchangeError;
use crate::signer::{query_string, sign};
use crate::utils::mask_key;

const USER_AGENT: &str = "delta-straddle-bot";

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, ExchangeError>;
}

pub struct DeltaTransport {
    client: Client,
    base_url: String,
    creds: Credentials,
}

impl DeltaTransport {
    pub fn new(cfg: &ExchangeCfg, creds: Credentials) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .connect_timeout(cfg.connect_timeout())
            .read_timeout(cfg.read_timeout())
            .user_agent(USER_AGENT)
            .build()?;
        info!(
            "Delta transport ready: base_url={}, api_key={}",
            cfg.base_url,
            mask_key(&creds.api_key)
        );
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            creds,
        })
    }
}

#[async_trait]
impl Transport for DeltaTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, ExchangeError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let query = query_string(params);
        let payload = match &body {
            Some(b) => serde_json::to_string(b)?,
            None => String::new(),
        };
        let signature = sign(
            &self.creds.api_secret,
            method.as_str(),
            &timestamp,
            path,
            &query,
            &payload,
        );

        // The query goes onto the URL exactly as it was signed.
        let url = format!("{}{}{}", self.base_url, path, query);
        debug!("{} {}", method, url);

        let mut req = self
            .client
            .request(method.clone(), &url)
            .header("api-key", &self.creds.api_key)
            .header("timestamp", &timestamp)
            .header("signature", &signature)
            .header(CONTENT_TYPE, "application/json");
        if body.is_some() {
            req = req.body(payload);
        }

        let resp = req.send().await.map_err(|e| {
            warn!("{} {} failed: {}", method, path, e);
            ExchangeError::from(e)
        })?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let message = error_message(&text);
            warn!("{} {} -> HTTP {}: {}", method, path, status.as_u16(), message);
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                message,
            });
        }

        unwrap_envelope(&text)
    }
}

/// Pull `result` out of `{success, result, error}`; `success: false` becomes `Rejected`.
fn unwrap_envelope(text: &str) -> Result<Value, ExchangeError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let mut v: Value = serde_json::from_str(text)?;
    if v.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ExchangeError::Rejected(error_message(text)));
    }
    Ok(v.get_mut("result").map(Value::take).unwrap_or(Value::Null))
}

/// Best-effort readable message from an exchange error body.
fn error_message(text: &str) -> String {
    let Ok(v) = serde_json::from_str::<Value>(text) else {
        return text.trim().to_string();
    };
    match v.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(e @ Value::Object(_)) => e
            .get("code")
            .and_then(Value::as_str)
            .map(|c| match e.get("context") {
                Some(ctx) if !ctx.is_null() => format!("{} ({})", c, ctx),
                _ => c.to_string(),
            })
            .unwrap_or_else(|| e.to_string()),
        Some(other) if !other.is_null() => other.to_string(),
        _ => text.trim().to_string(),
    }
}
