//! Small helpers.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Exchange calendar date (`DD-MM-YYYY`) for `now`, shifted by the venue's UTC offset.
pub fn expiry_date(now: DateTime<Utc>, utc_offset_minutes: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset).format("%d-%m-%Y").to_string()
}

/// Read a price-like JSON value that may be a number or a numeric string.
pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read an id-like JSON value (number or string) as text.
pub fn as_id(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

pub fn de_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(as_f64(&v).unwrap_or(0.0))
}

pub fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(as_f64(&v))
}

pub fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(as_id(&v).unwrap_or_default())
}

/// Exchange prices are sent as two-decimal strings.
pub fn price_str(p: f64) -> String {
    format!("{:.2}", p)
}

/// Print first two chars, then mask the rest (for logs only).
pub fn mask_key(k: &str) -> String {
    let mut cs = k.chars();
    let a = cs.next().unwrap_or('*');
    let b = cs.next().unwrap_or('*');
    format!("{}{}****", a, b)
}
