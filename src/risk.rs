//! Stop-loss levels and straddle risk figures.

use crate::types::RiskMetrics;

#[derive(Debug, Clone, Copy)]
pub struct StopPolicy {
    /// Premium increase (percent) that triggers the stop.
    pub stop_loss_pct: f64,
    /// Extra room (percent) between stop trigger and limit price.
    pub limit_buffer_pct: f64,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            stop_loss_pct: 25.0,
            limit_buffer_pct: 2.0,
        }
    }
}

impl StopPolicy {
    pub fn new(stop_loss_pct: f64, limit_buffer_pct: f64) -> Self {
        Self {
            stop_loss_pct,
            limit_buffer_pct,
        }
    }

    /// `(stop_price, limit_price)` for a short leg sold at `entry_price`.
    pub fn levels(&self, entry_price: f64) -> (f64, f64) {
        let stop = entry_price * (1.0 + self.stop_loss_pct / 100.0);
        let limit = stop * (1.0 + self.limit_buffer_pct / 100.0);
        (stop, limit)
    }

    pub fn metrics(&self, strike: f64, call_premium: f64, put_premium: f64) -> RiskMetrics {
        let max_profit = call_premium + put_premium;
        let (call_stop, _) = self.levels(call_premium);
        let (put_stop, _) = self.levels(put_premium);
        RiskMetrics {
            max_profit,
            call_stop_trigger: call_stop,
            put_stop_trigger: put_stop,
            max_loss_per_leg: (call_stop - call_premium).max(put_stop - put_premium),
            profit_target: max_profit * 0.5,
            break_even_upper: strike + max_profit,
            break_even_lower: strike - max_profit,
        }
    }
}
