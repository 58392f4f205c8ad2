#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-channel retention cap; oldest entries are evicted past this.
    pub max_data_points: usize,
    /// Number of grid intervals; the grid holds `grid_steps + 1` levels.
    pub grid_steps: usize,
    /// Fractional price band around the current price, e.g. 0.15 = ±15%.
    pub grid_range: f64,
    /// Trades pulled per prediction.
    pub trade_window: usize,
    /// Order-book snapshots pulled per prediction.
    pub orderbook_window: usize,
    /// Lookback for open-interest / funding / long-short events.
    pub rate_lookback_ms: i64,
    pub backend_timeout_ms: u64,
    /// Scale all buckets by `1 + 10·volatility` when set.
    pub volatility_adjustment: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_data_points: 10_000,
            grid_steps: 60,
            grid_range: 0.15,
            trade_window: 5_000,
            orderbook_window: 100,
            rate_lookback_ms: 86_400_000,
            backend_timeout_ms: 5000,
            volatility_adjustment: false,
        }
    }
}
