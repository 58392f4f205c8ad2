use super::events::{now_ms, Trade};
use crate::random::RandomSource;

/// Base price the fabricated fallback trades walk around.
pub const SYNTHETIC_BASE_PRICE: f64 = 50_000.0;
pub const SYNTHETIC_TRADE_COUNT: usize = 50;

/// Fabricate a small trade window from a bounded ±1% random walk.
///
/// This is the explicit fallback used when the trades channel is empty so
/// that dependent computations always have a non-empty input. Results are
/// tagged `DataSource::Synthetic` at the query layer; nothing here is ever
/// mixed into real query results.
pub fn synthetic_trades(base_price: f64, count: usize, rand: &dyn RandomSource) -> Vec<Trade> {
    let now = now_ms();
    let floor = base_price * 0.99;
    let ceil = base_price * 1.01;
    let mut price = base_price;
    let mut trades = Vec::with_capacity(count);
    for i in 0..count {
        price = (price * (1.0 + rand.in_range(-0.002, 0.002))).clamp(floor, ceil);
        trades.push(Trade {
            time: now - (count as i64 - i as i64) * 1_000,
            price,
            quantity: rand.in_range(0.1, 2.0),
            is_buyer_maker: rand.next_f64() < 0.5,
        });
    }
    trades
}
