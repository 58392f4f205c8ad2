pub mod grid;
pub mod leverage;
pub mod matrix;
pub mod volatility;

pub use matrix::{validate_prediction, PredictionRecord};


use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::random::{RandomSource, ThreadRandom};
use crate::store::events::{
    now_ms, Channel, DataSource, MarketEvent, OrderBookSnapshot, Trade, TradeWindow,
};
use crate::store::EventStore;
use grid::PriceGrid;
use leverage::LeverageModel;
use matrix::{LiquidationMatrix, PredictionMetadata, Side};

/// Floor for any single book-derived bucket contribution.
const MIN_BUCKET_NOTIONAL: f64 = 1_000.0;
/// Base notional per level when buckets are synthesized from the leverage
/// table instead of order-book data.
const BASE_LEVEL_NOTIONAL: f64 = 2_000_000.0;
const OPEN_INTEREST_UNIT: f64 = 1e9;
const OPEN_INTEREST_CAP: f64 = 10.0;
const VOLUME_BOOST_CAP: f64 = 5.0;

/// Estimates, per price level around the current price, the notional value
/// of leveraged positions likely to be force-closed.
///
/// Each `predict` call builds fresh arrays; the shared `EventStore` is the
/// only mutable state it touches.
pub struct LiquidationEngine {
    store: Arc<EventStore>,
    config: EngineConfig,
    model: LeverageModel,
    rand: Arc<dyn RandomSource>,
}

impl LiquidationEngine {
    pub fn new(store: Arc<EventStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            model: LeverageModel::default(),
            rand: Arc::new(ThreadRandom),
        }
    }

    pub fn with_random_source(mut self, rand: Arc<dyn RandomSource>) -> Self {
        self.rand = rand;
        self
    }

    pub fn with_leverage_model(mut self, model: LeverageModel) -> Self {
        self.model = model;
        self
    }

    /// Build a liquidation-exposure prediction around `current_price` and
    /// append it to the `liquidationPredictions` channel.
    ///
    /// Degrades instead of failing: unavailable channels become empty
    /// windows, and missing trade history switches to the basic prediction.
    /// Hard errors only when the grid itself cannot be built.
    pub async fn predict(&self, current_price: f64) -> Result<PredictionRecord, EngineError> {
        let grid = PriceGrid::build(current_price, self.config.grid_range, self.config.grid_steps)?;
        let now = now_ms();
        let since = now - self.config.rate_lookback_ms;

        // Independent reads, issued together so one slow channel does not
        // serialize behind the others.
        let (trades, books, open_interest, funding, long_short) = futures::join!(
            self.store
                .recent_trades(self.config.trade_window, self.rand.as_ref()),
            self.store
                .query_recent(Channel::OrderBook, self.config.orderbook_window),
            self.store
                .query_by_time_range(Channel::OpenInterest, since, now),
            self.store
                .query_by_time_range(Channel::FundingRate, since, now),
            self.store
                .query_by_time_range(Channel::LongShortRatio, since, now),
        );

        let window = trades.unwrap_or_else(|e| {
            warn!(error = %e, "trade window unavailable, treating history as empty");
            TradeWindow::empty()
        });
        let books = degraded(books, Channel::OrderBook);
        let open_interest = degraded(open_interest, Channel::OpenInterest);
        let funding = degraded(funding, Channel::FundingRate);
        let long_short = degraded(long_short, Channel::LongShortRatio);

        let mut metadata = PredictionMetadata {
            trades_used: window.trades.len(),
            snapshots_used: books.len(),
            open_interest_events: open_interest.len(),
            funding_rate_events: funding.len(),
            long_short_events: long_short.len(),
            data_source: window.source,
            is_basic_prediction: false,
        };

        if window.source == DataSource::Synthetic || window.trades.is_empty() {
            debug!("no real trade history, building basic prediction");
            metadata.trades_used = 0;
            metadata.is_basic_prediction = true;
            metadata.data_source = DataSource::Synthetic;
            let record = self.basic_prediction(current_price, &grid, now, metadata, &window);
            self.publish(record.clone()).await;
            return Ok(record);
        }

        let mut matrix = LiquidationMatrix::zeroed(grid.len());
        let shares = self.perturbed_shares();

        let latest_book = books.iter().find_map(|e| match e {
            MarketEvent::OrderBook(b) => Some(b),
            _ => None,
        });
        match latest_book {
            Some(book) => {
                self.allocate_from_book(&mut matrix, &grid, current_price, &shares, book)
            }
            None => {
                debug!("no order-book snapshots, seeding buckets from the leverage table");
                self.seed_from_bands(&mut matrix, &grid, current_price);
            }
        }

        self.apply_volume_concentration(&mut matrix, &grid, &window.trades);

        if let Some(oi) = latest_open_interest(&open_interest) {
            matrix.scale_all((oi / OPEN_INTEREST_UNIT).min(OPEN_INTEREST_CAP));
        }
        if let Some(ratio) = latest_long_short_ratio(&long_short) {
            if ratio > 1.0 {
                matrix.scale_side(Side::Long, 1.0 + (ratio - 1.0) * 0.5);
            } else if ratio < 1.0 {
                matrix.scale_side(Side::Short, 1.0 + (1.0 / ratio - 1.0) * 0.5);
            }
        }
        if self.config.volatility_adjustment {
            matrix.scale_all(1.0 + 10.0 * window_volatility(&window));
        }

        matrix.fold_cumulative(grid.midpoint());

        let record = PredictionRecord {
            current_price,
            price_levels: grid.levels().to_vec(),
            liquidation_data: matrix,
            timestamp: now,
            metadata,
        };
        debug!(
            trades = record.metadata.trades_used,
            snapshots = record.metadata.snapshots_used,
            "prediction built"
        );
        self.publish(record.clone()).await;
        Ok(record)
    }

    /// Heuristic-only prediction for when no real trade history exists.
    /// Buckets come straight from the leverage table's distance bands; the
    /// cumulative fold runs unchanged.
    fn basic_prediction(
        &self,
        current_price: f64,
        grid: &PriceGrid,
        now: i64,
        metadata: PredictionMetadata,
        window: &TradeWindow,
    ) -> PredictionRecord {
        let mut matrix = LiquidationMatrix::zeroed(grid.len());
        self.seed_from_bands(&mut matrix, grid, current_price);
        if self.config.volatility_adjustment {
            matrix.scale_all(1.0 + 10.0 * window_volatility(window));
        }
        matrix.fold_cumulative(grid.midpoint());
        PredictionRecord {
            current_price,
            price_levels: grid.levels().to_vec(),
            liquidation_data: matrix,
            timestamp: now,
            metadata,
        }
    }

    /// Population shares perturbed once per call by a factor in [0.8, 1.2).
    fn perturbed_shares(&self) -> [f64; leverage::TIER_COUNT] {
        let mut shares = [0.0; leverage::TIER_COUNT];
        for (i, tier) in self.model.tiers().iter().enumerate() {
            shares[i] = tier.population_share * self.rand.in_range(0.8, 1.2);
        }
        shares
    }

    fn allocate_from_book(
        &self,
        matrix: &mut LiquidationMatrix,
        grid: &PriceGrid,
        current_price: f64,
        shares: &[f64; leverage::TIER_COUNT],
        book: &OrderBookSnapshot,
    ) {
        for level in &book.bids {
            if level.price > current_price {
                self.allocate_level(
                    matrix,
                    grid,
                    current_price,
                    shares,
                    level.price,
                    level.quantity,
                    Side::Long,
                );
            }
        }
        for level in &book.asks {
            if level.price < current_price {
                self.allocate_level(
                    matrix,
                    grid,
                    current_price,
                    shares,
                    level.price,
                    level.quantity,
                    Side::Short,
                );
            }
        }
    }

    fn allocate_level(
        &self,
        matrix: &mut LiquidationMatrix,
        grid: &PriceGrid,
        current_price: f64,
        shares: &[f64; leverage::TIER_COUNT],
        price: f64,
        quantity: f64,
        side: Side,
    ) {
        if !price.is_finite() || !quantity.is_finite() || price <= 0.0 || quantity <= 0.0 {
            return;
        }
        let distance = (price - current_price).abs() / current_price;
        let index = grid.nearest_index(price);
        for (t, tier) in self.model.tiers().iter().enumerate() {
            if !tier.owns(distance) {
                continue;
            }
            let falloff = 1.0 - distance / tier.target_distance;
            let notional = (quantity * price * shares[t] * falloff).max(MIN_BUCKET_NOTIONAL);
            matrix.bucket_mut(side, t)[index] += notional;
        }
    }

    /// Distance-band synthesis: every level inside a tier's band gets the
    /// base notional scaled by the falloff and a random factor in [0.5, 1.0).
    fn seed_from_bands(&self, matrix: &mut LiquidationMatrix, grid: &PriceGrid, current_price: f64) {
        for (index, &level) in grid.levels().iter().enumerate() {
            let side = if level > current_price {
                Side::Long
            } else if level < current_price {
                Side::Short
            } else {
                continue;
            };
            let distance = (level - current_price).abs() / current_price;
            for (t, tier) in self.model.tiers().iter().enumerate() {
                if !tier.owns(distance) {
                    continue;
                }
                let falloff = 1.0 - distance / tier.target_distance;
                let notional = BASE_LEVEL_NOTIONAL * falloff * self.rand.in_range(0.5, 1.0);
                matrix.bucket_mut(side, t)[index] += notional;
            }
        }
    }

    /// Boost buckets where recent trade volume concentrates: a bucket with
    /// more than twice the mean occupied-bucket volume multiplies both sides
    /// by `1 + min(volume/100, 5)·tier_multiplier·concentration`.
    fn apply_volume_concentration(
        &self,
        matrix: &mut LiquidationMatrix,
        grid: &PriceGrid,
        trades: &[Trade],
    ) {
        let mut volume = vec![0.0; grid.len()];
        let mut total = 0.0;
        for trade in trades {
            if !trade.price.is_finite() || !trade.quantity.is_finite() || trade.quantity <= 0.0 {
                continue;
            }
            volume[grid.nearest_index(trade.price)] += trade.quantity;
            total += trade.quantity;
        }
        if total <= 0.0 {
            return;
        }
        let occupied = volume.iter().filter(|v| **v > 0.0).count();
        let mean = total / occupied as f64;
        for (index, &vol) in volume.iter().enumerate() {
            if vol <= 2.0 * mean {
                continue;
            }
            let concentration = vol / total;
            let capped = (vol / 100.0).min(VOLUME_BOOST_CAP);
            for (t, tier) in self.model.tiers().iter().enumerate() {
                let boost = 1.0 + capped * tier.volume_multiplier * concentration;
                matrix.long[t][index] *= boost;
                matrix.short[t][index] *= boost;
            }
        }
    }

    /// Write failures here are logged and counted, never surfaced: losing a
    /// history record must not fail the prediction that produced it.
    async fn publish(&self, record: PredictionRecord) {
        self.store
            .ingest(
                Channel::LiquidationPredictions,
                MarketEvent::Prediction(record),
            )
            .await;
    }
}

fn degraded(result: Result<Vec<MarketEvent>, EngineError>, channel: Channel) -> Vec<MarketEvent> {
    match result {
        Ok(events) => events,
        Err(e) => {
            warn!(%channel, error = %e, "query failed, degrading to empty window");
            Vec::new()
        }
    }
}

fn latest_open_interest(events: &[MarketEvent]) -> Option<f64> {
    events.iter().rev().find_map(|e| match e {
        MarketEvent::OpenInterest(oi) if oi.value.is_finite() && oi.value > 0.0 => Some(oi.value),
        _ => None,
    })
}

fn latest_long_short_ratio(events: &[MarketEvent]) -> Option<f64> {
    events.iter().rev().find_map(|e| match e {
        MarketEvent::LongShortRatio(ls) if ls.ratio.is_finite() && ls.ratio > 0.0 => Some(ls.ratio),
        _ => None,
    })
}

fn window_volatility(window: &TradeWindow) -> f64 {
    // windows arrive newest-first; the return series wants chronological order
    let mut prices: Vec<f64> = window.trades.iter().map(|t| t.price).collect();
    prices.reverse();
    volatility::volatility(&prices)
}
