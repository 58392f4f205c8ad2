pub mod backend;
pub mod events;
pub mod synthetic;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::random::RandomSource;
use backend::{MemoryBackend, StorageBackend};
use events::{Channel, DataSource, MarketEvent, QueryOrder, Trade, TradeWindow};

/// Counters for the store's deliberate loss tolerance: swallowed write
/// failures and fallback windows must be observable, never silent.
#[derive(Default)]
struct StoreMetrics {
    appended: AtomicU64,
    dropped_writes: AtomicU64,
    evicted: AtomicU64,
    synthetic_windows: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub appended: u64,
    pub dropped_writes: u64,
    pub evicted: u64,
    pub synthetic_windows: u64,
}

/// Bounded, per-channel, append-ordered store of typed market events.
///
/// Capacity is enforced by evicting oldest-by-time entries after every
/// append, never by rejecting writes. Entries are unique by time within a
/// channel; colliding timestamps are a caller error and overwrite.
pub struct EventStore {
    backend: Arc<dyn StorageBackend>,
    capacity: usize,
    timeout: Duration,
    metrics: StoreMetrics,
}

impl EventStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), config)
    }

    pub fn with_backend(backend: Arc<dyn StorageBackend>, config: &EngineConfig) -> Self {
        Self {
            backend,
            capacity: config.max_data_points,
            timeout: Duration::from_millis(config.backend_timeout_ms),
            metrics: StoreMetrics::default(),
        }
    }

    /// Append one event. Never fails due to capacity; fails only when the
    /// backend is unavailable or the event does not match the channel.
    pub async fn append(&self, channel: Channel, event: MarketEvent) -> Result<(), EngineError> {
        if event.channel() != channel {
            return Err(EngineError::ChannelMismatch(channel));
        }
        let evicted = self
            .bounded(self.backend.append(channel, event, self.capacity))
            .await?;
        self.metrics.appended.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Lossy append for ingestion paths: losing one market event is
    /// preferable to blocking a feed, so failures are logged and counted.
    pub async fn ingest(&self, channel: Channel, event: MarketEvent) {
        if let Err(e) = self.append(channel, event).await {
            self.metrics.dropped_writes.fetch_add(1, Ordering::Relaxed);
            warn!(%channel, error = %e, "dropping market event");
        }
    }

    /// All entries with `start <= time <= end`, oldest first. Unlimited;
    /// callers apply their own limits.
    pub async fn query_by_time_range(
        &self,
        channel: Channel,
        start: i64,
        end: i64,
    ) -> Result<Vec<MarketEvent>, EngineError> {
        self.query_by_time_range_ordered(channel, start, end, QueryOrder::OldestFirst)
            .await
    }

    pub async fn query_by_time_range_ordered(
        &self,
        channel: Channel,
        start: i64,
        end: i64,
        order: QueryOrder,
    ) -> Result<Vec<MarketEvent>, EngineError> {
        self.bounded(self.backend.scan_time_range(channel, start, end, order))
            .await
    }

    /// Up to `limit` entries in the requested order.
    pub async fn query_recent_ordered(
        &self,
        channel: Channel,
        limit: usize,
        order: QueryOrder,
    ) -> Result<Vec<MarketEvent>, EngineError> {
        self.bounded(self.backend.recent(channel, limit, order)).await
    }

    /// Up to `limit` entries, newest first.
    pub async fn query_recent(
        &self,
        channel: Channel,
        limit: usize,
    ) -> Result<Vec<MarketEvent>, EngineError> {
        self.query_recent_ordered(channel, limit, QueryOrder::NewestFirst)
            .await
    }

    /// Trades priced within `[min, max]`, newest first.
    pub async fn query_by_price_range(
        &self,
        min: f64,
        max: f64,
        limit: usize,
    ) -> Result<Vec<Trade>, EngineError> {
        self.bounded(self.backend.scan_price_range(min, max, limit))
            .await
    }

    /// Recent trades, newest first, tagged with their source. When the
    /// channel is empty a fabricated window is returned instead so dependent
    /// computations always have input; the tag tells consumers which it was.
    pub async fn recent_trades(
        &self,
        limit: usize,
        rand: &dyn RandomSource,
    ) -> Result<TradeWindow, EngineError> {
        let events = self.query_recent(Channel::Trades, limit).await?;
        let trades: Vec<Trade> = events
            .into_iter()
            .filter_map(|e| match e {
                MarketEvent::Trade(t) => Some(t),
                _ => None,
            })
            .collect();
        if !trades.is_empty() {
            return Ok(TradeWindow {
                trades,
                source: DataSource::Real,
            });
        }
        self.metrics.synthetic_windows.fetch_add(1, Ordering::Relaxed);
        info!("trades channel empty, serving synthetic window");
        let mut fallback = synthetic::synthetic_trades(
            synthetic::SYNTHETIC_BASE_PRICE,
            synthetic::SYNTHETIC_TRADE_COUNT,
            rand,
        );
        fallback.reverse();
        Ok(TradeWindow {
            trades: fallback,
            source: DataSource::Synthetic,
        })
    }

    pub async fn len(&self, channel: Channel) -> Result<usize, EngineError> {
        self.bounded(self.backend.len(channel)).await
    }

    /// Atomically empty every channel.
    pub async fn clear_all(&self) -> Result<(), EngineError> {
        self.bounded(self.backend.clear_all()).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            appended: self.metrics.appended.load(Ordering::Relaxed),
            dropped_writes: self.metrics.dropped_writes.load(Ordering::Relaxed),
            evicted: self.metrics.evicted.load(Ordering::Relaxed),
            synthetic_windows: self.metrics.synthetic_windows.load(Ordering::Relaxed),
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::BackendUnavailable(format!(
                "backend call exceeded {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::events::now_ms;
    use crate::random::SeededRandom;

    fn trade(time: i64, price: f64, quantity: f64) -> MarketEvent {
        MarketEvent::Trade(Trade {
            time,
            price,
            quantity,
            is_buyer_maker: false,
        })
    }

    fn store_with_capacity(capacity: usize) -> EventStore {
        let config = EngineConfig {
            max_data_points: capacity,
            ..EngineConfig::default()
        };
        EventStore::new(&config)
    }

    #[tokio::test]
    async fn append_and_query_recent_newest_first() {
        let store = store_with_capacity(100);
        for i in 0..5 {
            store
                .append(Channel::Trades, trade(1_000 + i, 100.0 + i as f64, 1.0))
                .await
                .unwrap();
        }
        let events = store.query_recent(Channel::Trades, 3).await.unwrap();
        let times: Vec<i64> = events.iter().map(|e| e.time()).collect();
        assert_eq!(times, vec![1_004, 1_003, 1_002]);

        let reversed = store
            .query_by_time_range_ordered(Channel::Trades, 0, 2_000, QueryOrder::NewestFirst)
            .await
            .unwrap();
        let times: Vec<i64> = reversed.iter().map(|e| e.time()).collect();
        assert_eq!(times, vec![1_004, 1_003, 1_002, 1_001, 1_000]);
    }

    #[tokio::test]
    async fn eviction_keeps_most_recent_up_to_capacity() {
        let store = store_with_capacity(100);
        for i in 0..250 {
            store
                .append(Channel::Trades, trade(i, 100.0, 1.0))
                .await
                .unwrap();
        }
        assert_eq!(store.len(Channel::Trades).await.unwrap(), 100);
        let events = store
            .query_by_time_range(Channel::Trades, 0, 1_000)
            .await
            .unwrap();
        assert_eq!(events.len(), 100);
        assert_eq!(events.first().unwrap().time(), 150);
        assert_eq!(events.last().unwrap().time(), 249);
        assert_eq!(store.metrics().evicted, 150);
    }

    #[tokio::test]
    async fn eviction_order_is_by_time_not_insertion() {
        let store = store_with_capacity(2);
        store.append(Channel::Trades, trade(30, 100.0, 1.0)).await.unwrap();
        store.append(Channel::Trades, trade(10, 100.0, 1.0)).await.unwrap();
        store.append(Channel::Trades, trade(20, 100.0, 1.0)).await.unwrap();
        let events = store.query_by_time_range(Channel::Trades, 0, 100).await.unwrap();
        let times: Vec<i64> = events.iter().map(|e| e.time()).collect();
        assert_eq!(times, vec![20, 30]);
    }

    #[tokio::test]
    async fn price_range_query_returns_matching_trades_newest_first() {
        let store = store_with_capacity(100);
        store.append(Channel::Trades, trade(1, 95.0, 1.0)).await.unwrap();
        store.append(Channel::Trades, trade(2, 100.0, 2.0)).await.unwrap();
        store.append(Channel::Trades, trade(3, 105.0, 3.0)).await.unwrap();
        store.append(Channel::Trades, trade(4, 101.0, 4.0)).await.unwrap();
        let trades = store.query_by_price_range(99.0, 102.0, 10).await.unwrap();
        let times: Vec<i64> = trades.iter().map(|t| t.time).collect();
        assert_eq!(times, vec![4, 2]);
    }

    #[tokio::test]
    async fn channel_mismatch_is_rejected() {
        let store = store_with_capacity(10);
        let err = store
            .append(Channel::OrderBook, trade(1, 100.0, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ChannelMismatch(Channel::OrderBook)));
    }

    #[tokio::test]
    async fn ingest_counts_dropped_writes() {
        let store = store_with_capacity(10);
        store.ingest(Channel::OrderBook, trade(1, 100.0, 1.0)).await;
        assert_eq!(store.metrics().dropped_writes, 1);
        assert_eq!(store.len(Channel::OrderBook).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_trades_channel_serves_tagged_synthetic_window() {
        let store = store_with_capacity(10);
        let rand = SeededRandom::new(1);
        let window = store.recent_trades(100, &rand).await.unwrap();
        assert_eq!(window.source, DataSource::Synthetic);
        assert!(!window.trades.is_empty());
        assert_eq!(store.metrics().synthetic_windows, 1);

        store
            .append(Channel::Trades, trade(now_ms(), 50_000.0, 1.0))
            .await
            .unwrap();
        let window = store.recent_trades(100, &rand).await.unwrap();
        assert_eq!(window.source, DataSource::Real);
        assert_eq!(window.trades.len(), 1);
    }

    #[tokio::test]
    async fn clear_all_empties_every_channel() {
        let store = store_with_capacity(10);
        store.append(Channel::Trades, trade(1, 100.0, 1.0)).await.unwrap();
        store
            .append(
                Channel::OpenInterest,
                MarketEvent::OpenInterest(events::OpenInterest {
                    time: 1,
                    value: 2e9,
                }),
            )
            .await
            .unwrap();
        store.clear_all().await.unwrap();
        for channel in Channel::ALL {
            assert_eq!(store.len(channel).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn concurrent_appends_respect_capacity() {
        let store = Arc::new(store_with_capacity(50));
        let mut handles = Vec::new();
        for task in 0..8i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100i64 {
                    store
                        .append(Channel::Trades, trade(task * 1_000 + i, 100.0, 1.0))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len(Channel::Trades).await.unwrap(), 50);
    }
}
