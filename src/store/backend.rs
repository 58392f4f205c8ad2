use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::events::{Channel, MarketEvent, QueryOrder, Trade};
use crate::error::EngineError;

/// Embedded ordered key-value backend: one time-keyed collection per channel,
/// plus a secondary price index over the trades channel.
///
/// Append and eviction on one channel run under the same lock; different
/// channels proceed fully in parallel. Readers get a point-in-time clone,
/// never a torn write.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert one event and evict oldest-by-time entries beyond `capacity`.
    /// Returns the number of evicted entries.
    async fn append(
        &self,
        channel: Channel,
        event: MarketEvent,
        capacity: usize,
    ) -> Result<usize, EngineError>;

    async fn scan_time_range(
        &self,
        channel: Channel,
        start: i64,
        end: i64,
        order: QueryOrder,
    ) -> Result<Vec<MarketEvent>, EngineError>;

    async fn recent(
        &self,
        channel: Channel,
        limit: usize,
        order: QueryOrder,
    ) -> Result<Vec<MarketEvent>, EngineError>;

    /// Trades whose price falls in `[min, max]`, newest first.
    async fn scan_price_range(
        &self,
        min: f64,
        max: f64,
        limit: usize,
    ) -> Result<Vec<Trade>, EngineError>;

    async fn len(&self, channel: Channel) -> Result<usize, EngineError>;

    /// Empty every channel atomically.
    async fn clear_all(&self) -> Result<(), EngineError>;
}

#[derive(Default)]
struct ChannelData {
    by_time: BTreeMap<i64, MarketEvent>,
    /// (price in cents, time) -> time. Cent precision matches the grid's
    /// two-decimal rounding policy.
    by_price: BTreeMap<(i64, i64), i64>,
}

fn price_key(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

impl ChannelData {
    fn insert(&mut self, event: MarketEvent) {
        if let MarketEvent::Trade(ref t) = event {
            self.by_price.insert((price_key(t.price), t.time), t.time);
        }
        self.by_time.insert(event.time(), event);
    }

    fn evict_excess(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.by_time.len() > capacity {
            if let Some((time, event)) = self.by_time.pop_first() {
                if let MarketEvent::Trade(ref t) = event {
                    self.by_price.remove(&(price_key(t.price), time));
                }
                evicted += 1;
            }
        }
        evicted
    }
}

pub struct MemoryBackend {
    channels: HashMap<Channel, RwLock<ChannelData>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let mut channels = HashMap::new();
        for channel in Channel::ALL {
            channels.insert(channel, RwLock::new(ChannelData::default()));
        }
        Self { channels }
    }

    fn channel(&self, channel: Channel) -> &RwLock<ChannelData> {
        // The map is built over Channel::ALL and never mutated afterwards.
        &self.channels[&channel]
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn append(
        &self,
        channel: Channel,
        event: MarketEvent,
        capacity: usize,
    ) -> Result<usize, EngineError> {
        let mut data = self.channel(channel).write().await;
        data.insert(event);
        Ok(data.evict_excess(capacity))
    }

    async fn scan_time_range(
        &self,
        channel: Channel,
        start: i64,
        end: i64,
        order: QueryOrder,
    ) -> Result<Vec<MarketEvent>, EngineError> {
        let data = self.channel(channel).read().await;
        let iter = data.by_time.range(start..=end).map(|(_, e)| e.clone());
        Ok(match order {
            QueryOrder::OldestFirst => iter.collect(),
            QueryOrder::NewestFirst => {
                let mut out: Vec<_> = iter.collect();
                out.reverse();
                out
            }
        })
    }

    async fn recent(
        &self,
        channel: Channel,
        limit: usize,
        order: QueryOrder,
    ) -> Result<Vec<MarketEvent>, EngineError> {
        let data = self.channel(channel).read().await;
        let mut out: Vec<_> = data
            .by_time
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect();
        if order == QueryOrder::OldestFirst {
            out.reverse();
        }
        Ok(out)
    }

    async fn scan_price_range(
        &self,
        min: f64,
        max: f64,
        limit: usize,
    ) -> Result<Vec<Trade>, EngineError> {
        let data = self.channel(Channel::Trades).read().await;
        let low = (price_key(min), i64::MIN);
        let high = (price_key(max), i64::MAX);
        let mut times: Vec<i64> = data
            .by_price
            .range(low..=high)
            .map(|(_, &time)| time)
            .collect();
        times.sort_unstable_by(|a, b| b.cmp(a));
        let trades = times
            .into_iter()
            .take(limit)
            .filter_map(|time| match data.by_time.get(&time) {
                Some(MarketEvent::Trade(t)) => Some(t.clone()),
                _ => None,
            })
            .collect();
        Ok(trades)
    }

    async fn len(&self, channel: Channel) -> Result<usize, EngineError> {
        Ok(self.channel(channel).read().await.by_time.len())
    }

    async fn clear_all(&self) -> Result<(), EngineError> {
        // Take every write lock in a fixed order before clearing anything, so
        // no reader can observe a half-cleared store.
        let mut guards = Vec::with_capacity(Channel::ALL.len());
        for channel in Channel::ALL {
            guards.push(self.channel(channel).write().await);
        }
        for guard in &mut guards {
            guard.by_time.clear();
            guard.by_price.clear();
        }
        Ok(())
    }
}
