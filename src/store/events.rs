use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::matrix::PredictionRecord;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A named, independently-evicted collection of one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Trades,
    OrderBook,
    OpenInterest,
    FundingRate,
    LongShortRatio,
    LiquidationPredictions,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Trades,
        Channel::OrderBook,
        Channel::OpenInterest,
        Channel::FundingRate,
        Channel::LongShortRatio,
        Channel::LiquidationPredictions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Trades => "trades",
            Channel::OrderBook => "orderbook",
            Channel::OpenInterest => "openInterest",
            Channel::FundingRate => "fundingRate",
            Channel::LongShortRatio => "longShortRatio",
            Channel::LiquidationPredictions => "liquidationPredictions",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Epoch milliseconds; primary ordering key.
    pub time: i64,
    pub price: f64,
    pub quantity: f64,
    pub is_buyer_maker: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub time: i64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenInterest {
    pub time: i64,
    /// Notional open interest in currency units.
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRate {
    pub time: i64,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongShortRatio {
    pub time: i64,
    pub ratio: f64,
}

/// Sum of every event type the store accepts, one variant per channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
    Trade(Trade),
    OrderBook(OrderBookSnapshot),
    OpenInterest(OpenInterest),
    FundingRate(FundingRate),
    LongShortRatio(LongShortRatio),
    Prediction(PredictionRecord),
}

impl MarketEvent {
    pub fn time(&self) -> i64 {
        match self {
            MarketEvent::Trade(t) => t.time,
            MarketEvent::OrderBook(b) => b.time,
            MarketEvent::OpenInterest(oi) => oi.time,
            MarketEvent::FundingRate(fr) => fr.time,
            MarketEvent::LongShortRatio(ls) => ls.time,
            MarketEvent::Prediction(p) => p.timestamp,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            MarketEvent::Trade(_) => Channel::Trades,
            MarketEvent::OrderBook(_) => Channel::OrderBook,
            MarketEvent::OpenInterest(_) => Channel::OpenInterest,
            MarketEvent::FundingRate(_) => Channel::FundingRate,
            MarketEvent::LongShortRatio(_) => Channel::LongShortRatio,
            MarketEvent::Prediction(_) => Channel::LiquidationPredictions,
        }
    }
}

/// Whether a batch of events came from ingestion or from the fabricated
/// fallback generator. Consumers must be able to tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Real,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrder {
    NewestFirst,
    OldestFirst,
}

/// A window of trades tagged with where it came from.
#[derive(Debug, Clone)]
pub struct TradeWindow {
    pub trades: Vec<Trade>,
    pub source: DataSource,
}

impl TradeWindow {
    pub fn empty() -> Self {
        Self {
            trades: Vec::new(),
            source: DataSource::Real,
        }
    }
}
