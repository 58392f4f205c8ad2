pub mod config;
pub mod engine;
pub mod error;
pub mod random;
pub mod store;

pub use config::EngineConfig;
pub use engine::LiquidationEngine;
pub use error::EngineError;
pub use store::EventStore;
