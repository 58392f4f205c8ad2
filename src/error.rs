use crate::store::events::Channel;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid grid parameters: {0}")]
    InvalidRange(String),

    #[error("Event does not belong to channel {0}")]
    ChannelMismatch(Channel),
}
