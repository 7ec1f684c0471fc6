//! Outbound channels.
//!
//! The chatbox sink carries the combined message; the presence channel
//! carries a structured summary to Discord. Both are best-effort: callers
//! log failures and carry on.

pub mod discord;
pub mod osc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use discord::DiscordIpc;
pub use osc::OscChatbox;

/// Errors raised while delivering to an outbound channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Channel is not connected")]
    NotConnected,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Destination for the combined text message.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), TransportError>;
}

/// Image and hover-text references shown beside the presence lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenceAssets {
    pub large_image: String,
    pub large_text: String,
    pub small_image: String,
    pub small_text: String,
}

/// One presence update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub details: String,
    pub state: Option<String>,
    pub assets: Option<PresenceAssets>,
}

/// Secondary channel showing a presence summary.
#[async_trait]
pub trait PresenceChannel: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn update(&self, update: &PresenceUpdate) -> Result<(), TransportError>;
    async fn close(&self) -> Result<(), TransportError>;
}
