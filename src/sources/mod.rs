//! Signal sources polled by the relay.
//!
//! Sources only produce values. A failure is never fatal: the polling loop
//! logs it and treats the tick as having no value.

pub mod heart_rate;
pub mod media;

#[cfg(feature = "spotify")]
pub mod spotify;
#[cfg(feature = "spotify")]
pub mod spotify_auth;

use async_trait::async_trait;
use thiserror::Error;

pub use heart_rate::FileHeartRateSource;
pub use media::{format_now_playing, NoMedia, Playback};

#[cfg(feature = "spotify")]
pub use spotify::SpotifySource;
#[cfg(feature = "spotify")]
pub use spotify_auth::SpotifyAuthorizer;

/// Errors a source may report for a single poll.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response ({status}): {message}")]
    Response { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),
}

/// Heart-rate source.
#[async_trait]
pub trait BiometricSource: Send + Sync {
    /// Whether the producer of the readings is currently running.
    async fn is_live(&self) -> Result<bool, SourceError>;

    /// The latest reading, if one is available.
    async fn read_value(&self) -> Result<Option<u32>, SourceError>;
}

/// Now-playing source.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Pre-formatted, possibly multi-line, now-playing text.
    async fn current_track(&self) -> Result<Option<String>, SourceError>;
}
