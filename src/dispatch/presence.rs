//! Rate-limited, toggleable presence updates.

use crate::channel::{PresenceChannel, PresenceUpdate, TransportError};
use crate::stats::SharedStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum spacing between successful presence updates.
pub const PRESENCE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceOutcome {
    Updated,
    /// Within the rate-limit window of the previous update
    Throttled,
    /// The channel is switched off
    Disabled,
    Failed(String),
}

pub struct PresenceRelay {
    channel: Arc<dyn PresenceChannel>,
    enabled: AtomicBool,
    last_update: Mutex<Option<Instant>>,
    min_interval: Duration,
    stats: SharedStats,
}

impl PresenceRelay {
    pub fn new(channel: Arc<dyn PresenceChannel>, stats: SharedStats) -> Self {
        Self::with_interval(channel, stats, PRESENCE_INTERVAL)
    }

    pub fn with_interval(
        channel: Arc<dyn PresenceChannel>,
        stats: SharedStats,
        min_interval: Duration,
    ) -> Self {
        Self {
            channel,
            enabled: AtomicBool::new(false),
            last_update: Mutex::new(None),
            min_interval,
            stats,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Connect and start accepting updates.
    pub async fn enable(&self) -> Result<(), TransportError> {
        self.channel.connect().await?;
        *self.last_update.lock().await = None;
        self.enabled.store(true, Ordering::SeqCst);
        tracing::info!("Presence channel connected");
        Ok(())
    }

    /// Stop accepting updates and close the channel.
    pub async fn disable(&self) -> Result<(), TransportError> {
        if !self.enabled.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Presence channel closed");
        self.channel.close().await
    }

    /// Flip the channel; returns whether it is now enabled.
    pub async fn toggle(&self) -> Result<bool, TransportError> {
        if self.is_enabled() {
            self.disable().await?;
            Ok(false)
        } else {
            self.enable().await?;
            Ok(true)
        }
    }

    /// Offer an update. Dropped if disabled or inside the rate-limit window;
    /// failures are logged and reported, never raised.
    pub async fn update_presence(&self, update: &PresenceUpdate) -> PresenceOutcome {
        if !self.is_enabled() {
            return PresenceOutcome::Disabled;
        }

        let mut last_update = self.last_update.lock().await;
        if let Some(at) = *last_update {
            if at.elapsed() < self.min_interval {
                self.stats.record_presence_throttled();
                return PresenceOutcome::Throttled;
            }
        }

        match self.channel.update(update).await {
            Ok(()) => {
                *last_update = Some(Instant::now());
                self.stats.record_presence_update();
                PresenceOutcome::Updated
            }
            Err(e) => {
                tracing::debug!("Presence update failed: {e}");
                self.note_failure(&e);
                PresenceOutcome::Failed(e.to_string())
            }
        }
    }

    /// Push an update immediately, ignoring and not advancing the rate limit.
    pub async fn announce(&self, update: &PresenceUpdate) -> PresenceOutcome {
        if !self.is_enabled() {
            return PresenceOutcome::Disabled;
        }
        match self.channel.update(update).await {
            Ok(()) => PresenceOutcome::Updated,
            Err(e) => {
                tracing::debug!("Presence announcement failed: {e}");
                self.note_failure(&e);
                PresenceOutcome::Failed(e.to_string())
            }
        }
    }

    /// A lost connection disables the relay; `/rpc` reconnects.
    fn note_failure(&self, error: &TransportError) {
        if matches!(error, TransportError::NotConnected | TransportError::Network(_))
            && self.enabled.swap(false, Ordering::SeqCst)
        {
            tracing::warn!("Presence channel lost: {error}");
        }
    }
}
