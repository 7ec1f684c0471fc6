//! Dispatch statistics for the current session.
//!
//! Counters live in memory only and are printed on request and at exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct DispatchStats {
    /// Messages delivered to the chatbox
    messages_sent: AtomicU64,
    /// Of those, messages sent by an override
    overrides_sent: AtomicU64,
    /// Submits dropped because they repeated the last message
    duplicates_suppressed: AtomicU64,
    /// Submits dropped while an override window was open
    override_suppressed: AtomicU64,
    /// Chatbox sends that failed
    transport_failures: AtomicU64,
    /// Presence updates delivered
    presence_updates: AtomicU64,
    /// Presence updates dropped by the rate limit
    presence_throttled: AtomicU64,
    session_start: DateTime<Utc>,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            overrides_sent: AtomicU64::new(0),
            duplicates_suppressed: AtomicU64::new(0),
            override_suppressed: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            presence_updates: AtomicU64::new(0),
            presence_throttled: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_override_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.overrides_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_override_suppressed(&self) {
        self.override_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_presence_update(&self) {
        self.presence_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_presence_throttled(&self) {
        self.presence_throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            overrides_sent: self.overrides_sent.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            override_suppressed: self.override_suppressed.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            presence_updates: self.presence_updates.load(Ordering::Relaxed),
            presence_throttled: self.presence_throttled.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Messages sent: {} ({} overrides)\n\
             - Duplicates suppressed: {}\n\
             - Suppressed by override: {}\n\
             - Send failures: {}\n\
             - Presence updates: {} ({} throttled)\n\
             - Session duration: {} seconds",
            stats.messages_sent,
            stats.overrides_sent,
            stats.duplicates_suppressed,
            stats.override_suppressed,
            stats.transport_failures,
            stats.presence_updates,
            stats.presence_throttled,
            stats.session_duration_secs
        )
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub messages_sent: u64,
    pub overrides_sent: u64,
    pub duplicates_suppressed: u64,
    pub override_suppressed: u64,
    pub transport_failures: u64,
    pub presence_updates: u64,
    pub presence_throttled: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

pub type SharedStats = Arc<DispatchStats>;
