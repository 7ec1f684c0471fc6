//! Time-boxed override of the chatbox.
//!
//! While the gate is armed, periodic dispatch stays quiet so an operator
//! message remains visible.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct OverrideGate {
    expiry: Mutex<Option<Instant>>,
}

impl OverrideGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window ending `duration` from now, replacing any current one.
    pub fn arm(&self, duration: Duration) {
        *self.expiry.lock() = Some(Instant::now() + duration);
    }

    pub fn is_active(&self) -> bool {
        self.expiry
            .lock()
            .is_some_and(|expiry| Instant::now() < expiry)
    }

    /// Time left in the current window.
    pub fn remaining(&self) -> Option<Duration> {
        let expiry = (*self.expiry.lock())?;
        let left = expiry.saturating_duration_since(Instant::now());
        (!left.is_zero()).then_some(left)
    }

    pub fn clear(&self) {
        self.expiry.lock().take();
    }
}
