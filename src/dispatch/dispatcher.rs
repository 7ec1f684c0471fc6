//! Chatbox dispatcher: deduplication and override policy.

use super::gate::OverrideGate;
use crate::channel::ChatSink;
use crate::stats::SharedStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// What happened to one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered to the chatbox
    Sent,
    /// Nothing to send
    Empty,
    /// Same as the last delivered message
    Duplicate,
    /// An override window is open
    Overridden,
    /// The sink reported an error; `last_sent` is unchanged
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

/// Serializes every chatbox send.
///
/// The dedup check, the send and the bookkeeping happen under one lock so
/// two callers can never both pass the check with the same message.
pub struct Dispatcher {
    sink: Arc<dyn ChatSink>,
    gate: OverrideGate,
    last_sent: Mutex<Option<String>>,
    stats: SharedStats,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn ChatSink>, stats: SharedStats) -> Self {
        Self {
            sink,
            gate: OverrideGate::new(),
            last_sent: Mutex::new(None),
            stats,
        }
    }

    /// Send an aggregated message unless it is empty, repeated, or
    /// shadowed by an override.
    pub async fn submit(&self, message: &str) -> DispatchOutcome {
        if message.is_empty() {
            return DispatchOutcome::Empty;
        }

        let mut last_sent = self.last_sent.lock().await;
        if last_sent.as_deref() == Some(message) {
            self.stats.record_duplicate();
            return DispatchOutcome::Duplicate;
        }
        if self.gate.is_active() {
            self.stats.record_override_suppressed();
            return DispatchOutcome::Overridden;
        }

        match self.sink.send(message).await {
            Ok(()) => {
                *last_sent = Some(message.to_string());
                self.stats.record_sent();
                tracing::debug!("Sent chatbox message ({} bytes)", message.len());
                DispatchOutcome::Sent
            }
            Err(e) => {
                self.stats.record_transport_failure();
                tracing::warn!("Chatbox send failed: {e}");
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Send an operator message and hold the chatbox for `window`.
    ///
    /// Bypasses deduplication and any open window. The window is armed even
    /// if the send fails.
    pub async fn send_override(&self, message: &str, window: Duration) -> DispatchOutcome {
        if message.is_empty() {
            return DispatchOutcome::Empty;
        }

        let mut last_sent = self.last_sent.lock().await;
        let outcome = match self.sink.send(message).await {
            Ok(()) => {
                *last_sent = Some(message.to_string());
                self.stats.record_override_sent();
                DispatchOutcome::Sent
            }
            Err(e) => {
                self.stats.record_transport_failure();
                tracing::warn!("Chatbox override send failed: {e}");
                DispatchOutcome::Failed(e.to_string())
            }
        };
        self.gate.arm(window);
        tracing::debug!("Override window armed for {}s", window.as_secs());

        outcome
    }

    pub fn gate(&self) -> &OverrideGate {
        &self.gate
    }

    pub async fn last_sent(&self) -> Option<String> {
        self.last_sent.lock().await.clone()
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::channel::TransportError;
    use crate::stats::DispatchStats;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Sink that records every message and can be told to fail.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub sent: parking_lot::Mutex<Vec<String>>,
        pub fail: AtomicBool,
    }

    impl RecordingSink {
        pub fn messages(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl ChatSink for RecordingSink {
        async fn send(&self, text: &str) -> Result<(), TransportError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::NotConnected);
            }
            self.sent.lock().push(text.to_string());
            Ok(())
        }
    }

    fn dispatcher() -> (Arc<RecordingSink>, Dispatcher) {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(sink.clone(), Arc::new(DispatchStats::new()));
        (sink, dispatcher)
    }

    #[tokio::test]
    async fn test_submit_is_idempotent() {
        let (sink, dispatcher) = dispatcher();

        assert_eq!(dispatcher.submit("💖 70").await, DispatchOutcome::Sent);
        assert_eq!(dispatcher.submit("💖 70").await, DispatchOutcome::Duplicate);
        assert_eq!(sink.messages(), vec!["💖 70"]);

        // Whitespace and layout count.
        assert_eq!(dispatcher.submit("💖 70 ").await, DispatchOutcome::Sent);
        assert_eq!(dispatcher.stats().snapshot().duplicates_suppressed, 1);
    }

    #[tokio::test]
    async fn test_empty_message_is_ignored() {
        let (sink, dispatcher) = dispatcher();
        assert_eq!(dispatcher.submit("").await, DispatchOutcome::Empty);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_suppresses_until_expiry() {
        let (sink, dispatcher) = dispatcher();

        let outcome = dispatcher
            .send_override("💬 hello", Duration::from_secs(15))
            .await;
        assert_eq!(outcome, DispatchOutcome::Sent);

        for i in 0..14 {
            tokio::time::advance(Duration::from_secs(1)).await;
            let outcome = dispatcher.submit(&format!("tick {i}")).await;
            assert_eq!(outcome, DispatchOutcome::Overridden);
        }
        assert_eq!(sink.messages(), vec!["💬 hello"]);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(dispatcher.submit("after").await, DispatchOutcome::Sent);
        assert_eq!(sink.messages(), vec!["💬 hello", "after"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_bypasses_dedup_and_open_window() {
        let (sink, dispatcher) = dispatcher();

        dispatcher.submit("same").await;
        assert!(dispatcher
            .send_override("same", Duration::from_secs(5))
            .await
            .is_sent());
        assert!(dispatcher
            .send_override("😂 joke", Duration::from_secs(5))
            .await
            .is_sent());

        assert_eq!(sink.messages(), vec!["same", "same", "😂 joke"]);
        assert_eq!(dispatcher.last_sent().await.as_deref(), Some("😂 joke"));
    }

    #[tokio::test]
    async fn test_failed_send_is_retried_next_time() {
        let (sink, dispatcher) = dispatcher();

        sink.fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            dispatcher.submit("msg").await,
            DispatchOutcome::Failed(_)
        ));
        assert_eq!(dispatcher.last_sent().await, None);

        sink.fail.store(false, Ordering::SeqCst);
        assert_eq!(dispatcher.submit("msg").await, DispatchOutcome::Sent);
        assert_eq!(dispatcher.stats().snapshot().transport_failures, 1);
    }

    #[tokio::test]
    async fn test_concurrent_submits_send_once() {
        let (sink, dispatcher) = dispatcher();
        let dispatcher = Arc::new(dispatcher);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let d = dispatcher.clone();
                tokio::spawn(async move { d.submit("racing").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(sink.messages(), vec!["racing"]);
    }
}
