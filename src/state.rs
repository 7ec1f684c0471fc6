//! State shared between the relay loops.

use crate::config::Config;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Latest value from every source. Each field is written whole.
#[derive(Debug, Default)]
pub struct SourceState {
    media: RwLock<Option<String>>,
    custom_status: RwLock<String>,
    status_line: RwLock<String>,
    effective_bpm: RwLock<Option<u32>>,
}

impl SourceState {
    pub fn media(&self) -> Option<String> {
        self.media.read().clone()
    }

    pub fn set_media(&self, media: Option<String>) {
        *self.media.write() = media;
    }

    pub fn custom_status(&self) -> String {
        self.custom_status.read().clone()
    }

    /// Store a trimmed custom status; empty clears it.
    pub fn set_custom_status(&self, status: &str) {
        *self.custom_status.write() = status.trim().to_string();
    }

    pub fn status_line(&self) -> String {
        self.status_line.read().clone()
    }

    pub fn set_status_line(&self, line: String) {
        *self.status_line.write() = line;
    }

    pub fn effective_bpm(&self) -> Option<u32> {
        *self.effective_bpm.read()
    }

    pub fn set_effective_bpm(&self, bpm: Option<u32>) {
        *self.effective_bpm.write() = bpm;
    }
}

/// Run and pause flags observed by every loop.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    shutdown: CancellationToken,
    paused: Arc<AtomicBool>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Ask every loop to exit.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Resolves once `stop` has been called.
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await
    }

    /// Sleep for `period`, waking early on shutdown.
    ///
    /// Returns `false` when the relay is stopping.
    pub async fn sleep(&self, period: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(period) => self.is_running(),
        }
    }
}

/// Everything the loops share, handed out behind an `Arc`.
#[derive(Debug)]
pub struct SharedState {
    pub config: RwLock<Config>,
    pub config_path: Option<PathBuf>,
    pub sources: SourceState,
    pub run: RunState,
}

impl SharedState {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            config_path,
            sources: SourceState::default(),
            run: RunState::new(),
        })
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Multi-line summary for the operator.
    pub fn summary(&self, presence_enabled: bool) -> String {
        let mut lines = Vec::with_capacity(4);

        if let Some(bpm) = self.sources.effective_bpm() {
            lines.push(format!("⌘ HR: {bpm} BPM"));
        }
        let custom = self.sources.custom_status();
        if !custom.is_empty() {
            lines.push(format!("⌘ Custom Status: {custom}"));
        }
        if let Some(media) = self.sources.media() {
            if let Some(first) = media.lines().next() {
                lines.push(format!("⌘ Now Playing: {first}"));
            }
        }
        lines.push(format!(
            "⌘ Discord RPC: {}",
            if presence_enabled { "Enabled" } else { "Disabled" }
        ));
        if self.run.is_paused() {
            lines.push("⌘ Updates paused".to_string());
        }

        lines.join("\n")
    }
}
