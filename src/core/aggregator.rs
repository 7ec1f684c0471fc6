//! Heart-rate aggregation.
//!
//! Each tick polls the biometric source, runs the reading through the
//! smoothing unit and stores a freshly composed status line. The combine
//! loop picks that line up together with the media text.

use crate::channel::{PresenceAssets, PresenceUpdate};
use crate::config::Config;
use crate::core::format;
use crate::core::smoothing::{EffectiveReading, SmoothingOptions, SmoothingUnit};
use crate::dispatch::PresenceRelay;
use crate::sources::BiometricSource;
use crate::state::SharedState;
use std::sync::Arc;

pub struct Aggregator {
    state: Arc<SharedState>,
    source: Arc<dyn BiometricSource>,
    presence: Arc<PresenceRelay>,
    unit: SmoothingUnit,
}

impl Aggregator {
    pub fn new(
        state: Arc<SharedState>,
        source: Arc<dyn BiometricSource>,
        presence: Arc<PresenceRelay>,
    ) -> Self {
        Self {
            state,
            source,
            presence,
            unit: SmoothingUnit::new(SmoothingOptions::default()),
        }
    }

    /// Poll the source. Every failure collapses to "no reading".
    async fn poll_reading(&self) -> Option<u32> {
        match self.source.is_live().await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::debug!("Liveness check failed: {e}");
                return None;
            }
        }

        match self.source.read_value().await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Heart-rate read failed: {e}");
                None
            }
        }
    }

    /// Run one aggregation step and return the reading it displayed.
    pub async fn tick(&mut self) -> Option<EffectiveReading> {
        let config = self.state.config();
        let display = &config.display;
        self.unit.configure(SmoothingOptions {
            smoothing: display.enable_smoothing,
            trend: display.enable_trend,
        });

        let reading = match self.poll_reading().await {
            Some(raw) => Some(self.unit.observe(raw)),
            None => None,
        };

        let custom = self.state.sources.custom_status();
        let line = match reading {
            Some(reading) => {
                let icon = format::pick_icon(&display.heart_icons);
                format::status_line(Some((icon, reading)), &custom, display)
            }
            None => format::status_line(None, &custom, display),
        };

        self.state.sources.set_status_line(line);
        self.state.sources.set_effective_bpm(reading.map(|r| r.bpm));

        if let Some(reading) = reading {
            let update = presence_update(reading, &custom, &config);
            self.presence.update_presence(&update).await;
        }

        reading
    }

    /// Tick on the configured interval until the relay stops.
    pub async fn run(mut self) {
        tracing::debug!("Aggregator started");
        while self.state.run.is_running() {
            if !self.state.run.is_paused() {
                self.tick().await;
            }

            let interval = self.state.config.read().chatbox.check_interval;
            if !self.state.run.sleep(interval).await {
                break;
            }
        }
        tracing::debug!("Aggregator stopped");
    }
}

/// Presence payload for a reading.
pub fn presence_update(
    reading: EffectiveReading,
    custom_status: &str,
    config: &Config,
) -> PresenceUpdate {
    let presence = &config.presence;
    let assets = presence.assets_enabled.then(|| PresenceAssets {
        large_image: presence.large_image.clone(),
        large_text: presence.large_text.clone(),
        small_image: presence.small_image.clone(),
        small_text: presence.small_text.clone(),
    });

    PresenceUpdate {
        details: format::presence_details(reading, &config.display),
        state: format::presence_state(custom_status),
        assets,
    }
}

/// The message the chatbox should currently show.
pub fn combined_message(state: &SharedState) -> String {
    let line = state.sources.status_line();
    let media = state.sources.media();
    format::combine(&line, media.as_deref())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dispatch::presence::tests::RecordingPresence;
    use crate::sources::SourceError;
    use crate::stats::DispatchStats;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Biometric source replaying a script of readings.
    pub(crate) struct ScriptedSource {
        pub live: AtomicBool,
        /// Liveness results served before falling back to `live`
        pub liveness: Mutex<VecDeque<Result<bool, SourceError>>>,
        pub readings: Mutex<VecDeque<Result<Option<u32>, SourceError>>>,
    }

    impl ScriptedSource {
        pub fn new(readings: impl IntoIterator<Item = u32>) -> Self {
            Self {
                live: AtomicBool::new(true),
                liveness: Mutex::new(VecDeque::new()),
                readings: Mutex::new(readings.into_iter().map(|r| Ok(Some(r))).collect()),
            }
        }
    }

    #[async_trait]
    impl BiometricSource for ScriptedSource {
        async fn is_live(&self) -> Result<bool, SourceError> {
            self.liveness
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(self.live.load(Ordering::SeqCst)))
        }

        async fn read_value(&self) -> Result<Option<u32>, SourceError> {
            self.readings.lock().pop_front().unwrap_or(Ok(None))
        }
    }

    fn single_icon_config() -> Config {
        let mut config = Config::default();
        config.display.heart_icons = vec!["💖".to_string()];
        config
    }

    fn aggregator(
        source: ScriptedSource,
        config: Config,
    ) -> (Arc<SharedState>, Arc<RecordingPresence>, Aggregator) {
        let state = SharedState::new(config, None);
        let channel = Arc::new(RecordingPresence::default());
        let stats = Arc::new(DispatchStats::new());
        let presence = Arc::new(PresenceRelay::new(channel.clone(), stats));
        let aggregator = Aggregator::new(state.clone(), Arc::new(source), presence);
        (state, channel, aggregator)
    }

    #[tokio::test]
    async fn test_tick_composes_line_with_trend() {
        let source = ScriptedSource::new([60, 65, 70]);
        let (state, _, mut aggregator) = aggregator(source, single_icon_config());

        aggregator.tick().await;
        assert_eq!(state.sources.status_line(), "💖 60");
        aggregator.tick().await;
        assert_eq!(state.sources.status_line(), "💖 61");
        aggregator.tick().await;
        assert_eq!(state.sources.status_line(), "💖 64 🔺");
        assert_eq!(state.sources.effective_bpm(), Some(64));
    }

    #[tokio::test]
    async fn test_no_reading_keeps_custom_status_only() {
        let source = ScriptedSource::new([72]);
        source.live.store(false, Ordering::SeqCst);
        let (state, _, mut aggregator) = aggregator(source, single_icon_config());
        state.sources.set_custom_status("AFK");

        assert_eq!(aggregator.tick().await, None);
        assert_eq!(state.sources.status_line(), "AFK");
        assert_eq!(state.sources.effective_bpm(), None);
    }

    #[tokio::test]
    async fn test_source_errors_are_swallowed() {
        let source = ScriptedSource::new([]);
        source
            .readings
            .lock()
            .push_back(Err(SourceError::Parse("garbage".to_string())));
        let (state, _, mut aggregator) = aggregator(source, single_icon_config());

        assert_eq!(aggregator.tick().await, None);
        assert_eq!(state.sources.status_line(), "");
    }

    #[tokio::test]
    async fn test_liveness_error_skips_read() {
        let source = ScriptedSource::new([72]);
        source
            .liveness
            .lock()
            .push_back(Err(SourceError::Io(std::io::Error::other("probe failed"))));
        let (state, _, mut aggregator) = aggregator(source, single_icon_config());
        state.sources.set_custom_status("AFK");

        assert_eq!(aggregator.tick().await, None);
        assert_eq!(state.sources.status_line(), "AFK");

        // The queued reading was not consumed by the failed tick.
        let reading = aggregator.tick().await.unwrap();
        assert_eq!(reading.bpm, 72);
        assert_eq!(state.sources.status_line(), "💖 72 | AFK");
    }

    #[tokio::test]
    async fn test_runtime_toggle_disables_smoothing() {
        let source = ScriptedSource::new([60, 100]);
        let (state, _, mut aggregator) = aggregator(source, single_icon_config());

        aggregator.tick().await;
        state.config.write().display.enable_smoothing = false;
        aggregator.tick().await;
        assert_eq!(state.sources.status_line(), "💖 100");
    }

    #[tokio::test]
    async fn test_presence_receives_reading_when_enabled() {
        let mut config = single_icon_config();
        config.presence.assets_enabled = true;
        let (state, channel, mut aggregator) = aggregator(ScriptedSource::new([80]), config);
        state.sources.set_custom_status("Gaming");
        aggregator.presence.enable().await.unwrap();

        aggregator.tick().await;

        let updates = channel.updates.lock();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].details, "⌘ 80 BPM");
        assert_eq!(updates[0].state.as_deref(), Some("Status: Gaming"));
        assert_eq!(
            updates[0].assets.as_ref().map(|a| a.large_image.as_str()),
            Some("custom_large_image")
        );
    }

    #[test]
    fn test_combined_message() {
        let state = SharedState::new(Config::default(), None);
        assert_eq!(combined_message(&state), "");

        state.sources.set_status_line("💖 70".to_string());
        state.sources.set_media(Some("🎵 A - B\n[░░░░░░░░░░]".to_string()));
        assert_eq!(combined_message(&state), "💖 70\n🎵 A - B\n[░░░░░░░░░░]");
    }
}
