//! The running relay: one task per loop, joined on shutdown.
//!
//! ```text
//! heart-rate ──▶ Aggregator ──▶ status line ─┐
//! media ───────────────────────▶ media text ─┼─▶ combine (1s) ──▶ Dispatcher ──▶ chatbox
//! console ──▶ overrides ─────────────────────┘                  └─▶ PresenceRelay ──▶ Discord
//! ```

use crate::channel::PresenceUpdate;
use crate::console::Console;
use crate::core::{combined_message, Aggregator};
use crate::dispatch::{Dispatcher, PresenceRelay};
use crate::sources::{BiometricSource, MediaSource};
use crate::state::SharedState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Period of the combine/dispatch loop.
pub const COMBINE_INTERVAL: Duration = Duration::from_secs(1);

/// Period of the media poll.
pub const MEDIA_INTERVAL: Duration = Duration::from_secs(1);

/// First message shown after start-up.
pub const STARTUP_MESSAGE: &str = "⌘ pulse-relay starting ⌘";

pub struct Relay {
    state: Arc<SharedState>,
    dispatcher: Arc<Dispatcher>,
    presence: Arc<PresenceRelay>,
    biometric: Arc<dyn BiometricSource>,
    media: Arc<dyn MediaSource>,
}

impl Relay {
    pub fn new(
        state: Arc<SharedState>,
        dispatcher: Arc<Dispatcher>,
        presence: Arc<PresenceRelay>,
        biometric: Arc<dyn BiometricSource>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            state,
            dispatcher,
            presence,
            biometric,
            media,
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn console(&self) -> Console {
        Console::new(
            Arc::clone(&self.state),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.presence),
        )
    }

    /// Run every loop until the relay is stopped, then close the presence
    /// channel. Operator lines arrive on `input`.
    pub async fn run(self, input: mpsc::Receiver<String>) {
        self.dispatcher.submit(STARTUP_MESSAGE).await;
        let startup = PresenceUpdate {
            details: STARTUP_MESSAGE.to_string(),
            state: Some(STARTUP_MESSAGE.to_string()),
            assets: None,
        };
        self.presence.announce(&startup).await;

        let mut tasks = JoinSet::new();

        let aggregator = Aggregator::new(
            Arc::clone(&self.state),
            Arc::clone(&self.biometric),
            Arc::clone(&self.presence),
        );
        tasks.spawn(aggregator.run());
        tasks.spawn(media_loop(Arc::clone(&self.state), Arc::clone(&self.media)));
        tasks.spawn(combine_loop(Arc::clone(&self.state), Arc::clone(&self.dispatcher)));
        tasks.spawn(console_loop(Arc::clone(&self.state), self.console(), input));

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!("Relay task failed: {e}");
            }
        }

        if let Err(e) = self.presence.disable().await {
            tracing::debug!("Closing presence channel failed: {e}");
        }
        tracing::info!("Relay stopped");
    }
}

/// Poll the media source once a second.
pub async fn media_loop(state: Arc<SharedState>, media: Arc<dyn MediaSource>) {
    while state.run.is_running() {
        let track = match media.current_track().await {
            Ok(track) => track,
            Err(e) => {
                tracing::debug!("Media poll failed: {e}");
                None
            }
        };
        state.sources.set_media(track);

        if !state.run.sleep(MEDIA_INTERVAL).await {
            break;
        }
    }
}

/// Submit the combined message once a second.
///
/// Runs while paused: the status line is frozen but media changes still go out.
pub async fn combine_loop(state: Arc<SharedState>, dispatcher: Arc<Dispatcher>) {
    while state.run.is_running() {
        dispatcher.submit(&combined_message(&state)).await;

        if !state.run.sleep(COMBINE_INTERVAL).await {
            break;
        }
    }
}

/// Execute operator lines until shutdown or end of input.
pub async fn console_loop(
    state: Arc<SharedState>,
    console: Console,
    mut input: mpsc::Receiver<String>,
) {
    loop {
        let line = tokio::select! {
            _ = state.run.stopped() => break,
            line = input.recv() => line,
        };

        match line {
            Some(line) => {
                if let Some(reply) = console.handle_line(&line).await {
                    println!("{reply}");
                }
            }
            None => {
                tracing::info!("Operator input closed; console disabled");
                break;
            }
        }
    }
}
