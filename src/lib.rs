//! Pulse Relay - heart rate, now playing and custom status for the VRChat chatbox.
//!
//! This library polls a heart-rate reading from a file written by an external
//! monitor, smooths it, adds the currently playing track and an operator-set
//! status, and relays the result to the VRChat chatbox over OSC. The same
//! reading can be mirrored to Discord Rich Presence.
//!
//! # Delivery Guarantees
//!
//! - **No spam**: An identical message is never sent twice in a row
//! - **Overrides win**: Chat lines and canned messages hold the chatbox for their pause window
//! - **Rate limited presence**: Discord updates are spaced at least five seconds apart
//! - **Failures are local**: A dead source or channel never stops the relay
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Pulse Relay                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Heart rate  │──▶│  Smoothing  │──▶│ Status line │──┐    │
//! │  │   (file)    │   │  (EMA/trend)│   │  (format)   │  │    │
//! │  └─────────────┘   └─────────────┘   └─────────────┘  │    │
//! │  ┌─────────────┐                                       ▼    │
//! │  │   Spotify   │──────────────────────────────▶┌─────────────┐
//! │  └─────────────┘                               │ Dispatcher  │──▶ OSC
//! │  ┌─────────────┐   ┌─────────────┐             │ (dedup/gate)│
//! │  │   Console   │──▶│  Overrides  │────────────▶└─────────────┘
//! │  └─────────────┘   └─────────────┘   ┌─────────────┐
//! │                                      │  Presence   │──▶ Discord IPC
//! │                                      └─────────────┘
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pulse_relay::{Config, SharedState};
//!
//! let config = Config::load_or_default(&Config::config_path());
//! let state = SharedState::new(config, Some(Config::config_path()));
//! state.sources.set_custom_status("Gaming");
//! ```

pub mod channel;
pub mod config;
pub mod console;
pub mod core;
pub mod dispatch;
pub mod relay;
pub mod sources;
pub mod state;
pub mod stats;

// Re-export key types at crate root for convenience
pub use channel::{
    ChatSink, DiscordIpc, OscChatbox, PresenceChannel, PresenceUpdate, TransportError,
};
pub use config::{Config, ConfigError};
pub use console::{Command, Console};
pub use core::{EffectiveReading, SmoothingUnit, Trend};
pub use dispatch::{DispatchOutcome, Dispatcher, OverrideGate, PresenceRelay};
pub use relay::Relay;
pub use sources::{BiometricSource, FileHeartRateSource, MediaSource, NoMedia, SourceError};
pub use state::{RunState, SharedState};
pub use stats::{DispatchStats, SharedStats};

#[cfg(feature = "spotify")]
pub use sources::{SpotifyAuthorizer, SpotifySource};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Banner printed when the relay starts.
pub const BANNER: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                          PULSE RELAY                             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Relays your heart rate, now playing track and custom status     ║
║  to the VRChat chatbox.                                          ║
║                                                                  ║
║  Type a message and press Enter to chat.                         ║
║  Type /cmds for the list of commands.                            ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_contents() {
        assert!(BANNER.contains("PULSE RELAY"));
        assert!(BANNER.contains("/cmds"));
    }
}
