//! Operator console.
//!
//! Lines are parsed into [`Command`]s and executed against the shared state.
//! Every command produces a reply for the operator; errors never stop the
//! console.

pub mod commands;

pub use commands::{Command, CommandError, COMMAND_HELP};

use crate::dispatch::{Dispatcher, PresenceRelay};
use crate::state::SharedState;
use rand::seq::IndexedRandom;
use std::sync::Arc;

/// ANSI sequence that clears the terminal and homes the cursor.
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

#[derive(Clone)]
pub struct Console {
    state: Arc<SharedState>,
    dispatcher: Arc<Dispatcher>,
    presence: Arc<PresenceRelay>,
}

impl Console {
    pub fn new(
        state: Arc<SharedState>,
        dispatcher: Arc<Dispatcher>,
        presence: Arc<PresenceRelay>,
    ) -> Self {
        Self {
            state,
            dispatcher,
            presence,
        }
    }

    /// Parse and execute one input line.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        match Command::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => None,
            Err(e) => Some(format!("⌘: {e}")),
        }
    }

    /// Execute a command and return the reply, if any.
    pub async fn execute(&self, command: Command) -> Option<String> {
        let reply = match command {
            Command::Status(status) => {
                self.state.sources.set_custom_status(&status);
                let status = self.state.sources.custom_status();
                if status.is_empty() {
                    "⌘: Custom status cleared.".to_string()
                } else {
                    format!("⌘: Custom status set to: {status}")
                }
            }
            Command::Clear => {
                self.state.sources.set_custom_status("");
                format!("{CLEAR_SCREEN}⌘: Console cleared and custom status reset.")
            }
            Command::Pause => {
                self.state.run.set_paused(true);
                "⌘: Updates paused.".to_string()
            }
            Command::Resume => {
                self.state.run.set_paused(false);
                "⌘: Updates resumed.".to_string()
            }
            Command::Exit => {
                self.state.run.stop();
                "⌘: Exiting gracefully...".to_string()
            }
            Command::Get => match serde_json::to_string_pretty(&self.state.config()) {
                Ok(json) => format!("⌘: Current configuration:\n{json}"),
                Err(e) => format!("⌘: Could not render configuration: {e}"),
            },
            Command::Set { key, value } => self.set_config(&key, &value),
            Command::Time => {
                let now = chrono::Local::now().format("%H:%M:%S").to_string();
                let window = self.state.config.read().display.canned_pause_time;
                self.dispatcher
                    .send_override(&format!("⏰ {now}"), window)
                    .await;
                format!("⌘: Sent local time ({now})")
            }
            Command::Joke => {
                let (joke, window) = {
                    let config = self.state.config.read();
                    let joke = config.jokes.choose(&mut rand::rng()).cloned();
                    (joke, config.display.canned_pause_time)
                };
                match joke {
                    Some(joke) => {
                        self.dispatcher
                            .send_override(&format!("😂 {joke}"), window)
                            .await;
                        format!("⌘: Sent a joke: {joke}")
                    }
                    None => "⌘: No jokes configured.".to_string(),
                }
            }
            Command::Rpc => match self.presence.toggle().await {
                Ok(true) => "⌘: Discord RPC enabled.".to_string(),
                Ok(false) => "⌘: Discord RPC disabled.".to_string(),
                Err(e) => format!("⌘: Discord RPC unavailable: {e}"),
            },
            Command::Info => format!(
                "{}\n{}",
                self.state.summary(self.presence.is_enabled()),
                self.dispatcher.stats().summary()
            ),
            Command::Cmds => COMMAND_HELP.to_string(),
            Command::Chat(line) => {
                let window = self.state.config.read().display.chat_pause_time;
                self.dispatcher
                    .send_override(&format!("💬 {line}"), window)
                    .await;
                return None;
            }
        };
        Some(reply)
    }

    /// Apply a typed update and persist it.
    fn set_config(&self, key: &str, value: &str) -> String {
        let snapshot = {
            let mut config = self.state.config.write();
            let mut updated = config.clone();
            if let Err(e) = updated.set(key, value) {
                return format!("⌘: {e}");
            }
            *config = updated.clone();
            updated
        };

        match &self.state.config_path {
            Some(path) => match snapshot.save_to(path) {
                Ok(()) => format!("⌘: Updated config '{key}' to {value}."),
                Err(e) => format!("⌘: Updated config '{key}' to {value}, but failed to save: {e}"),
            },
            None => format!("⌘: Updated config '{key}' to {value}."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dispatch::dispatcher::tests::RecordingSink;
    use crate::dispatch::presence::tests::RecordingPresence;
    use crate::stats::DispatchStats;
    use std::time::Duration;

    struct Harness {
        state: Arc<SharedState>,
        sink: Arc<RecordingSink>,
        dispatcher: Arc<Dispatcher>,
        console: Console,
    }

    fn harness(config: Config, path: Option<std::path::PathBuf>) -> Harness {
        let state = SharedState::new(config, path);
        let stats = Arc::new(DispatchStats::new());
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Arc::new(Dispatcher::new(sink.clone(), stats.clone()));
        let presence = Arc::new(PresenceRelay::new(
            Arc::new(RecordingPresence::default()),
            stats,
        ));
        let console = Console::new(state.clone(), dispatcher.clone(), presence);
        Harness {
            state,
            sink,
            dispatcher,
            console,
        }
    }

    #[tokio::test]
    async fn test_status_commands() {
        let h = harness(Config::default(), None);

        let reply = h.console.handle_line("/status Gaming").await.unwrap();
        assert_eq!(reply, "⌘: Custom status set to: Gaming");
        assert_eq!(h.state.sources.custom_status(), "Gaming");

        let reply = h.console.handle_line("/status").await.unwrap();
        assert_eq!(reply, "⌘: Custom status cleared.");
        assert_eq!(h.state.sources.custom_status(), "");
    }

    #[tokio::test]
    async fn test_pause_resume_exit() {
        let h = harness(Config::default(), None);

        h.console.handle_line("/pause").await;
        assert!(h.state.run.is_paused());
        h.console.handle_line("/resume").await;
        assert!(!h.state.run.is_paused());

        h.console.handle_line("/exit").await;
        assert!(!h.state.run.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_line_arms_chat_window() {
        let h = harness(Config::default(), None);

        assert_eq!(h.console.handle_line("hi all").await, None);
        assert_eq!(h.sink.messages(), vec!["💬 hi all"]);
        assert_eq!(
            h.dispatcher.gate().remaining(),
            Some(Duration::from_secs(15))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_joke_uses_canned_window() {
        let mut config = Config::default();
        config.jokes = vec!["knock knock".to_string()];
        let h = harness(config, None);

        let reply = h.console.handle_line("/joke").await.unwrap();
        assert_eq!(reply, "⌘: Sent a joke: knock knock");
        assert_eq!(h.sink.messages(), vec!["😂 knock knock"]);
        assert_eq!(h.dispatcher.gate().remaining(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_joke_without_phrases() {
        let mut config = Config::default();
        config.jokes.clear();
        let h = harness(config, None);

        let reply = h.console.handle_line("/joke").await.unwrap();
        assert_eq!(reply, "⌘: No jokes configured.");
        assert!(h.sink.messages().is_empty());
        assert!(!h.dispatcher.gate().is_active());
    }

    #[tokio::test]
    async fn test_time_sends_clock() {
        let h = harness(Config::default(), None);
        h.console.handle_line("/time").await;

        let sent = h.sink.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("⏰ "));
        assert_eq!(sent[0].chars().filter(|c| *c == ':').count(), 2);
    }

    #[tokio::test]
    async fn test_set_persists_and_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let h = harness(Config::default(), Some(path.clone()));

        let reply = h.console.handle_line("/set display.low_bpm_threshold 55").await.unwrap();
        assert_eq!(reply, "⌘: Updated config 'display.low_bpm_threshold' to 55.");
        assert_eq!(h.state.config.read().display.low_bpm_threshold, 55);
        assert_eq!(Config::load(&path).unwrap().display.low_bpm_threshold, 55);

        let reply = h.console.handle_line("/set display.low_bpm_threshold low").await.unwrap();
        assert!(reply.contains("Failed to convert"));
        assert_eq!(h.state.config.read().display.low_bpm_threshold, 55);
    }

    #[tokio::test]
    async fn test_errors_are_reported() {
        let h = harness(Config::default(), None);
        assert_eq!(
            h.console.handle_line("/dance").await.unwrap(),
            "⌘: Unknown command: /dance"
        );
        assert!(h.sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_rpc_toggle_and_info() {
        let h = harness(Config::default(), None);
        assert_eq!(
            h.console.handle_line("/rpc").await.unwrap(),
            "⌘: Discord RPC enabled."
        );

        let info = h.console.handle_line("/info").await.unwrap();
        assert!(info.contains("⌘ Discord RPC: Enabled"));
        assert!(info.contains("Session Statistics"));
    }
}
