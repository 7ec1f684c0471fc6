//! Operator command parsing.

use thiserror::Error;

/// One operator input line, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set the custom status; empty clears it
    Status(String),
    /// Reset the custom status and the screen
    Clear,
    Pause,
    Resume,
    Exit,
    /// Print the configuration
    Get,
    /// Update one configuration key
    Set { key: String, value: String },
    /// Send the local time
    Time,
    /// Send a random configured phrase
    Joke,
    /// Toggle the presence channel
    Rpc,
    /// Print the status summary and statistics
    Info,
    /// List commands
    Cmds,
    /// Literal chat line
    Chat(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse a line. Blank lines yield `None`; anything not starting with
    /// `/` is a chat message.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(None);
        }
        if !line.starts_with('/') {
            return Ok(Some(Command::Chat(line.to_string())));
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let no_args = |cmd: Command, usage: &'static str| {
            if rest.is_empty() {
                Ok(Some(cmd))
            } else {
                Err(CommandError::Usage(usage))
            }
        };

        match name {
            "/status" => Ok(Some(Command::Status(rest.to_string()))),
            "/clear" => no_args(Command::Clear, "/clear"),
            "/pause" => no_args(Command::Pause, "/pause"),
            "/resume" => no_args(Command::Resume, "/resume"),
            "/exit" => no_args(Command::Exit, "/exit"),
            "/get" => no_args(Command::Get, "/get"),
            "/time" => no_args(Command::Time, "/time"),
            "/joke" => no_args(Command::Joke, "/joke"),
            "/rpc" => no_args(Command::Rpc, "/rpc"),
            "/info" => no_args(Command::Info, "/info"),
            "/cmds" => no_args(Command::Cmds, "/cmds"),
            "/set" => match rest.split_once(char::is_whitespace) {
                Some((key, value)) if !value.trim().is_empty() => Ok(Some(Command::Set {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                })),
                _ => Err(CommandError::Usage("/set key value")),
            },
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Command list shown by `/cmds`.
pub const COMMAND_HELP: &str = "⌘ Available commands ⌘\n\
⌘  Any message without prefix will be sent to the VRChat chatbox.\n\
⌘  /status [message] - Set custom status (empty clears status).\n\
⌘  /clear - Clear the console and reset custom status.\n\
⌘  /pause - Pause updates.\n\
⌘  /resume - Resume updates.\n\
⌘  /exit - Exit gracefully.\n\
⌘  /get - Display current configuration.\n\
⌘  /set key value - Update a configuration setting (dot notation, e.g. display.enable_trend).\n\
⌘  /time - Send current local time to the chatbox.\n\
⌘  /joke - Send a random joke.\n\
⌘  /rpc - Toggle Discord Rich Presence on/off.\n\
⌘  /info - Show current status and session statistics.\n\
⌘  /cmds - Show this command list.";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<Command> {
        Command::parse(line).unwrap()
    }

    #[test]
    fn test_status_set_and_clear() {
        assert_eq!(parse("/status Gaming hard"), Some(Command::Status("Gaming hard".into())));
        assert_eq!(parse("/status"), Some(Command::Status(String::new())));
        assert_eq!(parse("/status   "), Some(Command::Status(String::new())));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("/pause"), Some(Command::Pause));
        assert_eq!(parse("/resume\n"), Some(Command::Resume));
        assert_eq!(parse("/exit"), Some(Command::Exit));
        assert_eq!(parse("/joke"), Some(Command::Joke));
        assert_eq!(parse("/rpc"), Some(Command::Rpc));
        assert_eq!(parse("/cmds"), Some(Command::Cmds));
    }

    #[test]
    fn test_set() {
        assert_eq!(
            parse("/set display.separator  ~ | ~ "),
            Some(Command::Set {
                key: "display.separator".into(),
                value: "~ | ~".into()
            })
        );
        assert_eq!(
            Command::parse("/set display.enable_trend"),
            Err(CommandError::Usage("/set key value"))
        );
        assert_eq!(Command::parse("/set"), Err(CommandError::Usage("/set key value")));
    }

    #[test]
    fn test_chat_and_blank_lines() {
        assert_eq!(parse("hello there"), Some(Command::Chat("hello there".into())));
        assert_eq!(parse("  "), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_unknown_and_extra_args() {
        assert_eq!(
            Command::parse("/dance"),
            Err(CommandError::Unknown("/dance".into()))
        );
        assert_eq!(Command::parse("/pause now"), Err(CommandError::Usage("/pause")));
    }
}
