//! Pulse Relay CLI
//!
//! Heart rate, now playing and custom status relay for the VRChat chatbox.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pulse_relay::{
    config::Config,
    console::COMMAND_HELP,
    dispatch::{Dispatcher, PresenceRelay},
    relay::Relay,
    sources::{FileHeartRateSource, MediaSource, NoMedia},
    state::{RunState, SharedState},
    stats::DispatchStats,
    DiscordIpc, OscChatbox, BANNER, VERSION,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pulse-relay")]
#[command(version = VERSION)]
#[command(
    about = "Heart rate, now playing and custom status relay for the VRChat chatbox",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start relaying (the default)
    Start {
        /// Configuration file to use instead of the per-user one
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Configuration file to use instead of the per-user one
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Authorize Spotify and save a refresh token
    SpotifyAuth {
        /// Configuration file to use instead of the per-user one
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// List the operator console commands
    Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pulse_relay=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Start { config: None }) {
        Commands::Start { config } => cmd_start(config).await,
        Commands::Config { config } => {
            cmd_config(config);
            Ok(())
        }
        Commands::SpotifyAuth { config } => cmd_spotify_auth(config).await,
        Commands::Commands => {
            println!("{COMMAND_HELP}");
            Ok(())
        }
    }
}

async fn cmd_start(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    println!("{BANNER}");
    println!("Pulse Relay v{VERSION}");
    println!();

    let config_path = config_path.unwrap_or_else(Config::config_path);
    let config = Config::load_or_default(&config_path);

    println!("Config file: {config_path:?}");
    println!(
        "  Chatbox: {}:{}",
        config.chatbox.osc_ip, config.chatbox.osc_port
    );
    println!("  Heart-rate file: {:?}", config.chatbox.text_file_path);
    println!("  Check interval: {}s", config.chatbox.check_interval.as_secs());
    println!();

    let chatbox = OscChatbox::connect(&config.chatbox.osc_ip, config.chatbox.osc_port)
        .await
        .with_context(|| {
            format!(
                "could not open OSC socket for {}:{}",
                config.chatbox.osc_ip, config.chatbox.osc_port
            )
        })?;

    let biometric = Arc::new(FileHeartRateSource::new(
        config.chatbox.text_file_path.clone(),
        config.chatbox.process_name.clone(),
    ));
    let media = media_source(&config);

    let stats = Arc::new(DispatchStats::new());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(chatbox), stats.clone()));
    let discord = Arc::new(DiscordIpc::new(
        config.presence.client_id.clone(),
        config.presence.debug,
    ));
    let presence = Arc::new(PresenceRelay::new(discord, stats.clone()));

    if config.presence.enable {
        match presence.enable().await {
            Ok(()) => println!("  Discord RPC: connected"),
            Err(e) => tracing::warn!("Discord RPC unavailable, continuing without it: {e}"),
        }
    } else {
        println!("  Discord RPC: disabled");
    }

    let state = SharedState::new(config, Some(config_path));
    ctrlc_handler(state.run.clone());

    let (tx, rx) = mpsc::channel(32);
    spawn_stdin_reader(tx);

    println!();
    println!("Type /cmds for commands, Ctrl+C to stop");
    println!();

    let relay = Relay::new(state, dispatcher, presence, biometric, media);
    relay.run(rx).await;

    println!();
    println!("{}", stats.summary());
    Ok(())
}

/// Pick the media source the configuration asks for.
fn media_source(config: &Config) -> Arc<dyn MediaSource> {
    #[cfg(feature = "spotify")]
    if config.spotify.enable {
        match pulse_relay::sources::SpotifySource::new(config.spotify.clone()) {
            Ok(source) => return Arc::new(source),
            Err(e) => tracing::warn!("Spotify disabled: {e}"),
        }
    }

    #[cfg(not(feature = "spotify"))]
    if config.spotify.enable {
        tracing::warn!("spotify.enable ignored (spotify feature not enabled at compile time)");
    }

    Arc::new(NoMedia)
}

fn cmd_config(config_path: Option<PathBuf>) {
    let config_path = config_path.unwrap_or_else(Config::config_path);
    let config = Config::load_or_default(&config_path);

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// How long to wait for the browser to come back to the redirect URI.
#[cfg(feature = "spotify")]
const AUTHORIZE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

#[cfg(feature = "spotify")]
async fn cmd_spotify_auth(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    use pulse_relay::sources::SpotifyAuthorizer;

    let config_path = config_path.unwrap_or_else(Config::config_path);
    let mut config = Config::load_or_default(&config_path);

    let authorizer = SpotifyAuthorizer::new(config.spotify.clone())?;
    let state = uuid::Uuid::new_v4().to_string();
    let listener = authorizer.bind().await?;

    println!("Open this URL in a browser and approve access:");
    println!();
    println!("  {}", authorizer.authorize_url(&state)?);
    println!();
    println!("Waiting for Spotify to redirect to {} ...", config.spotify.redirect_uri);

    let code = tokio::time::timeout(AUTHORIZE_TIMEOUT, authorizer.receive_code(&listener, &state))
        .await
        .context("timed out waiting for the Spotify redirect")??;
    let refresh_token = authorizer.exchange_code(&code).await?;

    config.spotify.refresh_token = refresh_token;
    config.spotify.enable = true;
    config
        .save_to(&config_path)
        .with_context(|| format!("could not save {config_path:?}"))?;

    println!("Spotify authorized; refresh token saved to {config_path:?}");
    Ok(())
}

#[cfg(not(feature = "spotify"))]
async fn cmd_spotify_auth(_config_path: Option<PathBuf>) -> anyhow::Result<()> {
    anyhow::bail!("spotify-auth needs the spotify feature (rebuild with --features spotify)")
}

/// Forward operator lines from stdin.
fn spawn_stdin_reader(tx: mpsc::Sender<String>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(run: RunState) {
    if let Err(e) = ctrlc::set_handler(move || run.stop()) {
        tracing::warn!("Could not install Ctrl+C handler: {e}");
    }
}
