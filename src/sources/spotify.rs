//! Spotify Web API now-playing source.
//!
//! Uses the refresh token saved by `pulse-relay spotify-auth`; access tokens
//! are exchanged and cached as needed.

use super::media::{format_now_playing, Playback};
use super::{MediaSource, SourceError};
use crate::config::SpotifyConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub(crate) const ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const API_URL: &str = "https://api.spotify.com";

/// Refresh this long before the advertised expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Reject empty or placeholder client credentials.
pub(crate) fn check_credentials(config: &SpotifyConfig) -> Result<(), SourceError> {
    let placeholder = |v: &str| v.trim().is_empty() || v.starts_with("SPOTIFY_");
    if placeholder(&config.client_id) || placeholder(&config.client_secret) {
        return Err(SourceError::NotConfigured(
            "spotify.client_id / spotify.client_secret".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn http_client() -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| SourceError::Network(e.to_string()))
}

/// Polls the Spotify player endpoint.
pub struct SpotifySource {
    config: SpotifyConfig,
    accounts_url: String,
    api_url: String,
    client: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifySource {
    /// Create a source from configuration.
    ///
    /// Placeholder or missing credentials are rejected up front.
    pub fn new(config: SpotifyConfig) -> Result<Self, SourceError> {
        Self::with_endpoints(config, ACCOUNTS_URL, API_URL)
    }

    /// Create a source talking to alternative endpoints.
    pub fn with_endpoints(
        config: SpotifyConfig,
        accounts_url: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        check_credentials(&config)?;
        if config.refresh_token.trim().is_empty() {
            return Err(SourceError::NotConfigured(
                "spotify.refresh_token (run `pulse-relay spotify-auth`)".to_string(),
            ));
        }

        Ok(Self {
            config,
            accounts_url: accounts_url.into(),
            api_url: api_url.into(),
            client: http_client()?,
            token: Mutex::new(None),
        })
    }

    /// Token exchange endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_url)
    }

    /// Player state endpoint.
    pub fn player_url(&self) -> String {
        format!("{}/v1/me/player", self.api_url)
    }

    async fn access_token(&self) -> Result<String, SourceError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(self.token_url())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.config.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SourceError::Response {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::debug!("Refreshed Spotify access token, valid for {}s", lifetime.as_secs());

        let value = body.access_token.clone();
        *cached = Some(AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    /// Fetch the raw playback state. `None` when nothing is playing.
    pub async fn playback(&self) -> Result<Option<Playback>, SourceError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(self.player_url())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.token.lock().await.take();
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SourceError::Response {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MediaSource for SpotifySource {
    async fn current_track(&self) -> Result<Option<String>, SourceError> {
        Ok(self.playback().await?.as_ref().and_then(format_now_playing))
    }
}
