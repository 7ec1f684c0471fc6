//! Now-playing state and its chatbox rendering.

use super::{MediaSource, SourceError};
use async_trait::async_trait;
use serde::Deserialize;

/// Cells in the progress bar.
const PROGRESS_BAR_CELLS: usize = 10;

/// Playback state as reported by the Spotify player endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Playback {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<Track>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Track {
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Artist {
    pub name: String,
}

/// `█████░░░░░` for the given position.
pub fn progress_bar(progress_ms: u64, duration_ms: u64) -> String {
    let filled = if duration_ms == 0 {
        0
    } else {
        let secs = progress_ms / 1000;
        let total = (duration_ms / 1000).max(1);
        ((secs as f64 / total as f64) * PROGRESS_BAR_CELLS as f64) as usize
    }
    .min(PROGRESS_BAR_CELLS);

    "█".repeat(filled) + &"░".repeat(PROGRESS_BAR_CELLS - filled)
}

/// Render playback as `🎵 song - artist` over a progress bar.
///
/// Nothing is shown unless a track is actively playing.
pub fn format_now_playing(playback: &Playback) -> Option<String> {
    if !playback.is_playing {
        return None;
    }
    let track = playback.item.as_ref()?;
    let artist = track.artists.first().map(|a| a.name.as_str()).unwrap_or("Unknown");
    let bar = progress_bar(playback.progress_ms.unwrap_or(0), track.duration_ms);

    Some(format!("🎵 {} - {}\n[{}]", track.name, artist, bar))
}

/// Media source used when no player integration is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMedia;

#[async_trait]
impl MediaSource for NoMedia {
    async fn current_track(&self) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0, 200_000), "░░░░░░░░░░");
        assert_eq!(progress_bar(100_000, 200_000), "█████░░░░░");
        assert_eq!(progress_bar(200_000, 200_000), "██████████");
        assert_eq!(progress_bar(500_000, 200_000), "██████████");
        assert_eq!(progress_bar(1_000, 0), "░░░░░░░░░░");
    }

    #[test]
    fn test_format_from_player_json() {
        let json = r#"{
            "is_playing": true,
            "progress_ms": 30000,
            "item": {
                "name": "Song",
                "duration_ms": 120000,
                "artists": [{"name": "Artist"}, {"name": "Feature"}]
            }
        }"#;
        let playback: Playback = serde_json::from_str(json).unwrap();

        assert_eq!(
            format_now_playing(&playback).unwrap(),
            "🎵 Song - Artist\n[██░░░░░░░░]"
        );
    }

    #[test]
    fn test_paused_or_empty_playback_is_hidden() {
        let paused: Playback = serde_json::from_str(
            r#"{"is_playing": false,
                "item": {"name": "Song", "duration_ms": 1000, "artists": []}}"#,
        )
        .unwrap();
        assert_eq!(format_now_playing(&paused), None);

        let no_item = Playback {
            is_playing: true,
            ..Playback::default()
        };
        assert_eq!(format_now_playing(&no_item), None);
    }
}
