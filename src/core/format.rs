//! Message formatting.
//!
//! Everything here is a pure function of its inputs except the icon pick,
//! which is random per call.

use crate::config::{DisplayConfig, TrendSymbols};
use crate::core::smoothing::{EffectiveReading, Trend};
use rand::seq::IndexedRandom;

/// Pick a heart icon at random. Falls back to a plain heart on an empty set.
pub fn pick_icon(icons: &[String]) -> &str {
    icons
        .choose(&mut rand::rng())
        .map(String::as_str)
        .unwrap_or("❤")
}

pub fn trend_symbol(trend: Trend, symbols: &TrendSymbols) -> &str {
    match trend {
        Trend::Up => &symbols.up,
        Trend::Down => &symbols.down,
        Trend::Steady => &symbols.steady,
    }
}

/// Tag for the current heart rate, when contextual display is enabled.
pub fn contextual_tag(bpm: u32, display: &DisplayConfig) -> Option<&str> {
    if !display.enable_contextual {
        return None;
    }

    let tag = if bpm >= display.high_bpm_threshold {
        &display.high_bpm_message
    } else if bpm <= display.low_bpm_threshold {
        &display.low_bpm_message
    } else {
        &display.normal_bpm_message
    };

    Some(tag.as_str()).filter(|t| !t.trim().is_empty())
}

/// `<icon> <bpm> [<trend>]`
fn heart_block(icon: &str, reading: EffectiveReading, display: &DisplayConfig) -> String {
    let mut block = format!("{icon} {}", reading.bpm);
    if display.enable_trend {
        if let Some(trend) = reading.trend {
            block.push(' ');
            block.push_str(trend_symbol(trend, &display.trend_symbols));
        }
    }
    block
}

/// Compose the status line for one aggregation tick.
///
/// Without a reading the line is just the custom status (possibly empty).
pub fn status_line(
    reading: Option<(&str, EffectiveReading)>,
    custom_status: &str,
    display: &DisplayConfig,
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);

    if let Some((icon, reading)) = reading {
        parts.push(heart_block(icon, reading, display));
        if let Some(tag) = contextual_tag(reading.bpm, display) {
            parts.push(tag.to_string());
        }
    }

    let custom = custom_status.trim();
    if !custom.is_empty() {
        parts.push(custom.to_string());
    }

    parts.join(&display.separator)
}

/// Join the status line and the media block.
pub fn combine(status_line: &str, media: Option<&str>) -> String {
    let media = media.filter(|m| !m.is_empty());
    match (status_line.is_empty(), media) {
        (false, Some(media)) => format!("{status_line}\n{media}"),
        (false, None) => status_line.to_string(),
        (true, Some(media)) => media.to_string(),
        (true, None) => String::new(),
    }
}

/// Primary presence line: `⌘ <bpm> BPM [<trend>] [| <tag>]`
pub fn presence_details(reading: EffectiveReading, display: &DisplayConfig) -> String {
    let mut details = format!("⌘ {} BPM", reading.bpm);
    if display.enable_trend {
        if let Some(trend) = reading.trend {
            details.push(' ');
            details.push_str(trend_symbol(trend, &display.trend_symbols));
        }
    }
    if let Some(tag) = contextual_tag(reading.bpm, display) {
        details.push_str(" | ");
        details.push_str(tag);
    }
    details
}

/// Secondary presence line, present only with a custom status.
pub fn presence_state(custom_status: &str) -> Option<String> {
    let custom = custom_status.trim();
    (!custom.is_empty()).then(|| format!("Status: {custom}"))
}
