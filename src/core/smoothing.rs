//! Heart-rate smoothing and trend detection.
//!
//! Raw readings are kept in a short FIFO history for trend classification,
//! while an exponential moving average provides the value that is displayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of raw readings retained.
pub const HISTORY_CAPACITY: usize = 10;

/// Weight of the newest reading in the moving average.
pub const SMOOTHING_ALPHA: f64 = 0.3;

/// Number of trailing readings examined for a trend.
const TREND_SPAN: usize = 3;

/// A single heart-rate reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricSample {
    pub bpm: u32,
    pub received_at: DateTime<Utc>,
}

impl BiometricSample {
    pub fn new(bpm: u32) -> Self {
        Self {
            bpm,
            received_at: Utc::now(),
        }
    }
}

/// Direction of the last three raw readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Steady,
}

/// What the unit toggles are currently set to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothingOptions {
    pub smoothing: bool,
    pub trend: bool,
}

impl Default for SmoothingOptions {
    fn default() -> Self {
        Self {
            smoothing: true,
            trend: true,
        }
    }
}

/// The value to display for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveReading {
    /// Smoothed (truncated) or raw value, depending on options
    pub bpm: u32,
    /// `None` until three readings exist, or when trends are disabled
    pub trend: Option<Trend>,
}

/// Bounded history plus exponential moving average.
#[derive(Debug, Default)]
pub struct SmoothingUnit {
    options: SmoothingOptions,
    history: VecDeque<BiometricSample>,
    smoothed: Option<f64>,
}

impl SmoothingUnit {
    pub fn new(options: SmoothingOptions) -> Self {
        Self {
            options,
            history: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
            smoothed: None,
        }
    }

    /// Replace the toggles; history and average are kept.
    pub fn configure(&mut self, options: SmoothingOptions) {
        self.options = options;
    }

    /// Record a raw reading and return the value to display.
    pub fn observe(&mut self, raw: u32) -> EffectiveReading {
        self.record(BiometricSample::new(raw))
    }

    /// Record a reading that already carries its arrival time.
    pub fn record(&mut self, sample: BiometricSample) -> EffectiveReading {
        self.history.push_back(sample);
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }

        let bpm = if self.options.smoothing {
            let raw = f64::from(sample.bpm);
            let next = match self.smoothed {
                Some(prev) => SMOOTHING_ALPHA * raw + (1.0 - SMOOTHING_ALPHA) * prev,
                None => raw,
            };
            self.smoothed = Some(next);
            next as u32
        } else {
            sample.bpm
        };

        EffectiveReading {
            bpm,
            trend: self.trend(),
        }
    }

    /// Classify the last three raw readings.
    pub fn trend(&self) -> Option<Trend> {
        if !self.options.trend || self.history.len() < TREND_SPAN {
            return None;
        }

        let n = self.history.len();
        let a = self.history[n - 3].bpm;
        let b = self.history[n - 2].bpm;
        let c = self.history[n - 1].bpm;

        Some(if a < b && b < c {
            Trend::Up
        } else if a > b && b > c {
            Trend::Down
        } else {
            Trend::Steady
        })
    }

    /// Raw readings in arrival order.
    pub fn history(&self) -> impl Iterator<Item = u32> + '_ {
        self.history.iter().map(|s| s.bpm)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Current moving average, if smoothing has seen a reading.
    pub fn smoothed_value(&self) -> Option<f64> {
        self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_is_unsmoothed() {
        let mut unit = SmoothingUnit::new(SmoothingOptions::default());
        let reading = unit.observe(87);

        assert_eq!(reading.bpm, 87);
        assert_eq!(unit.smoothed_value(), Some(87.0));
        assert_eq!(reading.trend, None);
    }

    #[test]
    fn test_history_keeps_most_recent_ten() {
        let mut unit = SmoothingUnit::new(SmoothingOptions::default());
        for bpm in 1..=25 {
            unit.observe(bpm);
        }

        assert_eq!(unit.len(), HISTORY_CAPACITY);
        let history: Vec<u32> = unit.history().collect();
        assert_eq!(history, (16..=25).collect::<Vec<_>>());
    }

    #[test]
    fn test_rising_sequence_is_smoothed_and_trends_up() {
        let mut unit = SmoothingUnit::new(SmoothingOptions::default());
        let readings: Vec<EffectiveReading> =
            [60, 65, 70, 75, 80].iter().map(|&bpm| unit.observe(bpm)).collect();

        let shown: Vec<u32> = readings.iter().map(|r| r.bpm).collect();
        assert_eq!(shown, vec![60, 61, 64, 67, 71]);

        assert_eq!(readings[1].trend, None);
        assert_eq!(readings[2].trend, Some(Trend::Up));
    }

    #[test]
    fn test_trend_classification() {
        let classify = |values: &[u32]| {
            let mut unit = SmoothingUnit::new(SmoothingOptions::default());
            values.iter().map(|&v| unit.observe(v)).last().and_then(|r| r.trend)
        };

        assert_eq!(classify(&[90, 80, 70]), Some(Trend::Down));
        assert_eq!(classify(&[70, 80, 90]), Some(Trend::Up));
        assert_eq!(classify(&[70, 70, 90]), Some(Trend::Steady));
        assert_eq!(classify(&[70, 90, 80]), Some(Trend::Steady));
        // Only the last three readings count.
        assert_eq!(classify(&[100, 50, 60, 70]), Some(Trend::Up));
        assert_eq!(classify(&[70, 80]), None);
    }

    #[test]
    fn test_disabled_smoothing_passes_raw_and_keeps_history() {
        let mut unit = SmoothingUnit::new(SmoothingOptions {
            smoothing: false,
            trend: true,
        });

        assert_eq!(unit.observe(60).bpm, 60);
        assert_eq!(unit.observe(90).bpm, 90);
        let last = unit.observe(120);
        assert_eq!(last.bpm, 120);
        assert_eq!(last.trend, Some(Trend::Up));
        assert_eq!(unit.smoothed_value(), None);
    }

    #[test]
    fn test_disabled_trend_reports_none() {
        let mut unit = SmoothingUnit::new(SmoothingOptions {
            smoothing: true,
            trend: false,
        });
        for bpm in [60, 70, 80, 90] {
            assert_eq!(unit.observe(bpm).trend, None);
        }
    }
}
