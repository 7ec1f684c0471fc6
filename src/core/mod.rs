//! Core functionality for the pulse relay.
//!
//! This module contains:
//! - Heart-rate smoothing and trend detection
//! - Message formatting
//! - The aggregation step that turns readings into a status line

pub mod aggregator;
pub mod format;
pub mod smoothing;

// Re-export commonly used types
pub use aggregator::{combined_message, presence_update, Aggregator};
pub use smoothing::{
    BiometricSample, EffectiveReading, SmoothingOptions, SmoothingUnit, Trend, HISTORY_CAPACITY,
    SMOOTHING_ALPHA,
};
