//! Audio processing context and domain-level error types
//!
//! The processing context describes the host audio format (sample rate,
//! channel layout, block size budget). It is handed to the engine once per
//! format change; everything downstream sizes its state from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error)]
pub enum AudioError {
    /// `process` was called before `prepare`
    #[error("Engine not prepared: call prepare() before process()")]
    NotPrepared,

    /// Invalid processing configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A block exceeded the maximum size given to `prepare`
    #[error("Block too large: {0} samples exceeds prepared maximum of {1}")]
    BlockTooLarge(usize, usize),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Gain below this level is treated as silence
pub const SILENCE_FLOOR_DB: f32 = -100.0;

/// Convert decibels to linear gain
///
/// Values at or below [`SILENCE_FLOOR_DB`] map to exactly 0.0.
#[inline]
#[must_use]
pub fn db_to_gain(db: f32) -> f32 {
    if db <= SILENCE_FLOOR_DB {
        0.0
    } else {
        10.0_f32.powf(db / 20.0)
    }
}

/// Convert linear gain to decibels
///
/// Non-positive gain maps to [`SILENCE_FLOOR_DB`].
#[inline]
#[must_use]
pub fn gain_to_db(gain: f32) -> f32 {
    if gain <= 0.0 {
        SILENCE_FLOOR_DB
    } else {
        20.0 * gain.log10()
    }
}

/// Host audio format handed to `prepare`
///
/// All per-channel state and scratch buffers are sized from this once;
/// nothing on the audio path allocates afterwards. A new spec must be
/// supplied whenever the host format changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Number of audio channels
    pub channels: usize,
    /// Largest block length (in samples) that will be passed to `process`
    pub max_block: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f64, channels: usize, max_block: usize) -> Self {
        Self {
            sample_rate,
            channels,
            max_block,
        }
    }

    /// Check that the spec can drive coefficient math and buffer sizing
    pub fn is_valid(&self) -> bool {
        self.sample_rate.is_finite()
            && self.sample_rate > 0.0
            && self.channels > 0
            && self.max_block > 0
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            channels: 2,
            max_block: 512,
        }
    }
}
