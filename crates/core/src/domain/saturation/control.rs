//! Lock-free parameter sharing between control code and the audio thread
//!
//! This implementation uses crossbeam's atomic utilities so a UI or
//! automation thread can publish parameter changes while the audio thread
//! reads them at block boundaries.
//!
//! Performance characteristics:
//! - Lock-free (no mutex contention)
//! - Wait-free stores and loads
//! - Cache-padded cells to prevent false sharing
//! - No allocations after construction
//!
//! Each cell is an independent scalar; writes to different parameters are
//! not ordered relative to each other. The audio thread applies a snapshot
//! once per block, so the last published value per parameter wins.

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::SaturationParams;

/// Shared saturation parameter bank
///
/// Cloning is cheap: every clone refers to the same storage. Values are
/// stored verbatim; range clamping happens when the engine applies them.
#[derive(Debug, Clone)]
pub struct SaturationControls {
    inner: Arc<ControlBlock>,
}

#[derive(Debug)]
struct ControlBlock {
    /// Drive (pre-waveshaper gain) in dB
    drive_db: CachePadded<AtomicU32>,

    /// Output trim (post-waveshaper gain) in dB
    output_db: CachePadded<AtomicU32>,

    /// Dry/wet mix in percent
    mix_percent: CachePadded<AtomicU32>,

    /// Tone value in the engine's committed design domain
    tone_value: CachePadded<AtomicU32>,

    /// Noise amount in percent
    noise_percent: CachePadded<AtomicU32>,

    /// Noise high-pass cutoff in Hz
    noise_hp_hz: CachePadded<AtomicU32>,
}

/// f32 values travel through the cells as raw bits
#[inline]
fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

#[inline]
fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

impl SaturationControls {
    /// Create a bank seeded with the given parameter values
    pub fn new(initial: SaturationParams) -> Self {
        let cell = |value: f32| CachePadded::new(AtomicU32::new(value.to_bits()));
        Self {
            inner: Arc::new(ControlBlock {
                drive_db: cell(initial.drive_db),
                output_db: cell(initial.output_db),
                mix_percent: cell(initial.mix_percent),
                tone_value: cell(initial.tone_value),
                noise_percent: cell(initial.noise_percent),
                noise_hp_hz: cell(initial.noise_hp_hz),
            }),
        }
    }

    pub fn set_drive_db(&self, value: f32) {
        store_f32(&self.inner.drive_db, value);
    }

    pub fn drive_db(&self) -> f32 {
        load_f32(&self.inner.drive_db)
    }

    pub fn set_output_db(&self, value: f32) {
        store_f32(&self.inner.output_db, value);
    }

    pub fn output_db(&self) -> f32 {
        load_f32(&self.inner.output_db)
    }

    pub fn set_mix_percent(&self, value: f32) {
        store_f32(&self.inner.mix_percent, value);
    }

    pub fn mix_percent(&self) -> f32 {
        load_f32(&self.inner.mix_percent)
    }

    pub fn set_tone_value(&self, value: f32) {
        store_f32(&self.inner.tone_value, value);
    }

    pub fn tone_value(&self) -> f32 {
        load_f32(&self.inner.tone_value)
    }

    pub fn set_noise_percent(&self, value: f32) {
        store_f32(&self.inner.noise_percent, value);
    }

    pub fn noise_percent(&self) -> f32 {
        load_f32(&self.inner.noise_percent)
    }

    pub fn set_noise_hp_hz(&self, value: f32) {
        store_f32(&self.inner.noise_hp_hz, value);
    }

    pub fn noise_hp_hz(&self) -> f32 {
        load_f32(&self.inner.noise_hp_hz)
    }

    /// Publish a full parameter set
    pub fn push(&self, params: &SaturationParams) {
        self.set_drive_db(params.drive_db);
        self.set_output_db(params.output_db);
        self.set_mix_percent(params.mix_percent);
        self.set_tone_value(params.tone_value);
        self.set_noise_percent(params.noise_percent);
        self.set_noise_hp_hz(params.noise_hp_hz);
    }

    /// Read all parameters as one struct
    ///
    /// Fields are read one by one; a concurrent `push` may be observed
    /// partially, which block-boundary application tolerates.
    pub fn snapshot(&self) -> SaturationParams {
        SaturationParams {
            drive_db: self.drive_db(),
            output_db: self.output_db(),
            mix_percent: self.mix_percent(),
            tone_value: self.tone_value(),
            noise_percent: self.noise_percent(),
            noise_hp_hz: self.noise_hp_hz(),
        }
    }
}

impl Default for SaturationControls {
    fn default() -> Self {
        Self::new(SaturationParams::default())
    }
}
