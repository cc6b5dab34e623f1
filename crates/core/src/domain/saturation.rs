//! Tube-style saturation processor
//!
//! This module provides:
//! - `SaturationParams`: the complete user-facing parameter set
//! - `DryWetMixer`: linear crossfade against the unprocessed signal
//! - `SaturationEngine`: the block processor tying every stage together
//!
//! Processing pipeline, applied in place per block:
//! 1. Keep a dry copy of the input
//! 2. Smoothed drive gain into the waveshaper
//! 3. Tube-style waveshaping, sample by sample
//! 4. Tone filtering (low-pass or tilt, committed at construction)
//! 5. Signal-dependent noise injection (skipped entirely at amount 0)
//! 6. Smoothed output trim
//! 7. Dry/wet blend
//!
//! The engine follows a prepare/process lifecycle: `prepare` sizes all
//! per-channel state for a sample rate, channel count and maximum block
//! length; `process` then runs allocation-free on planar buffers.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::domain::audio::{AudioError, ProcessSpec, Result};
use crate::domain::dsp::{ranges, tube_shape, SmoothedGain, ToneMode, ToneShaper};

pub mod control;
pub mod noise;

pub use control::SaturationControls;
pub use noise::{NoiseInjector, PinkNoiseGenerator, DEFAULT_NOISE_HP_HZ, DEFAULT_NOISE_SEED};

// ============================================================================
// PARAMETERS
// ============================================================================

/// Complete saturation parameter set
///
/// All fields are plain numbers so a host can persist and restore them
/// verbatim. Values are clamped to their documented ranges when applied
/// to an engine; the struct itself stores what it is given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaturationParams {
    /// Drive into the waveshaper in dB (0 to 40)
    pub drive_db: f32,
    /// Output trim after the waveshaper in dB (-24 to 6)
    pub output_db: f32,
    /// Dry/wet mix in percent (100 = fully processed)
    pub mix_percent: f32,
    /// Tone value in the committed design's domain: cutoff in Hz for the
    /// low-pass design, -1..1 for the tilt design
    pub tone_value: f32,
    /// Noise amount in percent (0 disables the noise stage)
    pub noise_percent: f32,
    /// Noise high-pass cutoff in Hz (20 to 1000)
    pub noise_hp_hz: f32,
}

impl SaturationParams {
    /// Defaults for a given tone design: moderate drive, fully wet,
    /// neutral tone, no noise
    pub fn default_for(mode: ToneMode) -> Self {
        let tone_value = match mode {
            ToneMode::LowPass => ToneShaper::DEFAULT_CUTOFF_HZ,
            ToneMode::Tilt => 0.0,
        };
        Self {
            drive_db: 10.0,
            output_db: 0.0,
            mix_percent: 100.0,
            tone_value,
            noise_percent: 0.0,
            noise_hp_hz: DEFAULT_NOISE_HP_HZ,
        }
    }
}

impl Default for SaturationParams {
    fn default() -> Self {
        Self::default_for(ToneMode::Tilt)
    }
}

// ============================================================================
// DRY/WET MIXER
// ============================================================================

/// Linear crossfade between the stored dry signal and the processed buffer
///
/// `output = (1 - mix) * dry + mix * wet`. The endpoints short-circuit:
/// fully wet skips the blend, fully dry copies the stored input back so
/// the output is bit-identical to what came in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryWetMixer {
    mix_percent: f32,
}

impl DryWetMixer {
    /// Create a fully wet mixer
    pub fn new() -> Self {
        Self { mix_percent: 100.0 }
    }

    /// Set the mix in percent, clamped to 0-100
    pub fn set_mix_percent(&mut self, percent: f32) {
        self.mix_percent = percent.clamp(ranges::MIX_PERCENT_MIN, ranges::MIX_PERCENT_MAX);
    }

    /// Current mix in percent
    pub fn mix_percent(&self) -> f32 {
        self.mix_percent
    }

    /// Whether the blend leaves the processed buffer untouched
    pub fn is_fully_wet(&self) -> bool {
        self.mix_percent >= ranges::MIX_PERCENT_MAX
    }

    /// Whether the output is the dry signal alone
    pub fn is_fully_dry(&self) -> bool {
        self.mix_percent <= ranges::MIX_PERCENT_MIN
    }

    /// Blend the dry copy into the first `samples` of every channel
    pub fn blend<B: AsMut<[f32]>>(&self, dry: &[Vec<f32>], buffer: &mut [B], samples: usize) {
        if self.is_fully_wet() {
            return;
        }

        if self.is_fully_dry() {
            // Bit-exact restore of the input
            for (channel, dry_channel) in buffer.iter_mut().zip(dry.iter()) {
                channel.as_mut()[..samples].copy_from_slice(&dry_channel[..samples]);
            }
            return;
        }

        let mix = self.mix_percent / 100.0;
        let dry_gain = 1.0 - mix;
        for (channel, dry_channel) in buffer.iter_mut().zip(dry.iter()) {
            let wet = &mut channel.as_mut()[..samples];
            for (sample, &dry_sample) in wet.iter_mut().zip(dry_channel.iter()) {
                *sample = dry_gain * dry_sample + mix * *sample;
            }
        }
    }
}

impl Default for DryWetMixer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SATURATION ENGINE
// ============================================================================

/// Block-based tube saturation processor
///
/// Owns every stage of the pipeline plus the dry-signal scratch buffer.
/// The tone design is committed at construction; all other parameters are
/// adjustable at any time and take effect at the next block, gain changes
/// ramping over 20 ms.
///
/// `prepare` must succeed before `process`; `reset` clears transient
/// state (filter memory, envelopes, ramps) without touching parameters.
#[derive(Debug, Clone)]
pub struct SaturationEngine {
    /// Set by a successful `prepare`; `None` means not ready to process
    spec: Option<ProcessSpec>,
    /// Authoritative clamped parameter values
    params: SaturationParams,
    input_gain: SmoothedGain,
    output_gain: SmoothedGain,
    tone: ToneShaper,
    noise: NoiseInjector,
    mixer: DryWetMixer,
    /// Per-channel dry copy, sized to `max_block` at prepare time
    dry_buffer: Vec<Vec<f32>>,
}

impl SaturationEngine {
    /// Create an engine with the tilt tone design and default parameters
    ///
    /// The tilt shelf is the default build's tone control; use
    /// [`with_tone_mode`](Self::with_tone_mode) to commit to the low-pass
    /// design instead.
    pub fn new() -> Self {
        Self::with_tone_mode(ToneMode::Tilt)
    }

    /// Create an engine committed to the given tone design
    pub fn with_tone_mode(mode: ToneMode) -> Self {
        let params = SaturationParams::default_for(mode);
        let mut engine = Self {
            spec: None,
            params,
            input_gain: SmoothedGain::default(),
            output_gain: SmoothedGain::default(),
            tone: ToneShaper::new(mode),
            noise: NoiseInjector::new(),
            mixer: DryWetMixer::new(),
            dry_buffer: Vec::new(),
        };
        engine.push_params();
        engine
    }

    /// Forward the stored parameters into every stage
    fn push_params(&mut self) {
        self.input_gain.set_gain_db(self.params.drive_db);
        self.output_gain.set_gain_db(self.params.output_db);
        self.mixer.set_mix_percent(self.params.mix_percent);
        self.tone.set_value(self.params.tone_value);
        self.params.tone_value = self.tone.value();
        self.noise.set_amount_percent(self.params.noise_percent);
        self.noise.set_hp_cutoff(self.params.noise_hp_hz);
    }

    /// The tone design this engine is committed to
    pub fn tone_mode(&self) -> ToneMode {
        self.tone.mode()
    }

    /// Whether `prepare` has succeeded
    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    /// The processing context adopted by the last successful `prepare`
    pub fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }

    /// Current parameter values after clamping
    pub fn params(&self) -> SaturationParams {
        self.params
    }

    /// Size all per-channel state for a processing context
    ///
    /// Gains snap to their targets instead of ramping, so the first block
    /// after prepare is already at the configured levels. Transient state
    /// is cleared.
    pub fn prepare(&mut self, spec: ProcessSpec) -> Result<()> {
        if !spec.is_valid() {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate {} Hz, {} channels, max block {}",
                spec.sample_rate, spec.channels, spec.max_block
            )));
        }

        let sample_rate = spec.sample_rate as f32;
        self.input_gain.prepare(sample_rate);
        self.output_gain.prepare(sample_rate);
        self.tone.prepare(sample_rate, spec.channels);
        self.noise.prepare(sample_rate, spec.channels);
        self.dry_buffer = vec![vec![0.0; spec.max_block]; spec.channels];
        self.spec = Some(spec);

        debug!(
            "saturation engine prepared: {:.0} Hz, {} channels, max block {}",
            spec.sample_rate, spec.channels, spec.max_block
        );
        Ok(())
    }

    /// Clear transient state: filter memory, noise envelopes, gain ramps
    ///
    /// Parameters and prepared sizing are untouched.
    pub fn reset(&mut self) {
        self.input_gain.reset();
        self.output_gain.reset();
        self.tone.reset();
        self.noise.reset();
        trace!("saturation engine state cleared");
    }

    /// Set the drive into the waveshaper in dB
    pub fn set_drive_db(&mut self, db: f32) {
        if !db.is_finite() {
            return;
        }
        let db = db.clamp(ranges::DRIVE_DB_MIN, ranges::DRIVE_DB_MAX);
        if db != self.params.drive_db {
            self.params.drive_db = db;
            self.input_gain.set_gain_db(db);
            trace!("drive set: {:.1} dB", db);
        }
    }

    /// Set the output trim in dB
    pub fn set_output_db(&mut self, db: f32) {
        if !db.is_finite() {
            return;
        }
        let db = db.clamp(ranges::OUTPUT_DB_MIN, ranges::OUTPUT_DB_MAX);
        if db != self.params.output_db {
            self.params.output_db = db;
            self.output_gain.set_gain_db(db);
            trace!("output set: {:.1} dB", db);
        }
    }

    /// Set the dry/wet mix in percent
    pub fn set_mix_percent(&mut self, percent: f32) {
        if !percent.is_finite() {
            return;
        }
        let percent = percent.clamp(ranges::MIX_PERCENT_MIN, ranges::MIX_PERCENT_MAX);
        if percent != self.params.mix_percent {
            self.params.mix_percent = percent;
            self.mixer.set_mix_percent(percent);
            trace!("mix set: {:.0}%", percent);
        }
    }

    /// Set the tone value in the committed design's domain
    pub fn set_tone_value(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        self.tone.set_value(value);
        self.params.tone_value = self.tone.value();
    }

    /// Set the noise amount in percent
    pub fn set_noise_percent(&mut self, percent: f32) {
        if !percent.is_finite() {
            return;
        }
        let percent = percent.clamp(ranges::NOISE_PERCENT_MIN, ranges::NOISE_PERCENT_MAX);
        if percent != self.params.noise_percent {
            self.params.noise_percent = percent;
            self.noise.set_amount_percent(percent);
            trace!("noise set: {:.0}%", percent);
        }
    }

    /// Set the noise-path high-pass cutoff in Hz
    pub fn set_noise_hp_hz(&mut self, cutoff_hz: f32) {
        if !cutoff_hz.is_finite() {
            return;
        }
        let cutoff_hz = cutoff_hz.clamp(ranges::NOISE_HP_HZ_MIN, ranges::NOISE_HP_HZ_MAX);
        if cutoff_hz != self.params.noise_hp_hz {
            self.params.noise_hp_hz = cutoff_hz;
            self.noise.set_hp_cutoff(cutoff_hz);
        }
    }

    /// Restart the noise generators from a new base seed
    ///
    /// Mainly for reproducible rendering; channel generators are seeded
    /// `seed + channel`.
    pub fn set_noise_seed(&mut self, seed: u64) {
        self.noise.set_seed(seed);
    }

    /// Apply a full parameter set through the individual setters
    pub fn set_params(&mut self, params: SaturationParams) {
        self.set_drive_db(params.drive_db);
        self.set_output_db(params.output_db);
        self.set_mix_percent(params.mix_percent);
        self.set_tone_value(params.tone_value);
        self.set_noise_percent(params.noise_percent);
        self.set_noise_hp_hz(params.noise_hp_hz);
    }

    /// Adopt the latest values published through a control bank
    ///
    /// Intended to run once per block on the audio thread.
    pub fn apply_controls(&mut self, controls: &SaturationControls) {
        self.set_params(controls.snapshot());
    }

    /// Process planar audio in place
    ///
    /// Each element of `buffer` is one channel. Channels beyond the
    /// prepared count are left untouched; the shortest channel length
    /// bounds the processed region. Fails if the engine is unprepared or
    /// the block exceeds the prepared maximum.
    pub fn process<B: AsMut<[f32]>>(&mut self, buffer: &mut [B]) -> Result<()> {
        let spec = self.spec.ok_or(AudioError::NotPrepared)?;

        let channels = buffer.len().min(spec.channels);
        let buffer = &mut buffer[..channels];
        let samples = buffer
            .iter_mut()
            .map(|channel| channel.as_mut().len())
            .min()
            .unwrap_or(0);
        if samples == 0 {
            return Ok(());
        }
        if samples > spec.max_block {
            return Err(AudioError::BlockTooLarge(samples, spec.max_block));
        }

        if !self.mixer.is_fully_wet() {
            for (dry, channel) in self.dry_buffer.iter_mut().zip(buffer.iter_mut()) {
                dry[..samples].copy_from_slice(&channel.as_mut()[..samples]);
            }
        }

        // The wet path always runs, even fully dry, so filter and envelope
        // state stays continuous across mix changes
        self.input_gain.process(buffer, samples);

        for channel in buffer.iter_mut() {
            for sample in &mut channel.as_mut()[..samples] {
                *sample = tube_shape(*sample);
            }
        }

        self.tone.process(buffer, samples);

        if self.noise.is_active() {
            self.noise.process(buffer, samples);
        }

        self.output_gain.process(buffer, samples);

        self.mixer.blend(&self.dry_buffer[..channels], buffer, samples);

        Ok(())
    }
}

impl Default for SaturationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
