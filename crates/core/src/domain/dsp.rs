//! Digital signal processing building blocks for the saturation engine
//!
//! This module provides:
//! - Tube-style nonlinear waveshaping transfer function
//! - Click-free smoothed gain stages (20 ms linear ramp)
//! - Tone filters: biquad low-pass and first-order tilt shelf
//! - One-pole high-pass and envelope follower used by the noise path
//!
//! All processing is in-place on f32 buffers with:
//! - Zero allocations in the hot path
//! - Per-channel filter state in dense arrays sized at prepare time
//! - Coefficients recomputed only when a parameter actually changes

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Parameter constraints for the saturation processor
///
/// All user-facing parameters are clamped to these ranges at the setter
/// boundary so invalid values never reach coefficient math.
pub mod ranges {
    /// Drive (pre-waveshaper gain) range in dB
    pub const DRIVE_DB_MIN: f32 = 0.0;
    pub const DRIVE_DB_MAX: f32 = 40.0;

    /// Output (post-waveshaper gain) range in dB
    pub const OUTPUT_DB_MIN: f32 = -24.0;
    pub const OUTPUT_DB_MAX: f32 = 6.0;

    /// Dry/wet mix range in percent
    pub const MIX_PERCENT_MIN: f32 = 0.0;
    pub const MIX_PERCENT_MAX: f32 = 100.0;

    /// Noise amount range in percent
    pub const NOISE_PERCENT_MIN: f32 = 0.0;
    pub const NOISE_PERCENT_MAX: f32 = 100.0;

    /// Noise high-pass cutoff range in Hz
    pub const NOISE_HP_HZ_MIN: f32 = 20.0;
    pub const NOISE_HP_HZ_MAX: f32 = 1000.0;

    /// Tone low-pass cutoff range in Hz
    pub const TONE_CUTOFF_HZ_MIN: f32 = 1000.0;
    pub const TONE_CUTOFF_HZ_MAX: f32 = 20000.0;

    /// Tone tilt range (dimensionless, 0 = flat)
    pub const TILT_MIN: f32 = -1.0;
    pub const TILT_MAX: f32 = 1.0;
}

// ============================================================================
// WAVESHAPER (Tube-style nonlinear transfer function)
// ============================================================================

/// Weight of the even-harmonic term in the transfer function
const TUBE_BIAS: f32 = 0.15;

/// Tube-style waveshaping transfer function
///
/// `shape(x) = tanh(x) + 0.15 * x^2 / (1 + |x|)`
///
/// The squared term is non-negative for either input sign, so the curve is
/// deliberately not odd-symmetric: it injects even-order harmonics (2nd,
/// 4th, ...), the asymmetry characteristic of tube stages. The `1 + |x|`
/// denominator keeps the squared term from diverging at extreme drive.
/// Stateless and total over all finite audio-range inputs.
#[inline]
#[must_use]
pub fn tube_shape(x: f32) -> f32 {
    x.tanh() + TUBE_BIAS * (x * x) / (1.0 + x.abs())
}

// ============================================================================
// SMOOTHED GAIN (Click-free gain stage)
// ============================================================================

/// Linear gain stage with a fixed-duration ramp between targets
///
/// Stepping gain discontinuously between blocks is audible as a click, so a
/// new target is approached linearly in the linear-gain domain over the ramp
/// duration. The ramp advances once per sample frame; every channel of a
/// frame receives the same gain value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothedGain {
    sample_rate: f32,
    ramp_seconds: f32,
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
}

impl SmoothedGain {
    /// Default ramp duration in seconds
    pub const DEFAULT_RAMP_SECONDS: f32 = 0.02;

    /// Create a gain stage at unity with the given ramp duration
    pub fn new(ramp_seconds: f32) -> Self {
        Self {
            sample_rate: 0.0,
            ramp_seconds,
            current: 1.0,
            target: 1.0,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Bind the stage to a sample rate and snap to the current target
    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.reset();
    }

    /// Snap the applied gain to the target, discarding any ramp in progress
    pub fn reset(&mut self) {
        self.current = self.target;
        self.remaining = 0;
    }

    /// Set the target gain in decibels
    pub fn set_gain_db(&mut self, db: f32) {
        self.set_gain_linear(crate::domain::audio::db_to_gain(db));
    }

    /// Set the target gain as a linear factor
    ///
    /// Non-finite targets are ignored and re-setting the current target is a
    /// no-op; without a valid sample rate the gain snaps immediately (no ramp
    /// length is defined).
    pub fn set_gain_linear(&mut self, gain: f32) {
        if !gain.is_finite() || gain == self.target {
            return;
        }
        self.target = gain;
        if self.sample_rate > 0.0 {
            let steps = (self.ramp_seconds * self.sample_rate).round() as u32;
            if steps == 0 {
                self.current = gain;
                self.remaining = 0;
            } else {
                self.step = (gain - self.current) / steps as f32;
                self.remaining = steps;
            }
        } else {
            self.current = gain;
            self.remaining = 0;
        }
    }

    /// Gain applied to the most recent sample
    pub fn current_gain(&self) -> f32 {
        self.current
    }

    /// Gain the stage is ramping towards
    pub fn target_gain(&self) -> f32 {
        self.target
    }

    /// Whether a ramp is still in progress
    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }

    /// Advance the ramp by one sample frame and return the gain to apply
    #[inline]
    fn next_gain(&mut self) -> f32 {
        if self.remaining > 0 {
            self.current += self.step;
            self.remaining -= 1;
            if self.remaining == 0 {
                // Land exactly on the target, discarding accumulated rounding
                self.current = self.target;
            }
        }
        self.current
    }

    /// Apply the gain to the first `samples` of every channel in-place
    pub fn process<B: AsMut<[f32]>>(&mut self, buffer: &mut [B], samples: usize) {
        if self.remaining == 0 {
            let gain = self.current;
            if gain == 1.0 {
                return;
            }
            for channel in buffer.iter_mut() {
                for sample in &mut channel.as_mut()[..samples] {
                    *sample *= gain;
                }
            }
            return;
        }

        // Ramping: frame-outer loop so all channels see the same gain value
        for frame in 0..samples {
            let gain = self.next_gain();
            for channel in buffer.iter_mut() {
                channel.as_mut()[frame] *= gain;
            }
        }
    }
}

impl Default for SmoothedGain {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RAMP_SECONDS)
    }
}

// ============================================================================
// BIQUAD FILTER (Low-level IIR filter for the low-pass tone variant)
// ============================================================================

/// Biquad filter coefficients
///
/// Direct Form I implementation for numerical stability. Coefficients are
/// pre-computed once per parameter change, never per sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Calculate coefficients for a second-order low-pass filter
    ///
    /// Standard bilinear-transform design. Used to tame the harsh upper
    /// harmonics generated by saturation.
    ///
    /// # Parameters
    /// - `sample_rate`: Audio sample rate in Hz
    /// - `freq`: Corner frequency in Hz (held below Nyquist)
    /// - `q`: Q factor, 0.707 for a Butterworth response
    #[must_use]
    pub fn low_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        // Keep the corner below Nyquist so the design stays stable at low
        // sample rates
        let freq = freq.min(0.49 * sample_rate);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let b2 = (1.0 - cos_w0) / 2.0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Stateful biquad filter using Direct Form I
///
/// Direct Form I is chosen over Transposed Direct Form II for:
/// - Better numerical stability with low-frequency filters
/// - Easier coefficient updates without artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl BiquadFilter {
    /// Create a new biquad filter with given coefficients
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Create a bypass filter (unity gain)
    pub fn bypass() -> Self {
        Self::new(BiquadCoeffs::default())
    }

    /// Update filter coefficients
    ///
    /// Can be called in real-time for parameter changes.
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    /// Process a single sample
    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let y = self.coeffs.b0 * x
            + self.coeffs.b1 * self.x1
            + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Process a buffer of samples
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

// ============================================================================
// TILT SHELF (First-order tone filter pivoting around a fixed frequency)
// ============================================================================

/// First-order tilt-shelf coefficients
///
/// Bilinear transform of the analog prototype
/// `H(s) = (s + wc*g) / (s + wc/g)` with `g = 10^(tilt*6/20)` and
/// `wc = 2*pi*800/sampleRate`. Positive tilt raises the band below the
/// pivot and lowers the band above it (DC gain g^2, unity at Nyquist).
/// At tilt = 0 the coefficients reduce to the identity filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TiltCoeffs {
    pub a0: f32,
    pub a1: f32,
    pub b1: f32,
}

impl Default for TiltCoeffs {
    fn default() -> Self {
        // Identity (flat response)
        Self {
            a0: 1.0,
            a1: 0.0,
            b1: 0.0,
        }
    }
}

impl TiltCoeffs {
    /// Pivot frequency of the shelf in Hz
    pub const PIVOT_HZ: f32 = 800.0;
    /// Gain span of the shelf at full tilt, in dB
    pub const RANGE_DB: f32 = 6.0;

    /// Calculate shelf coefficients for a tilt in [-1, 1]
    #[must_use]
    pub fn from_tilt(sample_rate: f32, tilt: f32) -> Self {
        let tilt = tilt.clamp(ranges::TILT_MIN, ranges::TILT_MAX);
        let g = 10.0_f32.powf(tilt * Self::RANGE_DB / 20.0);
        let wc = 2.0 * std::f32::consts::PI * Self::PIVOT_HZ / sample_rate;
        let norm = 1.0 / (1.0 + wc / g);

        Self {
            a0: (1.0 + wc * g) * norm,
            a1: (wc * g - 1.0) * norm,
            b1: (wc / g - 1.0) * norm,
        }
    }
}

/// Stateful first-order tilt-shelf filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiltFilter {
    coeffs: TiltCoeffs,
    x1: f32,
    y1: f32,
}

impl TiltFilter {
    /// Create a new tilt filter with given coefficients
    pub fn new(coeffs: TiltCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            y1: 0.0,
        }
    }

    /// Create a flat (identity) filter
    pub fn flat() -> Self {
        Self::new(TiltCoeffs::default())
    }

    /// Update filter coefficients
    pub fn set_coeffs(&mut self, coeffs: TiltCoeffs) {
        self.coeffs = coeffs;
    }

    /// Process a single sample
    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        // y[n] = a0*x[n] + a1*x[n-1] - b1*y[n-1]
        let y = self.coeffs.a0 * x + self.coeffs.a1 * self.x1 - self.coeffs.b1 * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }

    /// Process a buffer of samples
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

// ============================================================================
// NOISE HIGH-PASS (One-pole filter applied to the noise signal only)
// ============================================================================

/// First-order RC-style high-pass filter
///
/// `y[n] = alpha * (y[n-1] + x[n] - x[n-1])` with
/// `alpha = RC / (RC + dt)`, `RC = 1 / (2*pi*fc)`, `dt = 1 / sampleRate`.
/// Removes low-end rumble from the synthesized noise; the audio signal
/// itself never passes through this filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseHighPass {
    alpha: f32,
    x1: f32,
    y1: f32,
}

impl NoiseHighPass {
    /// Create a high-pass with zeroed state; silent until an alpha is set
    pub fn new() -> Self {
        Self {
            alpha: 0.0,
            x1: 0.0,
            y1: 0.0,
        }
    }

    /// Compute the smoothing factor for a cutoff at a sample rate
    #[must_use]
    pub fn alpha_for(sample_rate: f32, cutoff_hz: f32) -> f32 {
        let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff_hz);
        let dt = 1.0 / sample_rate;
        rc / (rc + dt)
    }

    /// Update the smoothing factor, keeping filter state
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let y = self.alpha * (self.y1 + x - self.x1);
        self.x1 = x;
        self.y1 = y;
        y
    }

    /// Reset filter state, keeping the configured alpha
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

impl Default for NoiseHighPass {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ENVELOPE FOLLOWER (Asymmetric one-pole level tracker)
// ============================================================================

/// Envelope follower coefficients with distinct attack and release
///
/// Tracks smoothed absolute signal level: a fast coefficient when the level
/// rises, a slow one when it falls. Coefficients are pre-computed as
/// `exp(-1 / (tau * sampleRate))`; state lives with the owner so one
/// follower can serve any number of channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeFollower {
    attack_coeff: f32,
    release_coeff: f32,
}

impl EnvelopeFollower {
    /// Create a follower for the given time constants
    ///
    /// Without a valid sample rate both coefficients are zero and the
    /// envelope tracks the input level instantly.
    pub fn new(sample_rate: f32, attack_sec: f32, release_sec: f32) -> Self {
        if sample_rate > 0.0 {
            Self {
                attack_coeff: (-1.0 / (attack_sec * sample_rate)).exp(),
                release_coeff: (-1.0 / (release_sec * sample_rate)).exp(),
            }
        } else {
            Self {
                attack_coeff: 0.0,
                release_coeff: 0.0,
            }
        }
    }

    /// Advance one envelope state by one sample and return the new value
    #[inline]
    pub fn next(&self, envelope: f32, sample: f32) -> f32 {
        let level = sample.abs();

        // Attack coefficient for rising level, release for falling
        let coeff = if level > envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };

        coeff * envelope + (1.0 - coeff) * level
    }
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self {
            attack_coeff: 0.0,
            release_coeff: 0.0,
        }
    }
}

// ============================================================================
// TONE SHAPER (Strategy over the two tone-control designs)
// ============================================================================

/// Which tone-control design a build commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToneMode {
    /// Movable second-order low-pass, cutoff 1-20 kHz
    LowPass,
    /// First-order tilt shelf around 800 Hz, tilt -1..1
    Tilt,
}

/// Spectral tone control applied after waveshaping
///
/// Two interchangeable designs live behind this type; an instance commits
/// to one at construction and its single `set_value` setter is interpreted
/// in that design's domain (cutoff in Hz, or dimensionless tilt). The
/// filter always runs; the tilt design is transparent at center rather
/// than bypassed.
#[derive(Debug, Clone)]
pub struct ToneShaper {
    kind: ToneKind,
}

#[derive(Debug, Clone)]
enum ToneKind {
    LowPass {
        sample_rate: f32,
        cutoff_hz: f32,
        filters: Vec<BiquadFilter>,
    },
    Tilt {
        sample_rate: f32,
        tilt: f32,
        filters: Vec<TiltFilter>,
    },
}

impl ToneShaper {
    /// Default low-pass cutoff in Hz
    pub const DEFAULT_CUTOFF_HZ: f32 = 12000.0;
    /// Butterworth Q for the low-pass design
    pub const TONE_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

    /// Create a tone shaper committed to the given design
    pub fn new(mode: ToneMode) -> Self {
        let kind = match mode {
            ToneMode::LowPass => ToneKind::LowPass {
                sample_rate: 0.0,
                cutoff_hz: Self::DEFAULT_CUTOFF_HZ,
                filters: Vec::new(),
            },
            ToneMode::Tilt => ToneKind::Tilt {
                sample_rate: 0.0,
                tilt: 0.0,
                filters: Vec::new(),
            },
        };
        Self { kind }
    }

    /// The design this instance is committed to
    pub fn mode(&self) -> ToneMode {
        match self.kind {
            ToneKind::LowPass { .. } => ToneMode::LowPass,
            ToneKind::Tilt { .. } => ToneMode::Tilt,
        }
    }

    /// Current tone value (cutoff in Hz, or tilt)
    pub fn value(&self) -> f32 {
        match self.kind {
            ToneKind::LowPass { cutoff_hz, .. } => cutoff_hz,
            ToneKind::Tilt { tilt, .. } => tilt,
        }
    }

    /// Size per-channel filter state and recompute coefficients
    pub fn prepare(&mut self, sample_rate: f32, channels: usize) {
        match &mut self.kind {
            ToneKind::LowPass {
                sample_rate: sr,
                filters,
                ..
            } => {
                *sr = sample_rate;
                *filters = vec![BiquadFilter::bypass(); channels];
            }
            ToneKind::Tilt {
                sample_rate: sr,
                filters,
                ..
            } => {
                *sr = sample_rate;
                *filters = vec![TiltFilter::flat(); channels];
            }
        }
        self.update_coefficients();
    }

    /// Set the tone value in the committed design's domain
    ///
    /// Clamped to the design's range; non-finite values are ignored.
    /// Recomputes coefficients only when the value actually changes.
    pub fn set_value(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        let changed = match &mut self.kind {
            ToneKind::LowPass { cutoff_hz, .. } => {
                let value = value.clamp(ranges::TONE_CUTOFF_HZ_MIN, ranges::TONE_CUTOFF_HZ_MAX);
                let changed = value != *cutoff_hz;
                *cutoff_hz = value;
                changed
            }
            ToneKind::Tilt { tilt, .. } => {
                let value = value.clamp(ranges::TILT_MIN, ranges::TILT_MAX);
                let changed = value != *tilt;
                *tilt = value;
                changed
            }
        };
        if changed {
            self.update_coefficients();
        }
    }

    /// Recompute and distribute filter coefficients
    ///
    /// With a degenerate sample rate the current (stale or identity)
    /// coefficients are retained.
    fn update_coefficients(&mut self) {
        match &mut self.kind {
            ToneKind::LowPass {
                sample_rate,
                cutoff_hz,
                filters,
            } => {
                if *sample_rate <= 0.0 {
                    return;
                }
                let coeffs = BiquadCoeffs::low_pass(*sample_rate, *cutoff_hz, Self::TONE_Q);
                for filter in filters.iter_mut() {
                    filter.set_coeffs(coeffs);
                }
                trace!("tone low-pass updated: cutoff {:.0} Hz", cutoff_hz);
            }
            ToneKind::Tilt {
                sample_rate,
                tilt,
                filters,
            } => {
                if *sample_rate <= 0.0 {
                    return;
                }
                let coeffs = TiltCoeffs::from_tilt(*sample_rate, *tilt);
                for filter in filters.iter_mut() {
                    filter.set_coeffs(coeffs);
                }
                trace!("tone tilt updated: {:.2}", tilt);
            }
        }
    }

    /// Clear per-channel filter state, keeping coefficients
    pub fn reset(&mut self) {
        match &mut self.kind {
            ToneKind::LowPass { filters, .. } => {
                for filter in filters.iter_mut() {
                    filter.reset();
                }
            }
            ToneKind::Tilt { filters, .. } => {
                for filter in filters.iter_mut() {
                    filter.reset();
                }
            }
        }
    }

    /// Filter the first `samples` of every channel in-place
    pub fn process<B: AsMut<[f32]>>(&mut self, buffer: &mut [B], samples: usize) {
        match &mut self.kind {
            ToneKind::LowPass { filters, .. } => {
                for (channel, filter) in buffer.iter_mut().zip(filters.iter_mut()) {
                    filter.process(&mut channel.as_mut()[..samples]);
                }
            }
            ToneKind::Tilt { filters, .. } => {
                for (channel, filter) in buffer.iter_mut().zip(filters.iter_mut()) {
                    filter.process(&mut channel.as_mut()[..samples]);
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
