//! Pink-noise synthesis and signal-dependent noise injection
//!
//! This module provides:
//! - Voss-McCartney pink noise generator (-3 dB/octave spectrum)
//! - Per-channel noise injector whose level follows the signal envelope
//!
//! Noise modeling conventions:
//! - One generator per channel, seeded `base + channel`, so channels are
//!   decorrelated yet every run with the same seed is reproducible
//! - The injected level rides the signal envelope on top of a constant
//!   floor, with the amount control as a hard ceiling
//! - A one-pole high-pass shapes the noise path only, never the signal

use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::trace;

use crate::domain::audio::db_to_gain;
use crate::domain::dsp::{ranges, EnvelopeFollower, NoiseHighPass};

/// Default seed for noise generators when none is supplied
pub const DEFAULT_NOISE_SEED: u64 = 0x5EED;

/// Number of octave rows in the Voss-McCartney generator
const PINK_ROWS: usize = 12;

/// Output normalizer: rows plus the per-sample white component
const PINK_NORMALIZER: f32 = 1.0 / (PINK_ROWS as f32 + 1.0);

/// Envelope follower time constants for the noise level
const NOISE_ATTACK_SECONDS: f32 = 0.001;
const NOISE_RELEASE_SECONDS: f32 = 0.1;

/// Injected noise gain span: amount 0 maps to the floor, amount 1 to the max
const NOISE_GAIN_MIN_DB: f32 = -60.0;
const NOISE_GAIN_MAX_DB: f32 = -30.0;

/// Level mix between the constant floor and the envelope-following part
const NOISE_FLOOR_WEIGHT: f32 = 0.3;
const NOISE_ENVELOPE_WEIGHT: f32 = 0.7;

/// Default cutoff for the noise-path high-pass in Hz
pub const DEFAULT_NOISE_HP_HZ: f32 = 100.0;

// ============================================================================
// PINK NOISE GENERATOR (Voss-McCartney algorithm)
// ============================================================================

/// Pink noise generator with a -3 dB/octave power spectrum
///
/// Voss-McCartney: `PINK_ROWS` independent random rows are held, and on each
/// sample the rows whose bit flipped in a running counter are redrawn, so
/// row `k` updates every `2^k` samples. The sum of all rows plus a fresh
/// white sample, normalized by the source count, yields pink noise.
///
/// Each call draws at least one random value (the white component), so two
/// generators with the same seed stay in lockstep only while they process
/// the same number of samples.
#[derive(Debug, Clone)]
pub struct PinkNoiseGenerator {
    rng: SmallRng,
    rows: [f32; PINK_ROWS],
    running_sum: f32,
    counter: u32,
}

impl PinkNoiseGenerator {
    /// Create a generator with a deterministic seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            rows: [0.0; PINK_ROWS],
            running_sum: 0.0,
            counter: 0,
        }
    }

    /// Produce the next pink noise sample in [-1.0, 1.0]
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let previous = self.counter;
        self.counter = self.counter.wrapping_add(1);
        let flipped = previous ^ self.counter;

        for (row, value) in self.rows.iter_mut().enumerate() {
            if flipped & (1 << row) != 0 {
                let drawn = self.rng.gen::<f32>() * 2.0 - 1.0;
                self.running_sum += drawn - *value;
                *value = drawn;
            }
        }

        let white = self.rng.gen::<f32>() * 2.0 - 1.0;
        (self.running_sum + white) * PINK_NORMALIZER
    }

    /// Zero the rows, sum and counter
    ///
    /// The random stream itself is not rewound; reseed for that.
    pub fn reset(&mut self) {
        self.rows = [0.0; PINK_ROWS];
        self.running_sum = 0.0;
        self.counter = 0;
    }

    /// Restart the generator from a new seed
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
        self.reset();
    }
}

// ============================================================================
// NOISE INJECTOR (Signal-dependent noise layer)
// ============================================================================

/// Adds filtered pink noise whose level tracks the signal envelope
///
/// The envelope is taken from the signal as it stands at the injection
/// point, before any noise is added, so the noise never feeds its own
/// level. A constant floor keeps quiet passages from falling completely
/// silent; the amount control scales the whole layer and acts as a hard
/// ceiling on the injected level.
#[derive(Debug, Clone)]
pub struct NoiseInjector {
    /// Normalized amount in [0, 1]; 0 disables the stage entirely
    amount: f32,
    hp_cutoff_hz: f32,
    seed: u64,
    sample_rate: f32,
    follower: EnvelopeFollower,
    generators: Vec<PinkNoiseGenerator>,
    highpass: Vec<NoiseHighPass>,
    envelopes: Vec<f32>,
}

impl NoiseInjector {
    /// Create an inactive injector with default filtering and seed
    pub fn new() -> Self {
        Self {
            amount: 0.0,
            hp_cutoff_hz: DEFAULT_NOISE_HP_HZ,
            seed: DEFAULT_NOISE_SEED,
            sample_rate: 0.0,
            follower: EnvelopeFollower::default(),
            generators: Vec::new(),
            highpass: Vec::new(),
            envelopes: Vec::new(),
        }
    }

    /// Size per-channel state for a sample rate and channel count
    ///
    /// Generators are reseeded `seed + channel` so a fresh prepare always
    /// starts an identical, decorrelated noise field.
    pub fn prepare(&mut self, sample_rate: f32, channels: usize) {
        self.sample_rate = sample_rate;
        self.follower =
            EnvelopeFollower::new(sample_rate, NOISE_ATTACK_SECONDS, NOISE_RELEASE_SECONDS);
        self.generators = (0..channels)
            .map(|channel| PinkNoiseGenerator::new(self.seed.wrapping_add(channel as u64)))
            .collect();
        self.highpass = vec![NoiseHighPass::new(); channels];
        self.envelopes = vec![0.0; channels];
        self.update_highpass();
    }

    /// Clear transient state: envelopes, filter memory, generator rows
    ///
    /// Parameters, coefficients and the random streams are untouched.
    pub fn reset(&mut self) {
        for generator in self.generators.iter_mut() {
            generator.reset();
        }
        for highpass in self.highpass.iter_mut() {
            highpass.reset();
        }
        self.envelopes.fill(0.0);
    }

    /// Set the noise amount as a percentage (0 disables the stage)
    pub fn set_amount_percent(&mut self, percent: f32) {
        let percent = percent.clamp(ranges::NOISE_PERCENT_MIN, ranges::NOISE_PERCENT_MAX);
        self.amount = percent / 100.0;
    }

    /// Current amount as a percentage
    pub fn amount_percent(&self) -> f32 {
        self.amount * 100.0
    }

    /// Set the noise-path high-pass cutoff in Hz
    pub fn set_hp_cutoff(&mut self, cutoff_hz: f32) {
        let cutoff_hz = cutoff_hz.clamp(ranges::NOISE_HP_HZ_MIN, ranges::NOISE_HP_HZ_MAX);
        if cutoff_hz != self.hp_cutoff_hz {
            self.hp_cutoff_hz = cutoff_hz;
            self.update_highpass();
        }
    }

    /// Current high-pass cutoff in Hz
    pub fn hp_cutoff_hz(&self) -> f32 {
        self.hp_cutoff_hz
    }

    /// Restart the random streams from a new base seed
    ///
    /// Only the generators are rewound; envelopes and filter memory are
    /// transient state and belong to `reset`.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        for (channel, generator) in self.generators.iter_mut().enumerate() {
            generator.reseed(seed.wrapping_add(channel as u64));
        }
    }

    /// Base seed currently in use
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether the stage does any work at all
    pub fn is_active(&self) -> bool {
        self.amount > 0.0
    }

    /// Per-channel envelope values, exposed for inspection
    pub fn envelopes(&self) -> &[f32] {
        &self.envelopes
    }

    fn update_highpass(&mut self) {
        if self.sample_rate <= 0.0 {
            return;
        }
        let alpha = NoiseHighPass::alpha_for(self.sample_rate, self.hp_cutoff_hz);
        for highpass in self.highpass.iter_mut() {
            highpass.set_alpha(alpha);
        }
        trace!("noise high-pass updated: cutoff {:.0} Hz", self.hp_cutoff_hz);
    }

    /// Inject noise into the first `samples` of every channel in-place
    ///
    /// At amount 0 this is a strict no-op: no random draws, no envelope or
    /// filter state advances.
    pub fn process<B: AsMut<[f32]>>(&mut self, buffer: &mut [B], samples: usize) {
        if self.amount <= 0.0 {
            return;
        }

        let gain_db = NOISE_GAIN_MIN_DB + self.amount * (NOISE_GAIN_MAX_DB - NOISE_GAIN_MIN_DB);
        let gain = db_to_gain(gain_db);
        let channels = self.generators.len();

        for (channel, data) in buffer.iter_mut().enumerate().take(channels) {
            let data = &mut data.as_mut()[..samples];
            let generator = &mut self.generators[channel];
            let highpass = &mut self.highpass[channel];
            let mut envelope = self.envelopes[channel];

            for sample in data.iter_mut() {
                // Envelope reads the signal before noise is added
                envelope = self.follower.next(envelope, *sample);
                let noise = highpass.process_sample(generator.next_sample());
                let level = gain * (NOISE_FLOOR_WEIGHT + NOISE_ENVELOPE_WEIGHT * envelope.min(1.0));
                *sample += noise * level;
            }

            self.envelopes[channel] = envelope;
        }
    }
}

impl Default for NoiseInjector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
