//! Domain entities and business rules

pub mod audio;
pub mod dsp;
pub mod saturation;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{db_to_gain, gain_to_db, AudioError, ProcessSpec, Result, SILENCE_FLOOR_DB};
pub use dsp::*;
pub use saturation::{
    DryWetMixer, NoiseInjector, PinkNoiseGenerator, SaturationControls, SaturationEngine,
    SaturationParams, DEFAULT_NOISE_HP_HZ, DEFAULT_NOISE_SEED,
};
