//! Real-time tube saturation DSP core
//!
//! Block-based audio processing built around a prepare/process lifecycle:
//! a [`SaturationEngine`] is prepared once for a sample rate, channel count
//! and maximum block size, then processes planar f32 buffers in place with
//! no allocations on the audio path.
//!
//! ```
//! use filament_core::{ProcessSpec, SaturationEngine};
//!
//! let mut engine = SaturationEngine::new();
//! engine.prepare(ProcessSpec::new(48000.0, 2, 512))?;
//!
//! let mut block = vec![vec![0.0_f32; 512]; 2];
//! engine.process(&mut block)?;
//! # Ok::<(), filament_core::AudioError>(())
//! ```

pub mod domain;

pub use domain::{
    AudioError, ProcessSpec, Result, SaturationControls, SaturationEngine, SaturationParams,
    ToneMode,
};
