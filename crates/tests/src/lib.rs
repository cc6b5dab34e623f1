//! Integration test suite for the saturation engine
//!
//! End-to-end scenarios across the public API: full pipeline renders,
//! spectral checks, concurrent parameter control and preset persistence.

#[cfg(test)]
mod preset_roundtrip;
#[cfg(test)]
mod saturation_integration;
