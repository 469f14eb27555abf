//! `cascade_core` — Configuration translation for multi-chip mmWave cascade radar.
//!
//! Translates human-authored physical-unit parameters (GHz, µs, ms) into the
//! fixed-point register values the AWR2243 DFP firmware expects, and expands a
//! single logical configuration into the per-device `.mmwave.json` descriptor
//! consumed by firmware loaders and post-processing tools.
//!
//! # Module layout
//! - [`lua`]        — Key/value extraction from mmWave Studio Lua scripts
//! - [`convert`]    — Physical-unit ↔ LSB conversion formulas
//! - [`config`]     — Canonical device configuration (defaults + overlay)
//! - [`chirp`]      — Fixed chirp/TX-antenna assignment table
//! - [`descriptor`] — Multi-device descriptor expansion and JSON serialization

pub mod chirp;
pub mod config;
pub mod convert;
pub mod descriptor;
pub mod lua;

pub use config::{DeviceConfig, MimoConfig};
pub use convert::{ConvertedParam, FirmwareField};
pub use descriptor::{
    expand_descriptor, write_descriptor, write_setup, CaptureSetup, MmWaveDescriptor,
};
pub use lua::Literal;
