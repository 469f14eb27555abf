//! `capture` — Capture workflow around the cascade radar.
//!
//! The translation pipeline in `cascade_core` is pure; this crate owns the
//! impure collaborators: the hardware-control session (arming, framing,
//! descriptor export) and the fire-and-forget transfer of finished captures.
//!
//! # Module layout
//! - [`control`]  — `RadarControl` trait and stage-labeled error type
//! - [`session`]  — Capture session: configure, single-shot and continuous recording
//! - [`transfer`] — Detached background `scp` transfer of capture + descriptor

pub mod control;
pub mod session;
pub mod transfer;

pub use control::{ControlError, RadarControl, Stage};
pub use session::{CaptureSession, SessionOptions};
pub use transfer::{spawn_transfer, TransferOptions};
