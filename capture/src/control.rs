//! Hardware-control boundary.
//!
//! The actual radar link (TDA board server, mmwavelink RPC) lives outside
//! this crate; the session only needs the operations below. Every operation
//! reports success or a non-zero firmware status, and every failure carries
//! the stage it happened in so the operator can tell a configuration problem
//! from a framing problem.

use cascade_core::DeviceConfig;
use std::fmt;
use thiserror::Error;

/// The stage of the capture workflow an operation belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Configure,
    Init,
    Arm,
    StartFrame,
    StopFrame,
    Disarm,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configure => "configure",
            Stage::Init => "init",
            Stage::Arm => "arm",
            Stage::StartFrame => "start-frame",
            Stage::StopFrame => "stop-frame",
            Stage::Disarm => "disarm",
        };
        f.write_str(name)
    }
}

/// A failed hardware-control operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    /// The device returned a non-zero status code.
    #[error("{stage} stage failed with status {status}")]
    Status { stage: Stage, status: i32 },
    /// The control link itself is gone.
    #[error("{stage} stage failed: connection lost")]
    Disconnected { stage: Stage },
}

impl ControlError {
    /// The workflow stage the failure belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            ControlError::Status { stage, .. } | ControlError::Disconnected { stage } => *stage,
        }
    }
}

/// Operations the capture session needs from the radar hardware.
///
/// The canonical [`DeviceConfig`] is exactly the payload
/// [`set_configuration`](RadarControl::set_configuration) expects; the
/// session never mutates it after handoff.
pub trait RadarControl {
    /// Push the full cascade configuration to all chips.
    fn set_configuration(&mut self, config: &DeviceConfig) -> Result<(), ControlError>;
    /// Connect to the capture board.
    fn initialize(&mut self, address: &str, port: u16) -> Result<(), ControlError>;
    /// Arm the capture card, directing raw data into `directory`.
    fn arm_capture(&mut self, directory: &str) -> Result<(), ControlError>;
    /// Start framing on every chip.
    fn start_frame(&mut self) -> Result<(), ControlError>;
    /// Stop framing on every chip.
    fn stop_frame(&mut self) -> Result<(), ControlError>;
    /// Disarm the capture card.
    fn disarm_capture(&mut self) -> Result<(), ControlError>;
    /// Tear down the control link. Best effort, never fails.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_reports_failing_stage() {
        let err = ControlError::Status {
            stage: Stage::StartFrame,
            status: -12,
        };
        assert_eq!(err.stage(), Stage::StartFrame);
        assert_eq!(err.to_string(), "start-frame stage failed with status -12");
    }
}
