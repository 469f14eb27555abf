//! Capture session: the per-cycle hardware workflow.
//!
//! One cycle is arm → settle → start framing → record → stop framing →
//! disarm, followed by post-processing: export the `.mmwave.json` descriptor
//! for the capture and hand both off to the background transfer. The session
//! holds the canonical configuration immutably; every descriptor it exports
//! reflects exactly what was programmed into the chips.
//!
//! Failure policy: hardware-stage failures abort the current cycle after an
//! orderly unwind (stop/disarm attempted), and are labeled with the failing
//! stage. In continuous mode they are logged and the loop keeps cycling;
//! transfer failures never reach the loop at all.

use crate::control::{ControlError, RadarControl};
use crate::transfer::{spawn_transfer, TransferOptions};
use anyhow::{Context, Result};
use cascade_core::chirp::NUM_DEVICES;
use cascade_core::descriptor::{expand_descriptor, write_descriptor};
use cascade_core::DeviceConfig;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

/// Session-wide settings.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Raw-data root on the capture board's SSD.
    pub capture_root: PathBuf,
    /// Local directory the descriptor documents are written to.
    pub descriptor_dir: PathBuf,
    /// Cascade size (partial arrays supported).
    pub num_devices: usize,
    /// `createdBy` tag stamped into every descriptor.
    pub created_by: String,
    /// Pause between arming and framing, and after a cycle ends.
    pub settle_delay: Duration,
    /// Remote destination for finished captures; `None` disables transfer.
    pub transfer: Option<TransferOptions>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            capture_root: PathBuf::from("/mnt/ssd"),
            descriptor_dir: PathBuf::from("."),
            num_devices: NUM_DEVICES,
            created_by: "mmwcas".to_string(),
            settle_delay: Duration::from_secs(2),
            transfer: None,
        }
    }
}

/// A configured radar session driving capture cycles.
pub struct CaptureSession<C: RadarControl> {
    control: C,
    config: DeviceConfig,
    opts: SessionOptions,
    capture_count: u32,
}

impl<C: RadarControl> CaptureSession<C> {
    pub fn new(control: C, config: DeviceConfig, opts: SessionOptions) -> Self {
        Self {
            control,
            config,
            opts,
            capture_count: 0,
        }
    }

    /// The canonical configuration this session programs and exports.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Push the configuration and connect to the capture board.
    ///
    /// A failure here tears the control link down; the session cannot
    /// record without a completed configuration.
    pub fn configure(&mut self, address: &str, port: u16) -> Result<(), ControlError> {
        if let Err(err) = self.control.set_configuration(&self.config) {
            error!(stage = %err.stage(), %err, "configuration failed");
            self.control.close();
            return Err(err);
        }
        if let Err(err) = self.control.initialize(address, port) {
            error!(stage = %err.stage(), %err, "board connection failed");
            self.control.close();
            return Err(err);
        }
        info!(address, port, "radar configured");
        Ok(())
    }

    /// Record a single capture into `<capture_root>/<name>`, export its
    /// descriptor and start the background transfer.
    ///
    /// On failure the hardware session is shut down orderly (stop/disarm
    /// attempted, control link closed) and the error names the failed stage.
    pub fn record_once(&mut self, name: &str, duration: Duration) -> Result<PathBuf> {
        match self.run_cycle(name, duration) {
            Ok(path) => Ok(path),
            Err(err) => {
                self.control.close();
                Err(err)
            }
        }
    }

    /// Keep recording back-to-back captures of `interval` length until
    /// `running` is cleared. Capture directories are stamped
    /// `<base>_YYYYMMDD_HHMMSS_mmm`.
    ///
    /// Non-fatal conditions (stage failures, descriptor-export failures)
    /// are logged and the loop continues with the next cycle.
    pub fn record_continuous(&mut self, base: &str, interval: Duration, running: &AtomicBool) {
        info!(base, interval_s = interval.as_secs_f64(), "continuous capture starting");
        while running.load(Ordering::Relaxed) {
            let name = format!("{base}_{}", timestamp());
            match self.run_cycle(&name, interval) {
                Ok(path) => {
                    info!(capture = %name, descriptor = %path.display(), "capture complete");
                }
                Err(err) => {
                    error!(capture = %name, error = %format!("{err:#}"), "capture cycle failed");
                }
            }
            std::thread::sleep(self.opts.settle_delay);
        }
        info!("continuous capture stopped");
        self.control.close();
    }

    /// Release the control link.
    pub fn close(mut self) {
        self.control.close();
    }

    fn run_cycle(&mut self, name: &str, duration: Duration) -> Result<PathBuf> {
        self.capture_count += 1;
        let capture_id = self.capture_count;
        let capture_dir = self.opts.capture_root.join(name);
        let capture_dir_str = capture_dir.to_string_lossy().into_owned();

        // Nothing armed yet, so an arm failure needs no unwind.
        self.control
            .arm_capture(&capture_dir_str)
            .map_err(stage_error)?;
        std::thread::sleep(self.opts.settle_delay);

        if let Err(err) = self.control.start_frame() {
            // Framing may have started on a subset of chips.
            let _ = self.control.stop_frame();
            let _ = self.control.disarm_capture();
            return Err(stage_error(err));
        }

        std::thread::sleep(duration);

        // Always attempt both halves of the unwind before reporting.
        let stopped = self.control.stop_frame();
        let disarmed = self.control.disarm_capture();
        stopped.map_err(stage_error)?;
        disarmed.map_err(stage_error)?;

        // Post-processing: descriptor export, then background transfer.
        let descriptor_path = self
            .opts
            .descriptor_dir
            .join(format!("{name}.mmwave.json"));
        let doc = expand_descriptor(&self.config, self.opts.num_devices, &self.opts.created_by)
            .with_context(|| format!("exporting descriptor for capture {name}"))?;
        write_descriptor(&doc, &descriptor_path)
            .with_context(|| format!("exporting descriptor for capture {name}"))?;

        if let Some(transfer) = &self.opts.transfer {
            // Detached; the handle is dropped on purpose.
            spawn_transfer(
                transfer.clone(),
                capture_dir,
                descriptor_path.clone(),
                capture_id,
            );
            info!(capture_id, "transfer started in background");
        } else {
            debug!(capture_id, "no transfer destination configured, capture stays on the board");
        }

        Ok(descriptor_path)
    }
}

fn stage_error(err: ControlError) -> anyhow::Error {
    let stage = err.stage();
    anyhow::Error::new(err).context(format!("capture aborted at {stage} stage"))
}

/// `YYYYMMDD_HHMMSS_mmm` stamp for capture directory names.
fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Stage;
    use std::sync::atomic::AtomicU32;
    use std::sync::{Arc, Mutex};

    /// Scripted control double: records every call, optionally fails one
    /// stage, optionally clears a run flag after N arm attempts.
    #[derive(Clone, Default)]
    struct MockControl {
        calls: Arc<Mutex<Vec<&'static str>>>,
        fail_stage: Option<Stage>,
        arm_attempts: Arc<AtomicU32>,
        stop_after_arms: Option<(Arc<AtomicBool>, u32)>,
    }

    impl MockControl {
        fn log(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn check(&self, stage: Stage) -> Result<(), ControlError> {
            if self.fail_stage == Some(stage) {
                Err(ControlError::Status { stage, status: -1 })
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RadarControl for MockControl {
        fn set_configuration(&mut self, _config: &DeviceConfig) -> Result<(), ControlError> {
            self.log("set_configuration");
            self.check(Stage::Configure)
        }
        fn initialize(&mut self, _address: &str, _port: u16) -> Result<(), ControlError> {
            self.log("initialize");
            self.check(Stage::Init)
        }
        fn arm_capture(&mut self, _directory: &str) -> Result<(), ControlError> {
            self.log("arm_capture");
            let attempts = self.arm_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((flag, max)) = &self.stop_after_arms {
                if attempts >= *max {
                    flag.store(false, Ordering::SeqCst);
                }
            }
            self.check(Stage::Arm)
        }
        fn start_frame(&mut self) -> Result<(), ControlError> {
            self.log("start_frame");
            self.check(Stage::StartFrame)
        }
        fn stop_frame(&mut self) -> Result<(), ControlError> {
            self.log("stop_frame");
            self.check(Stage::StopFrame)
        }
        fn disarm_capture(&mut self) -> Result<(), ControlError> {
            self.log("disarm_capture");
            self.check(Stage::Disarm)
        }
        fn close(&mut self) {
            self.log("close");
        }
    }

    fn fast_opts(dir: &std::path::Path) -> SessionOptions {
        SessionOptions {
            capture_root: PathBuf::from("/mnt/ssd"),
            descriptor_dir: dir.to_path_buf(),
            settle_delay: Duration::ZERO,
            ..SessionOptions::default()
        }
    }

    #[test]
    fn configure_pushes_config_then_connects() {
        let mock = MockControl::default();
        let mut session =
            CaptureSession::new(mock.clone(), DeviceConfig::default(), SessionOptions::default());
        session.configure("192.168.33.180", 5001).unwrap();
        assert_eq!(mock.calls(), vec!["set_configuration", "initialize"]);
    }

    #[test]
    fn configure_failure_closes_the_link() {
        let mock = MockControl {
            fail_stage: Some(Stage::Configure),
            ..MockControl::default()
        };
        let mut session =
            CaptureSession::new(mock.clone(), DeviceConfig::default(), SessionOptions::default());
        let err = session.configure("192.168.33.180", 5001).unwrap_err();
        assert_eq!(err.stage(), Stage::Configure);
        assert_eq!(mock.calls(), vec!["set_configuration", "close"]);
    }

    #[test]
    fn record_once_full_cycle_exports_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockControl::default();
        let mut session =
            CaptureSession::new(mock.clone(), DeviceConfig::default(), fast_opts(dir.path()));

        let path = session.record_once("outdoor1", Duration::ZERO).unwrap();
        assert_eq!(
            mock.calls(),
            vec!["arm_capture", "start_frame", "stop_frame", "disarm_capture"]
        );
        assert_eq!(path, dir.path().join("outdoor1.mmwave.json"));
        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["mmWaveDevices"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn start_failure_unwinds_and_names_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockControl {
            fail_stage: Some(Stage::StartFrame),
            ..MockControl::default()
        };
        let mut session =
            CaptureSession::new(mock.clone(), DeviceConfig::default(), fast_opts(dir.path()));

        let err = session.record_once("x", Duration::ZERO).unwrap_err();
        assert!(format!("{err:#}").contains("start-frame"));
        // orderly unwind: stop and disarm attempted, link closed
        assert_eq!(
            mock.calls(),
            vec![
                "arm_capture",
                "start_frame",
                "stop_frame",
                "disarm_capture",
                "close"
            ]
        );
        // no descriptor for a failed capture
        assert!(!dir.path().join("x.mmwave.json").exists());
    }

    #[test]
    fn oversized_cascade_fails_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockControl::default();
        let opts = SessionOptions {
            num_devices: 5,
            ..fast_opts(dir.path())
        };
        let mut session = CaptureSession::new(mock.clone(), DeviceConfig::default(), opts);

        let err = session.record_once("x", Duration::ZERO).unwrap_err();
        assert!(format!("{err:#}").contains("got 5"));
        // orderly shutdown, no descriptor
        assert_eq!(mock.calls().last(), Some(&"close"));
        assert!(!dir.path().join("x.mmwave.json").exists());
    }

    #[test]
    fn stop_failure_still_disarms() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockControl {
            fail_stage: Some(Stage::StopFrame),
            ..MockControl::default()
        };
        let mut session =
            CaptureSession::new(mock.clone(), DeviceConfig::default(), fast_opts(dir.path()));

        let err = session.record_once("x", Duration::ZERO).unwrap_err();
        assert!(format!("{err:#}").contains("stop-frame"));
        assert!(mock.calls().contains(&"disarm_capture"));
    }

    #[test]
    fn continuous_mode_runs_until_flag_clears() {
        let dir = tempfile::tempdir().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let mock = MockControl {
            stop_after_arms: Some((running.clone(), 3)),
            ..MockControl::default()
        };
        let mut session =
            CaptureSession::new(mock.clone(), DeviceConfig::default(), fast_opts(dir.path()));

        session.record_continuous("cap", Duration::ZERO, &running);

        let arms = mock.calls().iter().filter(|&&c| c == "arm_capture").count();
        assert_eq!(arms, 3);
        assert_eq!(mock.calls().last(), Some(&"close"));
        // descriptors were exported (timestamped names may collide at
        // zero-length intervals, so at least one must exist)
        let descriptors = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(descriptors >= 1);
    }

    #[test]
    fn continuous_mode_survives_stage_failures() {
        let dir = tempfile::tempdir().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let mock = MockControl {
            fail_stage: Some(Stage::Arm),
            stop_after_arms: Some((running.clone(), 4)),
            ..MockControl::default()
        };
        let mut session =
            CaptureSession::new(mock.clone(), DeviceConfig::default(), fast_opts(dir.path()));

        // every arm fails, but the loop keeps cycling until the flag clears
        session.record_continuous("cap", Duration::ZERO, &running);
        let arms = mock.calls().iter().filter(|&&c| c == "arm_capture").count();
        assert_eq!(arms, 4);
    }
}
