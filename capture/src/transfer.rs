//! Background transfer of finished captures.
//!
//! After every capture cycle the raw-data directory and its descriptor
//! document are copied to a remote destination with `scp`, on a detached
//! thread so the next capture never waits on network I/O. Transfer failures
//! are logged with the full command, exit status and stderr, and are never
//! propagated to the capture loop. Nothing joins the thread; process exit
//! does not wait for in-flight transfers.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use tracing::{info, warn};

/// Remote destination for finished captures.
#[derive(Clone, Debug)]
pub struct TransferOptions {
    pub user: String,
    pub host: String,
    /// Directory on the remote side, e.g. `~/mmwave/PostProc`
    pub dest_dir: String,
}

impl TransferOptions {
    fn destination(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.dest_dir)
    }
}

/// Argument vector for the transfer command. The legacy ssh-rsa options are
/// required by the dropbear server shipped on the capture board.
fn scp_args(opts: &TransferOptions, capture_dir: &Path, descriptor: &Path) -> Vec<String> {
    vec![
        "-O".to_string(),
        "-oHostKeyAlgorithms=+ssh-rsa".to_string(),
        "-oPubkeyAcceptedAlgorithms=+ssh-rsa".to_string(),
        "-r".to_string(),
        capture_dir.display().to_string(),
        descriptor.display().to_string(),
        opts.destination(),
    ]
}

/// Copy a capture directory and its descriptor to the remote destination on
/// a detached background thread. Fire and forget: the returned handle may be
/// dropped, and any failure is logged rather than returned.
pub fn spawn_transfer(
    opts: TransferOptions,
    capture_dir: PathBuf,
    descriptor: PathBuf,
    capture_id: u32,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let args = scp_args(&opts, &capture_dir, &descriptor);
        info!(capture_id, command = %format!("scp {}", args.join(" ")), "transfer starting");

        match Command::new("scp").args(&args).output() {
            Ok(output) if output.status.success() => {
                info!(capture_id, "transfer completed");
            }
            Ok(output) => {
                warn!(
                    capture_id,
                    status = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "transfer failed"
                );
            }
            Err(err) => {
                warn!(capture_id, error = %err, "could not launch scp");
            }
        }
    })
}
