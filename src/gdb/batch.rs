//! Batch-mode GDB command construction and execution

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, error};

use crate::error::{DecodeError, Result};

/// A single non-interactive GDB run listing one source line per address.
#[derive(Debug, Clone)]
pub struct GdbBatch {
    gdb: PathBuf,
    firmware: PathBuf,
    addresses: Vec<u32>,
}

/// Captured output of a successful GDB run
#[derive(Debug, Clone)]
pub struct GdbOutput {
    pub stdout: String,
    pub stderr: String,
}

impl GdbBatch {
    pub fn new(gdb: &Path, firmware: &Path, addresses: &[u32]) -> Self {
        Self {
            gdb: gdb.to_path_buf(),
            firmware: firmware.to_path_buf(),
            addresses: addresses.to_vec(),
        }
    }

    /// Arguments passed to GDB:
    /// `--batch <elf> -ex "set listsize 1" -ex "l *0x..." ... -ex q`
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(4 + self.addresses.len() * 2 + 2);
        args.push("--batch".into());
        args.push(self.firmware.clone().into_os_string());
        args.push("-ex".into());
        args.push("set listsize 1".into());
        for address in &self.addresses {
            args.push("-ex".into());
            args.push(format!("l *0x{:08x}", address).into());
        }
        args.push("-ex".into());
        args.push("q".into());
        args
    }

    /// Human-readable command line for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.gdb.as_os_str().to_os_string())
            .chain(self.args())
            .map(|arg| {
                let arg = arg.to_string_lossy().into_owned();
                if arg.contains(' ') {
                    format!("\"{}\"", arg)
                } else {
                    arg
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn GDB once and wait for it, optionally bounded by `timeout`.
    ///
    /// A non-zero exit fails the whole batch with the captured output.
    pub async fn run(&self, timeout: Option<Duration>) -> Result<GdbOutput> {
        debug!("Running: {}", self.command_line());

        let child = Command::new(&self.gdb)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DecodeError::DebuggerLaunch {
                path: self.gdb.clone(),
                source,
            })?;

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    error!("GDB exceeded {:?}, killing it", limit);
                    DecodeError::DebuggerTimeout(limit)
                })??,
            None => child.wait_with_output().await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            error!("GDB failed with {}: {}", output.status, stderr.trim());
            return Err(DecodeError::DebuggerFailed {
                status: output.status.to_string(),
                stdout,
                stderr,
            });
        }

        debug!("GDB produced {} bytes of output", stdout.len());
        Ok(GdbOutput { stdout, stderr })
    }
}
