//! Decode pipeline: crash text in, resolved frames out

use serde::Serialize;
use tracing::{debug, info};

use crate::config::DecoderConfig;
use crate::crash_log::{self, CrashReport};
use crate::error::{DecodeError, Result};
use crate::fingerprint::{self, FingerprintCheck};
use crate::gdb::{self, ResolvedFrame};

/// Result of one decode action
#[derive(Debug, Clone, Serialize)]
pub struct DecodeOutcome {
    pub report: CrashReport,
    pub frames: Vec<ResolvedFrame>,
    /// Present when the log carried a SHA256 and verification is enabled
    pub fingerprint: Option<FingerprintCheck>,
}

/// Decode a pasted crash log.
///
/// Configuration problems are reported before GDB is started. When the log
/// has no addresses, GDB is not run at all and `frames` is empty.
pub async fn decode(config: &DecoderConfig, text: &str) -> Result<DecodeOutcome> {
    let (firmware, gdb_path) = config.require_paths()?;
    if text.trim().is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let report = crash_log::parse(text);
    debug!(
        "Parsed crash log: backtrace={} addresses={} stack_smashing={} corrupted={}",
        report.backtrace_found,
        report.addresses.len(),
        report.stack_smashing,
        report.corrupted
    );

    let frames = if report.has_addresses() {
        gdb::resolve_addresses(
            gdb_path,
            firmware,
            &report.addresses,
            config.timeout,
            config.correlation,
        )
        .await?
    } else {
        Vec::new()
    };

    let fingerprint = match (&report.sha256, config.verify_fingerprint) {
        (Some(expected), true) => Some(fingerprint::verify(firmware, expected)),
        _ => None,
    };

    info!(
        "Decoded {} frames from {}",
        frames.len(),
        firmware.display()
    );

    Ok(DecodeOutcome {
        report,
        frames,
        fingerprint,
    })
}

/// Resolve explicit addresses without a crash log.
pub async fn resolve(config: &DecoderConfig, addresses: &[u32]) -> Result<Vec<ResolvedFrame>> {
    let (firmware, gdb_path) = config.require_paths()?;
    gdb::resolve_addresses(gdb_path, firmware, addresses, config.timeout, config.correlation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdb::FrameLocation;

    #[tokio::test]
    async fn test_missing_firmware_checked_first() {
        let config = DecoderConfig::default();
        let err = decode(&config, "").await.unwrap_err();
        assert!(matches!(err, DecodeError::MissingFirmware));
    }

    #[tokio::test]
    async fn test_missing_gdb() {
        let config = DecoderConfig {
            firmware: Some("app.elf".into()),
            ..DecoderConfig::default()
        };
        let err = decode(&config, "Backtrace: 0x400d1234").await.unwrap_err();
        assert!(matches!(err, DecodeError::MissingDebugger));
    }

    #[tokio::test]
    async fn test_blank_input_rejected() {
        let config = DecoderConfig::new("app.elf", "/nonexistent/gdb");
        let err = decode(&config, "  \n\t").await.unwrap_err();
        assert!(matches!(err, DecodeError::EmptyInput));
    }

    #[tokio::test]
    async fn test_no_backtrace_skips_gdb() {
        // GDB path does not exist: reaching it would be a launch error
        let config = DecoderConfig::new("app.elf", "/nonexistent/gdb");
        let outcome = decode(&config, "Rebooting...").await.unwrap();
        assert!(!outcome.report.backtrace_found);
        assert!(outcome.frames.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_requires_addresses() {
        let config = DecoderConfig::new("app.elf", "/nonexistent/gdb");
        let err = resolve(&config, &[]).await.unwrap_err();
        assert!(matches!(err, DecodeError::NoAddresses));
    }

    #[cfg(unix)]
    mod fake_gdb {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use tempfile::TempDir;

        fn fake_gdb(dir: &TempDir, stdout: &str, exit_code: i32) -> PathBuf {
            let out = dir.path().join("gdb-stdout.txt");
            std::fs::write(&out, stdout).unwrap();
            let path = dir.path().join("fake-gdb");
            std::fs::write(
                &path,
                format!(
                    "#!/bin/sh\ncat '{}'\necho 'gdb stderr text' >&2\nexit {}\n",
                    out.display(),
                    exit_code
                ),
            )
            .unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn firmware(dir: &TempDir) -> PathBuf {
            let path = dir.path().join("app.elf");
            std::fs::write(&path, b"abc").unwrap();
            path
        }

        #[tokio::test]
        async fn test_two_addresses_resolved_in_order() {
            let dir = TempDir::new().unwrap();
            let gdb = fake_gdb(
                &dir,
                "0x400d1234 is in app_main (/project/main/main.c:42).\n\
                 0x400d5678 is in do_work (/project/main/work.c:7).\n",
                0,
            );
            let config = DecoderConfig::new(firmware(&dir), gdb);

            let outcome = decode(&config, "Backtrace: 0x400d1234 0x400d5678").await.unwrap();
            assert_eq!(outcome.report.addresses, vec![0x400d1234, 0x400d5678]);
            assert_eq!(outcome.frames.len(), 2);
            assert_eq!(outcome.frames[0].address, 0x400d1234);
            assert_eq!(
                outcome.frames[0].location,
                FrameLocation::Resolved {
                    function: "app_main".to_string(),
                    file: "/project/main/main.c".to_string(),
                    line: 42,
                }
            );
            assert_eq!(outcome.frames[1].address, 0x400d5678);
            assert!(outcome.fingerprint.is_none());
        }

        #[tokio::test]
        async fn test_gdb_failure_returns_no_frames() {
            let dir = TempDir::new().unwrap();
            let gdb = fake_gdb(&dir, "0x400d1234 is in app_main (main.c:1).\n", 1);
            let config = DecoderConfig::new(firmware(&dir), gdb);

            match decode(&config, "Backtrace: 0x400d1234").await {
                Err(DecodeError::DebuggerFailed { stderr, .. }) => {
                    assert!(stderr.contains("gdb stderr text"));
                }
                other => panic!("expected DebuggerFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_fingerprint_checked() {
            let dir = TempDir::new().unwrap();
            let gdb = fake_gdb(&dir, "0x400d1234 is in app_main (main.c:1).\n", 0);
            let config = DecoderConfig::new(firmware(&dir), gdb);

            let text = "Backtrace: 0x400d1234\n\nELF file SHA256: ba7816bf8f01cfea\n";
            let outcome = decode(&config, text).await.unwrap();
            assert_eq!(outcome.fingerprint, Some(FingerprintCheck::Match));

            let config = DecoderConfig {
                verify_fingerprint: false,
                ..config
            };
            let outcome = decode(&config, text).await.unwrap();
            assert!(outcome.fingerprint.is_none());
        }
    }
}
