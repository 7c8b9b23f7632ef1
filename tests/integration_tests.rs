//! Integration tests for esp-exception-decoder MCP server
//!
//! Tests handler creation, config and the public decode API. Tool invocation
//! tests are in src/tools/decoder_tools.rs (they need access to private methods).

use esp_exception_decoder::crash_log;
use esp_exception_decoder::gdb::{correlate, Correlation, FrameLocation};
use esp_exception_decoder::{decode, Config, DecodeError, DecoderConfig, DecoderToolHandler};

#[test]
fn test_handler_creation() {
    let config = Config::default();
    let _handler = DecoderToolHandler::new(config);
}

#[test]
fn test_handler_default() {
    let _handler = DecoderToolHandler::default();
}

#[test]
fn test_config_default_values() {
    let config = Config::default();
    assert!(config.firmware_path.is_none());
    assert!(config.gdb_path.is_none());
    assert!(config.timeout_secs.is_none());
    assert_eq!(config.correlation, Correlation::Address);
    assert!(config.verify_fingerprint);
}

#[test]
fn test_error_types() {
    let error = DecodeError::MissingFirmware;
    assert!(error.to_string().contains("ELF file not selected"));

    let error = DecodeError::MissingDebugger;
    assert!(error.to_string().contains("GDB not selected"));
}

#[tokio::test]
async fn test_decode_requires_configuration() {
    let err = decode(&DecoderConfig::default(), "Backtrace: 0x400d1234")
        .await
        .unwrap_err();
    assert!(err.is_configuration_error());
}

#[test]
fn test_parse_then_correlate_round_trip() {
    let report = crash_log::parse("Guru Meditation Error\nBacktrace: 0x400d1234 0x400d5678 0x400d1234");
    assert_eq!(report.addresses.len(), 3);

    let stdout: String = report
        .addresses
        .iter()
        .enumerate()
        .map(|(i, a)| format!("0x{:08x} is in func_{} (src/file_{}.c:{}).\n", a, i, i, 10 + i))
        .collect();

    for correlation in [Correlation::Address, Correlation::Positional] {
        let frames = correlate(&report.addresses, &stdout, correlation);
        assert_eq!(frames.len(), 3);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.address, report.addresses[i]);
            assert_eq!(
                frame.location,
                FrameLocation::Resolved {
                    function: format!("func_{}", i),
                    file: format!("src/file_{}.c", i),
                    line: 10 + i as u32,
                }
            );
        }
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_decode_with_fake_gdb_failure() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::TempDir::new().unwrap();
    let elf = tmp.path().join("app.elf");
    std::fs::write(&elf, b"\x7fELF").unwrap();
    let gdb = tmp.path().join("gdb");
    std::fs::write(&gdb, "#!/bin/sh\necho '\"app.elf\": not in executable format' >&2\nexit 1\n").unwrap();
    std::fs::set_permissions(&gdb, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = DecoderConfig::new(&elf, &gdb);
    match decode(&config, "Backtrace: 0x400d1234 0x400d5678").await {
        Err(DecodeError::DebuggerFailed { stderr, .. }) => {
            assert!(stderr.contains("not in executable format"));
        }
        other => panic!("expected DebuggerFailed, got {other:?}"),
    }
}
