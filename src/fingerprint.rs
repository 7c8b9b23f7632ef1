//! Firmware fingerprint check
//!
//! ESP-IDF prints the start of the app ELF's SHA-256 in its panic output.
//! Comparing it against the selected ELF catches decoding against the
//! wrong build.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FingerprintCheck {
    Match,
    Mismatch {
        /// Value printed by the device
        expected: String,
        /// Digest of the selected ELF
        actual: String,
    },
    Unavailable {
        reason: String,
    },
}

/// Hex SHA-256 of the file at `path`
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compare a (possibly truncated) fingerprint against a full hex digest.
pub fn compare(expected: &str, actual: &str) -> FingerprintCheck {
    let expected_lower = expected.to_ascii_lowercase();
    if expected_lower.is_empty() || hex::decode(pad_even(&expected_lower)).is_err() {
        return FingerprintCheck::Unavailable {
            reason: format!("'{}' is not a hex digest", expected),
        };
    }

    if actual.to_ascii_lowercase().starts_with(&expected_lower) {
        FingerprintCheck::Match
    } else {
        FingerprintCheck::Mismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

fn pad_even(hex_str: &str) -> String {
    if hex_str.len() % 2 == 1 {
        format!("{}0", hex_str)
    } else {
        hex_str.to_string()
    }
}

/// Hash `firmware` and compare it with the fingerprint from the crash log.
pub fn verify(firmware: &Path, expected: &str) -> FingerprintCheck {
    match sha256_file(firmware) {
        Ok(actual) => {
            let check = compare(expected, &actual);
            match &check {
                FingerprintCheck::Mismatch { .. } => warn!(
                    "Firmware {} does not match crash log fingerprint {}",
                    firmware.display(),
                    expected
                ),
                _ => debug!("Fingerprint check for {}: {:?}", firmware.display(), check),
            }
            check
        }
        Err(e) => FingerprintCheck::Unavailable {
            reason: format!("Failed to read {}: {}", firmware.display(), e),
        },
    }
}
