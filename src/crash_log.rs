//! Crash log parsing for ESP32 serial monitor output.
//!
//! Scans pasted panic output for the markers ESP-IDF prints when a task
//! crashes: the stack-smashing banner, the `Backtrace:` line with its
//! `PC:SP` address pairs, the `CORRUPTED` suffix and the
//! `ELF file SHA256:` fingerprint.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

const STACK_SMASHING_MARKER: &str = "Stack smashing protect failure!";
const BACKTRACE_MARKER: &str = "Backtrace:";
const CORRUPTED_MARKER: &str = "CORRUPTED";

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x([0-9a-fA-F]{8})").expect("address pattern is valid"));

static SHA256_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ELF file SHA256: (\w+)").expect("sha256 pattern is valid"));

/// Everything the parser derives from one crash log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrashReport {
    /// `Stack smashing protect failure!` appeared anywhere in the text
    pub stack_smashing: bool,
    /// A `Backtrace:` marker was present
    pub backtrace_found: bool,
    /// Addresses from the backtrace region, in order of appearance
    #[serde(serialize_with = "serialize_addresses")]
    pub addresses: Vec<u32>,
    /// The backtrace region contained `CORRUPTED`
    pub corrupted: bool,
    /// Token following `ELF file SHA256: `
    pub sha256: Option<String>,
}

impl CrashReport {
    pub fn has_addresses(&self) -> bool {
        !self.addresses.is_empty()
    }
}

fn serialize_addresses<S>(addresses: &[u32], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(addresses.iter().map(|a| format!("0x{:08x}", a)))
}

/// Parse raw crash text. Never fails: missing markers leave fields empty.
pub fn parse(text: &str) -> CrashReport {
    let backtrace = backtrace_region(text);

    CrashReport {
        stack_smashing: text.contains(STACK_SMASHING_MARKER),
        backtrace_found: backtrace.is_some(),
        addresses: backtrace.map(extract_addresses).unwrap_or_default(),
        corrupted: backtrace.is_some_and(|region| region.contains(CORRUPTED_MARKER)),
        sha256: SHA256_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
    }
}

/// Text after the first `Backtrace:` marker, through end of input.
fn backtrace_region(text: &str) -> Option<&str> {
    text.find(BACKTRACE_MARKER)
        .map(|pos| &text[pos + BACKTRACE_MARKER.len()..])
}

/// Every `0x` + 8 hex digit token, duplicates included.
pub fn extract_addresses(region: &str) -> Vec<u32> {
    ADDRESS_RE
        .captures_iter(region)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| u32::from_str_radix(m.as_str(), 16).ok())
        .collect()
}

/// Parse a single user-supplied address, with or without `0x`.
pub fn parse_address(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Read a saved serial log. Bytes that are not UTF-8 (line noise, a wrong
/// baud rate) are replaced rather than rejected.
pub fn read_log(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
