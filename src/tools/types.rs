//! Type definitions for esp-exception-decoder MCP tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crash_log::CrashReport;
use crate::fingerprint::FingerprintCheck;
use crate::gdb::ResolvedFrame;
use crate::report::ReportFormat;

// ============================================================================
// parse_crash_log
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ParseCrashLogArgs {
    /// Raw serial monitor output containing the panic
    pub text: String,
}

// ============================================================================
// decode_backtrace
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DecodeBacktraceArgs {
    /// Raw serial monitor output containing the panic
    pub text: String,
    /// Firmware ELF file (overrides the configured one)
    #[serde(default)]
    pub elf_path: Option<String>,
    /// GDB executable (overrides the configured one)
    #[serde(default)]
    pub gdb_path: Option<String>,
    /// Kill GDB after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Format of the rendered report: "text" (default), "html" or "json"
    #[serde(default)]
    pub format: Option<ReportFormat>,
}

#[derive(Debug, Serialize)]
pub struct DecodeBacktraceResult {
    pub report: CrashReport,
    pub frames: Vec<ResolvedFrame>,
    pub fingerprint: Option<FingerprintCheck>,
    /// Report rendered in the requested format
    pub rendered: String,
}

// ============================================================================
// resolve_addresses
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResolveAddressesArgs {
    /// Addresses as hex, with or without 0x (e.g. ["0x400d1234", "400d5678"])
    pub addresses: Vec<String>,
    /// Firmware ELF file (overrides the configured one)
    #[serde(default)]
    pub elf_path: Option<String>,
    /// GDB executable (overrides the configured one)
    #[serde(default)]
    pub gdb_path: Option<String>,
    /// Kill GDB after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ResolveAddressesResult {
    pub frames: Vec<ResolvedFrame>,
}

// ============================================================================
// set_firmware / set_debugger
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetPathArgs {
    /// Path to the file
    pub path: String,
}

// ============================================================================
// show_config
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ShowConfigArgs {}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PathStatus {
    /// File name, or "Not selected"
    pub name: String,
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShowConfigResult {
    pub firmware: PathStatus,
    pub gdb: PathStatus,
    pub timeout_secs: Option<u64>,
    pub correlation: String,
    pub verify_fingerprint: bool,
    /// One-line summary, e.g. "ELF: app.elf | GDB: xtensa-esp32-elf-gdb"
    pub status: String,
}
