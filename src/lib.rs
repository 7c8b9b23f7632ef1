//! ESP32 Exception Decoder MCP Server
//!
//! Decodes ESP32 crash backtraces pasted from a serial monitor: the
//! `Backtrace:` addresses are listed in one batch GDB run against the
//! matching firmware ELF and mapped to function, file and line.

pub mod config;
pub mod crash_log;
pub mod decoder;
pub mod error;
pub mod fingerprint;
pub mod gdb;
pub mod report;
pub mod tools;

pub use config::{Config, DecoderConfig};
pub use decoder::{decode, DecodeOutcome};
pub use error::{DecodeError, Result};
pub use tools::DecoderToolHandler;
