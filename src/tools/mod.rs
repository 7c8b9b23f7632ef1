//! MCP tools for ESP32 exception decoding

pub mod decoder_tools;
pub mod types;

pub use decoder_tools::DecoderToolHandler;
pub use types::*;
