//! Configuration for the esp-exception-decoder MCP server

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DecodeError, Result};
use crate::gdb::Correlation;
use crate::report::ReportFormat;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "esp-exception-decoder")]
#[command(about = "MCP server for decoding ESP32 crash backtraces with GDB")]
#[command(version)]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Firmware ELF image with debug symbols
    #[arg(long, env = "ESP_DECODER_ELF")]
    pub elf: Option<PathBuf>,

    /// GDB executable for the target (e.g. xtensa-esp32-elf-gdb)
    #[arg(long, env = "ESP_DECODER_GDB")]
    pub gdb: Option<PathBuf>,

    /// Kill GDB if it runs longer than this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// How GDB output lines are matched to addresses (address, positional)
    #[arg(long)]
    pub correlation: Option<Correlation>,

    /// Skip comparing the crash log SHA256 against the ELF file
    #[arg(long)]
    pub no_verify_fingerprint: bool,

    /// Decode this crash log once, print the report and exit
    #[arg(long)]
    pub decode: Option<PathBuf>,

    /// Report format for --decode (text, html, json)
    #[arg(long, default_value = "text")]
    pub format: ReportFormat,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log file path (defaults to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Server-wide decoder defaults, loadable from TOML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub firmware_path: Option<PathBuf>,
    pub gdb_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub correlation: Correlation,
    pub verify_fingerprint: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            firmware_path: None,
            gdb_path: None,
            timeout_secs: None,
            correlation: Correlation::Address,
            verify_fingerprint: true,
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let Some(path) = config_path else {
            return Ok(Config::default());
        };

        let content = std::fs::read_to_string(path).map_err(|e| {
            DecodeError::InvalidConfig(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DecodeError::InvalidConfig(format!("Invalid TOML syntax: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file named by `--config`, then overlay the other arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = Config::load(args.config.as_deref())?;
        config.merge_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Merge command line arguments into configuration
    pub fn merge_args(&mut self, args: &Args) {
        if let Some(elf) = &args.elf {
            self.firmware_path = Some(elf.clone());
        }
        if let Some(gdb) = &args.gdb {
            self.gdb_path = Some(gdb.clone());
        }
        if let Some(secs) = args.timeout_secs {
            self.timeout_secs = Some(secs);
        }
        if let Some(correlation) = args.correlation {
            self.correlation = correlation;
        }
        if args.no_verify_fingerprint {
            self.verify_fingerprint = false;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == Some(0) {
            return Err(DecodeError::InvalidConfig("timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// Generate TOML configuration string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DecodeError::InvalidConfig(format!("Failed to serialize config: {}", e)))
    }

    /// Snapshot of these defaults as a decoder configuration.
    ///
    /// A configured GDB path that points nowhere is dropped with a warning,
    /// so a stale default never masks the "GDB not selected" error. Bare
    /// program names are kept and left to `PATH` lookup.
    pub fn decoder_config(&self) -> DecoderConfig {
        let gdb = self.gdb_path.clone().filter(|path| {
            let usable = path.exists() || path.components().count() == 1;
            if !usable {
                warn!("Configured GDB {} does not exist, ignoring", path.display());
            }
            usable
        });

        DecoderConfig {
            firmware: self.firmware_path.clone(),
            gdb,
            timeout: self.timeout_secs.map(Duration::from_secs),
            correlation: self.correlation,
            verify_fingerprint: self.verify_fingerprint,
        }
    }
}

/// Everything one decode needs, passed explicitly into the decoder
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    pub firmware: Option<PathBuf>,
    pub gdb: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub correlation: Correlation,
    pub verify_fingerprint: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Config::default().decoder_config()
    }
}

impl DecoderConfig {
    pub fn new(firmware: impl Into<PathBuf>, gdb: impl Into<PathBuf>) -> Self {
        Self {
            firmware: Some(firmware.into()),
            gdb: Some(gdb.into()),
            ..Self::default()
        }
    }

    /// Both paths, or the configuration error naming the missing one
    pub fn require_paths(&self) -> Result<(&Path, &Path)> {
        let firmware = self.firmware.as_deref().ok_or(DecodeError::MissingFirmware)?;
        let gdb = self.gdb.as_deref().ok_or(DecodeError::MissingDebugger)?;
        Ok((firmware, gdb))
    }
}
