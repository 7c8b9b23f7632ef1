//! RMCP 0.3.2 implementation for ESP32 exception decoder MCP tools
//!
//! Provides 6 tools: parse_crash_log, decode_backtrace, resolve_addresses,
//! set_firmware, set_debugger, show_config.

use rmcp::{
    tool, tool_router, tool_handler, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::*,
    ErrorData as McpError,
    service::RequestContext,
    RoleServer,
};
use serde::Serialize;
use tracing::{debug, error, info};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::types::*;
use crate::config::{Config, DecoderConfig};
use crate::{crash_log, decoder, report};
use crate::error::DecodeError;

/// ESP32 exception decoder tool handler
#[derive(Clone)]
pub struct DecoderToolHandler {
    #[allow(dead_code)]
    tool_router: ToolRouter<DecoderToolHandler>,
    /// Session settings, changed only by set_firmware / set_debugger
    config: Arc<RwLock<Config>>,
}

impl DecoderToolHandler {
    pub fn new(config: Config) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Snapshot of the session settings with per-call overrides applied
    async fn decoder_config(
        &self,
        elf_path: Option<&str>,
        gdb_path: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> Result<DecoderConfig, McpError> {
        let mut config = self.config.read().await.decoder_config();

        if let Some(elf) = elf_path {
            config.firmware = Some(Self::validate_file(elf, "ELF file")?);
        }
        if let Some(gdb) = gdb_path {
            config.gdb = Some(PathBuf::from(gdb));
        }
        match timeout_secs {
            Some(0) => {
                return Err(McpError::invalid_params(
                    "timeout_secs must be > 0".to_string(),
                    None,
                ))
            }
            Some(secs) => config.timeout = Some(Duration::from_secs(secs)),
            None => {}
        }

        Ok(config)
    }

    /// Validate that a file exists.
    fn validate_file(path: &str, what: &str) -> Result<PathBuf, McpError> {
        let p = PathBuf::from(path);
        if !p.is_file() {
            return Err(McpError::invalid_params(
                format!("{} not found: {}", what, path),
                None,
            ));
        }
        Ok(p)
    }

    async fn config_status(&self) -> ShowConfigResult {
        let config = self.config.read().await;
        let firmware = path_status(config.firmware_path.as_deref());
        let gdb = path_status(config.gdb_path.as_deref());
        ShowConfigResult {
            status: format!("ELF: {} | GDB: {}", firmware.name, gdb.name),
            firmware,
            gdb,
            timeout_secs: config.timeout_secs,
            correlation: format!("{:?}", config.correlation).to_lowercase(),
            verify_fingerprint: config.verify_fingerprint,
        }
    }
}

impl Default for DecoderToolHandler {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn path_status(path: Option<&Path>) -> PathStatus {
    match path {
        Some(p) => PathStatus {
            name: p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            path: Some(p.display().to_string()),
        },
        None => PathStatus {
            name: "Not selected".to_string(),
            path: None,
        },
    }
}

fn json_result<T: Serialize>(result: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(result).map_err(|e| {
        McpError::internal_error(format!("Serialization error: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[tool_router]
impl DecoderToolHandler {
    #[tool(description = "Parse ESP32 panic output without running GDB. Reports the stack smashing marker, whether a Backtrace: section exists, the backtrace addresses in order, the CORRUPTED marker and the ELF file SHA256.")]
    async fn parse_crash_log(
        &self,
        Parameters(args): Parameters<ParseCrashLogArgs>,
    ) -> Result<CallToolResult, McpError> {
        let report = crash_log::parse(&args.text);
        debug!("Parsed crash log with {} addresses", report.addresses.len());
        json_result(&report)
    }

    #[tool(description = "Decode an ESP32 crash backtrace. Extracts the Backtrace: addresses, runs GDB once in batch mode against the firmware ELF and maps each address to function, file and line. Uses the configured ELF/GDB unless elf_path/gdb_path are given.")]
    async fn decode_backtrace(
        &self,
        Parameters(args): Parameters<DecodeBacktraceArgs>,
    ) -> Result<CallToolResult, McpError> {
        let config = self
            .decoder_config(args.elf_path.as_deref(), args.gdb_path.as_deref(), args.timeout_secs)
            .await?;

        let outcome = decoder::decode(&config, &args.text).await.inspect_err(|e| {
            if !e.is_configuration_error() {
                error!("Decoding failed: {}", e);
            }
        })?;
        let rendered = report::render(&outcome, args.format.unwrap_or_default())?;

        info!(
            "Decoded backtrace: {} frames, {} resolved",
            outcome.frames.len(),
            outcome.frames.iter().filter(|f| f.is_resolved()).count()
        );

        json_result(&DecodeBacktraceResult {
            report: outcome.report,
            frames: outcome.frames,
            fingerprint: outcome.fingerprint,
            rendered,
        })
    }

    #[tool(description = "Resolve explicit addresses (hex, with or without 0x) to function, file and line with a single GDB batch run.")]
    async fn resolve_addresses(
        &self,
        Parameters(args): Parameters<ResolveAddressesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let addresses = args
            .addresses
            .iter()
            .map(|a| {
                crash_log::parse_address(a).ok_or_else(|| DecodeError::InvalidAddress(a.clone()))
            })
            .collect::<Result<Vec<u32>, DecodeError>>()?;

        let config = self
            .decoder_config(args.elf_path.as_deref(), args.gdb_path.as_deref(), args.timeout_secs)
            .await?;

        let frames = decoder::resolve(&config, &addresses).await?;
        json_result(&ResolveAddressesResult { frames })
    }

    #[tool(description = "Select the firmware ELF file used by later decodes in this session")]
    async fn set_firmware(
        &self,
        Parameters(args): Parameters<SetPathArgs>,
    ) -> Result<CallToolResult, McpError> {
        let path = Self::validate_file(&args.path, "ELF file")?;
        info!("Firmware set to {}", path.display());
        self.config.write().await.firmware_path = Some(path);
        json_result(&self.config_status().await)
    }

    #[tool(description = "Select the GDB executable (e.g. xtensa-esp32-elf-gdb) used by later decodes in this session")]
    async fn set_debugger(
        &self,
        Parameters(args): Parameters<SetPathArgs>,
    ) -> Result<CallToolResult, McpError> {
        let path = Self::validate_file(&args.path, "GDB executable")?;
        info!("GDB set to {}", path.display());
        self.config.write().await.gdb_path = Some(path);
        json_result(&self.config_status().await)
    }

    #[tool(description = "Show the currently selected firmware ELF and GDB executable")]
    async fn show_config(
        &self,
        Parameters(_args): Parameters<ShowConfigArgs>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.config_status().await)
    }
}


#[tool_handler]
impl ServerHandler for DecoderToolHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "ESP32 Exception Decoder MCP Server - Decode crash backtraces from ESP32 serial output \
                 with GDB and the matching firmware ELF. \
                 6 tools available: parse_crash_log, decode_backtrace, resolve_addresses, set_firmware, set_debugger, show_config."
                    .to_string(),
            ),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        info!("ESP32 Exception Decoder MCP server initialized with 6 tools");
        Ok(self.get_info())
    }
}
