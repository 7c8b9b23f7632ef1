//! Error types for the esp-exception-decoder MCP server

use std::path::PathBuf;
use std::time::Duration;

use rmcp::ErrorData as McpError;
use thiserror::Error;

/// Main error type for the esp-exception-decoder MCP server
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("ELF file not selected")]
    MissingFirmware,

    #[error("GDB not selected")]
    MissingDebugger,

    #[error("No stack trace provided")]
    EmptyInput,

    #[error("No addresses to resolve")]
    NoAddresses,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to launch GDB at {}: {source}", path.display())]
    DebuggerLaunch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GDB command failed ({status})\nStdout: {stdout}\nStderr: {stderr}")]
    DebuggerFailed {
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("GDB did not finish within {0:?}")]
    DebuggerTimeout(Duration),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] askama::Error),
}

impl DecodeError {
    /// True for errors raised before any debugger process is started.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DecodeError::MissingFirmware
                | DecodeError::MissingDebugger
                | DecodeError::EmptyInput
                | DecodeError::NoAddresses
                | DecodeError::InvalidAddress(_)
                | DecodeError::InvalidConfig(_)
        )
    }
}

impl From<DecodeError> for McpError {
    fn from(error: DecodeError) -> Self {
        if error.is_configuration_error() {
            return McpError::invalid_params(error.to_string(), None);
        }

        let data = match &error {
            DecodeError::DebuggerFailed { status, stdout, stderr } => Some(serde_json::json!({
                "status": status,
                "stdout": stdout,
                "stderr": stderr,
            })),
            _ => None,
        };
        McpError::internal_error(error.to_string(), data)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        assert!(DecodeError::MissingFirmware.is_configuration_error());
        assert!(DecodeError::MissingDebugger.is_configuration_error());
        assert!(DecodeError::EmptyInput.is_configuration_error());
        assert!(!DecodeError::DebuggerTimeout(Duration::from_secs(1)).is_configuration_error());
    }

    #[test]
    fn test_debugger_failure_message_carries_output() {
        let error = DecodeError::DebuggerFailed {
            status: "exit status: 1".to_string(),
            stdout: "partial".to_string(),
            stderr: "No symbol table is loaded.".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("GDB command failed"));
        assert!(message.contains("partial"));
        assert!(message.contains("No symbol table is loaded."));
    }

    #[test]
    fn test_mcp_error_mapping() {
        let mcp: McpError = DecodeError::MissingFirmware.into();
        assert_eq!(mcp.code, rmcp::model::ErrorCode::INVALID_PARAMS);

        let mcp: McpError = DecodeError::DebuggerFailed {
            status: "exit status: 2".to_string(),
            stdout: String::new(),
            stderr: "boom".to_string(),
        }
        .into();
        assert_eq!(mcp.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
        assert_eq!(mcp.data.unwrap()["stderr"], "boom");
    }
}
