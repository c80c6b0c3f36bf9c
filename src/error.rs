//! Error types for pioneer

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PioneerError {
    /// Malformed MAC, IP, hostname, SSID or password supplied by the caller
    #[error("Validation error: {0}")]
    Validation(String),
    /// The forwarder rejected the on-disk configuration
    #[error("Configuration check failed for {service}: {detail}")]
    ConfigInvalid { service: String, detail: String },
    /// The change is saved but the forwarder could not be refreshed
    #[error("Saved but not yet active: reload failed ({graceful}), restart failed ({restart})")]
    ReloadFailed { graceful: String, restart: String },
    /// Hotspot profile creation, modification or activation failed
    #[error("Hotspot provisioning failed: {0}")]
    Provision(String),
    /// A required binary is missing or unreachable
    #[error("External tool unavailable: {tool}: {detail}")]
    ToolUnavailable { tool: String, detail: String },
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Command execution failed
    #[error("Command '{cmd}' failed{}: {stderr}", exit_suffix(.code))]
    CommandFailed { cmd: String, code: Option<i32>, stderr: String },
    /// Command did not finish in time
    #[error("Timeout: '{cmd}' did not finish within {secs}s")]
    Timeout { cmd: String, secs: u64 },
    /// Settings file error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with code {}", code),
        None => String::new(),
    }
}

/// Coarse classification handed to the web layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ConfigInvalid,
    ReloadFailed,
    Provision,
    ToolUnavailable,
    Internal,
}

impl PioneerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PioneerError::Validation(_) => ErrorKind::Validation,
            PioneerError::ConfigInvalid { .. } => ErrorKind::ConfigInvalid,
            PioneerError::ReloadFailed { .. } => ErrorKind::ReloadFailed,
            PioneerError::Provision(_) => ErrorKind::Provision,
            PioneerError::ToolUnavailable { .. } => ErrorKind::ToolUnavailable,
            _ => ErrorKind::Internal,
        }
    }

    /// True for errors caused by caller input (4xx class)
    pub fn is_client_error(&self) -> bool {
        matches!(self, PioneerError::Validation(_) | PioneerError::NotFound(_))
    }

    /// True when the record change reached disk even though the call failed
    pub fn change_persisted(&self) -> bool {
        matches!(
            self,
            PioneerError::ConfigInvalid { .. } | PioneerError::ReloadFailed { .. }
        )
    }
}

impl From<serde_json::Error> for PioneerError {
    fn from(error: serde_json::Error) -> Self {
        PioneerError::ParseError(error.to_string())
    }
}

pub type PioneerResult<T> = Result<T, PioneerError>;
