//! Error types for Lima operations.
//!
//! Operations whose failure cannot be corrected by looking at VM state afterwards
//! (`info`, `list`, `status`, `start`, `create`, `validate`) surface as
//! [`LimaError::ToolInvocation`]. `stop` and `delete` never produce an error at all.

use thiserror::Error;

use crate::command::{CommandOutput, ToolCommand};

#[derive(Error, Debug)]
pub enum LimaError {
    /// `limactl` exited non-zero on an operation without a state-based fallback.
    #[error("`{command}` failed with status {}: {stderr}", display_code(.code))]
    ToolInvocation {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Dependency not found: {0}")]
    Dependency(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

impl LimaError {
    pub fn tool_invocation(command: &ToolCommand, output: &CommandOutput) -> Self {
        LimaError::ToolInvocation {
            command: command.command_line(),
            code: output.code,
            stderr: output.stderr.trim_end().to_string(),
        }
    }

    /// True for errors caused by the caller's configuration rather than the tool.
    pub fn is_config(&self) -> bool {
        matches!(self, LimaError::Config(_))
    }
}

impl From<serde_yaml_ng::Error> for LimaError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        LimaError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LimaError {
    fn from(err: serde_json::Error) -> Self {
        LimaError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LimaError>;
