use thiserror::Error;

use crate::process::{config::StreamSource, group::ProcessGroupError};

/// Errors produced while configuring, spawning or running a process.
///
/// Failures of a started process carry the rendered command line so they can
/// be reported without access to the configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The binary is missing or the OS refused to create the process
    #[error("Failed to start '{command}': {message}")]
    SpawnFailure { command: String, message: String },

    /// A capture pipe failed, the run continues with what was captured
    #[error("Failed to read {stream}: {message}")]
    StreamReadFailure {
        stream: StreamSource,
        message: String,
    },

    /// The exit code is not in the success set
    #[error("{name} returned {exit_code}")]
    NonZeroExit {
        name: String,
        command: String,
        exit_code: i32,
        /// Buffered stderr, when it wasn't discarded or inherited
        stderr: Option<String>,
    },

    /// The process was interrupted and terminated
    #[error("'{command}' was interrupted")]
    Interrupted {
        command: String,
        /// Stderr read before the interrupt, when it was piped
        stderr: Option<String>,
    },

    /// The process ran longer than its timeout and was terminated
    #[error("'{command}' timed out after {timeout_ms}ms")]
    TimedOut {
        command: String,
        timeout_ms: u64,
        stderr: Option<String>,
    },

    #[error("Process group error: {0}")]
    ProcessGroup(String),

    #[error("IO error: {0}")]
    IO(String),

    #[error("Control error: {0}")]
    Control(String),
}

impl ProcessError {
    /// Whether the process was killed rather than failing on its own.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ProcessError::Interrupted { .. } | ProcessError::TimedOut { .. }
        )
    }

    /// Buffered stderr of a process that was started.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ProcessError::NonZeroExit { stderr, .. }
            | ProcessError::Interrupted { stderr, .. }
            | ProcessError::TimedOut { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// Exit code of the process, when it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::NonZeroExit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

impl From<ProcessGroupError> for ProcessError {
    fn from(err: ProcessGroupError) -> Self {
        ProcessError::ProcessGroup(err.to_string())
    }
}

impl From<std::io::Error> for ProcessError {
    fn from(err: std::io::Error) -> Self {
        ProcessError::IO(err.to_string())
    }
}
