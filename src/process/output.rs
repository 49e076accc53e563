use crate::process::filter::{CapturedLine, LogLevel};

/// What a finished run leaves behind.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code of the process, or of the last stage of a pipeline
    ///
    /// On Unix, a process killed by a signal reports `128 + signal`.
    pub exit_code: i32,

    /// Whole stdout, only with [`StreamPolicy::KeepInString`](crate::process::config::StreamPolicy::KeepInString)
    pub stdout: Option<String>,

    /// Whole stderr, only with [`StreamPolicy::KeepInString`](crate::process::config::StreamPolicy::KeepInString)
    pub stderr: Option<String>,

    /// Forwarded lines kept by the filters, in the order they were read
    pub lines: Vec<CapturedLine>,
}

impl ProcessOutput {
    /// Forwarded lines classified at `level`.
    pub fn lines_at(&self, level: LogLevel) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(move |l| l.level == level)
            .map(|l| l.line.as_str())
    }

    /// Forwarded lines joined with `\n`.
    pub fn joined_lines(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
