use std::sync::Arc;

use crate::process::config::StreamSource;

/// Target of diagnostics at [`LogLevel::Dump`].
pub const DUMP_TARGET: &str = "tcrm_process::dump";

/// Severity at which a forwarded output line is logged.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Below trace, emitted at `TRACE` on the [`DUMP_TARGET`] target so it
    /// can be filtered on its own
    Dump,
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Whether a line at this level counts as a diagnostic worth reporting
    /// even when the process succeeded.
    pub fn is_problem(self) -> bool {
        matches!(self, LogLevel::Warning | LogLevel::Error)
    }
}

/// A decoded output line handed to a stream's filter callback.
///
/// The callback may change `level` to reclassify the line, or set `ignore`
/// to drop it: ignored lines are neither logged nor recorded in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFilter {
    pub line: String,
    pub stream: StreamSource,
    pub level: LogLevel,
    pub ignore: bool,
}

impl LineFilter {
    pub fn new(line: impl Into<String>, stream: StreamSource, level: LogLevel) -> Self {
        Self {
            line: line.into(),
            stream,
            level,
            ignore: false,
        }
    }
}

/// Callback classifying the lines of a forwarded stream.
pub type LineFilterFn = Arc<dyn Fn(&mut LineFilter) + Send + Sync>;

/// A line that went through the filter and was kept.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLine {
    pub stream: StreamSource,
    pub level: LogLevel,
    pub line: String,
}

impl From<LineFilter> for CapturedLine {
    fn from(f: LineFilter) -> Self {
        Self {
            stream: f.stream,
            level: f.level,
            line: f.line,
        }
    }
}
