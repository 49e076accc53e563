use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::process::{
    arg::{Arg, ArgFlags, RenderedArgs, render_args, render_command_line},
    encoding::Encoding,
    error::ProcessError,
    filter::{LineFilter, LineFilterFn, LogLevel},
};

/// Default time given to a process to exit after a cooperative interrupt.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 2000;

/// Configuration of one child process invocation.
///
/// `ProcessConfig` is a plain value built with consuming setters. It is not
/// modified by running it, so the same configuration can be cloned and run
/// several times.
///
/// # Examples
///
/// ```rust
/// use tcrm_process::process::{
///     arg::ArgFlags,
///     config::{ProcessConfig, StreamPolicy},
/// };
///
/// let config = ProcessConfig::new("git")
///     .arg("clone")
///     .arg_with("https://example.com/repo.git", ArgFlags::new().quote())
///     .named_arg("--depth", "1")
///     .named_arg("--branch=", "main")
///     .stdout_policy(StreamPolicy::KeepInString)
///     .allow_failure(true)
///     .timeout_ms(60_000);
///
/// assert_eq!(
///     config.command_line(),
///     "git clone \"https://example.com/repo.git\" --depth 1 --branch=main"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Name used in diagnostics, defaults to the binary's file stem
    pub name: Option<String>,

    /// The executable to run
    pub binary: String,

    /// Arguments, rendered with their flags at spawn time
    pub args: Vec<Arg>,

    /// Working directory, created if missing
    pub working_dir: Option<String>,

    /// Environment variables added to the inherited environment
    pub env: Option<HashMap<String, String>>,

    pub stdout: StreamConfig,
    pub stderr: StreamConfig,

    /// Text written to the child's stdin, which is closed afterwards
    pub stdin: Option<String>,

    pub flags: ProcessFlags,

    /// Exit codes considered a success
    pub success_exit_codes: BTreeSet<i32>,

    /// Maximum allowed runtime in milliseconds
    pub timeout_ms: Option<u64>,

    /// Time between the cooperative interrupt and the forced kill
    pub grace_period_ms: u64,

    /// Log file written by the child, dumped when the process fails
    pub external_error_log: Option<PathBuf>,

    /// Log the command line without running anything
    pub dry_run: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        ProcessConfig {
            name: None,
            binary: String::new(),
            args: Vec::new(),
            working_dir: None,
            env: None,
            stdout: StreamConfig::new(LogLevel::Trace),
            stderr: StreamConfig::new(LogLevel::Error),
            stdin: None,
            flags: ProcessFlags::default(),
            success_exit_codes: BTreeSet::from([0]),
            timeout_ms: None,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            external_error_log: None,
            dry_run: false,
        }
    }
}

impl ProcessConfig {
    pub fn new(binary: impl Into<String>) -> Self {
        ProcessConfig {
            binary: binary.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn arg(self, value: impl Into<String>) -> Self {
        self.push_arg(Arg::new(value))
    }

    pub fn arg_with(self, value: impl Into<String>, flags: ArgFlags) -> Self {
        self.push_arg(Arg::new(value).flags(flags))
    }

    pub fn named_arg(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_arg(Arg::named(name, value))
    }

    pub fn named_arg_with(
        self,
        name: impl Into<String>,
        value: impl Into<String>,
        flags: ArgFlags,
    ) -> Self {
        self.push_arg(Arg::named(name, value).flags(flags))
    }

    /// Adds a path argument, always quoted in diagnostics.
    pub fn path_arg(self, path: impl AsRef<Path>, flags: ArgFlags) -> Self {
        let value = path.as_ref().to_string_lossy().into_owned();
        self.push_arg(Arg::new(value).flags(flags.quote()))
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Arg::new));
        self
    }

    pub fn push_arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env<K, V, I>(mut self, env: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.env = Some(env.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn stdout_policy(mut self, policy: StreamPolicy) -> Self {
        self.stdout.policy = policy;
        self
    }

    pub fn stdout_level(mut self, level: LogLevel) -> Self {
        self.stdout.level = level;
        self
    }

    pub fn stdout_encoding(mut self, encoding: Encoding) -> Self {
        self.stdout.encoding = encoding;
        self
    }

    pub fn stdout_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&mut LineFilter) + Send + Sync + 'static,
    {
        self.stdout.filter = Some(Arc::new(filter));
        self
    }

    pub fn stderr_policy(mut self, policy: StreamPolicy) -> Self {
        self.stderr.policy = policy;
        self
    }

    pub fn stderr_level(mut self, level: LogLevel) -> Self {
        self.stderr.level = level;
        self
    }

    pub fn stderr_encoding(mut self, encoding: Encoding) -> Self {
        self.stderr.encoding = encoding;
        self
    }

    pub fn stderr_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&mut LineFilter) + Send + Sync + 'static,
    {
        self.stderr.filter = Some(Arc::new(filter));
        self
    }

    /// Switches both streams to UTF-16, for programs that write wide output.
    pub fn utf16_output(mut self, enabled: bool) -> Self {
        let encoding = if enabled {
            Encoding::Utf16
        } else {
            Encoding::Unknown
        };
        self.stdout.encoding = encoding;
        self.stderr.encoding = encoding;
        self
    }

    pub fn stdin(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(text.into());
        self
    }

    pub fn flags(mut self, flags: ProcessFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn allow_failure(mut self, b: bool) -> Self {
        self.flags.allow_failure = b;
        self
    }

    /// Whether the parent's Ctrl-C reaches this run through the Ctrl-C bridge.
    pub fn terminate_on_interrupt(mut self, b: bool) -> Self {
        self.flags.terminate_on_interrupt = b;
        self
    }

    pub fn ignore_output_on_success(mut self, b: bool) -> Self {
        self.flags.ignore_output_on_success = b;
        self
    }

    pub fn success_exit_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = i32>,
    {
        self.success_exit_codes = codes.into_iter().collect();
        self
    }

    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout_ms = Some(timeout);
        self
    }

    pub fn grace_period_ms(mut self, grace: u64) -> Self {
        self.grace_period_ms = grace;
        self
    }

    pub fn external_error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.external_error_log = Some(path.into());
        self
    }

    pub fn dry_run(mut self, b: bool) -> Self {
        self.dry_run = b;
        self
    }

    /// Name shown in diagnostics.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        Path::new(&self.binary)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary.clone())
    }

    /// Arguments as passed to the OS, with the display string.
    pub fn rendered_args(&self) -> RenderedArgs {
        render_args(&self.args)
    }

    /// Command line shown in diagnostics, secrets masked.
    pub fn command_line(&self) -> String {
        render_command_line(&self.binary, &self.args)
    }

    pub fn validate(&self) -> Result<(), ProcessError> {
        const MAX_BINARY_LEN: usize = 4096;
        const MAX_ARG_LEN: usize = 32768;
        const MAX_WORKING_DIR_LEN: usize = 4096;
        const MAX_ENV_KEY_LEN: usize = 1024;
        const MAX_ENV_VALUE_LEN: usize = 32768;

        // Validate binary
        if self.binary.is_empty() {
            return Err(ProcessError::InvalidConfiguration(
                "process: nothing to run".to_string(),
            ));
        }
        if self.binary.trim() != self.binary {
            return Err(ProcessError::InvalidConfiguration(
                "Binary cannot have leading or trailing whitespace".to_string(),
            ));
        }
        if self.binary.contains('\0') {
            return Err(ProcessError::InvalidConfiguration(
                "Binary cannot contain null bytes".to_string(),
            ));
        }
        if self.binary.len() > MAX_BINARY_LEN {
            return Err(ProcessError::InvalidConfiguration(
                "Binary path exceeds maximum allowed length".to_string(),
            ));
        }
        if looks_like_path(&self.binary) && !Path::new(&self.binary).is_file() {
            return Err(ProcessError::InvalidConfiguration(format!(
                "Binary '{}' does not exist",
                self.binary
            )));
        }

        // Validate arguments
        for arg in &self.args {
            let name = arg.name.as_deref().unwrap_or_default();
            if name.contains('\0') || arg.value.contains('\0') {
                return Err(ProcessError::InvalidConfiguration(format!(
                    "Argument '{}{}' cannot contain null bytes",
                    name,
                    arg.value.replace('\0', "\\0")
                )));
            }
            if name.len() + arg.value.len() > MAX_ARG_LEN {
                return Err(ProcessError::InvalidConfiguration(format!(
                    "Argument '{}' exceeds maximum length",
                    name
                )));
            }
        }

        // Validate working directory
        if let Some(dir) = &self.working_dir {
            if dir.trim().is_empty() {
                return Err(ProcessError::InvalidConfiguration(
                    "Working directory cannot be empty".to_string(),
                ));
            }
            if dir.len() > MAX_WORKING_DIR_LEN {
                return Err(ProcessError::InvalidConfiguration(
                    "Working directory path exceeds maximum length".to_string(),
                ));
            }
            let path = Path::new(dir);
            if path.exists() && !path.is_dir() {
                return Err(ProcessError::InvalidConfiguration(format!(
                    "Working directory '{}' is not a directory",
                    dir
                )));
            }
        }

        // Validate environment variables
        if let Some(env) = &self.env {
            for (k, v) in env {
                if k.is_empty() {
                    return Err(ProcessError::InvalidConfiguration(
                        "Environment variable key cannot be empty".to_string(),
                    ));
                }
                if k.contains('=') {
                    return Err(ProcessError::InvalidConfiguration(format!(
                        "Environment variable key '{}' cannot contain '='",
                        k
                    )));
                }
                if k.contains('\0') || v.contains('\0') {
                    return Err(ProcessError::InvalidConfiguration(format!(
                        "Environment variable '{}' cannot contain null bytes",
                        k
                    )));
                }
                if k.len() > MAX_ENV_KEY_LEN {
                    return Err(ProcessError::InvalidConfiguration(format!(
                        "Environment variable key '{}' exceeds maximum length",
                        k
                    )));
                }
                if v.len() > MAX_ENV_VALUE_LEN {
                    return Err(ProcessError::InvalidConfiguration(format!(
                        "Environment variable '{}' value exceeds maximum length",
                        k
                    )));
                }
            }
        }

        // Validate exit codes and timings
        if self.success_exit_codes.is_empty() {
            return Err(ProcessError::InvalidConfiguration(
                "At least one success exit code is required".to_string(),
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(ProcessError::InvalidConfiguration(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.grace_period_ms == 0 {
            return Err(ProcessError::InvalidConfiguration(
                "Grace period must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn looks_like_path(binary: &str) -> bool {
    binary.contains('/') || (cfg!(windows) && binary.contains('\\'))
}

/// Per-stream handling: policy, log level, encoding and filter.
#[derive(Clone)]
pub struct StreamConfig {
    pub policy: StreamPolicy,
    /// Level at which forwarded lines are logged before filtering
    pub level: LogLevel,
    pub encoding: Encoding,
    pub filter: Option<LineFilterFn>,
}

impl StreamConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            policy: StreamPolicy::default(),
            level,
            encoding: Encoding::default(),
            filter: None,
        }
    }
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("policy", &self.policy)
            .field("level", &self.level)
            .field("encoding", &self.encoding)
            .field("filter", &self.filter.as_ref().map(|_| "Fn(&mut LineFilter)"))
            .finish()
    }
}

/// What happens to a child's stdout or stderr.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPolicy {
    /// Decode lines, filter them and log them
    #[default]
    ForwardToLog,
    /// Send the stream to the null device
    Discard,
    /// Buffer everything, available as text after the process finished
    KeepInString,
    /// Share the parent's stream
    Inherit,
}

impl StreamPolicy {
    /// Whether the stream goes through a pipe owned by the runner.
    pub fn is_piped(self) -> bool {
        matches!(self, StreamPolicy::ForwardToLog | StreamPolicy::KeepInString)
    }
}

/// Process-level behavior flags.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessFlags {
    /// Exit codes outside the success set are not an error
    pub allow_failure: bool,
    /// Let the parent's Ctrl-C interrupt the run, see
    /// [`ProcessRunner::interrupt_on_ctrl_c`](crate::process::tokio::runner::ProcessRunner::interrupt_on_ctrl_c).
    /// An explicit interrupt applies either way.
    pub terminate_on_interrupt: bool,
    /// Only log forwarded output if the process fails
    pub ignore_output_on_success: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamSource {
    #[default]
    Stdout = 0,
    Stderr = 1,
}

impl std::fmt::Display for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamSource::Stdout => write!(f, "stdout"),
            StreamSource::Stderr => write!(f, "stderr"),
        }
    }
}
