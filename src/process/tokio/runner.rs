use std::{sync::Arc, time::SystemTime};

use tokio::task::JoinHandle;

use crate::process::{
    config::ProcessConfig,
    error::ProcessError,
    interrupt::InterruptHandle,
    output::ProcessOutput,
    state::ProcessState,
    tokio::{context::ProcessContext, run_loop::RunReport},
};

/// Runs a child process, or a pipeline of them, to completion.
///
/// The runner spawns the process into its own process group (a Job Object on
/// Windows), reads both output streams without blocking, decodes them into
/// lines and applies the stream policies. Interrupting the run asks the whole
/// group to exit and kills it after the grace period, so [`join`](Self::join)
/// always returns in bounded time.
///
/// # Examples
///
/// ```rust
/// use tcrm_process::process::{
///     config::{ProcessConfig, StreamPolicy},
///     tokio::runner::ProcessRunner,
/// };
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     #[cfg(windows)]
///     let config = ProcessConfig::new("cmd").args(["/C", "echo hello"]);
///     #[cfg(unix)]
///     let config = ProcessConfig::new("echo").arg("hello");
///
///     let mut runner =
///         ProcessRunner::new(config.stdout_policy(StreamPolicy::KeepInString));
///     let output = runner.run().await?;
///
///     assert_eq!(output.exit_code, 0);
///     assert_eq!(output.stdout.as_deref().map(str::trim), Some("hello"));
///     Ok(())
/// }
/// ```
///
/// ## Interrupting from another task
///
/// ```rust
/// use tcrm_process::process::{config::ProcessConfig, tokio::runner::ProcessRunner};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     #[cfg(windows)]
///     let config = ProcessConfig::new("ping").args(["-n", "30", "127.0.0.1"]);
///     #[cfg(unix)]
///     let config = ProcessConfig::new("sleep").arg("30");
///
///     let mut runner = ProcessRunner::new(config.grace_period_ms(500));
///     let handle = runner.interrupt_handle();
///
///     runner.start().await?;
///     tokio::spawn(async move {
///         tokio::time::sleep(std::time::Duration::from_millis(100)).await;
///         handle.interrupt();
///     });
///
///     let result = runner.join().await;
///     assert!(result.is_err_and(|e| e.is_cancellation()));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct ProcessRunner {
    /// Never empty, the last stage is the one whose result is reported
    pub(crate) stages: Vec<ProcessConfig>,
    pub(crate) context: Arc<ProcessContext>,
    pub(crate) interrupt: InterruptHandle,
    pub(crate) task: Option<JoinHandle<RunReport>>,
    pub(crate) report: Option<RunReport>,
}

impl ProcessRunner {
    pub fn new(config: ProcessConfig) -> Self {
        Self::from_stages(vec![config])
    }

    /// Chains processes left to right, each stdout feeding the next stdin.
    ///
    /// The pipeline behaves like a single process: its exit code, output,
    /// flags and timeout are those of the last stage. All stages share one
    /// process group and are interrupted together.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InvalidConfiguration`] if `stages` is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tcrm_process::process::{
    ///     config::{ProcessConfig, StreamPolicy},
    ///     tokio::runner::ProcessRunner,
    /// };
    ///
    /// let runner = ProcessRunner::pipe([
    ///     ProcessConfig::new("git").args(["log", "--oneline"]),
    ///     ProcessConfig::new("head").args(["-n", "5"]).stdout_policy(StreamPolicy::KeepInString),
    /// ])?;
    /// assert_eq!(runner.command_line(), "git log --oneline | head -n 5");
    /// # Ok::<(), tcrm_process::process::error::ProcessError>(())
    /// ```
    pub fn pipe<I>(stages: I) -> Result<Self, ProcessError>
    where
        I: IntoIterator<Item = ProcessConfig>,
    {
        let stages: Vec<ProcessConfig> = stages.into_iter().collect();
        if stages.is_empty() {
            return Err(ProcessError::InvalidConfiguration(
                "pipe: no process to run".to_string(),
            ));
        }
        Ok(Self::from_stages(stages))
    }

    fn from_stages(stages: Vec<ProcessConfig>) -> Self {
        Self {
            stages,
            context: Arc::new(ProcessContext::new()),
            interrupt: InterruptHandle::new(),
            task: None,
            report: None,
        }
    }

    /// Configuration of the last stage.
    pub fn config(&self) -> &ProcessConfig {
        &self.stages[self.stages.len() - 1]
    }

    pub fn stages(&self) -> &[ProcessConfig] {
        &self.stages
    }

    /// Name used in diagnostics, stage names joined with `|` for pipelines.
    pub fn name(&self) -> String {
        self.stages
            .iter()
            .map(ProcessConfig::display_name)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Rendered command line, secrets masked.
    pub fn command_line(&self) -> String {
        self.stages
            .iter()
            .map(ProcessConfig::command_line)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Handle to interrupt the run from another task or thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Interrupts the run.
    ///
    /// Before [`start`](Self::start), nothing will be spawned. After the run
    /// finished, this does nothing.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    /// Interrupts the run when the current process receives Ctrl-C.
    ///
    /// Children run in their own process group and don't see the terminal's
    /// Ctrl-C. Without `terminate_on_interrupt`, the signal is ignored and
    /// the process runs to completion. The returned task can be aborted to
    /// stop listening.
    pub fn interrupt_on_ctrl_c(&self) -> JoinHandle<()> {
        let handle = self.interrupt.clone();
        let terminate = self.config().flags.terminate_on_interrupt;

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) if terminate => handle.interrupt(),
                Ok(()) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("interrupt received, process not flagged for termination");
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_e, "Failed to listen for Ctrl-C");
                }
            }
        })
    }

    /// Waits for the run to finish and returns its output.
    ///
    /// Can be called again after completion, returning the same outcome.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::NonZeroExit`] if the exit code is not a success and
    ///   failures aren't allowed
    /// - [`ProcessError::Interrupted`] or [`ProcessError::TimedOut`] if the
    ///   process was terminated
    /// - [`ProcessError::Control`] if the runner was never started
    /// - the error returned by [`start`](Self::start), if it failed
    pub async fn join(&mut self) -> Result<ProcessOutput, ProcessError> {
        if let Some(task) = self.task.take() {
            let report = match task.await {
                Ok(report) => report,
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %e, "Process task failed");

                    self.context.set_state(ProcessState::Finalized);
                    RunReport::failed(ProcessError::Control(format!(
                        "Process task failed: {}",
                        e
                    )))
                }
            };
            self.report = Some(report);
        }

        match &self.report {
            Some(report) => report.result(),
            None => Err(ProcessError::Control(
                "Process has not been started".to_string(),
            )),
        }
    }

    /// Starts the process and waits for it.
    pub async fn run(&mut self) -> Result<ProcessOutput, ProcessError> {
        self.start().await?;
        self.join().await
    }

    pub fn state(&self) -> ProcessState {
        self.context.get_state()
    }

    /// Process id of the last stage, once spawned.
    pub fn process_id(&self) -> Option<u32> {
        self.context.get_process_id()
    }

    /// Exit code, once the process exited.
    pub fn exit_code(&self) -> Option<i32> {
        self.context.get_exit_code()
    }

    /// Output of a joined run, also available when the run failed.
    pub fn output(&self) -> Option<&ProcessOutput> {
        self.report.as_ref().map(|r| &r.output)
    }

    /// Whole stdout of a joined run with the `KeepInString` policy.
    pub fn stdout_text(&self) -> Option<&str> {
        self.output().and_then(|o| o.stdout.as_deref())
    }

    /// Whole stderr of a joined run with the `KeepInString` policy.
    pub fn stderr_text(&self) -> Option<&str> {
        self.output().and_then(|o| o.stderr.as_deref())
    }

    pub fn created_at(&self) -> SystemTime {
        self.context.get_create_at()
    }

    pub fn running_at(&self) -> Option<SystemTime> {
        self.context.get_running_at()
    }

    pub fn finished_at(&self) -> Option<SystemTime> {
        self.context.get_finished_at()
    }
}

impl Drop for ProcessRunner {
    fn drop(&mut self) {
        // an unjoined run is cancelled, its task kills the group
        if self.task.is_some() {
            self.interrupt.interrupt();
        }
    }
}
