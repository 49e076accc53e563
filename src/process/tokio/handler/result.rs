#[cfg(feature = "tracing")]
use crate::helper::tracing::level_enabled;
use crate::{
    helper::tracing::log_line,
    process::{
        config::StreamPolicy,
        error::ProcessError,
        filter::LogLevel,
        output::ProcessOutput,
        state::StopReason,
        tokio::run_loop::{OutputStream, RunLoop},
    },
};

impl RunLoop {
    /// Classifies the run once the streams are drained.
    ///
    /// Cancellations are reported as such regardless of the exit code. An
    /// exit code outside the success set is an error unless failures are
    /// allowed, the exit code stays available in the output either way.
    pub(crate) fn resolve_outcome(
        &self,
        reason: StopReason,
        waited: Result<i32, ProcessError>,
    ) -> Option<ProcessError> {
        match reason {
            StopReason::Interrupted => {
                #[cfg(feature = "tracing")]
                tracing::debug!(process = %self.name, "process was interrupted");

                self.dump_error_log();
                self.dump_output();
                return Some(ProcessError::Interrupted {
                    command: self.command.clone(),
                    stderr: self.buffered_stderr(),
                });
            }
            StopReason::TimedOut => {
                let timeout_ms = self.config.timeout_ms.unwrap_or_default();

                #[cfg(feature = "tracing")]
                tracing::warn!(process = %self.name, timeout_ms, "process timed out");

                self.dump_error_log();
                self.dump_output();
                return Some(ProcessError::TimedOut {
                    command: self.command.clone(),
                    timeout_ms,
                    stderr: self.buffered_stderr(),
                });
            }
            StopReason::Exited => {}
        }

        let exit_code = match waited {
            Ok(code) => code,
            Err(e) => return Some(e),
        };

        if self.config.success_exit_codes.contains(&exit_code) {
            self.report_problems();
            return None;
        }

        if self.config.flags.allow_failure {
            #[cfg(feature = "tracing")]
            tracing::debug!(process = %self.name, exit_code, "process failed, ignoring");
            return None;
        }

        self.dump_error_log();
        self.dump_output();

        #[cfg(feature = "tracing")]
        tracing::error!(command = %self.command, "{} returned {}", self.name, exit_code);

        Some(ProcessError::NonZeroExit {
            name: self.name.clone(),
            command: self.command.clone(),
            exit_code,
            stderr: self.buffered_stderr(),
        })
    }

    /// Whole stderr of the last stage, unless it was discarded or inherited.
    fn buffered_stderr(&self) -> Option<String> {
        self.stderr
            .config
            .policy
            .is_piped()
            .then(|| self.stderr.decoder.text())
    }

    pub(crate) fn take_output(&mut self, exit_code: i32) -> ProcessOutput {
        ProcessOutput {
            exit_code,
            stdout: kept_text(&self.stdout),
            stderr: kept_text(&self.stderr),
            lines: std::mem::take(&mut self.lines),
        }
    }

    /// Warns about warning and error lines of a process that succeeded.
    fn report_problems(&self) {
        if self.config.flags.ignore_output_on_success {
            return;
        }

        let problems: Vec<_> = self
            .lines
            .iter()
            .filter(|l| l.level.is_problem())
            .collect();
        if problems.is_empty() {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            process = %self.name,
            count = problems.len(),
            "process exited successfully, but had warnings or errors"
        );

        for line in problems {
            log_line(&self.name, line.stream, line.level, &line.line);
        }
    }

    /// Replays output that was held back, then dumps buffered stderr.
    fn dump_output(&self) {
        if self.config.flags.ignore_output_on_success {
            for line in &self.lines {
                log_line(&self.name, line.stream, line.level, &line.line);
            }
        }

        if self.stderr.config.policy != StreamPolicy::KeepInString {
            return;
        }

        let text = self.stderr.decoder.text();
        if text.trim().is_empty() {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::error!(process = %self.name, "stderr:");

        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            log_line(&self.name, self.stderr.pipe.source(), LogLevel::Error, line);
        }
    }

    #[cfg(feature = "tracing")]
    fn dump_error_log(&self) {
        let Some(path) = &self.config.external_error_log else {
            return;
        };
        if !level_enabled(LogLevel::Error) {
            return;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::error!(process = %self.name, path = %path.display(), "content of error log:");
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    tracing::error!(process = %self.name, "        {}", line);
                }
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no error log to dump");
            }
        }
    }

    #[cfg(not(feature = "tracing"))]
    fn dump_error_log(&self) {}
}

fn kept_text(stream: &OutputStream) -> Option<String> {
    (stream.config.policy == StreamPolicy::KeepInString).then(|| stream.decoder.text())
}
