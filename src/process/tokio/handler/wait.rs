use std::{io, process::ExitStatus, time::Duration};

use crate::process::{error::ProcessError, tokio::run_loop::RunLoop};

impl RunLoop {
    pub(crate) fn handle_wait_result(
        &mut self,
        result: io::Result<ExitStatus>,
    ) -> Result<i32, ProcessError> {
        match result {
            Ok(status) => {
                let exit_code = exit_code_of(status);
                self.context.set_exit_code(exit_code);

                #[cfg(feature = "tracing")]
                tracing::trace!(exit_code, "child process finished");

                Ok(exit_code)
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "Child process wait failed");

                Err(ProcessError::IO(format!(
                    "Failed to wait for child process: {}",
                    e
                )))
            }
        }
    }

    /// Waits for the stages before the last one, killing the group if one of
    /// them is still running after the grace period.
    pub(crate) async fn wait_other_stages(&mut self) {
        let grace = Duration::from_millis(self.config.grace_period_ms);
        let others = self.children.len().saturating_sub(1);

        for index in 0..others {
            if tokio::time::timeout(grace, self.children[index].wait())
                .await
                .is_ok()
            {
                continue;
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(stage = index, "pipeline stage still running");

            self.force_kill();
            let _ = tokio::time::timeout(grace, self.children[index].wait()).await;
        }
    }
}

/// Exit code of a finished process, `128 + signal` when a signal killed it.
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
