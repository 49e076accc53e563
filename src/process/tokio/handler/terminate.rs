use std::time::Duration;

use tokio::time::Instant;

use crate::process::{state::StopReason, tokio::run_loop::RunLoop};

impl RunLoop {
    /// Asks the process group to exit and returns when to kill it.
    ///
    /// Returns `None` when the group was killed right away because the
    /// cooperative request could not be delivered.
    pub(crate) fn begin_cancel(&mut self, _reason: StopReason) -> Option<Instant> {
        #[cfg(feature = "tracing")]
        tracing::debug!(reason = ?_reason, grace_period_ms = self.config.grace_period_ms, "interrupting process group");

        if let Err(_e) = self.group.interrupt_group() {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, "Failed to interrupt process group, terminating");

            self.force_kill();
            return None;
        }

        Some(Instant::now() + Duration::from_millis(self.config.grace_period_ms))
    }

    /// Kills the whole process group, falling back to the direct children
    /// when the group can't be signalled.
    pub(crate) fn force_kill(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;

        #[cfg(feature = "tracing")]
        tracing::trace!("terminating process group");

        let terminated = self.group.is_active() && self.group.terminate_group().is_ok();
        if terminated {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!("Failed to terminate process group, killing children");

        for child in &mut self.children {
            if let Err(_e) = child.start_kill() {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %_e, "Failed to kill child process");
            }
        }
    }

    /// Kills whatever the process left running in its group.
    pub(crate) fn terminate_remaining(&mut self) {
        if self.killed || !self.group.is_active() {
            return;
        }

        if let Err(_e) = self.group.terminate_group() {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %_e, "Failed to terminate remaining processes");
        }
    }
}
