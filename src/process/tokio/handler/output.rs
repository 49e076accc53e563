use crate::{
    helper::tracing::log_line,
    process::{
        config::{StreamPolicy, StreamSource},
        error::ProcessError,
        tokio::run_loop::RunLoop,
    },
};

impl RunLoop {
    pub(crate) fn handle_read(&mut self, source: StreamSource, read: Result<usize, ProcessError>) {
        match read {
            Ok(0) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(stream = %source, "pipe closed");
            }
            Ok(_) => self.flush_lines(source, false),
            Err(_e) => {
                // the pipe is closed now, the other stream keeps going
                #[cfg(feature = "tracing")]
                tracing::debug!(stream = %source, error = %_e, "continuing without stream");
            }
        }
    }

    /// Logs and records the complete lines of a forwarded stream.
    ///
    /// With `finished`, the unterminated tail is flushed as well.
    pub(crate) fn flush_lines(&mut self, source: StreamSource, finished: bool) {
        let stream = self.stream_mut(source);
        if stream.config.policy != StreamPolicy::ForwardToLog {
            return;
        }

        let kept = stream.take_lines(finished);
        for entry in kept {
            if !self.config.flags.ignore_output_on_success {
                log_line(&self.name, source, entry.level, &entry.line);
            }
            self.lines.push(entry.into());
        }
    }
}
