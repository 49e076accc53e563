use std::{io, process::ExitStatus, sync::Arc, time::Duration};

use tokio::{process::Child, time::Instant};

use crate::process::{
    config::{ProcessConfig, StreamConfig, StreamSource},
    decoder::LineDecoder,
    error::ProcessError,
    filter::{CapturedLine, LineFilter},
    group::ProcessGroup,
    interrupt::InterruptHandle,
    output::ProcessOutput,
    pipe::AsyncPipe,
    state::{ProcessState, StopReason},
    tokio::{context::ProcessContext, spawn::SpawnedStages},
};

/// Final status of a run, kept by the runner once joined.
#[derive(Debug, Clone)]
pub(crate) struct RunReport {
    pub(crate) output: ProcessOutput,
    pub(crate) error: Option<ProcessError>,
}

impl RunReport {
    pub(crate) fn completed(output: ProcessOutput) -> Self {
        Self {
            output,
            error: None,
        }
    }

    pub(crate) fn failed(error: ProcessError) -> Self {
        Self {
            output: ProcessOutput {
                exit_code: -1,
                ..Default::default()
            },
            error: Some(error),
        }
    }

    pub(crate) fn result(&self) -> Result<ProcessOutput, ProcessError> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(self.output.clone()),
        }
    }
}

/// One of the last stage's output streams with its decoder.
#[derive(Debug)]
pub(crate) struct OutputStream {
    pub(crate) config: StreamConfig,
    pub(crate) decoder: LineDecoder,
    pub(crate) pipe: AsyncPipe,
}

impl OutputStream {
    pub(crate) fn new(config: StreamConfig, pipe: AsyncPipe) -> Self {
        Self {
            decoder: LineDecoder::new(config.encoding),
            config,
            pipe,
        }
    }

    /// Decodes the complete lines and runs them through the filter.
    ///
    /// Lines the filter ignores are dropped.
    pub(crate) fn take_lines(&mut self, finished: bool) -> Vec<LineFilter> {
        let source = self.pipe.source();
        let level = self.config.level;
        let filter = self.config.filter.as_ref();
        let mut kept = Vec::new();

        self.decoder.produce_lines(finished, |line| {
            let mut entry = LineFilter::new(line, source, level);
            if let Some(filter) = filter {
                filter(&mut entry);
            }
            if !entry.ignore {
                kept.push(entry);
            }
        });

        kept
    }
}

/// State owned by the task driving a started run.
#[derive(Debug)]
pub(crate) struct RunLoop {
    pub(crate) context: Arc<ProcessContext>,
    pub(crate) interrupt: InterruptHandle,
    pub(crate) name: String,
    pub(crate) command: String,
    /// Configuration of the last stage
    pub(crate) config: ProcessConfig,
    pub(crate) group: ProcessGroup,
    pub(crate) children: Vec<Child>,
    pub(crate) stdout: OutputStream,
    pub(crate) stderr: OutputStream,
    pub(crate) lines: Vec<CapturedLine>,
    pub(crate) killed: bool,
}

impl RunLoop {
    pub(crate) fn new(
        context: Arc<ProcessContext>,
        interrupt: InterruptHandle,
        name: String,
        command: String,
        config: ProcessConfig,
        spawned: SpawnedStages,
    ) -> Self {
        Self {
            context,
            interrupt,
            name,
            command,
            stdout: OutputStream::new(config.stdout.clone(), spawned.stdout),
            stderr: OutputStream::new(config.stderr.clone(), spawned.stderr),
            config,
            group: spawned.group,
            children: spawned.children,
            lines: Vec::new(),
            killed: false,
        }
    }

    pub(crate) async fn run(mut self) -> RunReport {
        let (reason, status) = self.poll().await;
        self.context.set_state(reason.state());

        let waited = self.handle_wait_result(status);
        self.wait_other_stages().await;
        self.terminate_remaining();
        self.finish_streams().await;

        let exit_code = waited.as_ref().copied().unwrap_or(-1);
        let error = self.resolve_outcome(reason, waited);
        let output = self.take_output(exit_code);

        self.context.set_state(ProcessState::Finalized);

        #[cfg(feature = "tracing")]
        tracing::trace!(exit_code, "run finished");

        RunReport { output, error }
    }

    /// Multiplexes both output streams, the exit of the last stage, the
    /// interrupt flag and the timers until the last stage exits.
    async fn poll(&mut self) -> (StopReason, io::Result<ExitStatus>) {
        let timeout_at = self
            .config
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let mut reason = StopReason::Exited;
        let mut kill_at: Option<Instant> = None;

        loop {
            if reason == StopReason::Exited && self.interrupt.is_interrupted() {
                reason = StopReason::Interrupted;
                kill_at = self.begin_cancel(reason);
            }
            let cancelling = reason != StopReason::Exited;

            let Some(child) = self.children.last_mut() else {
                return (reason, Err(io::Error::other("no child process to wait for")));
            };

            tokio::select! {
                read = self.stdout.pipe.read(false, &mut self.stdout.decoder), if !self.stdout.pipe.closed() => {
                    self.handle_read(StreamSource::Stdout, read);
                }
                read = self.stderr.pipe.read(false, &mut self.stderr.decoder), if !self.stderr.pipe.closed() => {
                    self.handle_read(StreamSource::Stderr, read);
                }
                status = child.wait() => return (reason, status),
                // the flag is checked at the top of the loop
                _ = self.interrupt.interrupted(), if !cancelling => {}
                _ = sleep_until(timeout_at), if !cancelling => {
                    reason = StopReason::TimedOut;
                    kill_at = self.begin_cancel(reason);
                }
                _ = sleep_until(kill_at), if cancelling && !self.killed => {
                    self.force_kill();
                }
            }
        }
    }

    /// Moves whatever is left in the pipes into the decoders and flushes the
    /// last lines, including unterminated ones.
    async fn finish_streams(&mut self) {
        for source in [StreamSource::Stdout, StreamSource::Stderr] {
            let stream = self.stream_mut(source);
            if let Err(_e) = stream.pipe.read(true, &mut stream.decoder).await {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %_e, "final read failed, keeping what was captured");
            }
            self.flush_lines(source, true);
        }
    }

    pub(crate) fn stream_mut(&mut self, source: StreamSource) -> &mut OutputStream {
        match source {
            StreamSource::Stdout => &mut self.stdout,
            StreamSource::Stderr => &mut self.stderr,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending::<()>().await,
    }
}
