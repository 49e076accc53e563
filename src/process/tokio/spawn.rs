use std::process::Stdio;

use tokio::{
    io::AsyncWriteExt,
    process::{Child, ChildStdin, Command},
};

use crate::process::{
    config::{ProcessConfig, StreamPolicy, StreamSource},
    error::ProcessError,
    group::ProcessGroup,
    pipe::AsyncPipe,
    tokio::runner::ProcessRunner,
};

/// Children of a started run, with the pipes of the last stage.
#[derive(Debug)]
pub(crate) struct SpawnedStages {
    pub(crate) group: ProcessGroup,
    pub(crate) children: Vec<Child>,
    pub(crate) stdout: AsyncPipe,
    pub(crate) stderr: AsyncPipe,
}

/// Configures a `tokio::process::Command` from a stage's configuration.
///
/// Sets the binary, rendered arguments, working directory and environment.
/// Standard streams are bound by the caller.
pub(crate) fn setup_command(config: &ProcessConfig) -> Command {
    let mut cmd = Command::new(&config.binary);
    cmd.args(config.rendered_args().argv);

    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }

    if let Some(envs) = &config.env {
        cmd.envs(envs);
    }

    cmd.kill_on_drop(true);
    cmd
}

fn stream_stdio(policy: StreamPolicy, pipe: &mut AsyncPipe) -> Stdio {
    match policy {
        StreamPolicy::ForwardToLog | StreamPolicy::KeepInString => pipe.create(),
        StreamPolicy::Discard => Stdio::null(),
        StreamPolicy::Inherit => Stdio::inherit(),
    }
}

impl ProcessRunner {
    /// Spawns every stage into one process group, left to right.
    ///
    /// Each stage's stdout becomes the next stage's stdin. Only the last
    /// stage's streams follow their policies, earlier stages have their
    /// stderr discarded unless it is inherited.
    pub(crate) fn spawn_stages(&self) -> Result<SpawnedStages, ProcessError> {
        let last = self.stages.len() - 1;
        let mut group = ProcessGroup::new();
        let mut children = Vec::with_capacity(self.stages.len());
        let mut stdout = AsyncPipe::new(StreamSource::Stdout);
        let mut stderr = AsyncPipe::new(StreamSource::Stderr);
        let mut previous: Option<Stdio> = None;

        for (index, stage) in self.stages.iter().enumerate() {
            let mut cmd = setup_command(stage);

            let feed_stdin = previous.is_none() && stage.stdin.is_some();
            match previous.take() {
                Some(stdio) => cmd.stdin(stdio),
                None if feed_stdin => cmd.stdin(Stdio::piped()),
                None => cmd.stdin(Stdio::null()),
            };

            if index == last {
                cmd.stdout(stream_stdio(stage.stdout.policy, &mut stdout));
                cmd.stderr(stream_stdio(stage.stderr.policy, &mut stderr));
            } else {
                cmd.stdout(Stdio::piped());
                cmd.stderr(match stage.stderr.policy {
                    StreamPolicy::Inherit => Stdio::inherit(),
                    _ => Stdio::null(),
                });
            }

            let mut cmd = group.create_with_command(cmd)?;

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %e, binary = %stage.binary, "Failed to spawn child process");

                    if group.is_active() {
                        let _ = group.terminate_group();
                    }
                    return Err(ProcessError::SpawnFailure {
                        command: stage.command_line(),
                        message: e.to_string(),
                    });
                }
            };

            if let Some(pid) = child.id() {
                #[cfg(feature = "tracing")]
                tracing::trace!(pid, stage = index, "child process spawned");

                if let Err(_e) = group.assign_child(pid) {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_e, pid, "Failed to assign process to group");
                }
            }

            if feed_stdin {
                if let (Some(text), Some(stdin)) = (&stage.stdin, child.stdin.take()) {
                    write_stdin(stdin, text.clone());
                }
            }

            if index != last {
                let out = child.stdout.take().ok_or_else(|| {
                    ProcessError::IO("Failed to take stdout of pipeline stage".to_string())
                })?;
                previous = Some(out.try_into()?);
            }

            children.push(child);
        }

        if let Some(child) = children.last_mut() {
            if let Some(out) = child.stdout.take() {
                stdout.attach(out);
            }
            if let Some(err) = child.stderr.take() {
                stderr.attach(err);
            }
        }

        Ok(SpawnedStages {
            group,
            children,
            stdout,
            stderr,
        })
    }
}

/// Writes `text` to the child's stdin in the background, then closes it.
fn write_stdin(mut stdin: ChildStdin, text: String) {
    tokio::spawn(async move {
        if let Err(_e) = stdin.write_all(text.as_bytes()).await {
            // the child may exit without reading everything
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %_e, "Failed to write to stdin");
        }
        if let Err(_e) = stdin.shutdown().await {
            #[cfg(feature = "tracing")]
            tracing::trace!(error = %_e, "Failed to close stdin");
        }
    });
}
