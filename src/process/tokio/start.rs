use std::path::Path;

use crate::{
    helper::tracing::MaybeInstrument,
    process::{
        config::ProcessConfig,
        error::ProcessError,
        output::ProcessOutput,
        state::ProcessState,
        tokio::{
            run_loop::{RunLoop, RunReport},
            runner::ProcessRunner,
        },
    },
};

impl ProcessRunner {
    /// Validates the configuration and spawns the process in the background.
    ///
    /// Output is read and the process is watched by a spawned task until it
    /// exits, use [`join`](Self::join) to wait for the outcome. Nothing is
    /// spawned when the run was interrupted before, or with `dry_run`.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::Control`] if the runner was already started
    /// - [`ProcessError::InvalidConfiguration`] if a stage fails validation
    /// - [`ProcessError::Interrupted`] if the run was interrupted before starting
    /// - [`ProcessError::SpawnFailure`] if a process could not be created
    ///
    /// The same error is returned by a later [`join`](Self::join).
    pub async fn start(&mut self) -> Result<(), ProcessError> {
        if self.task.is_some() || self.report.is_some() {
            return Err(ProcessError::Control(
                "Process has already been started".to_string(),
            ));
        }

        for stage in &self.stages {
            if let Err(e) = stage.validate() {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "Invalid process configuration");
                return Err(self.finish_early(e));
            }
        }

        let command = self.command_line();

        if self.interrupt.is_interrupted() {
            #[cfg(feature = "tracing")]
            tracing::debug!(%command, "interrupted before start, not spawning");
            return Err(self.finish_early(ProcessError::Interrupted {
                command,
                stderr: None,
            }));
        }

        #[cfg(feature = "tracing")]
        {
            if let Some(dir) = self.stages.iter().find_map(|s| s.working_dir.as_ref()) {
                tracing::debug!("> cd {}", dir);
            }
            tracing::debug!("> {}", command);
        }

        if self.stages.iter().any(|s| s.dry_run) {
            self.context.set_exit_code(0);
            self.context.set_state(ProcessState::Finalized);
            self.report = Some(RunReport::completed(ProcessOutput::default()));
            return Ok(());
        }

        for stage in &self.stages {
            if let Err(e) = prepare_stage(stage) {
                return Err(self.finish_early(e));
            }
        }

        let spawned = match self.spawn_stages() {
            Ok(spawned) => spawned,
            Err(e) => return Err(self.finish_early(e)),
        };

        if let Some(pid) = spawned.children.last().and_then(|c| c.id()) {
            self.context.set_process_id(pid);
        }
        self.context.set_state(ProcessState::Running);

        let name = self.name();
        let run_loop = RunLoop::new(
            self.context.clone(),
            self.interrupt.clone(),
            name.clone(),
            command,
            self.config().clone(),
            spawned,
        );
        self.task = Some(tokio::spawn(run_loop.run().maybe_instrument(name)));

        Ok(())
    }

    /// Ends a run that never got a running process.
    fn finish_early(&mut self, error: ProcessError) -> ProcessError {
        self.context.set_state(ProcessState::Finalized);
        self.report = Some(RunReport::failed(error.clone()));
        error
    }
}

/// Creates the working directory and removes a stale error log.
fn prepare_stage(stage: &ProcessConfig) -> Result<(), ProcessError> {
    if let Some(dir) = &stage.working_dir {
        let path = Path::new(dir);
        if !path.exists() {
            #[cfg(feature = "tracing")]
            tracing::trace!(dir = %dir, "creating working directory");

            std::fs::create_dir_all(path).map_err(|e| {
                ProcessError::IO(format!(
                    "Failed to create working directory '{}': {}",
                    dir, e
                ))
            })?;
        }
    }

    if let Some(log) = &stage.external_error_log {
        if log.exists() {
            #[cfg(feature = "tracing")]
            tracing::trace!(path = %log.display(), "removing stale error log");

            if let Err(_e) = std::fs::remove_file(log) {
                #[cfg(feature = "tracing")]
                tracing::warn!(path = %log.display(), error = %_e, "Failed to remove error log");
            }
        }
    }

    Ok(())
}
