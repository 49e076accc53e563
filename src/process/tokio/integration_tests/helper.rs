#[cfg(feature = "tracing")]
use std::{
    io::Write,
    sync::{Arc, Mutex},
};
use std::time::UNIX_EPOCH;

use crate::process::{state::ProcessState, tokio::runner::ProcessRunner};

pub(crate) fn expected_finished_runner_state(runner: &ProcessRunner) {
    assert_eq!(runner.state(), ProcessState::Finalized);
    assert!(
        runner
            .created_at()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
            > 0
    );
    assert!(runner.process_id().is_some());
    assert!(runner.exit_code().is_some());
    assert!(runner.running_at().unwrap() <= runner.finished_at().unwrap());
}

pub(crate) fn expected_unspawned_runner_state(runner: &ProcessRunner) {
    assert_eq!(runner.state(), ProcessState::Finalized);
    assert!(runner.process_id().is_none());
    assert!(runner.running_at().is_none());
    assert!(runner.finished_at().is_some());
}

/// Whether `pid` is a live process, zombies count as gone.
#[cfg(unix)]
pub(crate) fn process_is_running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => {
            // the state follows the parenthesized command name
            let state = stat
                .rsplit_once(") ")
                .and_then(|(_, rest)| rest.chars().next());
            !matches!(state, Some('Z') | Some('X') | None)
        }
        Err(_) => {
            use nix::{sys::signal::kill, unistd::Pid};
            kill(Pid::from_raw(pid as i32), None).is_ok()
        }
    }
}

/// Log sink for tests inspecting diagnostics.
#[cfg(feature = "tracing")]
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

#[cfg(feature = "tracing")]
impl CapturedLogs {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(feature = "tracing")]
impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
