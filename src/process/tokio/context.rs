use std::{
    sync::atomic::{AtomicI64, AtomicU8, AtomicU32, AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::process::state::ProcessState;

const NO_EXIT_CODE: i64 = i64::MIN;

/// Status of a run shared between the runner and its poll loop task.
#[derive(Debug)]
pub(crate) struct ProcessContext {
    state: AtomicU8,
    process_id: AtomicU32,
    exit_code: AtomicI64,
    created_at: AtomicU64,
    running_at: AtomicU64,
    finished_at: AtomicU64,
}

impl ProcessContext {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(ProcessState::Unstarted.into()),
            process_id: AtomicU32::new(0),
            exit_code: AtomicI64::new(NO_EXIT_CODE),
            created_at: AtomicU64::new(to_nanos(SystemTime::now())),
            running_at: AtomicU64::new(0),
            finished_at: AtomicU64::new(0),
        }
    }

    pub(crate) fn get_state(&self) -> ProcessState {
        self.state.load(Ordering::SeqCst).into()
    }

    /// Stores the state, stamping the time the run started or ended.
    pub(crate) fn set_state(&self, new_state: ProcessState) {
        match new_state {
            ProcessState::Running => Self::set_time(&self.running_at),
            ProcessState::Finalized => Self::set_time(&self.finished_at),
            _ => {}
        }
        self.state.store(new_state.into(), Ordering::SeqCst);
    }

    pub(crate) fn get_exit_code(&self) -> Option<i32> {
        match self.exit_code.load(Ordering::SeqCst) {
            NO_EXIT_CODE => None,
            code => Some(code as i32),
        }
    }

    pub(crate) fn set_exit_code(&self, code: i32) {
        self.exit_code.store(i64::from(code), Ordering::SeqCst);
    }

    pub(crate) fn get_process_id(&self) -> Option<u32> {
        match self.process_id.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub(crate) fn set_process_id(&self, pid: u32) {
        self.process_id.store(pid, Ordering::SeqCst);
    }

    pub(crate) fn get_create_at(&self) -> SystemTime {
        from_nanos(self.created_at.load(Ordering::SeqCst))
    }

    pub(crate) fn get_running_at(&self) -> Option<SystemTime> {
        Self::get_time(&self.running_at)
    }

    pub(crate) fn get_finished_at(&self) -> Option<SystemTime> {
        Self::get_time(&self.finished_at)
    }

    /// `0` marks a timestamp that was never set.
    fn get_time(store: &AtomicU64) -> Option<SystemTime> {
        match store.load(Ordering::SeqCst) {
            0 => None,
            nanos => Some(from_nanos(nanos)),
        }
    }

    fn set_time(store: &AtomicU64) {
        store.store(to_nanos(SystemTime::now()), Ordering::SeqCst);
    }
}

fn to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

fn from_nanos(nanos: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(nanos)
}
