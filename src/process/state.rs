/// Lifecycle of a process run.
///
/// `Unstarted → Running → (Completed | Interrupted | TimedOut) → Finalized`.
/// The terminal states are only observable between the child exiting and the
/// outcome being resolved, `Finalized` is where every run ends.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Unstarted,
    Running,
    Completed,
    Interrupted,
    TimedOut,
    Finalized,
}

impl From<u8> for ProcessState {
    fn from(v: u8) -> Self {
        match v {
            0 => ProcessState::Unstarted,
            1 => ProcessState::Running,
            2 => ProcessState::Completed,
            3 => ProcessState::Interrupted,
            4 => ProcessState::TimedOut,
            _ => ProcessState::Finalized,
        }
    }
}

impl From<ProcessState> for u8 {
    fn from(state: ProcessState) -> Self {
        match state {
            ProcessState::Unstarted => 0,
            ProcessState::Running => 1,
            ProcessState::Completed => 2,
            ProcessState::Interrupted => 3,
            ProcessState::TimedOut => 4,
            ProcessState::Finalized => 5,
        }
    }
}

/// Why the poll loop stopped waiting for the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    /// The child exited on its own
    Exited,
    Interrupted,
    TimedOut,
}

impl StopReason {
    pub(crate) fn state(self) -> ProcessState {
        match self {
            StopReason::Exited => ProcessState::Completed,
            StopReason::Interrupted => ProcessState::Interrupted,
            StopReason::TimedOut => ProcessState::TimedOut,
        }
    }
}
