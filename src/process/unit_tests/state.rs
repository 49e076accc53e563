use crate::process::state::{ProcessState, StopReason};

#[test]
fn u8_conversion() {
    for state in [
        ProcessState::Unstarted,
        ProcessState::Running,
        ProcessState::Completed,
        ProcessState::Interrupted,
        ProcessState::TimedOut,
        ProcessState::Finalized,
    ] {
        let raw: u8 = state.into();
        assert_eq!(ProcessState::from(raw), state);
    }
    assert_eq!(ProcessState::from(200), ProcessState::Finalized);
}

#[test]
fn stop_reason_state() {
    assert_eq!(StopReason::Exited.state(), ProcessState::Completed);
    assert_eq!(StopReason::Interrupted.state(), ProcessState::Interrupted);
    assert_eq!(StopReason::TimedOut.state(), ProcessState::TimedOut);
}
