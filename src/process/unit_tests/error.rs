use crate::process::{config::StreamSource, error::ProcessError, group::ProcessGroupError};

#[test]
fn non_zero_exit_message() {
    let error = ProcessError::NonZeroExit {
        name: "cmake".to_string(),
        command: "cmake --build .".to_string(),
        exit_code: 2,
        stderr: None,
    };
    assert_eq!(error.to_string(), "cmake returned 2");
    assert_eq!(error.exit_code(), Some(2));
    assert!(!error.is_cancellation());
}

#[test]
fn cancellations() {
    let interrupted = ProcessError::Interrupted {
        command: "sleep 30".to_string(),
        stderr: None,
    };
    let timed_out = ProcessError::TimedOut {
        command: "sleep 30".to_string(),
        timeout_ms: 100,
        stderr: Some("waiting\n".to_string()),
    };

    assert!(interrupted.is_cancellation());
    assert!(timed_out.is_cancellation());
    assert_eq!(interrupted.exit_code(), None);
    assert_eq!(interrupted.stderr(), None);
    assert_eq!(timed_out.stderr(), Some("waiting\n"));
    assert_eq!(timed_out.to_string(), "'sleep 30' timed out after 100ms");
}

#[test]
fn stderr_of_errors_without_a_process() {
    let error = ProcessError::InvalidConfiguration("empty binary".to_string());
    assert_eq!(error.stderr(), None);
}

#[test]
fn stream_read_failure_names_the_stream() {
    let error = ProcessError::StreamReadFailure {
        stream: StreamSource::Stderr,
        message: "broken pipe".to_string(),
    };
    assert_eq!(error.to_string(), "Failed to read stderr: broken pipe");
}

#[test]
fn conversions() {
    let error: ProcessError = ProcessGroupError::SignalFailed("EPERM".to_string()).into();
    assert!(matches!(error, ProcessError::ProcessGroup(msg) if msg.contains("EPERM")));

    let error: ProcessError = std::io::Error::other("disk full").into();
    assert_eq!(error, ProcessError::IO("disk full".to_string()));
}

#[cfg(feature = "serde")]
#[test]
fn serde_round_trip() {
    let error = ProcessError::SpawnFailure {
        command: "missing".to_string(),
        message: "not found".to_string(),
    };
    let json = serde_json::to_string(&error).unwrap();
    assert_eq!(serde_json::from_str::<ProcessError>(&json).unwrap(), error);
}
