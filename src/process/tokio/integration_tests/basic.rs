use std::time::Duration;

use tokio::time::timeout;

use crate::process::{
    config::{ProcessConfig, StreamPolicy, StreamSource},
    error::ProcessError,
    filter::{CapturedLine, LogLevel},
    state::ProcessState,
    tokio::{
        integration_tests::helper::{
            expected_finished_runner_state, expected_unspawned_runner_state,
        },
        runner::ProcessRunner,
    },
};

#[tokio::test]
async fn echo_keep_in_string() {
    #[cfg(windows)]
    let config = ProcessConfig::new("cmd").args(["/C", "echo hello"]);
    #[cfg(unix)]
    let config = ProcessConfig::new("echo").arg("hello");

    let mut runner = ProcessRunner::new(config.stdout_policy(StreamPolicy::KeepInString));
    assert_eq!(runner.state(), ProcessState::Unstarted);

    let output = timeout(Duration::from_secs(5), runner.run())
        .await
        .expect("run timed out")
        .expect("run failed");

    assert_eq!(output.exit_code, 0);
    #[cfg(unix)]
    assert_eq!(output.stdout.as_deref(), Some("hello\n"));
    #[cfg(windows)]
    assert_eq!(output.stdout.as_deref(), Some("hello\r\n"));
    assert_eq!(output.stderr, None);
    assert!(output.lines.is_empty());

    assert_eq!(runner.exit_code(), Some(0));
    assert_eq!(runner.stdout_text(), output.stdout.as_deref());
    assert_eq!(runner.stderr_text(), None);
    expected_finished_runner_state(&runner);
}

#[cfg(unix)]
#[tokio::test]
async fn forward_both_streams() {
    let config = ProcessConfig::new("sh").args(["-c", "echo one; echo two >&2"]);

    let output = ProcessRunner::new(config).run().await.unwrap();

    assert_eq!(output.lines.len(), 2);
    assert!(output.lines.contains(&CapturedLine {
        stream: StreamSource::Stdout,
        level: LogLevel::Trace,
        line: "one".to_string(),
    }));
    assert!(output.lines.contains(&CapturedLine {
        stream: StreamSource::Stderr,
        level: LogLevel::Error,
        line: "two".to_string(),
    }));
    assert_eq!(output.stdout, None);
}

#[cfg(unix)]
#[tokio::test]
async fn discarded_streams() {
    let config = ProcessConfig::new("sh")
        .args(["-c", "echo out; echo err >&2"])
        .stdout_policy(StreamPolicy::Discard)
        .stderr_policy(StreamPolicy::Discard);

    let output = ProcessRunner::new(config).run().await.unwrap();

    assert_eq!(output.exit_code, 0);
    assert!(output.lines.is_empty());
    assert_eq!(output.stdout, None);
    assert_eq!(output.stderr, None);
}

#[cfg(unix)]
#[tokio::test]
async fn keep_both_streams() {
    let config = ProcessConfig::new("sh")
        .args(["-c", "echo out; echo err >&2"])
        .stdout_policy(StreamPolicy::KeepInString)
        .stderr_policy(StreamPolicy::KeepInString);

    let mut runner = ProcessRunner::new(config);
    runner.run().await.unwrap();

    assert_eq!(runner.stdout_text(), Some("out\n"));
    assert_eq!(runner.stderr_text(), Some("err\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn environment_is_passed() {
    let config = ProcessConfig::new("sh")
        .args(["-c", "echo $TCRM_PROCESS_TEST"])
        .env([("TCRM_PROCESS_TEST", "from the parent")])
        .stdout_policy(StreamPolicy::KeepInString);

    let output = ProcessRunner::new(config).run().await.unwrap();
    assert_eq!(output.stdout.as_deref(), Some("from the parent\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn missing_working_dir_is_created() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("nested").join("build");

    let config = ProcessConfig::new("sh")
        .args(["-c", "touch marker"])
        .working_dir(dir.to_str().unwrap());

    ProcessRunner::new(config).run().await.unwrap();
    assert!(dir.join("marker").is_file());
}

#[tokio::test]
async fn missing_binary_is_a_spawn_failure() {
    let config = ProcessConfig::new("tcrm-process-no-such-binary").arg("--version");
    let mut runner = ProcessRunner::new(config);

    let result = runner.start().await;
    match &result {
        Err(ProcessError::SpawnFailure { command, .. }) => {
            assert_eq!(command, "tcrm-process-no-such-binary --version");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(runner.join().await.unwrap_err(), result.unwrap_err());
    expected_unspawned_runner_state(&runner);
}

#[tokio::test]
async fn invalid_config_is_not_spawned() {
    let mut runner = ProcessRunner::new(ProcessConfig::new(""));

    let result = runner.run().await;
    assert!(matches!(result, Err(ProcessError::InvalidConfiguration(_))));
    expected_unspawned_runner_state(&runner);
}

#[tokio::test]
async fn start_twice() {
    #[cfg(windows)]
    let config = ProcessConfig::new("cmd").args(["/C", "echo hello"]);
    #[cfg(unix)]
    let config = ProcessConfig::new("echo").arg("hello");

    let mut runner = ProcessRunner::new(config);
    runner.start().await.unwrap();

    assert!(matches!(
        runner.start().await,
        Err(ProcessError::Control(_))
    ));

    runner.join().await.unwrap();
    assert!(matches!(
        runner.start().await,
        Err(ProcessError::Control(_))
    ));
}

#[tokio::test]
async fn join_without_start() {
    let mut runner = ProcessRunner::new(ProcessConfig::new("echo"));
    assert!(matches!(
        runner.join().await,
        Err(ProcessError::Control(_))
    ));
    assert_eq!(runner.state(), ProcessState::Unstarted);
}

#[tokio::test]
async fn join_twice_returns_the_same_outcome() {
    #[cfg(windows)]
    let config = ProcessConfig::new("cmd").args(["/C", "echo hello"]);
    #[cfg(unix)]
    let config = ProcessConfig::new("echo").arg("hello");

    let mut runner = ProcessRunner::new(config.stdout_policy(StreamPolicy::KeepInString));
    let first = runner.run().await.unwrap();
    let second = runner.join().await.unwrap();
    assert_eq!(first, second);
}
