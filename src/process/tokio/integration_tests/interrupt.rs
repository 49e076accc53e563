use std::time::Duration;

use tokio::time::{Instant, timeout};

use crate::process::{
    config::ProcessConfig,
    error::ProcessError,
    state::ProcessState,
    tokio::{integration_tests::helper::expected_unspawned_runner_state, runner::ProcessRunner},
};

#[cfg(unix)]
use {
    crate::process::{config::StreamSource, tokio::integration_tests::helper::process_is_running},
    std::sync::{Arc, Mutex},
};

fn long_running() -> ProcessConfig {
    #[cfg(windows)]
    let config = ProcessConfig::new("ping").args(["-n", "30", "127.0.0.1"]);
    #[cfg(unix)]
    let config = ProcessConfig::new("sleep").arg("30");
    config
}

#[cfg(unix)]
#[tokio::test]
async fn stubborn_process_tree_is_killed_after_grace_period() {
    const GRACE_MS: u64 = 500;

    let background = Arc::new(Mutex::new(None::<u32>));
    let seen = background.clone();

    // ignores the cooperative interrupt, and so does its child
    let config = ProcessConfig::new("sh")
        .args(["-c", "trap '' INT TERM; sleep 30 & echo $!; wait"])
        .grace_period_ms(GRACE_MS)
        .stdout_filter(move |line| {
            if line.stream == StreamSource::Stdout {
                if let Ok(pid) = line.line.trim().parse() {
                    *seen.lock().unwrap() = Some(pid);
                }
            }
        });

    let mut runner = ProcessRunner::new(config);
    runner.start().await.unwrap();
    let shell = runner.process_id().unwrap();

    let sleep_pid = timeout(Duration::from_secs(5), async {
        loop {
            if let Some(pid) = *background.lock().unwrap() {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("background pid not reported");
    assert!(process_is_running(sleep_pid));

    let interrupted_at = Instant::now();
    runner.interrupt();
    let result = timeout(Duration::from_secs(10), runner.join())
        .await
        .expect("join did not return");
    let elapsed = interrupted_at.elapsed();

    assert!(matches!(result, Err(ProcessError::Interrupted { .. })));
    assert!(elapsed >= Duration::from_millis(GRACE_MS), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(GRACE_MS + 2000), "{:?}", elapsed);
    assert_eq!(runner.state(), ProcessState::Finalized);
    assert_eq!(runner.exit_code(), Some(128 + 9));

    // the kill is delivered to the whole group at once
    let gone = timeout(Duration::from_secs(2), async {
        while process_is_running(sleep_pid) || process_is_running(shell) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(gone.is_ok(), "process tree still running");
}

#[tokio::test]
async fn cooperative_interrupt_returns_before_grace_period() {
    let mut runner = ProcessRunner::new(long_running().grace_period_ms(10_000));
    runner.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let interrupted_at = Instant::now();
    runner.interrupt();
    let result = timeout(Duration::from_secs(15), runner.join())
        .await
        .expect("join did not return");

    assert!(result.unwrap_err().is_cancellation());
    #[cfg(unix)]
    assert!(interrupted_at.elapsed() < Duration::from_secs(5));
    #[cfg(windows)]
    let _ = interrupted_at;
}

#[tokio::test]
async fn interrupt_from_another_thread() {
    let mut runner = ProcessRunner::new(long_running().grace_period_ms(500));
    let handle = runner.interrupt_handle();
    runner.start().await.unwrap();

    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        handle.interrupt();
    });

    let result = timeout(Duration::from_secs(10), runner.join())
        .await
        .expect("join did not return");
    assert!(matches!(result, Err(ProcessError::Interrupted { .. })));
}

#[tokio::test]
async fn interrupt_before_start_spawns_nothing() {
    let mut runner = ProcessRunner::new(long_running());
    runner.interrupt();

    let result = runner.start().await;
    assert!(matches!(result, Err(ProcessError::Interrupted { .. })));
    assert!(matches!(
        runner.join().await,
        Err(ProcessError::Interrupted { .. })
    ));
    expected_unspawned_runner_state(&runner);
}

#[tokio::test]
async fn interrupt_after_completion_is_a_no_op() {
    #[cfg(windows)]
    let config = ProcessConfig::new("cmd").args(["/C", "exit 0"]);
    #[cfg(unix)]
    let config = ProcessConfig::new("true");

    let mut runner = ProcessRunner::new(config);
    runner.run().await.unwrap();

    runner.interrupt();
    assert!(runner.join().await.is_ok());
    assert_eq!(runner.exit_code(), Some(0));
}

#[tokio::test]
async fn dropping_a_started_runner_cancels_it() {
    let mut runner = ProcessRunner::new(long_running().grace_period_ms(200));
    runner.start().await.unwrap();
    let handle = runner.interrupt_handle();

    drop(runner);
    assert!(handle.is_interrupted());
}

#[cfg(unix)]
#[test]
fn dropping_the_runtime_kills_the_process_tree() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("background.pid");
    let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let runner = runtime.block_on(async {
        let mut runner = ProcessRunner::new(ProcessConfig::new("sh").args(["-c", script.as_str()]));
        runner.start().await.unwrap();
        runner
    });
    let shell = runner.process_id().unwrap();

    let started = std::time::Instant::now();
    let sleep_pid = loop {
        let written = std::fs::read_to_string(&pid_file).unwrap_or_default();
        if let Ok(pid) = written.trim().parse::<u32>() {
            break pid;
        }
        assert!(started.elapsed() < Duration::from_secs(5), "background pid not written");
        std::thread::sleep(Duration::from_millis(10));
    };
    assert!(process_is_running(sleep_pid));

    drop(runner);
    drop(runtime);

    let dropped_at = std::time::Instant::now();
    while process_is_running(sleep_pid) || process_is_running(shell) {
        assert!(
            dropped_at.elapsed() < Duration::from_secs(2),
            "process tree still running"
        );
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(unix)]
fn raise_ctrl_c() {
    nix::sys::signal::raise(nix::sys::signal::Signal::SIGINT).unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn ctrl_c_interrupts_a_run_flagged_for_termination() {
    // keeps the default SIGINT action from killing the test binary
    let _listener =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).unwrap();

    let config = long_running()
        .terminate_on_interrupt(true)
        .grace_period_ms(500);
    let mut runner = ProcessRunner::new(config);
    runner.start().await.unwrap();
    let bridge = runner.interrupt_on_ctrl_c();
    tokio::time::sleep(Duration::from_millis(100)).await;

    raise_ctrl_c();
    let result = timeout(Duration::from_secs(10), runner.join())
        .await
        .expect("join did not return");

    assert!(matches!(result, Err(ProcessError::Interrupted { .. })));
    bridge.abort();
}

#[cfg(unix)]
#[tokio::test]
async fn ctrl_c_leaves_an_unflagged_run_alone() {
    let _listener =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).unwrap();

    let config = ProcessConfig::new("sleep").arg("1");
    let mut runner = ProcessRunner::new(config);
    let handle = runner.interrupt_handle();
    runner.start().await.unwrap();
    let bridge = runner.interrupt_on_ctrl_c();
    tokio::time::sleep(Duration::from_millis(100)).await;

    raise_ctrl_c();
    let output = timeout(Duration::from_secs(10), runner.join())
        .await
        .expect("join did not return")
        .unwrap();

    assert_eq!(output.exit_code, 0);
    assert!(!handle.is_interrupted());
    bridge.abort();
}

#[cfg(unix)]
#[tokio::test]
async fn interrupt_carries_buffered_stderr() {
    let config = ProcessConfig::new("sh")
        .args(["-c", "echo 'partial progress' >&2; sleep 30"])
        .stderr_policy(crate::process::config::StreamPolicy::KeepInString)
        .grace_period_ms(500);
    let mut runner = ProcessRunner::new(config);
    runner.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    runner.interrupt();
    let result = timeout(Duration::from_secs(10), runner.join())
        .await
        .expect("join did not return");
    assert_eq!(result.unwrap_err().stderr(), Some("partial progress\n"));
}
