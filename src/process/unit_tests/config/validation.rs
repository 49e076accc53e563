use std::env::temp_dir;

use crate::process::{config::ProcessConfig, error::ProcessError};

fn assert_invalid(config: ProcessConfig) -> String {
    match config.validate() {
        Err(ProcessError::InvalidConfiguration(msg)) => msg,
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn accept_basic_echo_command() {
    let config = ProcessConfig::new("echo").args(["hello"]);
    assert!(config.validate().is_ok());
}

#[test]
fn accept_command_with_args_and_working_dir() {
    let config = ProcessConfig::new("ls")
        .args(["-la", "/tmp"])
        .working_dir(temp_dir().to_str().unwrap());
    assert!(config.validate().is_ok());
}

#[test]
fn accept_missing_working_dir() {
    // created before spawning
    let dir = temp_dir().join("tcrm-process-not-created-yet");
    let config = ProcessConfig::new("ls").working_dir(dir.to_str().unwrap());
    assert!(config.validate().is_ok());
}

#[test]
fn accept_command_with_env_vars() {
    let config = ProcessConfig::new("env").env([("PATH", "/usr/bin:/bin")]);
    assert!(config.validate().is_ok());
}

#[test]
fn accept_command_with_timeout() {
    let config = ProcessConfig::new("sleep").timeout_ms(1000);
    assert!(config.validate().is_ok());
}

#[test]
fn reject_empty_binary() {
    let msg = assert_invalid(ProcessConfig::new(""));
    assert_eq!(msg, "process: nothing to run");
}

#[test]
fn reject_binary_with_whitespace_or_nul() {
    assert_invalid(ProcessConfig::new(" echo"));
    assert_invalid(ProcessConfig::new("echo\0"));
}

#[test]
fn reject_missing_binary_path() {
    let missing = temp_dir().join("tcrm-process-missing").join("tool");
    let msg = assert_invalid(ProcessConfig::new(missing.to_string_lossy()));
    assert!(msg.contains("does not exist"), "{}", msg);
}

#[test]
fn reject_argument_with_nul() {
    let msg = assert_invalid(ProcessConfig::new("echo").arg("a\0b"));
    assert!(msg.contains("null bytes"), "{}", msg);
}

#[test]
fn reject_working_dir_that_is_a_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let msg = assert_invalid(
        ProcessConfig::new("echo").working_dir(file.path().to_str().unwrap()),
    );
    assert!(msg.contains("is not a directory"), "{}", msg);
}

#[test]
fn reject_empty_working_dir() {
    assert_invalid(ProcessConfig::new("echo").working_dir("  "));
}

#[test]
fn reject_invalid_env() {
    assert_invalid(ProcessConfig::new("env").env([("", "value")]));
    assert_invalid(ProcessConfig::new("env").env([("A=B", "value")]));
    assert_invalid(ProcessConfig::new("env").env([("KEY", "va\0lue")]));
}

#[test]
fn reject_zero_timeout() {
    let msg = assert_invalid(ProcessConfig::new("echo").timeout_ms(0));
    assert_eq!(msg, "Timeout must be greater than 0");
}

#[test]
fn reject_zero_grace_period() {
    let msg = assert_invalid(ProcessConfig::new("echo").grace_period_ms(0));
    assert_eq!(msg, "Grace period must be greater than 0");
}

#[test]
fn reject_empty_success_set() {
    let msg = assert_invalid(ProcessConfig::new("echo").success_exit_codes([]));
    assert_eq!(msg, "At least one success exit code is required");
}
