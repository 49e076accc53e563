//! Basic example: run a command, forward its output to the log and report the result
use tcrm_process::process::{
    config::{ProcessConfig, StreamPolicy},
    filter::LogLevel,
    tokio::runner::ProcessRunner,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    #[cfg(windows)]
    let config = ProcessConfig::new("cmd.exe").args(["/C", "echo Hello! && echo warning: careful 1>&2"]);
    #[cfg(unix)]
    let config = ProcessConfig::new("sh").args(["-c", "echo Hello!; echo 'warning: careful' >&2"]);

    let config = config
        .stdout_level(LogLevel::Info)
        .stderr_filter(|line| {
            if line.line.starts_with("warning:") {
                line.level = LogLevel::Warning;
            }
        })
        .timeout_ms(5000);

    let mut runner = ProcessRunner::new(config);
    let output = runner.run().await?;
    println!("exit code: {}", output.exit_code);
    for line in output.lines_at(LogLevel::Warning) {
        println!("warning: {}", line);
    }

    #[cfg(windows)]
    let config = ProcessConfig::new("cmd.exe").args(["/C", "ver"]);
    #[cfg(unix)]
    let config = ProcessConfig::new("uname").arg("-a");

    let output = ProcessRunner::new(config.stdout_policy(StreamPolicy::KeepInString))
        .run()
        .await?;
    println!("captured: {}", output.stdout.unwrap_or_default().trim());
    Ok(())
}
