//! Pipeline example: chain processes and stop them with Ctrl-C
use tcrm_process::process::{
    config::{ProcessConfig, StreamPolicy},
    error::ProcessError,
    tokio::runner::ProcessRunner,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    #[cfg(unix)]
    let stages = [
        ProcessConfig::new("sh").args(["-c", "for i in 5 3 1 4 2; do echo $i; sleep 1; done"]),
        ProcessConfig::new("sort").arg("-n"),
        ProcessConfig::new("tr")
            .args(["\\n", " "])
            .stdout_policy(StreamPolicy::KeepInString)
            .terminate_on_interrupt(true)
            .grace_period_ms(2000),
    ];
    #[cfg(windows)]
    let stages = [
        ProcessConfig::new("cmd.exe").args(["/C", "echo 5& echo 3& echo 1& echo 4& echo 2"]),
        ProcessConfig::new("sort.exe")
            .stdout_policy(StreamPolicy::KeepInString)
            .terminate_on_interrupt(true)
            .grace_period_ms(2000),
    ];

    let mut runner = ProcessRunner::pipe(stages)?;
    println!("running: {}", runner.command_line());
    runner.start().await?;
    runner.interrupt_on_ctrl_c();

    match runner.join().await {
        Ok(output) => println!("sorted: {}", output.stdout.unwrap_or_default().trim()),
        Err(ProcessError::Interrupted { command, .. }) => println!("stopped: {}", command),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
