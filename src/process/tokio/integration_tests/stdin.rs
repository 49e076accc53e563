use crate::process::{
    config::{ProcessConfig, StreamPolicy},
    tokio::runner::ProcessRunner,
};

#[cfg(unix)]
#[tokio::test]
async fn stdin_text_is_written_and_closed() {
    let config = ProcessConfig::new("cat")
        .stdin("line one\nline two\n")
        .stdout_policy(StreamPolicy::KeepInString);

    let output = ProcessRunner::new(config).run().await.unwrap();
    assert_eq!(output.stdout.as_deref(), Some("line one\nline two\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn stdin_is_null_by_default() {
    let config = ProcessConfig::new("cat").stdout_policy(StreamPolicy::KeepInString);

    let output = ProcessRunner::new(config).run().await.unwrap();
    assert_eq!(output.stdout.as_deref(), Some(""));
}

#[cfg(unix)]
#[tokio::test]
async fn large_stdin() {
    let text: String = (0..20_000).map(|i| format!("{}\n", i)).collect();
    let config = ProcessConfig::new("wc")
        .arg("-l")
        .stdin(text)
        .stdout_policy(StreamPolicy::KeepInString);

    let output = ProcessRunner::new(config).run().await.unwrap();
    assert_eq!(output.stdout.as_deref().map(str::trim), Some("20000"));
}

#[cfg(unix)]
#[tokio::test]
async fn stdin_feeds_first_pipeline_stage() {
    let runner = ProcessRunner::pipe([
        ProcessConfig::new("cat").stdin("pipeline input\n"),
        ProcessConfig::new("tr")
            .args(["a-z", "A-Z"])
            .stdout_policy(StreamPolicy::KeepInString),
    ]);

    let output = runner.unwrap().run().await.unwrap();
    assert_eq!(output.stdout.as_deref(), Some("PIPELINE INPUT\n"));
}
