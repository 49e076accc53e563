//! # tcrm-process
//!
//! Asynchronous execution of child processes for build tooling.
//!
//! A process is described by an immutable [`ProcessConfig`](process::config::ProcessConfig)
//! and run by a [`ProcessRunner`](process::tokio::runner::ProcessRunner). The runner
//! reads stdout and stderr without blocking, decodes them into lines in the
//! configured encoding and either forwards them to the log, discards them,
//! keeps them as text or lets the child inherit the parent's streams.
//!
//! ## Features
//!
//! - **Process groups**: every run gets its own process group (Job Object on
//!   Windows), interrupting or timing out kills the whole process tree
//! - **Bounded cancellation**: a cooperative interrupt first, a forced kill
//!   after the grace period
//! - **Line decoding**: chunked output is split on `\r` and `\n` for UTF-8,
//!   UTF-16 and Windows code pages
//! - **Filters**: a callback per stream can reclassify or drop lines
//! - **Pipelines**: processes chained with [`ProcessRunner::pipe`](process::tokio::runner::ProcessRunner::pipe)
//!
//! ## Quick Start
//!
//! ```rust
//! use tcrm_process::process::{
//!     config::{ProcessConfig, StreamPolicy},
//!     tokio::runner::ProcessRunner,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(windows)]
//!     let config = ProcessConfig::new("cmd").args(["/C", "echo", "Hello, World!"]);
//!     #[cfg(unix)]
//!     let config = ProcessConfig::new("echo").arg("Hello, World!");
//!
//!     let config = config.stdout_policy(StreamPolicy::KeepInString);
//!     config.validate()?;
//!
//!     let mut runner = ProcessRunner::new(config);
//!     let output = runner.run().await?;
//!     println!("{}", output.stdout.unwrap_or_default());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Filtering output
//!
//! ```rust
//! use tcrm_process::process::{
//!     config::ProcessConfig,
//!     filter::LogLevel,
//!     tokio::runner::ProcessRunner,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(windows)]
//!     let config = ProcessConfig::new("cmd").args(["/C", "echo warning: careful"]);
//!     #[cfg(unix)]
//!     let config = ProcessConfig::new("echo").arg("warning: careful");
//!
//!     let config = config.stdout_filter(|line| {
//!         if line.line.starts_with("warning") {
//!             line.level = LogLevel::Warning;
//!         }
//!     });
//!
//!     let output = ProcessRunner::new(config).run().await?;
//!     assert_eq!(output.lines_at(LogLevel::Warning).count(), 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `tracing`: structured logging of command lines, forwarded output and
//!   process lifecycle (enabled by default)
//! - `serde`: serialization support for configuration enums, errors and output

pub mod helper;
pub mod process;
