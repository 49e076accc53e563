use std::future::Future;

#[cfg(feature = "tracing")]
use tracing::Instrument;

#[cfg(feature = "tracing")]
use crate::process::filter::DUMP_TARGET;
use crate::process::{config::StreamSource, filter::LogLevel};

pub trait MaybeInstrument: Future + Sized {
    #[cfg(feature = "tracing")]
    fn maybe_instrument(self, name: String) -> impl Future<Output = Self::Output> {
        let span = tracing::debug_span!("process", name = %name);
        self.instrument(span)
    }

    #[cfg(not(feature = "tracing"))]
    fn maybe_instrument(self, _name: String) -> Self {
        self
    }
}

impl<F: Future> MaybeInstrument for F {}

/// Whether diagnostics at `level` currently reach a subscriber.
///
/// Always `false` without the `tracing` feature.
pub fn level_enabled(level: LogLevel) -> bool {
    #[cfg(feature = "tracing")]
    {
        match level {
            LogLevel::Dump => tracing::enabled!(target: DUMP_TARGET, tracing::Level::TRACE),
            LogLevel::Trace => tracing::enabled!(tracing::Level::TRACE),
            LogLevel::Debug => tracing::enabled!(tracing::Level::DEBUG),
            LogLevel::Info => tracing::enabled!(tracing::Level::INFO),
            LogLevel::Warning => tracing::enabled!(tracing::Level::WARN),
            LogLevel::Error => tracing::enabled!(tracing::Level::ERROR),
        }
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = level;
        false
    }
}

/// Logs one line of child output at its classified level.
#[allow(unused_variables)]
pub fn log_line(process: &str, stream: StreamSource, level: LogLevel, line: &str) {
    #[cfg(feature = "tracing")]
    match level {
        LogLevel::Dump => tracing::trace!(target: DUMP_TARGET, process, %stream, "{}", line),
        LogLevel::Trace => tracing::trace!(process, %stream, "{}", line),
        LogLevel::Debug => tracing::debug!(process, %stream, "{}", line),
        LogLevel::Info => tracing::info!(process, %stream, "{}", line),
        LogLevel::Warning => tracing::warn!(process, %stream, "{}", line),
        LogLevel::Error => tracing::error!(process, %stream, "{}", line),
    }
}
