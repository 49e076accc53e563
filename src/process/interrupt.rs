use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

/// Cloneable handle requesting the interruption of a run.
///
/// Can be used from any thread or task, at any time: interrupting before the
/// run starts prevents the process from being spawned, interrupting after it
/// finished does nothing.
///
/// # Examples
///
/// ```rust
/// use tcrm_process::process::interrupt::InterruptHandle;
///
/// let handle = InterruptHandle::new();
/// let other = handle.clone();
///
/// other.interrupt();
/// assert!(handle.is_interrupted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        #[cfg(feature = "tracing")]
        tracing::trace!("will interrupt");

        self.flag.store(true, Ordering::SeqCst);
        // stores a permit when the loop isn't waiting yet
        self.notify.notify_one();
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Completes once [`interrupt`](Self::interrupt) has been called.
    pub async fn interrupted(&self) {
        while !self.is_interrupted() {
            self.notify.notified().await;
        }
    }
}
