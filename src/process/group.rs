//! Cross-platform process groups for signalling and killing whole process trees.
//!
//! This module uses process groups on Unix systems and job objects on
//! Windows so that when a run is cancelled, the child and everything it
//! spawned are terminated together.
//!
//! # Example
//!
//! ```rust,no_run
//! use tcrm_process::process::group::ProcessGroup;
//! use tokio::process::Command;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut group = ProcessGroup::new();
//! let mut cmd = Command::new("sleep");
//! cmd.arg("30");
//!
//! let mut cmd = group.create_with_command(cmd)?;
//! let child = cmd.spawn()?;
//! group.assign_child(child.id().unwrap_or_default())?;
//!
//! // cooperative first, then forced
//! group.interrupt_group()?;
//! group.terminate_group()?;
//! # Ok(())
//! # }
//! ```

#[cfg(unix)]
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::process::Command;

/// A cross-platform wrapper for managing process groups/jobs.
///
/// On Unix, the first process assigned becomes the leader of a new process
/// group and later processes (pipeline stages) join it.
/// On Windows, every process is assigned to one Job Object created with
/// `JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE`, so dropping the group also kills the
/// whole tree.
#[derive(Debug)]
pub struct ProcessGroup {
    inner: ProcessGroupInner,
}

#[derive(Debug, Default)]
struct ProcessGroupInner {
    /// Groups of the assigned processes, usually a single one
    #[cfg(unix)]
    process_group_ids: Vec<i32>,
    /// Set once SIGKILL went out, dropping the group then leaves it alone
    #[cfg(unix)]
    terminated: AtomicBool,
    #[cfg(windows)]
    job_handle: Option<SendHandle>,
    #[cfg(windows)]
    process_ids: Vec<u32>,
}

#[cfg(windows)]
#[derive(Debug)]
struct SendHandle(windows::Win32::Foundation::HANDLE);

#[cfg(windows)]
unsafe impl Send for SendHandle {}

#[cfg(windows)]
unsafe impl Sync for SendHandle {}

/// Error type for process group operations.
#[derive(Error, Debug)]
pub enum ProcessGroupError {
    #[error("Failed to create process group/job: {0}")]
    CreationFailed(String),
    #[error("Failed to assign process to group/job: {0}")]
    AssignmentFailed(String),
    #[error("Failed to send signal to process group: {0}")]
    SignalFailed(String),

    #[cfg(not(any(unix, windows)))]
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Default for ProcessGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessGroup {
    /// Create a new, inactive process group
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tcrm_process::process::group::ProcessGroup;
    ///
    /// let group = ProcessGroup::new();
    /// assert!(!group.is_active());
    /// ```
    pub fn new() -> Self {
        Self {
            inner: ProcessGroupInner::default(),
        }
    }

    /// Check if at least one process has been assigned to the group
    pub fn is_active(&self) -> bool {
        #[cfg(unix)]
        {
            !self.inner.process_group_ids.is_empty()
        }
        #[cfg(windows)]
        {
            self.inner.job_handle.is_some() && !self.inner.process_ids.is_empty()
        }
        #[cfg(not(any(unix, windows)))]
        {
            false
        }
    }

    /// Configures a command so the spawned process runs in this group.
    ///
    /// On Unix, the command is set up to call `setpgid()` before exec: the
    /// first process creates a new group, later ones join the existing group
    /// and fall back to a group of their own when the leader is already gone.
    /// On Windows, the Job Object is created on first use and the command gets
    /// `CREATE_NEW_PROCESS_GROUP` so it can receive `CTRL_BREAK_EVENT`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessGroupError::CreationFailed`] if the Job Object cannot
    /// be created or configured.
    pub fn create_with_command(
        &mut self,
        #[allow(unused_mut)] mut command: Command,
    ) -> Result<Command, ProcessGroupError> {
        #[cfg(unix)]
        {
            let leader = self.inner.process_group_ids.first().copied().unwrap_or(0);

            // Only async-signal-safe calls are allowed between fork and exec
            unsafe {
                command.pre_exec(move || {
                    use nix::unistd::{Pid, setpgid};
                    let own = Pid::from_raw(0);
                    if leader != 0 && setpgid(own, Pid::from_raw(leader)).is_ok() {
                        return Ok(());
                    }
                    if setpgid(own, own).is_err() {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
            Ok(command)
        }
        #[cfg(windows)]
        {
            use windows::Win32::System::JobObjects::JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
            use windows::Win32::System::JobObjects::{
                CreateJobObjectW, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
                JobObjectExtendedLimitInformation, SetInformationJobObject,
            };
            use windows::Win32::System::Threading::CREATE_NEW_PROCESS_GROUP;
            use windows::core::PCWSTR;

            command.creation_flags(CREATE_NEW_PROCESS_GROUP.0);

            if self.inner.job_handle.is_some() {
                return Ok(command);
            }

            let job_handle = unsafe { CreateJobObjectW(None, PCWSTR::null()) }.map_err(|e| {
                ProcessGroupError::CreationFailed(format!("Failed to create Job Object: {}", e))
            })?;

            // Configure the job to kill all processes when the job handle is closed
            let mut job_info = JOBOBJECT_EXTENDED_LIMIT_INFORMATION::default();
            job_info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;

            unsafe {
                SetInformationJobObject(
                    job_handle,
                    JobObjectExtendedLimitInformation,
                    &job_info as *const _ as *const std::ffi::c_void,
                    std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
                )
            }
            .map_err(|e| {
                unsafe {
                    let _ = windows::Win32::Foundation::CloseHandle(job_handle);
                }
                ProcessGroupError::CreationFailed(format!("Failed to configure Job Object: {}", e))
            })?;
            self.inner.job_handle = Some(SendHandle(job_handle));

            Ok(command)
        }
        #[cfg(not(any(unix, windows)))]
        {
            Err(ProcessGroupError::UnsupportedPlatform(
                "Process group management not available on this platform".to_string(),
            ))
        }
    }

    /// Assigns a spawned child process to this process group/job.
    ///
    /// On Unix, this records the group the child ended up in. On Windows,
    /// this assigns the process to the Job Object.
    ///
    /// # Windows Race Condition Note
    /// If a spawned process creates children before it is assigned to the
    /// job object, those children are not part of the job and can escape
    /// containment.
    ///
    /// See: <https://devblogs.microsoft.com/oldnewthing/20130405-00/?p=4743>
    pub fn assign_child(&mut self, child_id: u32) -> Result<(), ProcessGroupError> {
        #[cfg(unix)]
        {
            use nix::unistd::{Pid, getpgid};

            let pid = i32::try_from(child_id).map_err(|_| {
                ProcessGroupError::AssignmentFailed(format!("Invalid PID: {}", child_id))
            })?;
            // the child may already have exited, it called setpgid() on itself
            let pgid = getpgid(Some(Pid::from_raw(pid)))
                .map(|p| p.as_raw())
                .unwrap_or(pid);

            if !self.inner.process_group_ids.contains(&pgid) {
                self.inner.process_group_ids.push(pgid);
            }
            Ok(())
        }
        #[cfg(windows)]
        {
            use windows::Win32::Foundation::CloseHandle;
            use windows::Win32::System::JobObjects::AssignProcessToJobObject;
            use windows::Win32::System::Threading::{
                OpenProcess, PROCESS_SET_INFORMATION, PROCESS_SET_QUOTA, PROCESS_TERMINATE,
            };

            let process_handle = unsafe {
                OpenProcess(
                    PROCESS_SET_QUOTA | PROCESS_TERMINATE | PROCESS_SET_INFORMATION,
                    false,
                    child_id,
                )
            }
            .map_err(|e| {
                ProcessGroupError::AssignmentFailed(format!("Failed to open process handle: {}", e))
            })?;

            let result = if let Some(SendHandle(job_handle)) = &self.inner.job_handle {
                unsafe { AssignProcessToJobObject(*job_handle, process_handle) }
            } else {
                unsafe {
                    let _ = CloseHandle(process_handle);
                }
                return Err(ProcessGroupError::AssignmentFailed(
                    "No Job Object handle available".to_string(),
                ));
            };

            unsafe {
                let _ = CloseHandle(process_handle);
            }

            result.map_err(|e| {
                ProcessGroupError::AssignmentFailed(format!(
                    "Failed to assign process to Job Object: {}",
                    e
                ))
            })?;
            self.inner.process_ids.push(child_id);
            Ok(())
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = child_id;
            Err(ProcessGroupError::UnsupportedPlatform(
                "Process group assignment not available on this platform".to_string(),
            ))
        }
    }

    /// Asks every process in the group to exit.
    ///
    /// Sends SIGINT to the process groups on Unix and `CTRL_BREAK_EVENT` to the
    /// assigned processes on Windows. Processes may ignore it.
    pub fn interrupt_group(&self) -> Result<(), ProcessGroupError> {
        #[cfg(unix)]
        {
            self.signal_unix(nix::sys::signal::Signal::SIGINT)
        }
        #[cfg(windows)]
        {
            use windows::Win32::System::Console::{CTRL_BREAK_EVENT, GenerateConsoleCtrlEvent};

            if self.inner.process_ids.is_empty() {
                return Err(ProcessGroupError::SignalFailed(
                    "No process assigned to the Job Object".to_string(),
                ));
            }
            for pid in &self.inner.process_ids {
                unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, *pid) }.map_err(|e| {
                    ProcessGroupError::SignalFailed(format!(
                        "Failed to send CTRL_BREAK to PID {}: {}",
                        pid, e
                    ))
                })?;
            }
            Ok(())
        }
        #[cfg(not(any(unix, windows)))]
        {
            Err(ProcessGroupError::UnsupportedPlatform(
                "Process group interruption not available on this platform".to_string(),
            ))
        }
    }

    /// Kills every process in the group/job.
    ///
    /// Sends SIGKILL to the process groups on Unix and terminates the Job
    /// Object on Windows. Groups that are already gone are not an error.
    pub fn terminate_group(&self) -> Result<(), ProcessGroupError> {
        #[cfg(unix)]
        {
            self.signal_unix(nix::sys::signal::Signal::SIGKILL)?;
            self.inner.terminated.store(true, Ordering::SeqCst);
            Ok(())
        }
        #[cfg(windows)]
        {
            if let Some(SendHandle(job_handle)) = &self.inner.job_handle {
                use windows::Win32::System::JobObjects::TerminateJobObject;
                // The handle is closed on drop, not here
                unsafe { TerminateJobObject(*job_handle, 0xff) }.map_err(|e| {
                    ProcessGroupError::SignalFailed(format!(
                        "Failed to terminate job object: {}",
                        e
                    ))
                })?;
                Ok(())
            } else {
                Err(ProcessGroupError::SignalFailed(
                    "No Job Object handle available".to_string(),
                ))
            }
        }
        #[cfg(not(any(unix, windows)))]
        {
            Err(ProcessGroupError::UnsupportedPlatform(
                "Process group termination not available on this platform".to_string(),
            ))
        }
    }

    #[cfg(unix)]
    fn signal_unix(&self, signal: nix::sys::signal::Signal) -> Result<(), ProcessGroupError> {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        if self.inner.process_group_ids.is_empty() {
            return Err(ProcessGroupError::SignalFailed(
                "No process group ID available".to_string(),
            ));
        }

        for pgid in &self.inner.process_group_ids {
            match killpg(Pid::from_raw(*pgid), signal) {
                Ok(_) => {}
                Err(Errno::ESRCH) => {} // Already terminated
                Err(Errno::EPERM) => {
                    return Err(ProcessGroupError::SignalFailed(format!(
                        "Permission denied to send {:?} to process group {}",
                        signal, pgid
                    )));
                }
                Err(e) => {
                    return Err(ProcessGroupError::SignalFailed(format!(
                        "Failed to send {:?} to process group {}: {}",
                        signal, pgid, e
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Drop for ProcessGroupInner {
    fn drop(&mut self) {
        // a run dropped mid-flight, e.g. by a runtime shutting down
        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            if !self.terminated.load(Ordering::SeqCst) {
                for pgid in &self.process_group_ids {
                    // ESRCH means the group is already gone
                    let _ = killpg(Pid::from_raw(*pgid), Signal::SIGKILL);
                }
            }
        }
        #[cfg(windows)]
        {
            if let Some(SendHandle(job_handle)) = self.job_handle.take() {
                unsafe {
                    let _ = windows::Win32::Foundation::CloseHandle(job_handle);
                }
            }
        }
    }
}
