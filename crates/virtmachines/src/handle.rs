//! Handle to a launched hypervisor process.
//!
//! A [`VmHandle`] owns the child process of one running VM. Use it to:
//!
//! - Query liveness via [`VmHandle::is_running`] and [`VmHandle::status`]
//! - Stop the VM gracefully or kill it
//! - Wait for the VM to exit
//! - Exchange lines with an interactive VM via [`VmHandle::take_output`]
//!   and [`VmHandle::send_line`]

use crate::backend::LaunchMode;
use crate::console::{ConsoleOutput, StderrTail, spawn_drain};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use virtmachines_core::{Error, Result};

/// Grace period used by [`VmHandle::stop`].
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(30);

const STATUS_RUNNING: u8 = 0;
const STATUS_STOPPING: u8 = 1;
const STATUS_STOPPED: u8 = 2;
const STATUS_FAILED: u8 = 3;

/// Current status of a launched VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmStatus {
    Running,
    /// A stop signal was sent and the process has not exited yet.
    Stopping,
    Stopped {
        /// `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
    },
    /// Waiting on the process itself failed.
    Failed { message: String },
}

impl VmStatus {
    fn from_atomic(val: u8, exit_code: Option<i32>, error_msg: Option<String>) -> Self {
        match val {
            STATUS_RUNNING => VmStatus::Running,
            STATUS_STOPPING => VmStatus::Stopping,
            STATUS_STOPPED => VmStatus::Stopped { exit_code },
            _ => VmStatus::Failed {
                message: error_msg.unwrap_or_else(|| "unknown error".to_string()),
            },
        }
    }

    /// Whether the process has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VmStatus::Stopped { .. } | VmStatus::Failed { .. })
    }
}

/// Handle to a running VM process.
///
/// Dropping the handle does not stop the VM.
pub struct VmHandle {
    label: String,
    pid: Option<u32>,
    mode: LaunchMode,
    child: Mutex<Child>,
    stdin: Option<Mutex<ChildStdin>>,
    output: StdMutex<Option<ConsoleOutput>>,
    drain: StdMutex<Option<JoinHandle<()>>>,
    stderr_tail: StderrTail,
    status: AtomicU8,
    exit_code: StdMutex<Option<i32>>,
    error_message: StdMutex<Option<String>>,
}

impl VmHandle {
    /// Takes ownership of a freshly spawned child and starts its drain task.
    pub(crate) fn new(mut child: Child, mode: LaunchMode, label: impl Into<String>) -> Self {
        let label = label.into();
        let stderr_tail = StderrTail::default();

        let (sink, output) = match mode {
            LaunchMode::Interactive => {
                let (tx, output) = ConsoleOutput::channel();
                (Some(tx), Some(output))
            }
            LaunchMode::Detached => (None, None),
        };

        let drain = spawn_drain(
            child.stdout.take(),
            child.stderr.take(),
            sink,
            stderr_tail.clone(),
            label.clone(),
        );
        let stdin = child.stdin.take().map(Mutex::new);

        Self {
            label,
            pid: child.id(),
            mode,
            child: Mutex::new(child),
            stdin,
            output: StdMutex::new(output),
            drain: StdMutex::new(Some(drain)),
            stderr_tail,
            status: AtomicU8::new(STATUS_RUNNING),
            exit_code: StdMutex::new(None),
            error_message: StdMutex::new(None),
        }
    }

    /// OS process id of the hypervisor, if it was available at spawn time.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Display name of the VM, taken from its `-name` argument.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mode(&self) -> LaunchMode {
        self.mode
    }

    pub fn status(&self) -> VmStatus {
        let val = self.status.load(Ordering::SeqCst);
        let exit_code = *lock(&self.exit_code);
        let error_msg = lock(&self.error_message).clone();
        VmStatus::from_atomic(val, exit_code, error_msg)
    }

    /// Non-blocking liveness check.
    ///
    /// Reaps the process if it has exited since the last check. While another
    /// task is blocked in [`wait`](Self::wait) the last known status is used.
    pub fn is_running(&self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        if let Ok(mut child) = self.child.try_lock() {
            match child.try_wait() {
                Ok(Some(exit)) => {
                    self.record_exit(exit);
                    return false;
                }
                Ok(None) => {}
                Err(e) => {
                    self.record_failure(&e.to_string());
                    return false;
                }
            }
        }
        true
    }

    /// Waits for the VM process to exit and returns its final status.
    pub async fn wait(&self) -> Result<VmStatus> {
        let status = self.status();
        if status.is_terminal() {
            return Ok(status);
        }

        let mut child = self.child.lock().await;
        match child.wait().await {
            Ok(exit) => {
                self.record_exit(exit);
                Ok(self.status())
            }
            Err(e) => {
                self.record_failure(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Waits for exit, giving up after `duration`.
    ///
    /// Returns `Ok(None)` if the VM is still running when the time is up.
    pub async fn wait_timeout(&self, duration: Duration) -> Result<Option<VmStatus>> {
        match timeout(duration, self.wait()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Asks the VM to shut down and waits up to [`DEFAULT_STOP_GRACE`].
    pub async fn stop(&self) -> Result<()> {
        self.stop_with_timeout(DEFAULT_STOP_GRACE).await
    }

    /// Sends a termination request and waits up to `grace_period` for exit.
    ///
    /// The process is never killed here. When the grace period elapses the
    /// VM is left running and [`Error::Timeout`] is returned; call
    /// [`kill`](Self::kill) to force it down.
    pub async fn stop_with_timeout(&self, grace_period: Duration) -> Result<()> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }

        self.status.store(STATUS_STOPPING, Ordering::SeqCst);
        tracing::debug!(vm = %self.label, pid = ?self.pid, "sending termination request");
        if let Err(e) = self.terminate().await {
            self.status.store(STATUS_RUNNING, Ordering::SeqCst);
            return Err(e);
        }

        match timeout(grace_period, self.wait()).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => {
                self.status.store(STATUS_RUNNING, Ordering::SeqCst);
                Err(Error::Timeout(format!(
                    "VM '{}' did not exit within {:?}",
                    self.label, grace_period
                )))
            }
        }
    }

    /// Forcefully terminates the VM and reaps it.
    pub async fn kill(&self) -> Result<()> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;
            self.signal(Signal::SIGKILL)?;
        }
        #[cfg(not(unix))]
        {
            self.child.lock().await.start_kill()?;
        }

        self.wait().await.map(|_| ())
    }

    /// Output stream of an interactive VM. Can be taken once.
    pub fn take_output(&self) -> Result<ConsoleOutput> {
        if self.mode != LaunchMode::Interactive {
            return Err(Error::ConsoleNotEnabled);
        }
        lock(&self.output).take().ok_or(Error::ConsoleNotEnabled)
    }

    /// Writes `line` plus a newline to the VM's standard input.
    pub async fn send_line(&self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_ref().ok_or(Error::ConsoleNotEnabled)?;
        if !self.is_running() {
            return Err(Error::NotRunning);
        }

        let mut stdin = stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Recent stderr of the process, waiting briefly for the drain task to
    /// finish so lines written just before exit are included.
    pub(crate) async fn stderr_diagnostic(&self) -> String {
        let drain = lock(&self.drain).take();
        if let Some(drain) = drain {
            let _ = timeout(Duration::from_millis(500), drain).await;
        }
        self.stderr_tail.snapshot()
    }

    #[cfg(unix)]
    async fn terminate(&self) -> Result<()> {
        use nix::sys::signal::Signal;
        self.signal(Signal::SIGTERM)
    }

    #[cfg(not(unix))]
    async fn terminate(&self) -> Result<()> {
        self.child.lock().await.start_kill()?;
        Ok(())
    }

    #[cfg(unix)]
    fn signal(&self, signal: nix::sys::signal::Signal) -> Result<()> {
        use nix::errno::Errno;
        use nix::unistd::Pid;

        let pid = self.pid.ok_or(Error::NotRunning)?;
        match nix::sys::signal::kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(Error::NotRunning),
            Err(e) => Err(std::io::Error::from(e).into()),
        }
    }

    fn record_exit(&self, exit: ExitStatus) {
        *lock(&self.exit_code) = exit.code();
        self.status.store(STATUS_STOPPED, Ordering::SeqCst);
        tracing::debug!(vm = %self.label, "process exited with {}", exit);
    }

    fn record_failure(&self, message: &str) {
        *lock(&self.error_message) = Some(message.to_string());
        self.status.store(STATUS_FAILED, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for VmHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmHandle")
            .field("label", &self.label)
            .field("pid", &self.pid)
            .field("mode", &self.mode)
            .field("status", &self.status())
            .finish()
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
