use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Role of an external process within one pipeline invocation.
///
/// The two transcode targets are distinct roles so that both conversions can
/// run concurrently while the "one live handle per role" invariant holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// ffmpeg producing the compressed archival file
    ArchiveEncode,
    /// ffmpeg producing the mono 16kHz PCM file for the recognizer
    Normalize,
    /// The speech-to-text engine
    Recognize,
}

impl ProcessRole {
    pub fn label(self) -> &'static str {
        match self {
            ProcessRole::ArchiveEncode => "archive-encode",
            ProcessRole::Normalize => "normalize",
            ProcessRole::Recognize => "recognize",
        }
    }
}

/// Launches and tracks external engine processes, one live handle per role.
///
/// `cancel_all` flips the shared cancellation flag and best-effort signals
/// every tracked pid. Components that launched a process observe the flag
/// after their child exits to distinguish cancellation from failure.
pub struct ProcessSupervisor {
    /// Live pids, keyed by role
    handles: Mutex<HashMap<ProcessRole, u32>>,

    /// Set by `cancel_all`, cleared by `arm` at the start of an invocation
    cancelled: AtomicBool,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Reset the cancellation switch at the start of a pipeline invocation.
    pub fn arm(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Whether `cancel_all` has been called since the last `arm`.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Spawn an external process and track it under `role`.
    ///
    /// The returned `Child` is owned by the caller, which drives its stdio
    /// and waits for exit; the supervisor only retains the pid so it can be
    /// signalled. Dropping the `Child` without waiting (a conversion future
    /// dropped mid-flight) kills the process. The coordinator serializes
    /// stages so a live handle is never overwritten in normal operation; if
    /// it happens anyway we log and track the newer pid.
    pub fn launch(
        &self,
        role: ProcessRole,
        program: impl AsRef<OsStr>,
        args: &[String],
        envs: &[(String, String)],
    ) -> io::Result<Child> {
        let mut command = Command::new(program.as_ref());
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in envs {
            command.env(key, value);
        }

        let child = command.spawn()?;

        match child.id() {
            Some(pid) => {
                debug!("Launched {} process (pid {})", role.label(), pid);
                let mut handles = lock_handles(&self.handles);
                if let Some(old) = handles.insert(role, pid) {
                    warn!(
                        "Replacing live {} handle (pid {}) with pid {}",
                        role.label(),
                        old,
                        pid
                    );
                }
            }
            None => {
                // Exited before we could record it; nothing to track
                debug!("{} process exited immediately after spawn", role.label());
            }
        }

        Ok(child)
    }

    /// Drop the tracked handle for `role` after its process has exited.
    pub fn release(&self, role: ProcessRole) {
        let mut handles = lock_handles(&self.handles);
        if handles.remove(&role).is_some() {
            debug!("Released {} handle", role.label());
        }
    }

    /// Terminate every live process and set the cancellation flag.
    ///
    /// Idempotent and safe to call when nothing is running. Signalling an
    /// already-exited process is logged and swallowed.
    pub fn cancel_all(&self) {
        self.cancelled.store(true, Ordering::SeqCst);

        let drained: Vec<(ProcessRole, u32)> = {
            let mut handles = lock_handles(&self.handles);
            handles.drain().collect()
        };

        if drained.is_empty() {
            debug!("cancel_all: no live processes");
            return;
        }

        for (role, pid) in drained {
            info!("Cancelling {} process (pid {})", role.label(), pid);
            send_termination_signal(pid);
        }
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// A poisoned handle map only means another thread panicked mid-update;
/// the pid entries themselves are still usable.
fn lock_handles(
    handles: &Mutex<HashMap<ProcessRole, u32>>,
) -> std::sync::MutexGuard<'_, HashMap<ProcessRole, u32>> {
    match handles.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Best-effort SIGTERM. The process may have already exited; that is fine.
#[cfg(unix)]
fn send_termination_signal(pid: u32) {
    match std::process::Command::new("kill").arg(pid.to_string()).status() {
        Ok(status) if status.success() => {}
        Ok(_) => debug!("kill {} reported failure (process likely already exited)", pid),
        Err(e) => warn!("Failed to run kill for pid {}: {}", pid, e),
    }
}

#[cfg(not(unix))]
fn send_termination_signal(pid: u32) {
    warn!(
        "Process termination is not implemented on this platform (pid {})",
        pid
    );
}
