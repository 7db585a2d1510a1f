//! Spawned child process and its kill capability

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

use crate::{
    config::ProcessConfig,
    error::{ProcessError, Result},
    quote,
};

/// Exit code reported when the OS gives neither a code nor a signal
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Kills a process by pid without owning its `Child`
///
/// Cheap to clone. Once the owner has reaped the child the pid may be reused
/// by an unrelated process, so every kill after a successful wait
/// is a no-op.
#[derive(Debug, Clone)]
pub struct ProcessKiller {
    pid: u32,
    process_group: bool,
    reaped: Arc<AtomicBool>,
}

impl ProcessKiller {
    fn new(pid: u32, process_group: bool) -> Self {
        Self {
            pid,
            process_group,
            reaped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Process ID this killer targets
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the process has already been waited on
    pub fn is_reaped(&self) -> bool {
        self.reaped.load(Ordering::Acquire)
    }

    fn mark_reaped(&self) {
        self.reaped.store(true, Ordering::Release);
    }

    /// A failed wait leaves the process possibly alive, so it stays killable
    fn record_wait(&self, status: io::Result<ExitStatus>) -> Result<i32> {
        let status = status.map_err(ProcessError::WaitFailed)?;
        self.mark_reaped();
        Ok(exit_code(status))
    }

    /// Forcibly kill the process (and its group when configured)
    ///
    /// Killing a process that already exited but was not reaped yet succeeds.
    pub fn kill(&self) -> Result<()> {
        if self.is_reaped() {
            return Ok(());
        }
        self.kill_impl()
            .map_err(|e| ProcessError::KillFailed(e.to_string()))
    }

    /// Adapter for [`crate::guard::ShutdownGuard`]
    pub fn into_destroy_action(self) -> impl FnOnce() -> io::Result<()> + Send + 'static {
        move || {
            self.kill()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
        }
    }

    #[cfg(unix)]
    fn kill_impl(&self) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, killpg, Signal};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(self.pid as i32);
        let result = if self.process_group {
            killpg(pid, Signal::SIGKILL)
        } else {
            kill(pid, Signal::SIGKILL)
        };

        match result {
            Ok(()) => {
                debug!(pid = %self.pid, group = self.process_group, "Sent SIGKILL");
                Ok(())
            }
            // Already gone
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    #[cfg(windows)]
    fn kill_impl(&self) -> io::Result<()> {
        // Runs inside Drop, so this has to be the blocking std command
        let status = std::process::Command::new("taskkill")
            .args(["/pid", &self.pid.to_string(), "/f", "/t"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        debug!(pid = %self.pid, success = status.success(), "taskkill finished");
        Ok(())
    }
}

/// Wrapper around tokio::process::Child owned by the supervisor
#[derive(Debug)]
pub struct ManagedChild {
    /// Underlying tokio child process
    child: Child,
    /// Kill capability shared with the shutdown guard
    killer: ProcessKiller,
}

impl ManagedChild {
    /// Spawn a process with piped stdio
    pub fn spawn(config: &ProcessConfig) -> Result<Self> {
        config.validate()?;

        debug!(
            command = %config.command,
            args = ?config.args,
            "Spawning process"
        );

        let mut cmd = Command::new(&config.command);
        push_args(&mut cmd, &config.args);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        #[cfg(unix)]
        if config.process_group {
            cmd.process_group(0);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd.spawn().map_err(ProcessError::SpawnFailed)?;
        let pid = child.id().ok_or_else(|| {
            ProcessError::SpawnFailed(io::Error::new(
                io::ErrorKind::Other,
                "Failed to get process ID",
            ))
        })?;

        info!(pid = %pid, command = %config.command, "Process spawned");

        Ok(Self {
            child,
            killer: ProcessKiller::new(pid, config.process_group),
        })
    }

    /// Get process ID
    pub fn pid(&self) -> u32 {
        self.killer.pid()
    }

    /// Kill capability for this process
    pub fn killer(&self) -> ProcessKiller {
        self.killer.clone()
    }

    /// Wait for the process to exit and return its exit code
    ///
    /// Marks the killer as reaped in the same poll that observes the exit.
    pub async fn wait_exit_code(&mut self) -> Result<i32> {
        let status = self.child.wait().await;
        self.killer.record_wait(status)
    }

    /// Take stdin handle
    pub fn stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take stdout handle
    pub fn stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take stderr handle
    pub fn stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }
}

#[cfg(windows)]
fn push_args(cmd: &mut Command, args: &[String]) {
    // Already quoted, must not be quoted again by std
    for arg in quote::platform_args(args) {
        cmd.raw_arg(arg);
    }
}

#[cfg(not(windows))]
fn push_args(cmd: &mut Command, args: &[String]) {
    cmd.args(quote::platform_args(args));
}

/// Map an exit status to a single integer code
///
/// Signal deaths on Unix follow the shell convention of `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    UNKNOWN_EXIT_CODE
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_and_wait() {
        let mut child = ManagedChild::spawn(&ProcessConfig::new("true")).unwrap();
        assert!(child.pid() > 0);
        assert_eq!(child.wait_exit_code().await.unwrap(), 0);
        assert!(child.killer().is_reaped());
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let err = ManagedChild::spawn(&ProcessConfig::new("/definitely/not/a/binary")).unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn test_spawn_invalid_working_dir() {
        let config = ProcessConfig::new("true").working_dir("/definitely/not/a/dir");
        let err = ManagedChild::spawn(&config).unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn test_kill_reports_signal_code() {
        let mut child = ManagedChild::spawn(&ProcessConfig::new("sleep").args(["10"])).unwrap();
        let killer = child.killer();
        killer.kill().unwrap();
        // Second kill on the unreaped zombie is still fine
        killer.kill().unwrap();
        assert_eq!(child.wait_exit_code().await.unwrap(), 137);
        // And after reaping it is a no-op
        killer.kill().unwrap();
    }

    #[tokio::test]
    async fn test_failed_wait_keeps_process_killable() {
        let mut child = ManagedChild::spawn(&ProcessConfig::new("sleep").args(["10"])).unwrap();
        let killer = child.killer();

        let err = killer
            .record_wait(Err(io::Error::new(io::ErrorKind::Other, "wait failed")))
            .unwrap_err();
        assert!(matches!(err, ProcessError::WaitFailed(_)));
        assert!(!killer.is_reaped());

        // The kill still goes through
        killer.kill().unwrap();
        assert_eq!(child.wait_exit_code().await.unwrap(), 137);
        assert!(killer.is_reaped());
    }

    #[tokio::test]
    async fn test_exit_code_passthrough() {
        let config = ProcessConfig::new("sh").args(["-c", "exit 7"]);
        let mut child = ManagedChild::spawn(&config).unwrap();
        assert_eq!(child.wait_exit_code().await.unwrap(), 7);
    }
}
