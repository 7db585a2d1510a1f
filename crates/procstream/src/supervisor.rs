//! Supervisor task coordinating a child process and its stdio adapters

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    child::{ManagedChild, ProcessKiller},
    config::ProcessConfig,
    error::{ProcessError, Result},
    event::{event_channel, EventReceiver, EventSender, ProcessEvent, SupervisorState},
    guard::ShutdownGuard,
    stream::{AdapterOutcome, InputSink, OutputSource, StdioStreams, StreamKind},
};

/// Output adapters that must terminate before the exit code is collected
const SOURCE_ADAPTERS: usize = 2;

/// Requests processed by the supervisor task, in arrival order
#[derive(Debug)]
pub(crate) enum SupervisorCommand {
    Destroy,
    AdapterTerminated {
        stream: StreamKind,
        outcome: AdapterOutcome,
    },
}

/// Owns one child process for its whole lifetime
///
/// Runs as a single tokio task; all of its state is touched only from that
/// task. Field order matters: the guard drops first and kills the child
/// before the `Child` itself is released.
pub struct ProcessSupervisor {
    _guard: ShutdownGuard,
    child: ManagedChild,
    killer: ProcessKiller,
    pending_sources: usize,
    events: EventSender,
    state: watch::Sender<SupervisorState>,
}

impl ProcessSupervisor {
    /// Spawn `config` under supervision, delivering events to `events`
    ///
    /// `Started` is sent before this returns. Spawn failures are returned
    /// here and leave nothing running. Must be called within a tokio runtime.
    ///
    /// # Examples
    /// ```no_run
    /// use procstream::{event_channel, ProcessConfig, ProcessEvent, ProcessSupervisor};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let (events_tx, mut events) = event_channel();
    /// let handle = ProcessSupervisor::start(ProcessConfig::new("echo").args(["hello"]), events_tx)?;
    ///
    /// if let Some(ProcessEvent::Started(streams)) = events.recv().await {
    ///     let output = streams.stdout.read_to_end().await?;
    ///     assert_eq!(output, b"hello\n");
    /// }
    /// assert_eq!(events.recv().await.and_then(|e| e.exit_code()), Some(0));
    /// handle.join().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn start(config: ProcessConfig, events: EventSender) -> Result<SupervisorHandle> {
        let (state, state_rx) = watch::channel(SupervisorState::Spawning);

        let mut child = ManagedChild::spawn(&config)?;
        let pid = child.pid();
        let killer = child.killer();
        // Armed before anything else can fail
        let guard = ShutdownGuard::new(killer.clone().into_destroy_action());

        let (commands, commands_rx) = mpsc::unbounded_channel();

        let stdin = child.stdin().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr().ok_or_else(|| missing_pipe("stderr"))?;

        let streams = StdioStreams {
            stdin: InputSink::spawn(stdin),
            stdout: spawn_source(StreamKind::Stdout, stdout, &config, &commands),
            stderr: spawn_source(StreamKind::Stderr, stderr, &config, &commands),
        };

        if events.send(ProcessEvent::Started(streams)).is_err() {
            debug!(pid = %pid, "Event receiver dropped before Started");
        }
        state.send_replace(SupervisorState::Running);

        let supervisor = Self {
            _guard: guard,
            child,
            killer,
            pending_sources: SOURCE_ADAPTERS,
            events,
            state,
        };
        let task = tokio::spawn(supervisor.run(commands_rx));

        Ok(SupervisorHandle {
            pid,
            commands,
            state: state_rx,
            task,
        })
    }

    /// Like [`ProcessSupervisor::start`] with a fresh event channel
    pub fn spawn(config: ProcessConfig) -> Result<(SupervisorHandle, EventReceiver)> {
        let (events_tx, events_rx) = event_channel();
        let handle = Self::start(config, events_tx)?;
        Ok((handle, events_rx))
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SupervisorCommand>) {
        let pid = self.killer.pid();

        while self.pending_sources > 0 {
            match commands.recv().await {
                Some(SupervisorCommand::Destroy) => destroy(&self.killer),
                Some(SupervisorCommand::AdapterTerminated { stream, outcome }) => {
                    // Any termination counts, whatever the outcome
                    self.pending_sources -= 1;
                    debug!(
                        pid = %pid,
                        stream = %stream,
                        outcome = ?outcome,
                        remaining = self.pending_sources,
                        "Source adapter terminated"
                    );
                }
                None => {
                    warn!(pid = %pid, "Command channel closed before output finished");
                    self.state.send_replace(SupervisorState::Stopped);
                    return;
                }
            }
        }

        self.state.send_replace(SupervisorState::AwaitingExit);
        debug!(pid = %pid, "Output finished, waiting for exit");

        let exit_code = loop {
            tokio::select! {
                biased;
                code = self.child.wait_exit_code() => break code,
                Some(command) = commands.recv() => {
                    if let SupervisorCommand::Destroy = command {
                        destroy(&self.killer);
                    }
                }
            }
        };

        match exit_code {
            Ok(exit_code) => {
                info!(pid = %pid, exit_code, "Process exited");
                self.state.send_replace(SupervisorState::Exited(exit_code));
                if self.events.send(ProcessEvent::Exited { exit_code }).is_err() {
                    debug!(pid = %pid, "Event receiver dropped before Exited");
                }
            }
            Err(e) => warn!(pid = %pid, error = %e, "Failed to collect exit code"),
        }

        self.state.send_replace(SupervisorState::Stopped);
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        // Covers aborts and panics; normal completion already set it
        self.state.send_replace(SupervisorState::Stopped);
    }
}

fn spawn_source<R>(
    kind: StreamKind,
    reader: R,
    config: &ProcessConfig,
    commands: &mpsc::UnboundedSender<SupervisorCommand>,
) -> OutputSource
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let commands = commands.clone();
    OutputSource::spawn(
        kind,
        reader,
        config.buffer_size,
        config.stdio_timeout,
        move |stream, outcome| {
            // Supervisor already gone when this fails
            let _ = commands.send(SupervisorCommand::AdapterTerminated { stream, outcome });
        },
    )
}

fn destroy(killer: &ProcessKiller) {
    debug!(pid = %killer.pid(), "Destroy requested");
    if let Err(e) = killer.kill() {
        warn!(pid = %killer.pid(), error = %e, "Failed to destroy process");
    }
}

fn missing_pipe(name: &str) -> ProcessError {
    ProcessError::SpawnFailed(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{} was not captured", name),
    ))
}

/// Caller side of a running supervisor
///
/// Dropping the handle detaches it; the supervisor keeps running until the
/// process exits.
#[derive(Debug)]
pub struct SupervisorHandle {
    pid: u32,
    commands: mpsc::UnboundedSender<SupervisorCommand>,
    state: watch::Receiver<SupervisorState>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Get process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Current supervisor state
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.clone()
    }

    /// Ask the supervisor to kill the process
    ///
    /// Returns immediately. Output streams end once the OS closes the pipes,
    /// after which `Exited` is delivered as usual. No-op once the supervisor
    /// has stopped.
    pub fn destroy(&self) {
        if self.commands.send(SupervisorCommand::Destroy).is_err() {
            debug!(pid = %self.pid, "Destroy after supervisor stopped");
        }
    }

    /// Stop the supervisor from outside
    ///
    /// The shutdown guard kills the process; no `Exited` event is sent.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the supervisor task has finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the supervisor task to finish
    pub async fn join(self) {
        match self.task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!(pid = %self.pid, "Supervisor stopped"),
            Err(e) => warn!(pid = %self.pid, error = %e, "Supervisor task failed"),
        }
    }
}
