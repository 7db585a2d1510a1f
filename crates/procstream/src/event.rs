//! Lifecycle notifications and supervisor state

use tokio::sync::mpsc;

use crate::stream::StdioStreams;

/// Notification delivered to the receiver registered at start
#[derive(Debug)]
pub enum ProcessEvent {
    /// The process is running; its stdio endpoints move to the receiver
    Started(StdioStreams),
    /// Both output streams terminated and the process was reaped
    Exited { exit_code: i32 },
}

impl ProcessEvent {
    /// Exit code carried by an `Exited` event
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessEvent::Exited { exit_code } => Some(*exit_code),
            ProcessEvent::Started(_) => None,
        }
    }
}

/// Sending half handed to the supervisor
pub type EventSender = mpsc::UnboundedSender<ProcessEvent>;

/// Receiving half kept by the caller
pub type EventReceiver = mpsc::UnboundedReceiver<ProcessEvent>;

/// Create a channel for lifecycle events
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Logical supervisor state
///
/// `Spawning -> Running -> AwaitingExit -> Exited(code) -> Stopped`. A stop
/// from outside jumps straight to `Stopped` without passing `Exited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Spawning,
    Running,
    AwaitingExit,
    Exited(i32),
    Stopped,
}

impl SupervisorState {
    /// Whether the supervisor has finished for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorState::Stopped)
    }
}
