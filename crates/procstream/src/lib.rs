//! # procstream
//!
//! **Purpose**: Supervise one child process and expose its stdio as streams
//!
//! Spawns a process, hands its stdin, stdout and stderr to the caller as
//! independently consumable endpoints, and reports the exit code exactly once.
//!
//! ## Features
//!
//! - **Lifecycle Events**: `Started` carries the stdio endpoints, `Exited` the exit code
//! - **Streaming Stdio**: Chunked output sources with optional idle timeout, input sink with close
//! - **Destroy**: Fire-and-forget kill, safe to repeat or to race natural exit
//! - **Shutdown Guard**: The process is killed whenever the supervisor goes away, so
//!   no reader stays blocked and no process is orphaned
//! - **Process Groups**: Optionally kill the whole group on Unix
//! - **Argument Quoting**: Windows command line quoting that round-trips every argument
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procstream::{ProcessConfig, ProcessEvent, ProcessSupervisor};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProcessConfig::new("cat").stdio_timeout_ms(5_000);
//! let (handle, mut events) = ProcessSupervisor::spawn(config)?;
//!
//! if let Some(ProcessEvent::Started(streams)) = events.recv().await {
//!     streams.stdin.send("hello").await?;
//!     streams.stdin.close();
//!     let echoed = streams.stdout.read_to_end().await?;
//!     assert_eq!(echoed, b"hello");
//! }
//!
//! if let Some(ProcessEvent::Exited { exit_code }) = events.recv().await {
//!     println!("cat exited with {}", exit_code);
//! }
//! handle.join().await;
//! # Ok(())
//! # }
//! ```

pub mod child;
pub mod config;
pub mod error;
pub mod event;
pub mod guard;
pub mod quote;
pub mod stream;
pub mod supervisor;

pub use child::{ManagedChild, ProcessKiller};
pub use config::ProcessConfig;
pub use error::{ProcessError, Result};
pub use event::{event_channel, EventReceiver, EventSender, ProcessEvent, SupervisorState};
pub use guard::ShutdownGuard;
pub use stream::{AdapterOutcome, InputSink, OutputSource, StdioStreams, StreamKind};
pub use supervisor::{ProcessSupervisor, SupervisorHandle};
