//! Scoped cleanup that kills the supervised process

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

type DestroyAction = Box<dyn FnOnce() -> io::Result<()> + Send + 'static>;

/// Runs its destroy action exactly once when dropped
///
/// Output readers may be parked on the process's pipes. Killing the process is
/// the only way to close those pipes from the outside, so the guard lives as
/// long as the supervisor task and fires on every way out of it: normal return,
/// abort, or panic. Errors and panics from the action are swallowed.
pub struct ShutdownGuard {
    action: Option<DestroyAction>,
}

impl ShutdownGuard {
    /// Create a guard around a destroy action
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        Self {
            action: Some(Box::new(action)),
        }
    }

    #[cfg(test)]
    fn disarm(mut self) {
        self.action = None;
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        let Some(action) = self.action.take() else {
            return;
        };

        debug!("Shutdown guard firing");
        match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Destroy action failed during shutdown"),
            Err(_) => debug!("Destroy action panicked during shutdown"),
        }
    }
}

impl fmt::Debug for ShutdownGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownGuard")
            .field("armed", &self.action.is_some())
            .finish()
    }
}
