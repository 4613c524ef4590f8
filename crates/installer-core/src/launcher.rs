//! Worker launch capability.
//!
//! The registry notifies a [`Launcher`] once for every session it creates.
//! What "launching" means is up to the host: spawning a task, starting a
//! service, or nothing at all.
//!
//! The registry calls [`Launcher::launch`] while it holds its write lock, so a
//! launcher must hand the id off and return. It must not call back into the
//! registry on the same thread.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::SessionId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Worker launcher is unavailable: {0}")]
    Unavailable(String),

    #[error("Worker launch rejected: {0}")]
    Rejected(String),
}

/// Starts the worker for a newly created session.
pub trait Launcher: Send + Sync {
    fn launch(&self, session_id: &SessionId) -> Result<(), LaunchError>;
}

impl<F> Launcher for F
where
    F: Fn(&SessionId) -> Result<(), LaunchError> + Send + Sync,
{
    fn launch(&self, session_id: &SessionId) -> Result<(), LaunchError> {
        self(session_id)
    }
}

/// Launcher for hosts that start workers themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLauncher;

impl Launcher for NoopLauncher {
    fn launch(&self, session_id: &SessionId) -> Result<(), LaunchError> {
        log::debug!("No launcher configured for session {}", session_id);
        Ok(())
    }
}

/// A request to start the worker for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub session_id: SessionId,
}

/// Forwards launch requests to a supervisor task over an unbounded channel.
///
/// Sending never blocks, which makes this safe to call under the registry
/// lock. Fails once the supervisor has dropped its receiver.
#[derive(Debug, Clone)]
pub struct ChannelLauncher {
    sender: mpsc::UnboundedSender<LaunchRequest>,
}

impl ChannelLauncher {
    /// Create a launcher and the receiver the supervisor should drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LaunchRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Launcher for ChannelLauncher {
    fn launch(&self, session_id: &SessionId) -> Result<(), LaunchError> {
        self.sender
            .send(LaunchRequest {
                session_id: session_id.clone(),
            })
            .map_err(|_| LaunchError::Unavailable("supervisor has shut down".to_string()))
    }
}
