//! Lifecycle commands and the per-session intake that buffers them.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// Pending actions kept per session: the latest one plus one extra.
pub const ACTION_BUFFER_CAPACITY: usize = 2;

/// Opaque platform context passed through with [`Action::Resolve`].
///
/// The coordinator never looks inside. Hosts wrap whatever their worker needs
/// (a window handle, a request origin) and downcast it on the other side.
#[derive(Clone)]
pub struct ActivityHandle(Arc<dyn Any + Send + Sync>);

impl ActivityHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ActivityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActivityHandle(..)")
    }
}

/// A command for the session's worker.
#[derive(Debug, Clone)]
pub enum Action {
    Resolve(ActivityHandle),
    Analyse,
    Install,
    Finish,
}

/// Payload-free discriminant of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Resolve,
    Analyse,
    Install,
    Finish,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Resolve(_) => ActionKind::Resolve,
            Action::Analyse => ActionKind::Analyse,
            Action::Install => ActionKind::Install,
            Action::Finish => ActionKind::Finish,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Resolve => "resolve",
            ActionKind::Analyse => "analyse",
            ActionKind::Install => "install",
            ActionKind::Finish => "finish",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
struct Intake {
    pending: VecDeque<Action>,
    closed: bool,
}

struct Shared {
    intake: Mutex<Intake>,
    notify: Notify,
}

impl Shared {
    fn intake(&self) -> MutexGuard<'_, Intake> {
        self.intake.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keep-latest action buffer.
///
/// Holds at most [`ACTION_BUFFER_CAPACITY`] pending actions. When full, the
/// oldest pending action is dropped to make room, so a slow worker never
/// builds an unbounded backlog. Sending never blocks.
pub(crate) struct ActionChannel {
    shared: Arc<Shared>,
}

/// Outcome of [`ActionChannel::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    Queued,
    /// Queued after evicting the oldest pending action.
    Replaced(ActionKind),
    /// The intake is closed; the action was dropped.
    Closed,
}

impl ActionChannel {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                intake: Mutex::new(Intake::default()),
                notify: Notify::new(),
            }),
        }
    }

    pub(crate) fn send(&self, action: Action) -> SendOutcome {
        let outcome = {
            let mut intake = self.shared.intake();
            if intake.closed {
                return SendOutcome::Closed;
            }
            let evicted = if intake.pending.len() >= ACTION_BUFFER_CAPACITY {
                intake.pending.pop_front().map(|a| a.kind())
            } else {
                None
            };
            intake.pending.push_back(action);
            evicted.map_or(SendOutcome::Queued, SendOutcome::Replaced)
        };
        self.shared.notify.notify_waiters();
        outcome
    }

    /// Stop accepting actions. Already-buffered actions remain receivable.
    pub(crate) fn close(&self) {
        self.shared.intake().closed = true;
        self.shared.notify.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shared.intake().closed
    }

    pub(crate) fn pending(&self) -> usize {
        self.shared.intake().pending.len()
    }

    pub(crate) fn receiver(&self) -> ActionReceiver {
        ActionReceiver {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// The worker's end of a session's action intake.
#[derive(Clone)]
pub struct ActionReceiver {
    shared: Arc<Shared>,
}

impl ActionReceiver {
    /// Wait for the next action, in send order.
    ///
    /// Returns `None` once the intake is closed and every buffered action has
    /// been taken.
    pub async fn recv(&self) -> Option<Action> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut intake = self.shared.intake();
                if let Some(action) = intake.pending.pop_front() {
                    return Some(action);
                }
                if intake.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Take the next buffered action without waiting.
    pub fn try_recv(&self) -> Option<Action> {
        self.shared.intake().pending.pop_front()
    }

    /// Whether the intake has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.intake().closed
    }
}

impl fmt::Debug for ActionReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let intake = self.shared.intake();
        f.debug_struct("ActionReceiver")
            .field("pending", &intake.pending.len())
            .field("closed", &intake.closed)
            .finish()
    }
}
