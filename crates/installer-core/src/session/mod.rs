//! Install sessions and the registry that owns them.
//!
//! A session is created through the [`SessionRegistry`], driven through its
//! action intake, and observed through its state and event channels.

mod action;
mod progress;
mod registry;
mod state;

pub use action::{Action, ActionKind, ActionReceiver, ActivityHandle, ACTION_BUFFER_CAPACITY};
pub use progress::{next_progress, Progress, TransitionError};
pub use registry::{RegistryError, SessionRegistry};
pub use state::{Session, SessionId, SessionSnapshot};
