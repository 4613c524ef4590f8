//! # installer-core
//!
//! Session registry and coordinator for package-install workflows.
//!
//! This crate is framework-agnostic and can be used by:
//! - A headless daemon (see `installer-daemon`)
//! - Any UI host that wants to observe install sessions
//!
//! ## Key Concepts
//!
//! - **Session**: A single install workflow (resolve → analyse → install → finish)
//! - **Action**: A lifecycle command queued into a session for its worker
//! - **Launcher**: The host capability that starts a worker for a new session
//! - **StateChannel / EventChannel**: Latest-value and transient broadcast streams

pub mod channels;
pub mod config;
pub mod context;
pub mod entities;
pub mod launcher;
pub mod logging;
pub mod paths;
pub mod session;

// Re-export commonly used types
pub use channels::{EventChannel, EventSubscription, StateChannel, StateSubscription};
pub use config::CoordinatorConfig;
pub use context::InstallerContext;
pub use entities::{DataSource, InstallCandidate, InstallConfig, InstallError, InstallerEvent};
pub use launcher::{ChannelLauncher, LaunchError, LaunchRequest, Launcher, NoopLauncher};
pub use session::{
    Action, ActionKind, ActionReceiver, ActivityHandle, Progress, RegistryError, Session,
    SessionId, SessionRegistry,
};
