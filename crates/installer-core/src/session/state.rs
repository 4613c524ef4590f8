//! Per-session state.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::{Action, ActionChannel, ActionReceiver, ActivityHandle, SendOutcome};
use super::progress::Progress;
use crate::channels::{EventChannel, EventSubscription, StateChannel, StateSubscription};
use crate::config::CoordinatorConfig;
use crate::entities::{DataSource, InstallCandidate, InstallConfig, InstallError, InstallerEvent};
use crate::logging::Transcript;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A single install session.
///
/// The worker is the only writer of `config`, `data`, `entities`, `error`
/// and `progress`. Any number of observers may read them or subscribe.
/// Callers drive the worker through [`resolve`](Self::resolve),
/// [`analyse`](Self::analyse), [`install`](Self::install) and
/// [`close`](Self::close).
pub struct Session {
    id: SessionId,
    config: RwLock<InstallConfig>,
    data: StateChannel<Vec<DataSource>>,
    entities: StateChannel<Vec<InstallCandidate>>,
    error: RwLock<Option<InstallError>>,
    progress: StateChannel<Progress>,
    background: StateChannel<bool>,
    events: EventChannel<InstallerEvent>,
    actions: ActionChannel,
    transcript: Transcript,
}

/// Point-in-time copy of a session's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub config: InstallConfig,
    pub data: Vec<DataSource>,
    pub entities: Vec<InstallCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<InstallError>,
    pub progress: Progress,
    pub background: bool,
}

impl Session {
    pub fn new(id: SessionId, config: &CoordinatorConfig) -> Self {
        let transcript = Transcript::new(config.log_dir.as_deref(), id.as_str());
        Self {
            id,
            config: RwLock::new(InstallConfig::default()),
            data: StateChannel::new(Vec::new()),
            entities: StateChannel::new(Vec::new()),
            error: RwLock::new(None),
            progress: StateChannel::new(Progress::Ready),
            background: StateChannel::new(false),
            events: EventChannel::with_capacity(config.event_capacity),
            actions: ActionChannel::new(),
            transcript,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    // === Actions ===

    pub fn resolve(&self, activity: ActivityHandle) {
        self.dispatch(Action::Resolve(activity));
    }

    pub fn analyse(&self) {
        self.dispatch(Action::Analyse);
    }

    pub fn install(&self) {
        self.dispatch(Action::Install);
    }

    /// Ask the worker to finish. The registry entry stays until removed.
    pub fn close(&self) {
        self.dispatch(Action::Finish);
    }

    fn dispatch(&self, action: Action) {
        let kind = action.kind();
        match self.actions.send(action) {
            SendOutcome::Queued => {}
            SendOutcome::Replaced(dropped) => {
                log::debug!(
                    "Session {}: dropped pending {} in favour of {}",
                    self.id,
                    dropped,
                    kind
                );
            }
            SendOutcome::Closed => {
                log::debug!("Session {}: intake closed, ignoring {}", self.id, kind);
                return;
            }
        }
        self.transcript.write("ACTION", &kind.to_string());
    }

    /// The worker's end of the action intake.
    pub fn actions(&self) -> ActionReceiver {
        self.actions.receiver()
    }

    /// Number of actions waiting for the worker.
    pub fn pending_actions(&self) -> usize {
        self.actions.pending()
    }

    /// Stop accepting actions. Called by the registry on removal.
    pub(crate) fn close_intake(&self) {
        self.actions.close();
        self.transcript.write("INTAKE", "closed");
    }

    pub fn is_intake_closed(&self) -> bool {
        self.actions.is_closed()
    }

    // === Config ===

    pub fn config(&self) -> InstallConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_config(&self, config: InstallConfig) {
        if let Ok(json) = serde_json::to_string(&config) {
            self.transcript.write("CONFIG", &json);
        }
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    // === Data and entities ===

    pub fn data(&self) -> Vec<DataSource> {
        self.data.get()
    }

    pub fn set_data(&self, data: Vec<DataSource>) {
        self.data.publish(data);
    }

    pub fn subscribe_data(&self) -> StateSubscription<Vec<DataSource>> {
        self.data.subscribe()
    }

    pub fn entities(&self) -> Vec<InstallCandidate> {
        self.entities.get()
    }

    pub fn set_entities(&self, entities: Vec<InstallCandidate>) {
        self.entities.publish(entities);
    }

    /// Toggle selection of the candidate with `package_name`.
    ///
    /// Returns `false`, without waking entity subscribers, if no candidate
    /// has that package name.
    pub fn select_entity(&self, package_name: &str, selected: bool) -> bool {
        self.entities.update_if(|entities| {
            let mut found = false;
            for entity in entities.iter_mut().filter(|e| e.package_name == package_name) {
                entity.selected = selected;
                found = true;
            }
            found
        })
    }

    pub fn subscribe_entities(&self) -> StateSubscription<Vec<InstallCandidate>> {
        self.entities.subscribe()
    }

    // === Error ===

    pub fn error(&self) -> Option<InstallError> {
        self.error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_error(&self, error: InstallError) {
        self.transcript.write("ERROR", &error.to_string());
        *self.error.write().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    // === Progress and background ===

    pub fn progress(&self) -> Progress {
        self.progress.get()
    }

    pub fn set_progress(&self, progress: Progress) {
        self.transcript.write("PROGRESS", &progress.to_string());
        self.progress.publish(progress);
    }

    pub fn subscribe_progress(&self) -> StateSubscription<Progress> {
        self.progress.subscribe()
    }

    pub fn is_background(&self) -> bool {
        self.background.get()
    }

    /// Publish a new background hint. Never blocks.
    pub fn background(&self, value: bool) {
        self.background.publish(value);
    }

    pub fn subscribe_background(&self) -> StateSubscription<bool> {
        self.background.subscribe()
    }

    // === Events ===

    /// Deliver `event` to every current subscriber.
    ///
    /// Events posted while nobody is subscribed are lost. Returns the number
    /// of subscribers reached.
    pub async fn post_event(&self, event: InstallerEvent) -> usize {
        self.events.post(event).await
    }

    pub fn subscribe_events(&self) -> EventSubscription<InstallerEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            config: self.config(),
            data: self.data(),
            entities: self.entities(),
            error: self.error(),
            progress: self.progress(),
            background: self.is_background(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("progress", &self.progress())
            .field("background", &self.is_background())
            .field("pending_actions", &self.pending_actions())
            .finish()
    }
}
