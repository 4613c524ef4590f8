//! SessionRegistry - the single map from session id to session.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use super::state::{Session, SessionId};
use crate::config::CoordinatorConfig;
use crate::launcher::{LaunchError, Launcher};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to launch worker for session {id}: {source}")]
    LaunchFailed {
        id: SessionId,
        #[source]
        source: LaunchError,
    },
}

/// A session whose launch failed, already removed from the map.
struct RolledBack {
    session: Arc<Session>,
    error: RegistryError,
}

/// Owns every live install session.
///
/// Constructed once by the host (usually through
/// [`InstallerContext`](crate::context::InstallerContext)) and shared by
/// reference. Creation and removal are serialized by one write lock; lookups
/// take the read lock and may run concurrently.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    launcher: Arc<dyn Launcher>,
    config: CoordinatorConfig,
}

impl SessionRegistry {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self::with_config(launcher, CoordinatorConfig::default())
    }

    pub fn with_config(launcher: Arc<dyn Launcher>, config: CoordinatorConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            launcher,
            config,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the session for `id`, or create a new one.
    ///
    /// `None` always creates. A given id that is not live also creates a new
    /// session, with a freshly generated id; callers read the new id from the
    /// returned session.
    pub fn get_or_create(&self, id: Option<&SessionId>) -> Result<Arc<Session>, RegistryError> {
        let created = {
            let mut sessions = self.write();
            if let Some(existing) = id.and_then(|id| sessions.get(id)) {
                return Ok(Arc::clone(existing));
            }
            self.create_locked(&mut sessions)
        };
        created.map_err(Self::rolled_back)
    }

    /// Look up a live session.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.read().get(id).cloned()
    }

    /// Create a session and launch its worker.
    ///
    /// If the launcher fails the session is removed again and the error is
    /// returned, so a retry starts from a clean registry.
    pub fn create(&self) -> Result<Arc<Session>, RegistryError> {
        let created = self.create_locked(&mut self.write());
        created.map_err(Self::rolled_back)
    }

    /// Insert a new session and launch it. On failure the entry is already
    /// gone from `sessions`; the caller closes the returned session once the
    /// lock is released.
    fn create_locked(
        &self,
        sessions: &mut HashMap<SessionId, Arc<Session>>,
    ) -> Result<Arc<Session>, RolledBack> {
        let mut id = SessionId::new();
        while sessions.contains_key(&id) {
            id = SessionId::new();
        }

        let session = Arc::new(Session::new(id.clone(), &self.config));
        sessions.insert(id.clone(), Arc::clone(&session));

        if let Err(source) = self.launcher.launch(&id) {
            log::warn!("Launch failed for session {}, rolling back: {}", id, source);
            sessions.remove(&id);
            return Err(RolledBack {
                session,
                error: RegistryError::LaunchFailed { id, source },
            });
        }

        log::info!("Created install session {}", id);
        Ok(session)
    }

    fn rolled_back(rolled_back: RolledBack) -> RegistryError {
        rolled_back.session.close_intake();
        rolled_back.error
    }

    /// Settings applied to every session this registry creates.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Remove a session. No-op if absent.
    ///
    /// The session's action intake is closed so its worker stops after the
    /// actions already buffered. Nothing is aborted, and observers holding the
    /// session keep it alive.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.write().remove(id);
        if let Some(ref session) = removed {
            session.close_intake();
            log::info!("Removed install session {}", id);
        }
        removed
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.read().contains_key(id)
    }

    /// List all live session ids.
    pub fn list_sessions(&self) -> Vec<SessionId> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove every session, closing each intake.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.write().drain().collect();
        for (_, session) in &drained {
            session.close_intake();
        }
        if !drained.is_empty() {
            log::info!("Registry shut down, closed {} sessions", drained.len());
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}
