//! InstallerContext - the process-wide root for install sessions.
//!
//! The host builds exactly one context at startup and hands clones of it to
//! everything that needs the registry. There are no statics: tearing the
//! context down with [`InstallerContext::shutdown`] closes every session.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │    InstallerContext     │
//!                    ├─────────────────────────┤
//!                    │  - SessionRegistry      │
//!                    │  - Launcher             │
//!                    │  - CoordinatorConfig    │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//!     │   Callers   │     │   Workers   │     │  Observers  │
//!     │  (actions)  │     │ (mutations) │     │ (subscribe) │
//!     └─────────────┘     └─────────────┘     └─────────────┘
//! ```

use std::sync::Arc;

use crate::config::CoordinatorConfig;
use crate::launcher::{Launcher, NoopLauncher};
use crate::session::SessionRegistry;

/// Configuration for building an InstallerContext.
#[derive(Default)]
pub struct InstallerContextBuilder {
    config: Option<CoordinatorConfig>,
    launcher: Option<Arc<dyn Launcher>>,
    registry: Option<Arc<SessionRegistry>>,
}

impl InstallerContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings applied to every session.
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// The launcher notified for each new session. Defaults to [`NoopLauncher`].
    pub fn launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Use an existing registry (for testing). Overrides `config` and `launcher`.
    pub fn registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the InstallerContext.
    pub fn build(self) -> InstallerContext {
        let registry = self.registry.unwrap_or_else(|| {
            let config = self.config.unwrap_or_default();
            let launcher = self.launcher.unwrap_or_else(|| Arc::new(NoopLauncher));
            Arc::new(SessionRegistry::with_config(launcher, config))
        });

        InstallerContext { registry }
    }
}

/// Shared handle to the session registry and its settings.
///
/// Cloning is cheap and every clone refers to the same registry.
#[derive(Clone)]
pub struct InstallerContext {
    registry: Arc<SessionRegistry>,
}

impl InstallerContext {
    /// Create a new InstallerContext with a builder.
    pub fn builder() -> InstallerContextBuilder {
        InstallerContextBuilder::new()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The registry's settings.
    pub fn config(&self) -> &CoordinatorConfig {
        self.registry.config()
    }

    /// Close and drop every session. The context stays usable afterwards.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

impl Default for InstallerContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{LaunchError, LaunchRequest};
    use crate::session::SessionId;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[test]
    fn builder_creates_context_with_defaults() {
        let ctx = InstallerContext::builder().build();
        assert_eq!(ctx.config(), &CoordinatorConfig::default());
        assert!(ctx.registry().is_empty());
    }

    #[test]
    fn builder_sets_config() {
        let ctx = InstallerContext::builder()
            .config(CoordinatorConfig::default().log_dir(PathBuf::from("/test/logs")))
            .build();
        assert_eq!(ctx.config().log_dir, Some(PathBuf::from("/test/logs")));
    }

    #[test]
    fn builder_uses_provided_launcher() {
        let launched = Arc::new(Mutex::new(Vec::<LaunchRequest>::new()));
        let sink = Arc::clone(&launched);
        let ctx = InstallerContext::builder()
            .launcher(Arc::new(move |id: &SessionId| -> Result<(), LaunchError> {
                sink.lock().unwrap().push(LaunchRequest {
                    session_id: id.clone(),
                });
                Ok(())
            }))
            .build();

        let session = ctx.registry().create().unwrap();
        let launched = launched.lock().unwrap();
        assert_eq!(launched.len(), 1);
        assert_eq!(&launched[0].session_id, session.id());
    }

    #[test]
    fn builder_uses_provided_registry() {
        let registry = Arc::new(SessionRegistry::new(Arc::new(NoopLauncher)));
        let ctx = InstallerContext::builder()
            .registry(Arc::clone(&registry))
            .build();
        assert!(Arc::ptr_eq(ctx.registry(), &registry));
    }

    #[test]
    fn config_comes_from_provided_registry() {
        let registry = Arc::new(SessionRegistry::with_config(
            Arc::new(NoopLauncher),
            CoordinatorConfig::default().event_capacity(8),
        ));
        let ctx = InstallerContext::builder()
            .config(CoordinatorConfig::default().event_capacity(32))
            .registry(registry)
            .build();
        assert_eq!(ctx.config().event_capacity, 8);
    }

    #[test]
    fn context_is_cheaply_clonable() {
        let ctx = InstallerContext::default();
        let ctx2 = ctx.clone();

        let session = ctx.registry().create().unwrap();
        assert!(Arc::ptr_eq(ctx.registry(), ctx2.registry()));
        assert!(ctx2.registry().get(session.id()).is_some());
    }

    #[test]
    fn shutdown_empties_registry() {
        let ctx = InstallerContext::default();
        let session = ctx.registry().create().unwrap();

        ctx.shutdown();

        assert!(ctx.registry().is_empty());
        assert!(session.is_intake_closed());
        assert!(ctx.registry().create().is_ok());
    }
}
