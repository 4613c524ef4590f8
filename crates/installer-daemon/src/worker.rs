//! Scripted install worker.
//!
//! Consumes a session's actions and walks it through the lifecycle without
//! touching any real package manager. Each step sleeps for the configured
//! delay and can be told to fail, which makes the daemon useful for exercising
//! observers end to end.

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use installer_core::entities::{DataSource, InstallCandidate, InstallError, InstallerEvent};
use installer_core::session::{next_progress, Action, ActivityHandle, Progress, Session};

/// A worker step that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    Resolve,
    Analyse,
    Install,
}

/// What the caller hands over with `Resolve`.
#[derive(Debug, Clone)]
pub struct CliOrigin {
    pub sources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub step_delay: Duration,
    pub fail_at: Option<Stage>,
}

impl Script {
    fn fails(&self, stage: Stage) -> bool {
        self.fail_at == Some(stage)
    }
}

/// Process actions for `session` until `Finish` or until its intake closes.
pub async fn run(session: Arc<Session>, script: Script) {
    let actions = session.actions();
    log::info!("Worker started for session {}", session.id());

    while let Some(action) = actions.recv().await {
        let kind = action.kind();
        let next = match next_progress(session.progress(), &action) {
            Ok(next) => next,
            Err(e) => {
                log::warn!("Session {}: ignoring {}: {}", session.id(), kind, e);
                session
                    .post_event(InstallerEvent::Notice {
                        message: e.to_string(),
                    })
                    .await;
                continue;
            }
        };
        session.set_progress(next);

        match action {
            Action::Resolve(handle) => resolve(&session, &script, &handle).await,
            Action::Analyse => analyse(&session, &script).await,
            Action::Install => install(&session, &script).await,
            Action::Finish => {
                session.post_event(InstallerEvent::RequestDismiss).await;
                break;
            }
        }
    }

    log::info!("Worker stopped for session {}", session.id());
}

async fn resolve(session: &Session, script: &Script, handle: &ActivityHandle) {
    tokio::time::sleep(script.step_delay).await;

    let sources = handle
        .downcast_ref::<CliOrigin>()
        .map(|origin| origin.sources.clone())
        .unwrap_or_default();

    if script.fails(Stage::Resolve) || sources.is_empty() {
        session.set_error(InstallError::Resolve("no install sources given".to_string()));
        session.set_progress(Progress::ResolveFailed);
        return;
    }

    session.clear_error();
    session.set_data(
        sources
            .into_iter()
            .map(|path| DataSource::File { path })
            .collect(),
    );
    session.set_progress(Progress::ResolveSuccess);
}

async fn analyse(session: &Session, script: &Script) {
    tokio::time::sleep(script.step_delay).await;

    if script.fails(Stage::Analyse) {
        session.set_error(InstallError::Analyse("unreadable package".to_string()));
        session.set_progress(Progress::AnalyseFailed);
        return;
    }

    let candidates = session
        .data()
        .into_iter()
        .enumerate()
        .map(|(index, source)| {
            let stem = source
                .display_name()
                .trim_end_matches(".apk")
                .replace(|c: char| !c.is_ascii_alphanumeric(), "_");
            InstallCandidate {
                package_name: format!("local.{}", stem.to_lowercase()),
                label: Some(stem),
                version_name: Some("1.0".to_string()),
                version_code: index as u64 + 1,
                source,
                selected: true,
            }
        })
        .collect();

    session.clear_error();
    session.set_entities(candidates);
    session.set_progress(Progress::AnalyseSuccess);
}

async fn install(session: &Session, script: &Script) {
    let selected: Vec<_> = session
        .entities()
        .into_iter()
        .filter(|candidate| candidate.selected)
        .collect();

    for candidate in &selected {
        tokio::time::sleep(script.step_delay).await;
        if script.fails(Stage::Install) {
            session.set_error(InstallError::Install(format!(
                "{}: INSTALL_FAILED_INTERNAL_ERROR",
                candidate.package_name
            )));
            session.set_progress(Progress::InstallFailed);
            return;
        }
        session
            .post_event(InstallerEvent::Notice {
                message: format!("Installed {}", candidate.package_name),
            })
            .await;
    }

    session.clear_error();
    session.set_progress(Progress::InstallSuccess);
}
