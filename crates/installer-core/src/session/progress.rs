//! Session progress and the lifecycle transition table.
//!
//! ```text
//! Ready ─Resolve→ Resolving → ResolveSuccess ─Analyse→ Analysing → AnalyseSuccess ─Install→ Installing → InstallSuccess
//!                    ↓                                    ↓                                     ↓
//!               ResolveFailed                        AnalyseFailed                         InstallFailed
//!
//! Finish is accepted from every state and is terminal.
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::action::{Action, ActionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Progress {
    #[default]
    Ready,
    Resolving,
    ResolveFailed,
    ResolveSuccess,
    Analysing,
    AnalyseFailed,
    AnalyseSuccess,
    Installing,
    InstallFailed,
    InstallSuccess,
    Finish,
}

impl Progress {
    /// A worker step is running.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Progress::Resolving | Progress::Analysing | Progress::Installing
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Progress::ResolveFailed | Progress::AnalyseFailed | Progress::InstallFailed
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Progress::Finish
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Progress::Ready => "ready",
            Progress::Resolving => "resolving",
            Progress::ResolveFailed => "resolveFailed",
            Progress::ResolveSuccess => "resolveSuccess",
            Progress::Analysing => "analysing",
            Progress::AnalyseFailed => "analyseFailed",
            Progress::AnalyseSuccess => "analyseSuccess",
            Progress::Installing => "installing",
            Progress::InstallFailed => "installFailed",
            Progress::InstallSuccess => "installSuccess",
            Progress::Finish => "finish",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Session already finished")]
    Finished,

    #[error("Session is busy ({0})")]
    Busy(Progress),

    #[error("Cannot {action} while {from}")]
    Invalid { from: Progress, action: ActionKind },
}

/// The progress a worker should publish when it starts handling `action`.
pub fn next_progress(current: Progress, action: &Action) -> Result<Progress, TransitionError> {
    let kind = action.kind();
    if kind == ActionKind::Finish {
        return Ok(Progress::Finish);
    }
    if current.is_terminal() {
        return Err(TransitionError::Finished);
    }
    if current.is_busy() {
        return Err(TransitionError::Busy(current));
    }

    match (kind, current) {
        (ActionKind::Resolve, _) => Ok(Progress::Resolving),
        (
            ActionKind::Analyse,
            Progress::ResolveSuccess | Progress::AnalyseFailed | Progress::AnalyseSuccess,
        ) => Ok(Progress::Analysing),
        (ActionKind::Install, Progress::AnalyseSuccess | Progress::InstallFailed) => {
            Ok(Progress::Installing)
        }
        _ => Err(TransitionError::Invalid {
            from: current,
            action: kind,
        }),
    }
}
