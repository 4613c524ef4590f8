//! Installer daemon - headless host for install sessions.
//!
//! Wires an [`InstallerContext`] to a channel launcher, runs a supervisor that
//! starts a scripted worker for every launch request, and drives one session
//! per source set given on the command line. Progress, events and the final
//! snapshot of each session are printed as JSON lines on stdout.

mod worker;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use installer_core::launcher::{ChannelLauncher, LaunchRequest};
use installer_core::session::{ActivityHandle, Progress, Session, SessionRegistry};
use installer_core::channels::MAX_EVENT_CAPACITY;
use installer_core::{paths, CoordinatorConfig, InstallerContext};
use serde_json::json;
use tokio::sync::mpsc;

use worker::{CliOrigin, Script, Stage};

/// Drive install sessions through resolve, analyse and install.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Package files to install in each session
    #[arg(value_name = "SOURCE", required = true)]
    sources: Vec<String>,

    /// Number of sessions to run in parallel over the same sources
    #[arg(short, long, default_value_t = 1)]
    sessions: usize,

    /// Directory for per-session transcripts (overrides INSTALLER_LOG_DIR)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write transcripts to ~/.installer/logs when no log dir is set
    #[arg(long)]
    transcripts: bool,

    /// Event backlog per subscriber (overrides INSTALLER_EVENT_CAPACITY)
    #[arg(long)]
    event_capacity: Option<usize>,

    /// Make the scripted worker fail at this stage
    #[arg(long, value_enum)]
    fail_at: Option<Stage>,

    /// Simulated duration of each worker step, in milliseconds
    #[arg(long, default_value_t = 200)]
    step_delay_ms: u64,
}

fn load_config(cli: &Cli) -> Result<CoordinatorConfig, Box<dyn Error>> {
    let mut config = CoordinatorConfig::from_env()?;
    if let Some(capacity) = cli.event_capacity {
        if !(1..=MAX_EVENT_CAPACITY).contains(&capacity) {
            return Err(format!(
                "--event-capacity must be between 1 and {}, got {}",
                MAX_EVENT_CAPACITY, capacity
            )
            .into());
        }
        config = config.event_capacity(capacity);
    }
    if let Some(dir) = cli.log_dir.clone() {
        config = config.log_dir(dir);
    } else if cli.transcripts && config.log_dir.is_none() {
        match paths::default_log_dir() {
            Some(dir) => config = config.log_dir(dir),
            None => log::warn!("Home directory not set, transcripts disabled"),
        }
    }
    Ok(config)
}

/// Start a worker for every launch request until the launcher is dropped.
async fn supervise(
    registry: Arc<SessionRegistry>,
    mut requests: mpsc::UnboundedReceiver<LaunchRequest>,
    script: Script,
) {
    while let Some(request) = requests.recv().await {
        match registry.get(&request.session_id) {
            Some(session) => {
                tokio::spawn(worker::run(session, script.clone()));
            }
            None => log::warn!(
                "Launch request for unknown session {}",
                request.session_id
            ),
        }
    }
    log::debug!("Supervisor stopped");
}

/// Print progress and events for `session` until it finishes.
fn observe(session: Arc<Session>) -> tokio::task::JoinHandle<()> {
    let mut progress = session.subscribe_progress();
    let mut events = session.subscribe_events();
    let id = session.id().clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                next = progress.next() => match next {
                    Some(p) => {
                        println!("{}", json!({"session": id, "progress": p}));
                        if p.is_terminal() {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = events.recv() => {
                    println!("{}", json!({"session": id, "event": event}));
                }
            }
        }
    })
}

/// Wait until the worker settles on a non-busy progress other than `from`.
async fn settle(session: &Session, from: Progress) -> Progress {
    let mut rx = session.subscribe_progress();
    while let Some(progress) = rx.next().await {
        if progress != from && !progress.is_busy() {
            return progress;
        }
    }
    session.progress()
}

/// Run one session through the whole lifecycle and remove it.
async fn drive(
    registry: Arc<SessionRegistry>,
    sources: Vec<String>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let session = registry.get_or_create(None)?;
    let observer = observe(Arc::clone(&session));

    session.resolve(ActivityHandle::new(CliOrigin { sources }));
    let mut progress = settle(&session, Progress::Ready).await;

    if progress == Progress::ResolveSuccess {
        session.analyse();
        progress = settle(&session, progress).await;
    }
    if progress == Progress::AnalyseSuccess {
        session.install();
        progress = settle(&session, progress).await;
    }

    if let Some(error) = session.error() {
        log::error!("Session {} failed: {}", session.id(), error);
    }

    session.close();
    if observer.await.is_err() {
        log::warn!("Observer for session {} panicked", session.id());
    }

    println!("{}", json!({"snapshot": session.snapshot()}));
    registry.remove(session.id());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    if let Some(ref dir) = config.log_dir {
        log::info!("Writing session transcripts to {}", dir.display());
    }

    let (launcher, requests) = ChannelLauncher::new();
    let ctx = InstallerContext::builder()
        .config(config)
        .launcher(Arc::new(launcher))
        .build();

    let script = Script {
        step_delay: Duration::from_millis(cli.step_delay_ms),
        fail_at: cli.fail_at,
    };
    tokio::spawn(supervise(Arc::clone(ctx.registry()), requests, script));

    let drivers: Vec<_> = (0..cli.sessions.max(1))
        .map(|_| tokio::spawn(drive(Arc::clone(ctx.registry()), cli.sources.clone())))
        .collect();

    let all_done = async {
        for driver in drivers {
            match driver.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("{}", e),
                Err(e) => log::error!("Session driver panicked: {}", e),
            }
        }
    };

    tokio::select! {
        _ = all_done => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, shutting down");
        }
    }

    ctx.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_event_capacity_flag_is_rejected() {
        let cli = Cli::parse_from(["installer-daemon", "--event-capacity", "1000000000", "a.apk"]);
        let message = load_config(&cli).unwrap_err().to_string();
        assert!(message.contains("--event-capacity"));
    }

    #[test]
    fn zero_event_capacity_flag_is_rejected() {
        let cli = Cli::parse_from(["installer-daemon", "--event-capacity", "0", "a.apk"]);
        assert!(load_config(&cli).is_err());
    }
}
