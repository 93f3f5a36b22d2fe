//! Session lifecycle controller.
//!
//! Probes the worker once, opens the telemetry channel when available, then
//! drives the state machine from UI commands and stream events, emitting
//! `SessionEvent`s for presentation layers.

use crate::model::{
    CleanOutcome, Mode, OperationState, ScanOutcome, SessionConfig, SessionEvent, WorkerError,
};
use crate::orchestrator::session::{OrchestrationState, CLEAN_COMPLETE_MARKER, CLEAN_START_MARKER};
use crate::worker::{self, ChannelEvent, OperationClient, TelemetryChannel, WorkerEndpoints};
use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to drive the session.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Scan,
    Clean,
    Quit,
}

/// Terminal result of the single in-flight operation.
enum OpResult {
    Scan(Result<ScanOutcome, WorkerError>),
    Clean(Result<CleanOutcome, WorkerError>),
}

type OpFuture = Pin<Box<dyn Future<Output = OpResult> + Send>>;

/// Orchestrate one session. Returns when the command channel closes or a quit
/// is observed; an in-flight operation is never cancelled, so quit waits for
/// its terminal result before breaking.
pub(crate) async fn run_controller(
    cfg: &SessionConfig,
    event_tx: UnboundedSender<SessionEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let endpoints = WorkerEndpoints::new(&cfg.base_url)?;
    let http = worker::build_http_client()?;
    let mut session = OrchestrationState::new();

    let mode = worker::check_health(&http, &endpoints, cfg.health_timeout).await;
    session.resolve_mode(mode);
    let _ = event_tx.send(SessionEvent::ModeResolved(mode));

    let (tel_tx, mut tel_rx) = tokio::sync::mpsc::unbounded_channel::<ChannelEvent>();
    let mut channel = TelemetryChannel::new();
    if mode == Mode::Available {
        if let Err(e) = channel.open(&endpoints.telemetry, tel_tx.clone()).await {
            // Telemetry is best-effort; operations still finalize through
            // their terminal responses.
            let _ = event_tx.send(SessionEvent::Log(format!("telemetry unavailable: {e:#}")));
            let _ = event_tx.send(SessionEvent::TelemetryLost);
        }
    }

    let ops = OperationClient::new(http, endpoints);
    // At most one operation in flight; the future lives here so a lost select
    // race doesn't drop its progress.
    let mut pending_op: Option<OpFuture> = None;
    let mut quit_pending = false;
    // Once the command channel closes it stays closed; stop polling it or the
    // select loop spins on `Ready(None)` for as long as an operation runs.
    let mut cmd_closed = false;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if !cmd_closed => {
                match cmd {
                    Some(UiCommand::Scan) => match session.begin_scan(&cfg.path) {
                        Ok(()) => {
                            let _ = event_tx.send(SessionEvent::StateChanged(OperationState::Scanning));
                            let _ = event_tx.send(SessionEvent::Progress(session.progress().clone()));
                            let client = ops.clone();
                            let path = cfg.path.clone();
                            pending_op = Some(Box::pin(async move {
                                OpResult::Scan(client.scan(&path).await)
                            }));
                        }
                        Err(denied) => {
                            let _ = event_tx.send(SessionEvent::Log(format!("scan not started: {denied}")));
                        }
                    },
                    Some(UiCommand::Clean) => match session.begin_clean(&cfg.path) {
                        Ok(()) => {
                            let _ = event_tx.send(SessionEvent::StateChanged(OperationState::Cleaning));
                            let _ = event_tx.send(SessionEvent::Progress(session.progress().clone()));
                            let _ = event_tx.send(SessionEvent::Log(CLEAN_START_MARKER.into()));
                            let client = ops.clone();
                            let path = cfg.path.clone();
                            let options = cfg.options;
                            pending_op = Some(Box::pin(async move {
                                OpResult::Clean(client.clean(&path, options).await)
                            }));
                        }
                        Err(denied) => {
                            let _ = event_tx.send(SessionEvent::Log(format!("clean not started: {denied}")));
                        }
                    },
                    Some(UiCommand::Quit) | None => {
                        if cmd.is_none() {
                            cmd_closed = true;
                        }
                        if pending_op.is_some() {
                            // Operations are not cancellable; finish observing
                            // the terminal result first.
                            quit_pending = true;
                        } else {
                            break;
                        }
                    }
                }
            }
            ev = tel_rx.recv() => {
                match ev {
                    Some(ChannelEvent::Event(event)) => {
                        if let Some(update) = session.ingest(event) {
                            let _ = event_tx.send(update);
                        }
                    }
                    Some(ChannelEvent::Closed) => {
                        channel.close();
                        let _ = event_tx.send(SessionEvent::TelemetryLost);
                    }
                    None => {}
                }
            }
            done = async {
                match pending_op.as_mut() {
                    Some(fut) => fut.as_mut().await,
                    None => futures::future::pending().await,
                }
            } => {
                pending_op = None;
                match done {
                    OpResult::Scan(res) => {
                        let outcome = res.as_ref().ok().cloned();
                        match session.complete_scan(res) {
                            Ok(()) => {
                                if let Some(outcome) = outcome {
                                    let _ = event_tx.send(SessionEvent::ScanCompleted(outcome));
                                }
                                let _ = event_tx.send(SessionEvent::StatsUpdated(session.stats().cloned()));
                            }
                            Err(message) => {
                                let _ = event_tx.send(SessionEvent::OperationFailed {
                                    op: OperationState::Scanning,
                                    message,
                                });
                            }
                        }
                    }
                    OpResult::Clean(res) => match session.complete_clean(res) {
                        Ok(()) => {
                            let _ = event_tx.send(SessionEvent::Progress(session.progress().clone()));
                            let _ = event_tx.send(SessionEvent::Log(CLEAN_COMPLETE_MARKER.into()));
                            let _ = event_tx.send(SessionEvent::StatsUpdated(session.stats().cloned()));
                        }
                        Err(message) => {
                            let _ = event_tx.send(SessionEvent::OperationFailed {
                                op: OperationState::Cleaning,
                                message,
                            });
                        }
                    },
                }
                let _ = event_tx.send(SessionEvent::StateChanged(OperationState::Idle));
                if quit_pending {
                    break;
                }
            }
        }
    }

    channel.close();
    Ok(())
}
