use crate::model::{
    CleanOptions, Mode, OperationState, ProgressView, ScanOutcome, SessionConfig, SessionEvent,
    SessionSnapshot, Stats,
};
use crate::orchestrator::{run_controller, UiCommand};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// A line routed to stdout (machine-readable results) or stderr (progress).
#[derive(Debug, PartialEq)]
enum ConsoleLine {
    Out(String),
    Err(String),
}

/// Console writing happens on a blocking thread so a slow pipe never stalls
/// the controller task.
fn spawn_console_writer() -> (
    mpsc::UnboundedSender<ConsoleLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ConsoleLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());
        while let Some(line) = rx.blocking_recv() {
            let _ = match line {
                ConsoleLine::Out(msg) => writeln!(out, "{msg}"),
                ConsoleLine::Err(msg) => writeln!(err, "{msg}"),
            };
        }
        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "smartclean",
    version,
    about = "SmartClean worker client with live cleaning progress"
)]
pub struct Cli {
    /// Base URL of the SmartClean worker
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub base_url: String,

    /// Folder to scan and clean
    #[arg(long, default_value = "")]
    pub path: String,

    /// Report what would be removed without touching the file system
    #[arg(long)]
    pub simulate: bool,

    /// Let the worker classify files with its AI categorizer
    #[arg(long)]
    pub ai_mode: bool,

    /// Remove directories left empty after cleaning
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub remove_empty: bool,

    /// Health probe timeout (capped at 1s)
    #[arg(long, default_value = "1s")]
    pub health_timeout: humantime::Duration,

    /// Run scan (and clean with --clean), stream progress to stderr, print a
    /// text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Like --text but quiet, printing the final session snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// In --text/--json mode, follow a successful scan with a clean
    #[arg(long)]
    pub clean: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_batch(args).await;
        }
    }

    run_batch(args).await
}

/// Build a `SessionConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> SessionConfig {
    SessionConfig {
        base_url: args.base_url.clone(),
        path: args.path.clone(),
        options: CleanOptions {
            simulate: args.simulate,
            ai_mode: args.ai_mode,
            remove_empty: args.remove_empty,
        },
        // The probe must answer fast or not at all.
        health_timeout: Duration::from(args.health_timeout).min(Duration::from_secs(1)),
    }
}

/// Event fold for the non-TUI runners. Pure: emits console lines and follow-up
/// commands into the caller's buffers instead of performing I/O.
struct BatchRunner {
    quiet: bool,
    clean_after_scan: bool,
    base_url: String,
    mode: Mode,
    current_op: OperationState,
    scan_ok: bool,
    stats: Option<Stats>,
    scan_outcome: Option<ScanOutcome>,
    progress: ProgressView,
    logs: Vec<String>,
    failure: Option<String>,
}

impl BatchRunner {
    fn new(quiet: bool, clean_after_scan: bool, base_url: String) -> Self {
        Self {
            quiet,
            clean_after_scan,
            base_url,
            mode: Mode::Unknown,
            current_op: OperationState::Idle,
            scan_ok: false,
            stats: None,
            scan_outcome: None,
            progress: ProgressView::default(),
            logs: Vec::new(),
            failure: None,
        }
    }

    fn apply(
        &mut self,
        ev: SessionEvent,
        lines: &mut Vec<ConsoleLine>,
        commands: &mut Vec<UiCommand>,
    ) {
        match ev {
            SessionEvent::ModeResolved(m) => {
                self.mode = m;
                if m == Mode::Available {
                    if !self.quiet {
                        lines.push(ConsoleLine::Err(format!(
                            "Worker available at {}",
                            self.base_url
                        )));
                    }
                } else {
                    self.failure = Some(format!("worker unavailable at {}", self.base_url));
                    commands.push(UiCommand::Quit);
                }
            }
            SessionEvent::StateChanged(op) => match op {
                OperationState::Scanning | OperationState::Cleaning => {
                    self.current_op = op;
                    if !self.quiet {
                        lines.push(ConsoleLine::Err(format!("== {op:?} ==")));
                    }
                }
                OperationState::Idle => {
                    let finished = self.current_op;
                    self.current_op = OperationState::Idle;
                    let run_clean = matches!(finished, OperationState::Scanning)
                        && self.scan_ok
                        && self.clean_after_scan
                        && self.failure.is_none();
                    commands.push(if run_clean {
                        UiCommand::Clean
                    } else {
                        UiCommand::Quit
                    });
                }
            },
            SessionEvent::StatsUpdated(s) => {
                if self.current_op == OperationState::Scanning {
                    self.scan_ok = true;
                }
                self.stats = s;
            }
            SessionEvent::ScanCompleted(outcome) => {
                self.scan_outcome = Some(outcome);
            }
            SessionEvent::Log(line) => {
                if !self.quiet {
                    lines.push(ConsoleLine::Err(line.clone()));
                }
                self.logs.push(line);
            }
            SessionEvent::Progress(view) => {
                if !self.quiet {
                    let line = match self.current_op {
                        OperationState::Scanning => {
                            format!("Scanned {} files: {}", view.scan_count, view.current_file)
                        }
                        _ => format!("{:>3.0}% {}", view.percent, view.current_file),
                    };
                    lines.push(ConsoleLine::Err(line));
                }
                self.progress = view;
            }
            SessionEvent::OperationFailed { op, message } => {
                let line = format!("{op:?} failed: {message}");
                // The failure always reaches the exit code; only the stderr
                // echo honors quiet mode.
                if !self.quiet {
                    lines.push(ConsoleLine::Err(line.clone()));
                }
                self.failure = Some(line);
            }
            SessionEvent::TelemetryLost => {
                if !self.quiet {
                    lines.push(ConsoleLine::Err(
                        "Telemetry connection lost; waiting for terminal results".into(),
                    ));
                }
            }
        }
    }
}

/// Non-TUI runner: issue scan (and optionally clean), fold session events into
/// printed lines, then summarize.
async fn run_batch(args: Cli) -> Result<()> {
    if args.path.trim().is_empty() {
        anyhow::bail!("--path is required in --text/--json mode");
    }

    let cfg = build_config(&args);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let controller = tokio::spawn({
        let cfg = cfg.clone();
        async move { run_controller(&cfg, event_tx, cmd_rx).await }
    });

    let (out_tx, out_handle) = spawn_console_writer();
    let _ = cmd_tx.send(UiCommand::Scan);

    let mut runner = BatchRunner::new(args.json, args.clean, cfg.base_url.clone());
    let mut lines = Vec::new();
    let mut commands = Vec::new();
    while let Some(ev) = event_rx.recv().await {
        runner.apply(ev, &mut lines, &mut commands);
        for line in lines.drain(..) {
            let _ = out_tx.send(line);
        }
        for cmd in commands.drain(..) {
            let _ = cmd_tx.send(cmd);
        }
    }

    controller
        .await
        .context("controller task failed")?
        .context("session controller failed")?;

    if args.json {
        let snapshot = SessionSnapshot {
            mode: runner.mode,
            state: OperationState::Idle,
            stats: runner.stats.clone(),
            progress: runner.progress.clone(),
            logs: runner.logs.clone(),
        };
        let _ = out_tx.send(ConsoleLine::Out(serde_json::to_string_pretty(&snapshot)?));
    } else {
        let summary = crate::text_summary::build_text_summary(
            runner.stats.as_ref(),
            runner.scan_outcome.as_ref(),
        );
        for line in summary.lines {
            let _ = out_tx.send(ConsoleLine::Out(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;

    match runner.failure {
        Some(msg) => Err(anyhow::anyhow!(msg)),
        None => Ok(()),
    }
}
