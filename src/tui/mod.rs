use crate::cli::{build_config, Cli};
use crate::model::{Mode, OperationState, ProgressView, SessionEvent, Stats};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::collections::BTreeMap;
use std::{
    io,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

struct UiState {
    mode: Mode,
    op: OperationState,
    stats: Option<Stats>,
    progress: ProgressView,
    logs: Vec<String>,
    categories: BTreeMap<String, u64>,
    telemetry_lost: bool,
    info: String,
    path: String,
}

impl UiState {
    fn new(path: String) -> Self {
        Self {
            mode: Mode::Unknown,
            op: OperationState::Idle,
            stats: None,
            progress: ProgressView::default(),
            logs: Vec::new(),
            categories: BTreeMap::new(),
            telemetry_lost: false,
            info: String::new(),
            path,
        }
    }
}

fn apply_event(state: &mut UiState, ev: SessionEvent) {
    match ev {
        SessionEvent::ModeResolved(mode) => {
            state.mode = mode;
            if mode == Mode::Unavailable {
                state.info = "Worker unreachable: showcase only, commands disabled".into();
            }
        }
        SessionEvent::StateChanged(op) => {
            if matches!(op, OperationState::Scanning | OperationState::Cleaning) {
                // State entry already reset the core buffers; mirror it here.
                state.logs.clear();
                state.progress = ProgressView::default();
            }
            state.op = op;
        }
        SessionEvent::StatsUpdated(stats) => state.stats = stats,
        SessionEvent::ScanCompleted(outcome) => state.categories = outcome.categories,
        SessionEvent::Log(line) => state.logs.push(line),
        SessionEvent::Progress(view) => state.progress = view,
        SessionEvent::OperationFailed { op, message } => {
            state.info = format!("{op:?} failed: {message}");
        }
        SessionEvent::TelemetryLost => {
            state.telemetry_lost = true;
            state.info = "Telemetry lost: progress frozen until results arrive".into();
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the UI thread and the
    // controller task.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let cfg = build_config(&args);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the
    // Tokio runtime.
    let ui_path = cfg.path.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_path, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&cfg, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    path: String,
    mut event_rx: UnboundedReceiver<SessionEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::new(path);

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive. A
        // disconnected channel means the controller already returned, so
        // there is nothing left to render or command.
        if !drain_events(&mut event_rx, &mut state) {
            break Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('s')) => {
                        if can_start(&state) {
                            state.info = "Scan requested".into();
                            let _ = cmd_tx.send(UiCommand::Scan);
                        }
                    }
                    (_, KeyCode::Char('c')) => {
                        if can_start(&state) && state.stats.is_some() {
                            state.info = "Clean requested".into();
                            let _ = cmd_tx.send(UiCommand::Clean);
                        } else if can_start(&state) {
                            state.info = "Run a scan before cleaning".into();
                        }
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

/// Apply every buffered event. Returns false once the sender side is gone;
/// buffered events are still applied first.
fn drain_events(event_rx: &mut UnboundedReceiver<SessionEvent>, state: &mut UiState) -> bool {
    loop {
        match event_rx.try_recv() {
            Ok(ev) => apply_event(state, ev),
            Err(mpsc::error::TryRecvError::Empty) => return true,
            Err(mpsc::error::TryRecvError::Disconnected) => return false,
        }
    }
}

/// Commands are disabled while an operation runs or the worker is unreachable.
/// The guard mirrors the session's own transition checks; the controller
/// re-validates every command.
fn can_start(state: &UiState) -> bool {
    state.mode == Mode::Available && state.op == OperationState::Idle
}

fn draw(area: Rect, f: &mut Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(area);

    draw_header(rows[0], f, state);
    draw_stats(rows[1], f, state);
    draw_progress(rows[2], f, state);
    draw_logs(rows[3], f, state);
    draw_footer(rows[4], f, state);
}

fn mode_span(mode: Mode) -> Span<'static> {
    match mode {
        Mode::Unknown => Span::styled("probing", Style::default().fg(Color::Gray)),
        Mode::Unavailable => Span::styled("showcase (no worker)", Style::default().fg(Color::Yellow)),
        Mode::Available => Span::styled("connected", Style::default().fg(Color::Green)),
    }
}

fn draw_header(area: Rect, f: &mut Frame, state: &UiState) {
    let line = Line::from(vec![
        Span::styled("SmartClean", Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        mode_span(state.mode),
        Span::raw("  path: "),
        Span::raw(state.path.clone()),
    ]);
    let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_stats(area: Rect, f: &mut Frame, state: &UiState) {
    let mut lines = Vec::new();
    match &state.stats {
        Some(s) => {
            lines.push(Line::from(format!("Total files:        {}", s.total_files)));
            lines.push(Line::from(format!("Space (MB):         {:.2}", s.space_saved_mb)));
            lines.push(Line::from(format!(
                "Duplicates removed: {}",
                s.duplicates_removed
            )));
        }
        None => lines.push(Line::from(Span::styled(
            "No scan yet",
            Style::default().fg(Color::Gray),
        ))),
    }
    if !state.categories.is_empty() {
        let cats: Vec<String> = state
            .categories
            .iter()
            .take(4)
            .map(|(name, count)| format!("{name} {count}"))
            .collect();
        lines.push(Line::from(format!("Categories: {}", cats.join(", "))));
    }
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Stats"));
    f.render_widget(p, area);
}

fn draw_progress(area: Rect, f: &mut Frame, state: &UiState) {
    let title = match state.op {
        OperationState::Idle => "Progress",
        OperationState::Scanning => "Scanning",
        OperationState::Cleaning => "Cleaning",
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    match state.op {
        OperationState::Scanning => {
            let p = Paragraph::new(vec![Line::from(format!(
                "Discovered {} files  {}",
                state.progress.scan_count, state.progress.current_file
            ))])
            .block(block);
            f.render_widget(p, area);
        }
        _ => {
            let label = if state.progress.current_file.is_empty() {
                format!("{:.0}%", state.progress.percent)
            } else {
                format!("{:.0}% {}", state.progress.percent, state.progress.current_file)
            };
            let gauge = Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(Color::Cyan))
                .ratio((state.progress.percent / 100.0).clamp(0.0, 1.0))
                .label(label);
            f.render_widget(gauge, area);
        }
    }
}

fn draw_logs(area: Rect, f: &mut Frame, state: &UiState) {
    let visible = (area.height as usize).saturating_sub(2).max(1);
    let start = state.logs.len().saturating_sub(visible);
    let lines: Vec<Line> = state.logs[start..]
        .iter()
        .map(|l| Line::from(l.clone()))
        .collect();
    let mut block = Block::default().borders(Borders::ALL).title("Activity");
    if state.telemetry_lost {
        block = block.title_style(Style::default().fg(Color::Yellow));
    }
    let p = Paragraph::new(lines).block(block);
    f.render_widget(p, area);
}

fn draw_footer(area: Rect, f: &mut Frame, state: &UiState) {
    let help = if state.mode == Mode::Available {
        "[s] scan  [c] clean  [q] quit"
    } else {
        "[q] quit"
    };
    let line = if state.info.is_empty() {
        Line::from(help)
    } else {
        Line::from(vec![
            Span::raw(help),
            Span::raw("  "),
            Span::styled(state.info.clone(), Style::default().fg(Color::Yellow)),
        ])
    };
    let p = Paragraph::new(line)
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_keeps_running_while_sender_lives() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState::new("/tmp/x".into());
        tx.send(SessionEvent::ModeResolved(Mode::Available)).unwrap();
        assert!(drain_events(&mut rx, &mut state));
        assert_eq!(state.mode, Mode::Available);
    }

    #[test]
    fn drain_signals_shutdown_after_controller_drops() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState::new("/tmp/x".into());
        tx.send(SessionEvent::ModeResolved(Mode::Unavailable)).unwrap();
        drop(tx);
        // The buffered event still lands before the disconnect is reported.
        assert!(!drain_events(&mut rx, &mut state));
        assert_eq!(state.mode, Mode::Unavailable);
    }
}
