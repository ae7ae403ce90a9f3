//! Kiosk TUI - terminal front end for the check-in kiosk
//!
//! Runs the kiosk in-process and renders its view:
//! - waiting screen with scanner status and the invalid-code hint
//! - guest pass (grouped identifier and QR payload)
//! - capture error notice and device picker
//!
//! Logs go to `kiosk-tui.log` so they do not tear the screen.

use checkin_kiosk::domain::ScannerStatus;
use checkin_kiosk::infra::{Config, Metrics, StateStore};
use checkin_kiosk::io::{create_analytics_channel, AnalyticsPublisher, SerialScannerHost};
use checkin_kiosk::services::{Kiosk, KioskCommand, KioskView, SessionKind};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame, Terminal,
};
use std::fs::File;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "kiosk-tui.log";

/// Screen-local state that is not part of the kiosk view
#[derive(Debug, Default)]
struct UiState {
    /// Staff typing a code by hand
    entry: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = File::create(LOG_FILE)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = Config::load(&args);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    let analytics = if config.analytics_enabled() {
        let (sender, rx) = create_analytics_channel(
            config.analytics_buffer_size(),
            config.site_id().to_string(),
            metrics.clone(),
        );
        let publisher = AnalyticsPublisher::new(&config, rx);
        let publisher_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            publisher.run(publisher_shutdown).await;
        });
        Some(sender)
    } else {
        None
    };

    let host = Arc::new(SerialScannerHost::new(&config));
    let kiosk = Kiosk::new(&config, host, StateStore::file(config.store_path()), analytics, metrics);
    let view_rx = kiosk.subscribe();
    let (command_tx, command_rx) = mpsc::channel(32);
    let kiosk_handle = tokio::spawn(kiosk.run(command_rx, shutdown_rx));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_ui(&mut terminal, view_rx, command_tx).await;

    let _ = shutdown_tx.send(true);
    let _ = kiosk_handle.await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    view_rx: watch::Receiver<KioskView>,
    command_tx: mpsc::Sender<KioskCommand>,
) -> Result<(), Box<dyn std::error::Error>> {
    let tick_rate = Duration::from_millis(100);
    let mut ui = UiState::default();

    loop {
        let view = view_rx.borrow().clone();
        terminal.draw(|f| draw_ui(f, &view, &ui))?;

        if !event::poll(tick_rate)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        // Manual entry captures every key until Enter or Esc
        if let Some(entry) = ui.entry.as_mut() {
            match key.code {
                KeyCode::Enter => {
                    let text = std::mem::take(entry);
                    ui.entry = None;
                    command_tx.send(KioskCommand::ManualEntry(text)).await?;
                }
                KeyCode::Esc => ui.entry = None,
                KeyCode::Backspace => {
                    entry.pop();
                }
                KeyCode::Char(c) => entry.push(c),
                _ => {}
            }
            continue;
        }

        let command = match key.code {
            KeyCode::Char('q') => return Ok(()),
            KeyCode::Char('m') if view.session != SessionKind::Success => {
                ui.entry = Some(String::new());
                None
            }
            KeyCode::Char('r') => Some(KioskCommand::Reset),
            KeyCode::Char('c') => Some(KioskCommand::CycleCamera),
            KeyCode::Char('d') => Some(KioskCommand::DismissNotice),
            KeyCode::Esc if view.picker_open => Some(KioskCommand::ClosePicker),
            KeyCode::Esc => return Ok(()),
            KeyCode::Char(c) if view.picker_open => c
                .to_digit(10)
                .and_then(|n| (n as usize).checked_sub(1))
                .and_then(|i| view.devices.get(i))
                .map(|d| KioskCommand::SelectDevice(d.device_id.clone())),
            _ => None,
        };

        if let Some(command) = command {
            command_tx.send(command).await?;
        }
    }
}

fn draw_ui(f: &mut Frame, view: &KioskView, ui: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Session
            Constraint::Length(3), // Key help
        ])
        .split(f.area());

    draw_header(f, chunks[0], view);
    match view.session {
        SessionKind::Success => draw_pass(f, chunks[1], view),
        _ => draw_scanner(f, chunks[1], view, ui),
    }
    draw_help(f, chunks[2], view);

    if let Some(notice) = &view.notice {
        let area = centered(f.area(), 60, 7);
        f.render_widget(Clear, area);
        let text = vec![
            Line::from(Span::styled(
                notice.message.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("[d] dismiss"),
        ];
        let popup = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" Camera error "));
        f.render_widget(popup, area);
    }

    if view.picker_open {
        let height = view.devices.len() as u16 + 4;
        let area = centered(f.area(), 60, height);
        f.render_widget(Clear, area);
        let items: Vec<ListItem> = if view.devices.is_empty() {
            vec![ListItem::new("No cameras found")]
        } else {
            view.devices
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    let current = view.current_device.as_ref() == Some(&d.device_id);
                    let style = if current {
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    ListItem::new(format!("[{}] {}", i + 1, d.label)).style(style)
                })
                .collect()
        };
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(" Choose camera (Esc closes) "));
        f.render_widget(list, area);
    }
}

fn draw_header(f: &mut Frame, area: Rect, view: &KioskView) {
    let (status_text, status_color) = match view.scanner_status {
        ScannerStatus::Loading => ("LOADING", Color::Yellow),
        ScannerStatus::Waiting => ("SCANNING", Color::Green),
        ScannerStatus::Error => ("ERROR", Color::Red),
    };
    let device = view
        .current_device
        .as_ref()
        .and_then(|id| view.devices.iter().find(|d| &d.device_id == id))
        .map(|d| d.label.as_str())
        .unwrap_or("none");

    let header = Paragraph::new(Line::from(vec![
        Span::styled("Check-in ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("| Scanner: "),
        Span::styled(status_text, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::raw(format!(" | Camera: {}", device)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_scanner(f: &mut Frame, area: Rect, view: &KioskView, ui: &UiState) {
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Scan your guest QR code",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    if view.session == SessionKind::Error {
        lines.push(Line::from(Span::styled(
            "The camera is not available right now",
            Style::default().fg(Color::Red),
        )));
    }
    if view.invalid {
        lines.push(Line::from(Span::styled(
            "That code is not a guest ID. Please try again.",
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(entry) = &ui.entry {
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Code: {}_", entry)));
    }

    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Welcome "));
    f.render_widget(body, area);
}

fn draw_pass(f: &mut Frame, area: Rect, view: &KioskView) {
    let Some(pass) = &view.pass else {
        return;
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "You're checked in",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            pass.display.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("QR {} (level {})", pass.qr.data, pass.qr.ec_level.as_str())),
    ];
    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Guest pass "));
    f.render_widget(body, area);
}

fn draw_help(f: &mut Frame, area: Rect, view: &KioskView) {
    let help = match view.session {
        SessionKind::Success => "[r] start over  [q] quit",
        _ => "[c] switch camera  [m] type code  [q] quit",
    };
    let para = Paragraph::new(help).block(Block::default().borders(Borders::ALL));
    f.render_widget(para, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
