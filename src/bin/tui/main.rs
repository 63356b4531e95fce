mod app;

use std::io;
use std::time::{Duration, Instant};

use app::{
    format_change, format_compact, format_latency, format_price, format_time, truncate,
    AppState, ConnectionStatus,
};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url.trim_end_matches('/').to_string());
    app.refresh(&client).await;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut board_state = TableState::default();

    let result = run_loop(&mut terminal, &mut app, &client, &mut board_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    board_state: &mut TableState,
) -> io::Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| render(f, app, board_state))?;

        let timeout = REFRESH_INTERVAL
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = Instant::now();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.board.rows.len().saturating_sub(1);
                            let next = board_state.selected().map_or(0, |i| (i + 1).min(max));
                            board_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = board_state.selected().map_or(0, |i| i.saturating_sub(1));
                            board_state.select(Some(prev));
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= REFRESH_INTERVAL {
            app.refresh(client).await;
            last_tick = Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, board_state: &mut TableState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_body(f, app, board_state, chunks[1]);
    render_footer(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => (format!("● {}", app.board.status), board_color(&app.board.status)),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let mut spans = vec![
        Span::styled(
            " Apex Scanner  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
    ];

    match &app.board.reference {
        Some(r) => {
            let color = headline_color(r.change_pct);
            spans.push(Span::styled(
                format!("{} {:.2} {}", r.symbol, r.last_price, format_change(r.change_pct)),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ));
        }
        None => spans.push(Span::styled("reference n/a", Style::default().fg(Color::DarkGray))),
    }

    spans.push(Span::raw("  │  "));
    spans.push(Span::styled(
        format!("regime {}", app.board.regime.as_deref().unwrap_or("—")),
        Style::default().fg(Color::White),
    ));
    spans.push(Span::raw("  │  "));
    spans.push(Span::styled(
        format!("{} parsed / {} received", app.board.parsed, app.board.received),
        Style::default().fg(Color::White),
    ));
    if let Some(t) = &app.board.refreshed_at {
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled(format_time(t), Style::default().fg(Color::DarkGray)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, board_state: &mut TableState, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    render_board_table(f, app, board_state, halves[0]);
    render_alerts_table(f, app, halves[1]);
}

fn render_board_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["#", "Symbol", "Price", "24h", "Size", "Lag", "Score", "Grade", "Dir"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .board
        .rows
        .iter()
        .map(|r| {
            let change_color = if r.change_pct >= 0.0 { Color::Green } else { Color::Red };
            Row::new(vec![
                Cell::from(r.rank.to_string()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&r.symbol, 14)),
                Cell::from(format_price(r.last_price)),
                Cell::from(format_change(r.change_pct)).style(Style::default().fg(change_color)),
                Cell::from(format_compact(r.size)),
                Cell::from(format_compact(r.lag_ratio)).style(Style::default().fg(Color::Cyan)),
                Cell::from(format!("{:.1}", r.score)),
                Cell::from(r.grade.clone()).style(
                    Style::default().fg(grade_color(&r.grade)).add_modifier(Modifier::BOLD),
                ),
                Cell::from(r.direction.as_deref().map_or("—", short_direction))
                    .style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let title = match &app.board.last_error {
        Some(e) if app.board.status == "stale" || app.board.status == "no_data" => {
            format!(" LEADERBOARD ({}) ", truncate(e, 50))
        }
        _ => " LEADERBOARD ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Length(5),
            Constraint::Length(5),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                title,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(table, area, state);
}

fn render_alerts_table(f: &mut Frame, app: &AppState, area: Rect) {
    let header_cells = ["Sent", "Key"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .alerts
        .entries
        .iter()
        .map(|e| {
            Row::new(vec![
                Cell::from(format_time(&e.last_sent_at)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&e.key, 16)),
            ])
        })
        .collect();

    let title = if app.alerts.enabled {
        format!(" ALERTS (cooldown {}) ", app.alerts.cooldown)
    } else {
        " ALERTS (off) ".to_string()
    };

    let table = Table::new(rows, [Constraint::Length(8), Constraint::Min(8)])
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(Span::styled(
                    title,
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        );

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll  "),
        Span::styled(
            format!(
                "fetch p50 {} p99 {}  │  sent {} failed {}  │  auto-refresh: 2s",
                format_latency(app.latency.p50_ms),
                format_latency(app.latency.p99_ms),
                app.health.alerts_sent_total,
                app.health.alerts_failed_total,
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    f.render_widget(Paragraph::new(line).style(Style::default().fg(Color::White)), area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Green only on a strictly positive move; flat reads as red.
fn headline_color(change_pct: f64) -> Color {
    if change_pct > 0.0 {
        Color::Green
    } else {
        Color::Red
    }
}

fn grade_color(grade: &str) -> Color {
    match grade {
        "A+" => Color::Green,
        "A" => Color::LightGreen,
        "B" => Color::Yellow,
        _ => Color::DarkGray,
    }
}

fn board_color(status: &str) -> Color {
    match status {
        "live" => Color::Green,
        "stale" => Color::Yellow,
        "no_data" => Color::Red,
        _ => Color::White,
    }
}

fn short_direction(d: &str) -> &'static str {
    match d {
        "LONG" => "L",
        "SHORT" => "S",
        "MISALIGNED" => "mis",
        _ => "—",
    }
}
