//! TUI rendering functions

use super::app::{InputMode, TuiApp};
use mcpany_common::{Event, EventStatus};
use mcpany_inspector::pipeline::DetailView;
use mcpany_inspector::transport::ConnectionStatus;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState, Wrap,
    },
    Frame,
};
use serde_json::Value;

/// Draw the TUI
pub fn draw(frame: &mut Frame, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Connection + feed info
            Constraint::Length(1), // Metrics row
            Constraint::Min(5),    // Event list (+ detail)
            Constraint::Length(1), // Footer / search box
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    draw_metrics_row(frame, app, chunks[1]);

    if app.show_detail {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[2]);
        draw_events(frame, app, body[0]);
        draw_detail(frame, app, body[1]);
    } else {
        draw_events(frame, app, chunks[2]);
    }

    draw_footer(frame, app, chunks[3]);
}

fn draw_header(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let status_color = match app.status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => Color::Yellow,
        ConnectionStatus::Suspended => Color::DarkGray,
        ConnectionStatus::Disconnected => Color::Red,
    };

    let mut status_line = vec![
        Span::styled("Status  ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            app.status.as_str(),
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
    ];
    if app.paused {
        status_line.push(Span::raw("  "));
        status_line.push(Span::styled(
            " PAUSED ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    status_line.push(Span::styled(
        format!("  via {}  v{}", app.info.transport, app.info.version),
        Style::default().fg(Color::DarkGray),
    ));

    let max_url_len = (area.width as usize).saturating_sub(30);
    let lines = vec![
        Line::from(status_line),
        Line::from(vec![
            Span::styled("Feed    ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                truncate_str(&app.info.endpoint, max_url_len),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled("  Buffer ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{}/{}", app.buffered, app.info.capacity),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

/// Draw the metrics row (compact, single line)
fn draw_metrics_row(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let m = &app.metrics;

    let text = Line::from(vec![
        Span::styled("Events ", Style::default().fg(Color::DarkGray)),
        Span::styled(format!("{} ", m.ingested), Style::default().fg(Color::White)),
        Span::styled(format!("{}✗ ", m.errors), Style::default().fg(Color::Red)),
        Span::styled("│ ", Style::default().fg(Color::DarkGray)),
        Span::styled("Rate ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{:.1}/m ", m.events_per_minute_1m),
            Style::default().fg(Color::White),
        ),
        Span::styled("│ ", Style::default().fg(Color::DarkGray)),
        Span::styled("p50:", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{} ", format_duration_short(Some(m.p50_duration_ms))),
            Style::default().fg(Color::White),
        ),
        Span::styled("p90:", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{} ", format_duration_short(Some(m.p90_duration_ms))),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled("│ ", Style::default().fg(Color::DarkGray)),
        Span::styled("Dropped ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{}", m.malformed + m.dropped_paused),
            Style::default().fg(Color::White),
        ),
    ]);

    frame.render_widget(Paragraph::new(text), area);
}

/// Draw the filtered event list with scrolling and scrollbar
fn draw_events(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let header = Row::new(vec!["Time", "Dir", "Target", "Status", "Duration"])
        .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .bottom_margin(0);

    let rows: Vec<Row> = app
        .events
        .iter()
        .map(|event| {
            let direction = event.direction.map(|d| d.as_str()).unwrap_or("");
            let mut target = event.target();
            if event.is_summary {
                target.push_str(" …");
            }

            Row::new(vec![
                Cell::from(format_timestamp(event)),
                Cell::from(truncate_str(direction, 3)).style(Style::default().fg(Color::Magenta)),
                Cell::from(target),
                Cell::from(event.status().as_str()).style(status_style(event.status())),
                Cell::from(format_duration_short(event.duration_ms)),
            ])
        })
        .collect();

    let title = if app.search_input.is_empty() {
        format!(" Events ({}) ", app.events.len())
    } else {
        format!(" Events ({}) matching \"{}\" ", app.events.len(), app.search_input)
    };

    // Split area to leave room for scrollbar
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    let table = Table::new(
        rows,
        [
            Constraint::Length(9),
            Constraint::Length(4),
            Constraint::Min(10),
            Constraint::Length(7),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    )
    .row_highlight_style(Style::default().bg(Color::Rgb(40, 40, 60)));

    let mut state = TableState::default();
    if !app.events.is_empty() {
        state.select(Some(app.selected_index));
    }

    frame.render_stateful_widget(table, chunks[0], &mut state);

    if !app.events.is_empty() {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");

        let mut scrollbar_state =
            ScrollbarState::new(app.events.len()).position(app.selected_index);

        frame.render_stateful_widget(scrollbar, chunks[1], &mut scrollbar_state);
    }
}

/// Draw the detail pane for the selected event
fn draw_detail(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);

    let lines: Vec<Line> = match &app.detail {
        DetailView::None => vec![Line::styled("Nothing selected", label)],
        DetailView::NotFound { id } => vec![
            Line::styled(
                "Not found",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Line::styled(format!("{} is no longer in the buffer", id), label),
        ],
        DetailView::Loading(event) => {
            let mut lines = summary_lines(event);
            lines.push(Line::from(""));
            lines.push(Line::styled(
                "Loading full detail...",
                Style::default().fg(Color::Yellow),
            ));
            lines
        }
        DetailView::Failed { event, error } => {
            let mut lines = summary_lines(event);
            lines.push(Line::from(""));
            lines.push(Line::styled(
                format!("Failed to load detail: {}", error),
                Style::default().fg(Color::Red),
            ));
            lines
        }
        DetailView::Ready(event) => {
            let mut lines = summary_lines(event);
            lines.extend(payload_lines("Request", event.request.as_ref()));
            lines.extend(payload_lines("Result", event.result.as_ref()));
            lines
        }
    };

    let block = Block::default()
        .title(" Detail ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn summary_lines(event: &Event) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("ID        ", label),
            Span::styled(event.id.clone(), value),
        ]),
        Line::from(vec![
            Span::styled("Target    ", label),
            Span::styled(event.target(), value.add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::styled("Time      ", label),
            Span::styled(event.timestamp.to_rfc3339(), value),
        ]),
        Line::from(vec![
            Span::styled("Status    ", label),
            Span::styled(event.status().as_str(), status_style(event.status())),
        ]),
        Line::from(vec![
            Span::styled("Duration  ", label),
            Span::styled(format_duration_short(event.duration_ms), value),
        ]),
    ];
    if let Some(status) = event.http_status {
        lines.push(Line::from(vec![
            Span::styled("HTTP      ", label),
            Span::styled(status.to_string(), value),
        ]));
    }
    if let Some(error) = &event.error {
        lines.push(Line::from(vec![
            Span::styled("Error     ", label),
            Span::styled(error.clone(), Style::default().fg(Color::Red)),
        ]));
    }
    lines
}

fn payload_lines(title: &str, payload: Option<&Value>) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(""),
        Line::styled(
            title.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
    ];
    match payload {
        Some(value) => {
            let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            lines.extend(text.lines().map(|l| Line::raw(l.to_string())));
        }
        None => lines.push(Line::styled("(none)", Style::default().fg(Color::DarkGray))),
    }
    lines
}

/// Draw the footer with key hints, or the search box while searching
fn draw_footer(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let key = Style::default().fg(Color::Cyan);
    let hint = Style::default().fg(Color::DarkGray);

    let text = match app.input_mode {
        InputMode::Search => Line::from(vec![
            Span::styled("/", key),
            Span::styled(app.search_input.clone(), Style::default().fg(Color::White)),
            Span::styled("█", hint),
            Span::styled("  Enter", key),
            Span::styled(" Done  ", hint),
            Span::styled("Esc", key),
            Span::styled(" Clear", hint),
        ]),
        InputMode::Normal => Line::from(vec![
            Span::styled("/", key),
            Span::styled(" Search  ", hint),
            Span::styled("p", key),
            Span::styled(if app.paused { " Resume  " } else { " Pause  " }, hint),
            Span::styled("c", key),
            Span::styled(" Clear  ", hint),
            Span::styled("r", key),
            Span::styled(" Refresh  ", hint),
            Span::styled("Enter", key),
            Span::styled(" Detail  ", hint),
            Span::styled("Esc", key),
            Span::styled(" Close  ", hint),
            Span::styled("q", key),
            Span::styled(" Quit", hint),
        ]),
    };

    frame.render_widget(Paragraph::new(text), area);
}

fn status_style(status: EventStatus) -> Style {
    match status {
        EventStatus::Success => Style::default().fg(Color::Green),
        EventStatus::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

/// Format timestamp for display
fn format_timestamp(event: &Event) -> String {
    event.timestamp.format("%H:%M:%S").to_string()
}

/// Format duration in ms (short version for tables)
fn format_duration_short(ms: Option<f64>) -> String {
    match ms {
        None => "-".to_string(),
        Some(ms) if ms >= 1000.0 => format!("{:.1}s", ms / 1000.0),
        Some(ms) if ms >= 10.0 => format!("{:.0}ms", ms),
        Some(ms) => format!("{:.1}ms", ms),
    }
}

/// Truncate any string to max length (in characters)
fn truncate_str(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len > max_len && max_len > 3 {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    } else if len > max_len {
        s.chars().take(max_len).collect()
    } else {
        s.to_string()
    }
}
