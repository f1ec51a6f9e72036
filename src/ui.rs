use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget, Wrap},
};
use time_humanize::{Accuracy, HumanTime, Tense};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::{App, LabelTarget, Screen},
    clock::{Clock, Timestamp},
    format::{format_duration, format_signed},
    registry::Timer,
    session::{Lap, Session},
};

const HORIZONTAL_MARGIN: u16 = 1;
const MAX_LABEL_WIDTH: usize = 24;

impl<C: Clock> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(1), // title
                Constraint::Min(3),    // body
                Constraint::Length(1), // status / label prompt
                Constraint::Length(1), // legend
            ])
            .split(area);

        let title = Paragraph::new(Line::from(vec![
            Span::styled("chronos", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" · "),
            Span::styled(self.screen.to_string(), Style::default().fg(Color::Cyan)),
        ]));
        title.render(chunks[0], buf);

        match self.screen {
            Screen::Timers => render_timers(self, chunks[1], buf),
            Screen::History => render_history(self, chunks[1], buf),
        }

        render_status(self, chunks[2], buf);

        let legend = match self.screen {
            Screen::Timers => {
                "(space)start/stop (l)ap (L)abelled lap (r)eset (s)ave (S)ave as… (1-9/←→)timer (↑↓)lap (d)elete lap (h)istory (q)uit"
            }
            Screen::History => "(↑↓)move (enter/→)laps (←)sessions (d)elete (b)ack (q)uit",
        };
        Paragraph::new(Span::styled(
            legend,
            Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    }
}

fn render_status<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let line = if let Some(input) = &app.input {
        let prompt = match input.target {
            LabelTarget::Lap => "Lap label",
            LabelTarget::Session => "Session label",
        };
        Line::from(vec![
            Span::styled(
                format!("{prompt}: "),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw(input.buffer.as_str()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ])
    } else if let Some(status) = &app.status {
        Line::from(Span::styled(status.as_str(), Style::default().fg(Color::Gray)))
    } else {
        Line::default()
    };
    Paragraph::new(line).render(area, buf);
}

/// Grid of timer panes: one row up to two timers, two columns beyond that
fn timer_areas(area: Rect, count: usize) -> Vec<Rect> {
    let columns = if count <= 2 { count.max(1) } else { 2 };
    let rows = count.div_ceil(columns);

    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, rows as u32); rows])
        .split(area);

    row_areas
        .iter()
        .flat_map(|row| {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, columns as u32); columns])
                .split(*row)
                .to_vec()
        })
        .take(count)
        .collect()
}

fn render_timers<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let registry = app.registry();
    for (index, (timer, pane)) in registry
        .iter()
        .zip(timer_areas(area, registry.len()))
        .enumerate()
    {
        let selected = index == app.selected;
        let lap_cursor = if selected { app.selected_lap } else { None };
        render_timer(index, timer, selected, lap_cursor, pane, buf);
    }
}

fn render_timer(
    index: usize,
    timer: &Timer,
    selected: bool,
    lap_cursor: Option<usize>,
    area: Rect,
    buf: &mut Buffer,
) {
    let (state, state_color) = if timer.is_running() {
        ("▶ running", Color::Green)
    } else if timer.stopwatch().session_start().is_some() {
        ("❚❚ stopped", Color::Yellow)
    } else {
        ("idle", Color::DarkGray)
    };

    let border_style = if selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Line::from(vec![
            Span::raw(format!(" Timer {} ", index + 1)),
            Span::styled(format!("{state} "), Style::default().fg(state_color)),
        ]));
    let inner = block.inner(area);
    block.render(area, buf);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // elapsed
            Constraint::Length(1), // session start
            Constraint::Min(0),    // laps
        ])
        .split(inner);

    let elapsed = format_duration(timer.display_elapsed());
    Paragraph::new(Line::from(vec![
        Span::styled(
            elapsed.main_text,
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(".{}", elapsed.sub_text),
            Style::default().add_modifier(Modifier::DIM),
        ),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    if let Some(started) = timer.stopwatch().session_start() {
        Paragraph::new(Span::styled(
            format!("started {started}"),
            Style::default().add_modifier(Modifier::DIM),
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);
    }

    render_laps(timer.stopwatch().laps(), lap_cursor, chunks[2], buf);
}

fn render_laps(laps: &[Lap], cursor: Option<usize>, area: Rect, buf: &mut Buffer) {
    if laps.is_empty() || area.height == 0 {
        return;
    }

    let label_width = laps
        .iter()
        .map(|lap| lap.label.width())
        .max()
        .unwrap_or(0)
        .clamp(5, MAX_LABEL_WIDTH);

    // keep the cursor visible; otherwise show the most recent laps
    let visible = area.height.saturating_sub(1) as usize;
    let skip = match cursor {
        Some(i) if i >= visible => i + 1 - visible,
        Some(_) => 0,
        None => laps.len().saturating_sub(visible),
    };

    let rows: Vec<Row> = laps
        .iter()
        .enumerate()
        .skip(skip)
        .take(visible)
        .map(|(i, lap)| {
            let split_style = if lap.lap_time < 0 {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            let row = Row::new(vec![
                Cell::from(format!("{}", i + 1)),
                Cell::from(truncate(&lap.label, MAX_LABEL_WIDTH)),
                Cell::from(format_signed(lap.lap_time)).style(split_style),
                Cell::from(format_duration(lap.total_time).to_string()),
            ]);
            if cursor == Some(i) {
                row.style(Style::default().bg(Color::DarkGray))
            } else {
                row
            }
        })
        .collect();

    let header = Row::new(vec!["#", "Label", "Split", "Total"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(label_width as u16),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .render(area, buf);
}

fn render_history<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    if !app.has_archive() {
        Paragraph::new("History is unavailable: the session archive could not be opened.")
            .block(Block::default().borders(Borders::ALL).title("History"))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(area, buf);
        return;
    }

    if app.history.is_empty() {
        Paragraph::new("No saved sessions yet.\nPress (s) on a timer to save its run.")
            .block(Block::default().borders(Borders::ALL).title("History"))
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center)
            .render(area, buf);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let now = app.clock().now();
    let sessions_focused = app.history_lap_cursor.is_none();

    let visible = chunks[0].height.saturating_sub(3) as usize;
    let skip = (app.history_cursor + 1).saturating_sub(visible);
    let rows: Vec<Row> = app
        .history
        .iter()
        .enumerate()
        .skip(skip)
        .take(visible)
        .map(|(i, session)| {
            let row = Row::new(vec![
                Cell::from(ago(now, session.timestamp)),
                Cell::from(session_label(session)),
                Cell::from(format_duration(session.total_time).to_string()),
                Cell::from(session.laps.len().to_string()),
            ]);
            if i == app.history_cursor {
                let bg = if sessions_focused {
                    Color::DarkGray
                } else {
                    Color::Black
                };
                row.style(Style::default().bg(bg).add_modifier(Modifier::BOLD))
            } else {
                row
            }
        })
        .collect();

    let header = Row::new(vec!["Saved", "Label", "Total", "Laps"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Min(8),
            Constraint::Length(12),
            Constraint::Length(5),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Sessions ({})", app.history.len())),
    )
    .render(chunks[0], buf);

    if let Some(session) = app.history.get(app.history_cursor) {
        let block = Block::default().borders(Borders::ALL).title(format!(
            "{} → {}",
            session.start_time, session.end_time
        ));
        let inner = block.inner(chunks[1]);
        block.render(chunks[1], buf);
        if session.laps.is_empty() {
            Paragraph::new("no laps")
                .style(Style::default().fg(Color::Gray))
                .alignment(Alignment::Center)
                .render(inner, buf);
        } else {
            render_laps(&session.laps, app.history_lap_cursor, inner, buf);
        }
    }
}

fn session_label(session: &Session) -> String {
    if session.label.is_empty() {
        "—".to_string()
    } else {
        truncate(&session.label, MAX_LABEL_WIDTH)
    }
}

fn ago(now: Timestamp, then: Timestamp) -> String {
    let secs = ((now - then) / 1000).max(0) as u64;
    HumanTime::from(std::time::Duration::from_secs(secs)).to_text_en(Accuracy::Rough, Tense::Past)
}

/// Cut `text` to at most `max` display columns
fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        if out.width() + c.to_string().width() + 1 > max {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}
