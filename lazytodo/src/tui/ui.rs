//! Frame rendering for the lazytodo TUI.
//!
//! ```text
//! render() --> list (title: file path, watch mode, counts)
//!          --> footer: prompt | status | key hints
//!          --> help overlay when Mode::Help
//! ```

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::todo::Todo;
use crate::tui::app::{App, StatusKind, Theme};
use crate::tui::input::Mode;

/// Key bindings shown in the help overlay and in `--help`.
pub const KEY_BINDINGS: &[(&str, &str)] = &[
    ("j / ↓", "move down"),
    ("k / ↑", "move up"),
    ("g / G", "jump to top / bottom"),
    ("a", "add todo"),
    ("e", "edit todo text"),
    ("d", "delete todo"),
    ("x / space", "toggle completion"),
    ("1 / 2 / 3", "set priority A / B / C"),
    ("0", "clear priority"),
    ("/", "filter"),
    ("r", "reload from disk"),
    ("?", "toggle help"),
    ("q / Ctrl-C", "quit"),
    ("Enter / Esc", "submit / cancel input"),
];

const HINTS: &str = "a add · e edit · x toggle · d delete · / filter · ? help · q quit";

/// Renders the whole screen.
pub fn render(frame: &mut Frame, app: &App) {
    let [list_area, footer_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());

    render_list(frame, app, list_area);
    render_footer(frame, app, footer_area);

    if app.state.mode == Mode::Help {
        render_help(frame, &app.theme);
    }
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let visible = app.visible();

    let mut title = format!(" {} ", app.store().path().display());
    if let Some(mode) = app.watch_mode() {
        title.push_str(&format!("[{mode}] "));
    }
    let done = app.store().todos().iter().filter(|t| t.completed).count();
    title.push_str(&format!("{}/{} done ", done, app.store().len()));
    if !app.state.filter.is_empty() {
        title.push_str(&format!("filter: {} ", app.state.filter));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border)
        .title(Span::styled(title, theme.title));

    if visible.is_empty() {
        let message = if app.store().is_empty() {
            "No todos yet. Press 'a' to add one."
        } else {
            "No todos match the filter."
        };
        let empty = Paragraph::new(Span::styled(message, theme.text_muted)).block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = visible
        .iter()
        .map(|todo| ListItem::new(todo_line(todo, theme)))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(theme.selected)
        .highlight_symbol("> ");

    let mut list_state = ListState::default().with_selected(Some(app.state.selected));
    frame.render_stateful_widget(list, area, &mut list_state);
}

/// Styled line for one todo.
fn todo_line<'a>(todo: &'a Todo, theme: &Theme) -> Line<'a> {
    if todo.completed {
        return Line::from(Span::styled(todo.raw.as_str(), theme.completed));
    }

    let mut spans = Vec::new();
    if let Some(letter) = todo.priority {
        spans.push(Span::styled(format!("({letter}) "), theme.priority(letter)));
    }
    if let Some(date) = &todo.created_date {
        spans.push(Span::styled(format!("{date} "), theme.date));
    }
    for (i, word) in todo.text.split(' ').enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        let style = if word.len() > 1 && word.starts_with('+') {
            theme.project
        } else if word.len() > 1 && word.starts_with('@') {
            theme.context
        } else {
            Style::default()
        };
        spans.push(Span::styled(word, style));
    }
    Line::from(spans)
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let line = match app.state.mode {
        Mode::Adding => prompt_line("Add: ", &app.state.input, theme),
        Mode::Editing => prompt_line("Edit: ", &app.state.input, theme),
        Mode::Filtering => prompt_line("Filter: ", &app.state.input, theme),
        Mode::Normal | Mode::Help => match &app.state.status {
            Some(status) => {
                let style = match status.kind {
                    StatusKind::Info => theme.status_info,
                    StatusKind::Error => theme.status_error,
                };
                Line::from(Span::styled(status.text.as_str(), style))
            }
            None => Line::from(Span::styled(HINTS, theme.text_muted)),
        },
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn prompt_line<'a>(label: &'a str, input: &'a str, theme: &Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, theme.prompt),
        Span::raw(input),
        Span::styled("_", theme.text_muted),
    ])
}

fn render_help(frame: &mut Frame, theme: &Theme) {
    let lines: Vec<Line> = KEY_BINDINGS
        .iter()
        .map(|(keys, action)| {
            Line::from(vec![
                Span::styled(format!("{keys:<13}"), theme.prompt),
                Span::raw(*action),
            ])
        })
        .collect();

    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(2);
    let area = centered(frame.area(), 44, height);
    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border)
            .title(Span::styled(" Keys ", theme.title)),
    );

    frame.render_widget(Clear, area);
    frame.render_widget(help, area);
}

/// A `width` x `height` rectangle centered in `area`, clipped to fit.
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
