//! Application state for the lazytodo TUI.
//!
//! - [`AppState`]: mode, prompt input, filter, selection and status line
//! - [`App`]: the state plus the [`TodoStore`] it edits; applies
//!   [`Command`]s and change notifications
//! - [`Theme`]: styles, with a monochrome variant for `NO_COLOR`
//!
//! The app owns the store. Only the UI loop mutates it; the watcher only
//! tells the loop to call [`App::refresh`].
//!
//! IDs are positional and reassigned on every reload, so the selection is
//! tracked by index into the visible list and carried across reloads by the
//! selected entry's raw line.

use std::time::{Duration, Instant};

use crossterm::event::KeyEvent;
use ratatui::style::{Color, Modifier, Style};
use tracing::{debug, warn};

use crate::error::TodoError;
use crate::store::{ReloadOutcome, TodoStore};
use crate::todo::Todo;
use crate::tui::input::{map_key, Command, Mode};
use crate::watcher::{ChangeReason, WatchMode};

/// How long a status message stays visible.
const STATUS_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

/// One-line message shown under the list.
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
    shown_at: Instant,
}

/// Styles used by the renderer.
#[derive(Debug, Clone)]
pub struct Theme {
    pub border: Style,
    pub title: Style,
    pub selected: Style,
    pub completed: Style,
    pub priority_a: Style,
    pub priority_b: Style,
    pub priority_c: Style,
    pub priority_other: Style,
    pub project: Style,
    pub context: Style,
    pub date: Style,
    pub status_info: Style,
    pub status_error: Style,
    pub prompt: Style,
    pub text_muted: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border: Style::default().fg(Color::DarkGray),
            title: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            selected: Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
            completed: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT),
            priority_a: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            priority_b: Style::default().fg(Color::Yellow),
            priority_c: Style::default().fg(Color::Green),
            priority_other: Style::default().fg(Color::Blue),
            project: Style::default().fg(Color::Magenta),
            context: Style::default().fg(Color::Cyan),
            date: Style::default().fg(Color::DarkGray),
            status_info: Style::default().fg(Color::Green),
            status_error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            prompt: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            text_muted: Style::default().fg(Color::DarkGray),
        }
    }
}

impl Theme {
    /// Modifier-only theme for `NO_COLOR` terminals.
    #[must_use]
    pub fn monochrome() -> Self {
        Self {
            border: Style::default(),
            title: Style::default().add_modifier(Modifier::BOLD),
            selected: Style::default().add_modifier(Modifier::REVERSED),
            completed: Style::default().add_modifier(Modifier::DIM | Modifier::CROSSED_OUT),
            priority_a: Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            priority_b: Style::default().add_modifier(Modifier::BOLD),
            priority_c: Style::default().add_modifier(Modifier::ITALIC),
            priority_other: Style::default(),
            project: Style::default().add_modifier(Modifier::ITALIC),
            context: Style::default().add_modifier(Modifier::UNDERLINED),
            date: Style::default().add_modifier(Modifier::DIM),
            status_info: Style::default(),
            status_error: Style::default().add_modifier(Modifier::BOLD),
            prompt: Style::default().add_modifier(Modifier::BOLD),
            text_muted: Style::default().add_modifier(Modifier::DIM),
        }
    }

    /// Returns [`Theme::monochrome`] if `NO_COLOR` is set.
    #[must_use]
    pub fn from_env() -> Self {
        if std::env::var("NO_COLOR").is_ok() {
            Self::monochrome()
        } else {
            Self::default()
        }
    }

    /// Style for a priority letter.
    pub fn priority(&self, letter: char) -> Style {
        match letter {
            'A' => self.priority_a,
            'B' => self.priority_b,
            'C' => self.priority_c,
            _ => self.priority_other,
        }
    }
}

/// Presentation state independent of the todo data.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub mode: Mode,
    /// Text typed into the open prompt.
    pub input: String,
    /// Case-insensitive substring filter on the todo text.
    pub filter: String,
    /// Index into the visible (sorted, filtered) list.
    pub selected: usize,
    pub status: Option<StatusMessage>,
    /// Raw line of the entry open in the edit prompt.
    editing: Option<String>,
    should_quit: bool,
}

impl AppState {
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
            shown_at: Instant::now(),
        });
    }

    /// Drops the status message once it has been shown long enough.
    pub fn expire_status(&mut self, now: Instant) {
        if self
            .status
            .as_ref()
            .is_some_and(|s| now.duration_since(s.shown_at) >= STATUS_TTL)
        {
            self.status = None;
        }
    }

    fn open_prompt(&mut self, mode: Mode, input: String) {
        self.mode = mode;
        self.input = input;
    }

    fn close_prompt(&mut self) -> String {
        self.mode = Mode::Normal;
        self.editing = None;
        std::mem::take(&mut self.input)
    }

    fn clamp_selection(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

/// The TUI application: presentation state plus the store it edits.
#[derive(Debug)]
pub struct App {
    pub state: AppState,
    pub theme: Theme,
    store: TodoStore,
    watch_mode: Option<WatchMode>,
}

impl App {
    /// Creates the app around a loaded store.
    ///
    /// `watch_mode` is `None` when auto-refresh could not be started.
    pub fn new(store: TodoStore, watch_mode: Option<WatchMode>) -> Self {
        Self {
            state: AppState::default(),
            theme: Theme::from_env(),
            store,
            watch_mode,
        }
    }

    pub fn store(&self) -> &TodoStore {
        &self.store
    }

    pub fn watch_mode(&self) -> Option<WatchMode> {
        self.watch_mode
    }

    pub fn should_quit(&self) -> bool {
        self.state.should_quit()
    }

    /// Todos in display order, narrowed by the filter.
    pub fn visible(&self) -> Vec<&Todo> {
        let needle = self.state.filter.to_lowercase();
        self.store
            .list_todos()
            .into_iter()
            .filter(|t| needle.is_empty() || t.text.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn selected_todo(&self) -> Option<&Todo> {
        self.visible().get(self.state.selected).copied()
    }

    /// Handles one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        let command = map_key(self.state.mode, key);
        self.apply(command);
    }

    /// Applies a command to the state and the store.
    pub fn apply(&mut self, command: Command) {
        let len = self.visible().len();

        match command {
            Command::Ignore => {}
            Command::Quit => self.state.quit(),
            Command::MoveDown => {
                if self.state.selected + 1 < len {
                    self.state.selected += 1;
                }
            }
            Command::MoveUp => self.state.selected = self.state.selected.saturating_sub(1),
            Command::Top => self.state.selected = 0,
            Command::Bottom => self.state.selected = len.saturating_sub(1),
            Command::StartAdd => self.state.open_prompt(Mode::Adding, String::new()),
            Command::StartEdit => {
                let selected = self.selected_todo().map(|t| (t.raw.clone(), t.text.clone()));
                if let Some((raw, text)) = selected {
                    self.state.open_prompt(Mode::Editing, text);
                    self.state.editing = Some(raw);
                }
            }
            Command::StartFilter => {
                let current = self.state.filter.clone();
                self.state.open_prompt(Mode::Filtering, current);
            }
            Command::ClearFilter => {
                self.state.filter.clear();
                self.state.clamp_selection(self.visible().len());
            }
            Command::ShowHelp => self.state.mode = Mode::Help,
            Command::CloseHelp => self.state.mode = Mode::Normal,
            Command::Delete => {
                if let Some(id) = self.selected_todo().map(|t| t.id) {
                    let result = self.store.delete(id);
                    self.report(result, "Deleted todo");
                    self.state.clamp_selection(self.visible().len());
                }
            }
            Command::Toggle => {
                if let Some(id) = self.selected_todo().map(|t| t.id) {
                    let result = self.store.toggle(id);
                    self.follow(id);
                    self.report(result, "Toggled todo");
                }
            }
            Command::Priority(priority) => {
                if let Some(id) = self.selected_todo().map(|t| t.id) {
                    let result = self.store.set_priority(id, priority);
                    self.follow(id);
                    let message = match priority {
                        Some(letter) => format!("Priority set to {letter}"),
                        None => "Priority cleared".to_string(),
                    };
                    self.report(result, message);
                }
            }
            Command::Reload => self.force_reload(),
            Command::InputChar(c) => {
                self.state.input.push(c);
                self.sync_filter();
            }
            Command::InputBackspace => {
                self.state.input.pop();
                self.sync_filter();
            }
            Command::Submit => self.submit(),
            Command::Cancel => {
                if self.state.mode == Mode::Filtering {
                    self.state.filter.clear();
                }
                self.state.close_prompt();
                self.state.clamp_selection(self.visible().len());
            }
        }
    }

    /// Re-reads the file if its content changed and keeps the selection on
    /// the same entry.
    ///
    /// Called for watcher notifications (`reason` set) and on the periodic
    /// refresh tick. A late notification after the watcher stopped is
    /// harmless.
    pub fn refresh(&mut self, reason: Option<ChangeReason>) {
        let key = self.selected_todo().map(|t| t.raw.clone());

        match self.store.reload_if_changed() {
            Ok(ReloadOutcome::Unchanged) => {
                if let Some(reason) = reason {
                    debug!(reason = %reason, "Change notification with identical content");
                }
            }
            Ok(ReloadOutcome::Changed) => {
                self.reselect(key.as_deref());
                let text = match reason {
                    Some(reason) => format!("Reloaded after external {reason}"),
                    None => "Reloaded after external change".to_string(),
                };
                self.state.set_status(StatusKind::Info, text);
            }
            Err(e) => {
                warn!(error = %e, "Failed to reload todo file");
                self.state
                    .set_status(StatusKind::Error, format!("Reload failed: {e}"));
            }
        }
    }

    /// Periodic housekeeping.
    pub fn on_tick(&mut self) {
        self.state.expire_status(Instant::now());
    }

    fn force_reload(&mut self) {
        let key = self.selected_todo().map(|t| t.raw.clone());
        match self.store.load() {
            Ok(()) => {
                self.reselect(key.as_deref());
                let count = self.store.len();
                self.state
                    .set_status(StatusKind::Info, format!("Reloaded {count} todos"));
            }
            Err(e) => self
                .state
                .set_status(StatusKind::Error, format!("Reload failed: {e}")),
        }
    }

    fn submit(&mut self) {
        let mode = self.state.mode;
        let editing = self.state.editing.take();
        let input = self.state.close_prompt();

        match mode {
            Mode::Adding => match self.store.add(&input) {
                Ok(id) => {
                    self.follow(id);
                    self.state.set_status(StatusKind::Info, "Added todo");
                }
                Err(e) => self.show_error(&e),
            },
            Mode::Editing => {
                // IDs may have shifted since the prompt opened.
                let target = editing
                    .and_then(|raw| self.store.find_by_content(&raw))
                    .map(|t| t.id);
                match target {
                    Some(id) => {
                        let result = self.store.update(id, &input);
                        self.follow(id);
                        self.report(result, "Updated todo");
                    }
                    None => self.state.set_status(
                        StatusKind::Error,
                        "Edit discarded: the todo was changed or removed on disk",
                    ),
                }
            }
            Mode::Filtering => {
                self.state.filter = input.trim().to_string();
                self.state.selected = 0;
            }
            Mode::Normal | Mode::Help => {}
        }
    }

    fn sync_filter(&mut self) {
        if self.state.mode == Mode::Filtering {
            self.state.filter = self.state.input.clone();
            self.state.selected = 0;
        }
    }

    /// Moves the selection to the entry with this ID, if visible.
    fn follow(&mut self, id: usize) {
        let position = self.visible().iter().position(|t| t.id == id);
        match position {
            Some(index) => self.state.selected = index,
            None => self.state.clamp_selection(self.visible().len()),
        }
    }

    /// Selects the entry whose raw line is `key`, else the nearest index.
    fn reselect(&mut self, key: Option<&str>) {
        match key.and_then(|key| self.store.find_by_content(key)).map(|t| t.id) {
            Some(id) => self.follow(id),
            None => self.state.clamp_selection(self.visible().len()),
        }
    }

    fn report(&mut self, result: crate::Result<()>, success: impl Into<String>) {
        match result {
            Ok(()) => self.state.set_status(StatusKind::Info, success),
            Err(e) => self.show_error(&e),
        }
    }

    fn show_error(&mut self, error: &TodoError) {
        warn!(error = %error, "Todo operation failed");
        self.state.set_status(StatusKind::Error, error.to_string());
    }
}
