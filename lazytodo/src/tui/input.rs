//! Terminal events and key bindings.
//!
//! [`EventHandler`] turns crossterm input into [`TuiEvent`]s on a channel;
//! [`map_key`] translates a key press into a [`Command`] for the current
//! [`Mode`]. Neither touches the todo list.

use std::time::Duration;

use crossterm::event::{
    self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use tokio::sync::{mpsc, oneshot};

/// Default tick rate for the event handler.
///
/// Ticks only expire status messages, so this can be slow.
pub const DEFAULT_TICK_RATE_MS: u64 = 250;

/// Poll timeout for checking terminal input.
const DEFAULT_POLL_TIMEOUT_MS: u64 = 10;

/// Events that drive the TUI loop.
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Periodic tick for timers.
    Tick,

    /// Key press from the user.
    Key(KeyEvent),

    /// Terminal resized to (columns, rows).
    Resize(u16, u16),
}

/// Interaction mode of the list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    /// Typing a new todo.
    Adding,
    /// Editing the text of the selected todo.
    Editing,
    /// Typing a filter string.
    Filtering,
    /// Key binding overlay.
    Help,
}

impl Mode {
    /// Returns `true` while a text prompt is open.
    pub fn is_input(self) -> bool {
        matches!(self, Self::Adding | Self::Editing | Self::Filtering)
    }
}

/// What a key press asks the app to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    MoveDown,
    MoveUp,
    Top,
    Bottom,
    StartAdd,
    StartEdit,
    Delete,
    Toggle,
    /// Set (`Some`) or clear (`None`) the selected todo's priority.
    Priority(Option<char>),
    StartFilter,
    ClearFilter,
    Reload,
    ShowHelp,
    CloseHelp,
    InputChar(char),
    InputBackspace,
    Submit,
    Cancel,
    Ignore,
}

/// Maps a key press to a command for `mode`.
pub fn map_key(mode: Mode, key: KeyEvent) -> Command {
    if key.kind != KeyEventKind::Press {
        return Command::Ignore;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Command::Quit;
    }

    match mode {
        Mode::Normal => match key.code {
            KeyCode::Char('q') => Command::Quit,
            KeyCode::Char('j') | KeyCode::Down => Command::MoveDown,
            KeyCode::Char('k') | KeyCode::Up => Command::MoveUp,
            KeyCode::Char('g') | KeyCode::Home => Command::Top,
            KeyCode::Char('G') | KeyCode::End => Command::Bottom,
            KeyCode::Char('a') => Command::StartAdd,
            KeyCode::Char('e') => Command::StartEdit,
            KeyCode::Char('d') => Command::Delete,
            KeyCode::Char('x') | KeyCode::Char(' ') => Command::Toggle,
            KeyCode::Char('1') => Command::Priority(Some('A')),
            KeyCode::Char('2') => Command::Priority(Some('B')),
            KeyCode::Char('3') => Command::Priority(Some('C')),
            KeyCode::Char('0') => Command::Priority(None),
            KeyCode::Char('/') => Command::StartFilter,
            KeyCode::Char('r') => Command::Reload,
            KeyCode::Char('?') => Command::ShowHelp,
            KeyCode::Esc => Command::ClearFilter,
            _ => Command::Ignore,
        },
        Mode::Adding | Mode::Editing | Mode::Filtering => match key.code {
            KeyCode::Enter => Command::Submit,
            KeyCode::Esc => Command::Cancel,
            KeyCode::Backspace => Command::InputBackspace,
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                Command::InputChar(c)
            }
            _ => Command::Ignore,
        },
        Mode::Help => match key.code {
            KeyCode::Char('q') => Command::Quit,
            _ => Command::CloseHelp,
        },
    }
}

/// Handles terminal input and generates periodic tick events.
///
/// Runs in its own task; terminal polling goes through `spawn_blocking` so
/// the synchronous crossterm calls never block the runtime.
#[derive(Debug)]
pub struct EventHandler {
    event_tx: mpsc::Sender<TuiEvent>,
    shutdown_rx: oneshot::Receiver<()>,
    tick_rate: Duration,
}

impl EventHandler {
    /// Creates a new `EventHandler` with the default tick rate.
    pub fn new(event_tx: mpsc::Sender<TuiEvent>, shutdown_rx: oneshot::Receiver<()>) -> Self {
        Self::with_tick_rate(
            event_tx,
            shutdown_rx,
            Duration::from_millis(DEFAULT_TICK_RATE_MS),
        )
    }

    /// Creates a new `EventHandler` with a custom tick rate.
    pub fn with_tick_rate(
        event_tx: mpsc::Sender<TuiEvent>,
        shutdown_rx: oneshot::Receiver<()>,
        tick_rate: Duration,
    ) -> Self {
        Self {
            event_tx,
            shutdown_rx,
            tick_rate,
        }
    }

    pub fn tick_rate(&self) -> Duration {
        self.tick_rate
    }

    /// Runs the event loop until a shutdown signal arrives or the receiver
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal polling task panics.
    pub async fn run(mut self) -> std::io::Result<()> {
        let mut tick_interval = tokio::time::interval(self.tick_rate);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tick_interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    tracing::debug!("EventHandler received shutdown signal");
                    break;
                }

                _ = tick_interval.tick() => {
                    if self.event_tx.send(TuiEvent::Tick).await.is_err() {
                        tracing::debug!("Event receiver dropped, exiting event loop");
                        break;
                    }
                }

                result = async {
                    tokio::time::sleep(Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS)).await;
                    tokio::task::spawn_blocking(|| {
                        Self::poll_terminal_event(Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS))
                    }).await
                } => {
                    match result {
                        Ok(Some(event)) => {
                            if self.event_tx.send(event).await.is_err() {
                                tracing::debug!("Event receiver dropped, exiting event loop");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(join_error) => {
                            tracing::error!("spawn_blocking task panicked: {}", join_error);
                            return Err(std::io::Error::other("Terminal polling task panicked"));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Polls for one terminal event. Failures (no terminal, as in tests)
    /// count as "no event".
    fn poll_terminal_event(timeout: Duration) -> Option<TuiEvent> {
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(crossterm_event) => Self::convert_crossterm_event(crossterm_event),
                Err(e) => {
                    tracing::trace!("Failed to read terminal event: {}", e);
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                tracing::trace!("Failed to poll terminal: {}", e);
                None
            }
        }
    }

    fn convert_crossterm_event(event: CrosstermEvent) -> Option<TuiEvent> {
        match event {
            CrosstermEvent::Key(key_event) => Some(TuiEvent::Key(key_event)),
            CrosstermEvent::Resize(cols, rows) => Some(TuiEvent::Resize(cols, rows)),
            CrosstermEvent::Mouse(_)
            | CrosstermEvent::FocusGained
            | CrosstermEvent::FocusLost
            | CrosstermEvent::Paste(_) => None,
        }
    }
}
