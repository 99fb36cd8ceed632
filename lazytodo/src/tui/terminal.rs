//! Terminal setup and RAII restoration.
//!
//! [`Tui`] enters raw mode and the alternate screen on creation and puts the
//! terminal back on drop. [`install_panic_hook`] covers the case where a panic
//! unwinds past the drop, so the panic message still lands on a usable shell.
//!
//! Install the hook before creating the [`Tui`]:
//!
//! ```ignore
//! install_panic_hook();
//! let mut tui = Tui::new()?;
//! tui.draw(|frame| ui::render(frame, &app))?;
//! tui.restore()?;
//! ```

use std::io::{self, Stdout};
use std::panic;

use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::error::TuiError;

/// Best-effort terminal restoration. Errors are ignored.
fn reset_terminal() {
    let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Chains a panic hook that restores the terminal before the previous hook
/// prints the panic message.
pub fn install_panic_hook() {
    let previous_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        reset_terminal();
        previous_hook(panic_info);
    }));
}

/// A ratatui terminal in raw mode on the alternate screen.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Set once restored so drop does not restore twice.
    restored: bool,
}

impl Tui {
    /// Enables raw mode, enters the alternate screen and hides the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`TuiError::TerminalInit`] if any step fails. Steps already
    /// taken are undone first.
    pub fn new() -> Result<Self, TuiError> {
        enable_raw_mode().map_err(TuiError::TerminalInit)?;

        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(TuiError::TerminalInit(e));
        }

        let terminal = Terminal::new(CrosstermBackend::new(stdout)).map_err(|e| {
            reset_terminal();
            TuiError::TerminalInit(e)
        })?;

        Ok(Self {
            terminal,
            restored: false,
        })
    }

    /// Draws one frame.
    ///
    /// # Errors
    ///
    /// Returns [`TuiError::Render`] if writing to the terminal fails.
    pub fn draw<F>(&mut self, f: F) -> Result<(), TuiError>
    where
        F: FnOnce(&mut ratatui::Frame),
    {
        self.terminal.draw(f).map_err(TuiError::Render)?;
        Ok(())
    }

    /// Restores the terminal. Later calls and the drop are no-ops.
    ///
    /// # Errors
    ///
    /// Unlike the drop, restoration errors are returned to the caller.
    pub fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;

        execute!(io::stdout(), Show, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if !self.restored {
            reset_terminal();
        }
    }
}
