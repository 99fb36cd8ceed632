//! Terminal user interface for lazytodo.
//!
//! - [`app`]: presentation state and the commands that mutate the store
//! - [`ui`]: frame rendering
//! - [`input`]: key mapping and the terminal event pump
//! - [`terminal`]: raw mode setup and restoration
//!
//! [`run`] wires them to a [`TodoStore`] and a [`FileWatcher`]:
//!
//! ```text
//! EventHandler --TuiEvent-----> +-----------+
//! FileWatcher  --ChangeReason-> | run loop  | --> App --> TodoStore --> todo.txt
//! refresh tick ---------------> +-----------+      |
//!                                                  +--> ui::render
//! ```

pub mod app;
pub mod input;
pub mod terminal;
pub mod ui;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub use app::{App, AppState, StatusKind, StatusMessage, Theme};
pub use input::{map_key, Command, EventHandler, Mode, TuiEvent};
pub use terminal::{install_panic_hook, Tui};

use crate::config::Config;
use crate::error::TuiError;
use crate::self_write::SelfWriteGuard;
use crate::store::TodoStore;
use crate::watcher::{ChangeReason, FileWatcher};

/// Buffer size for terminal events.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Buffer size for debounced change notifications.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Loads the todo file, starts auto-refresh and runs the interactive loop
/// until the user quits.
///
/// A watcher that cannot start is logged and the app runs without
/// auto-refresh. The periodic refresh still picks up external edits.
///
/// # Errors
///
/// Returns an error if the todo file cannot be loaded, or if the terminal
/// cannot be initialized or drawn to.
pub async fn run(config: &Config) -> crate::Result<()> {
    let guard = Arc::new(SelfWriteGuard::new(config.watch.self_write_ttl));
    let store = TodoStore::open(&config.todo_file, Arc::clone(&guard))?;
    info!(
        path = %store.path().display(),
        todos = store.len(),
        "Todo file loaded"
    );

    let (change_tx, mut change_rx) = mpsc::channel::<ChangeReason>(CHANGE_CHANNEL_CAPACITY);
    let watcher = start_watcher(config, guard, change_tx);
    let watch_mode = watcher.as_ref().and_then(FileWatcher::mode);
    let mut app = App::new(store, watch_mode);

    install_panic_hook();
    let mut tui = Tui::new()?;

    let (event_tx, mut event_rx) = mpsc::channel::<TuiEvent>(EVENT_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let event_task = tokio::spawn(EventHandler::new(event_tx, shutdown_rx).run());

    let result = event_loop(
        &mut tui,
        &mut app,
        &mut event_rx,
        &mut change_rx,
        config,
    )
    .await;

    if let Some(watcher) = &watcher {
        watcher.stop();
    }
    let _ = shutdown_tx.send(());
    if let Err(e) = event_task.await {
        warn!(error = %e, "Terminal event task failed");
    }
    if let Err(e) = tui.restore() {
        warn!(error = %e, "Failed to restore terminal");
    }

    info!("lazytodo stopped");
    result
}

/// Creates and starts the watcher. `None` means auto-refresh is off.
fn start_watcher(
    config: &Config,
    guard: Arc<SelfWriteGuard>,
    change_tx: mpsc::Sender<ChangeReason>,
) -> Option<FileWatcher> {
    let mut watcher = match FileWatcher::new(config.watch_config(), guard) {
        Ok(watcher) => watcher,
        Err(e) => {
            warn!(error = %e, "Auto-refresh disabled: watcher could not be created");
            return None;
        }
    };

    match watcher.start(change_tx) {
        Ok(mode) => {
            info!(mode = %mode, path = %watcher.target().display(), "Auto-refresh enabled");
            Some(watcher)
        }
        Err(e) => {
            warn!(error = %e, "Auto-refresh disabled: watcher could not be started");
            None
        }
    }
}

async fn event_loop(
    tui: &mut Tui,
    app: &mut App,
    event_rx: &mut mpsc::Receiver<TuiEvent>,
    change_rx: &mut mpsc::Receiver<ChangeReason>,
    config: &Config,
) -> crate::Result<()> {
    let mut refresh = tokio::time::interval(config.refresh_interval);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    refresh.tick().await;

    let mut watching = true;
    let terminate = terminate_signal();
    tokio::pin!(terminate);

    loop {
        tui.draw(|frame| ui::render(frame, app))?;
        if app.should_quit() {
            break;
        }

        tokio::select! {
            event = event_rx.recv() => match event {
                Some(TuiEvent::Key(key)) => app.handle_key(key),
                Some(TuiEvent::Tick) => app.on_tick(),
                Some(TuiEvent::Resize(width, height)) => {
                    debug!(width, height, "Terminal resized");
                }
                None => {
                    let err = TuiError::Event("terminal event stream closed".to_string());
                    return Err(err.into());
                }
            },

            reason = change_rx.recv(), if watching => match reason {
                Some(reason) => {
                    debug!(reason = %reason, "External change reported");
                    app.refresh(Some(reason));
                }
                None => {
                    debug!("Change channel closed");
                    watching = false;
                }
            },

            _ = refresh.tick() => app.refresh(None),

            _ = &mut terminate => {
                info!("Termination signal received");
                break;
            }
        }
    }

    Ok(())
}

/// Resolves on SIGTERM. Ctrl-C arrives as a key press in raw mode.
async fn terminate_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    std::future::pending::<()>().await;
}
