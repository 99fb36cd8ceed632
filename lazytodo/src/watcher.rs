//! File watcher for the todo.txt backing file.
//!
//! This module notifies the UI loop when the todo file's content plausibly
//! changed on disk, without reporting the application's own writes and
//! without flooding the loop during bursts of filesystem events.
//!
//! # Architecture
//!
//! Two interchangeable strategies feed the same pipeline:
//!
//! - **Events** ([`WatchMode::Events`]): the [`notify`] crate subscribes to the
//!   file's parent directory (atomic-replace editors show up there as create
//!   and rename events) and to the file itself when it exists. The notify
//!   callback stays lightweight: it filters events down to the target path,
//!   drops them while a self-write is in progress, and forwards the rest
//!   through an internal channel to an async task that classifies them and
//!   keeps the file subscription current.
//! - **Polling** ([`WatchMode::Polling`]): a fixed-interval timer samples the
//!   file's (size, mtime) pair. Used when native notifications are
//!   unavailable or when polling is forced by configuration.
//!
//! Both strategies check [`SelfWriteGuard::is_suppressed`] before any
//! classification work and hand accepted [`ChangeReason`]s to a single-slot
//! [`Debouncer`], which delivers only the last reason of a burst on the
//! output channel.
//!
//! ```text
//! Idle --start--> Watching --(suppressed | debouncing)--> Watching
//!   \                |
//!    `----stop-------`--> Stopped
//! ```
//!
//! [`FileWatcher::stop`] raises a shutdown flag shared by every task. The
//! pending debounce value is discarded and no reason is delivered once the
//! flag is up. Dropping the watcher stops it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use lazytodo::self_write::SelfWriteGuard;
//! use lazytodo::watcher::{FileWatcher, WatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let guard = Arc::new(SelfWriteGuard::default());
//!     let (tx, mut rx) = mpsc::channel(16);
//!
//!     let mut watcher = FileWatcher::new(WatchConfig::new("~/todo.txt"), guard)?;
//!     let mode = watcher.start(tx)?;
//!     println!("watching in {mode} mode");
//!
//!     while let Some(reason) = rx.recv().await {
//!         println!("todo.txt changed: {reason}");
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use notify::{
    event::ModifyKind, Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::self_write::SelfWriteGuard;
use crate::utils::debounce::{Debouncer, DEFAULT_DEBOUNCE_MS};
use crate::utils::path::{resolve_path, split_target};

/// Default polling interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Capacity of the channel between the notify callback and the async task.
const RAW_EVENT_CAPACITY: usize = 256;

/// Why the watcher believes the file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    /// File content was written in place.
    Write,
    /// File metadata (permissions, timestamps) changed.
    Chmod,
    /// The file appeared.
    Create,
    /// The file was removed or renamed away/over.
    Replace,
}

impl ChangeReason {
    /// Lower-case name used in logs and status messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Chmod => "chmod",
            Self::Create => "create",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the watcher is observing the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Native filesystem notifications.
    Events,
    /// Periodic (size, mtime) sampling.
    Polling,
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Events => f.write_str("events"),
            Self::Polling => f.write_str("polling"),
        }
    }
}

/// Which strategy to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchStrategy {
    /// Native notifications, falling back to polling.
    #[default]
    Auto,
    /// Polling only.
    Polling,
}

/// Lifecycle of a [`FileWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching(WatchMode),
    Stopped,
}

/// Watcher settings.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// File to watch; may contain `~` and `$VAR` references.
    pub path: PathBuf,
    /// Quiet period before a burst is delivered.
    pub debounce: Duration,
    /// Polling interval; zero disables the polling fallback.
    pub poll_interval: Duration,
    pub strategy: WatchStrategy,
}

impl WatchConfig {
    /// Creates a configuration with default timings for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            strategy: WatchStrategy::Auto,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: WatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the native file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// Failed to resolve the target path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Neither native notifications nor polling can be used.
    #[error("file watching unavailable: {0}")]
    Unavailable(String),

    /// The watcher has already been stopped.
    #[error("watcher already stopped")]
    Stopped,
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Resolved target: the file plus the directory it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    file: PathBuf,
    dir: PathBuf,
    file_name: String,
}

impl WatchTarget {
    /// Expands a leading `~` and makes the path absolute.
    pub fn resolve(path: &Path) -> Result<Self> {
        let file = resolve_path(path)?;
        let (dir, file_name) = split_target(&file)?;
        Ok(Self {
            file,
            dir,
            file_name,
        })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns `true` if `path` names the target file.
    pub fn matches(&self, path: &Path) -> bool {
        if path == self.file {
            return true;
        }
        path.parent() == Some(self.dir.as_path())
            && path.file_name().is_some_and(|n| n == self.file_name.as_str())
    }
}

/// Size and modification time sampled by the polling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStat {
    size: u64,
    mtime: Option<SystemTime>,
}

impl FileStat {
    fn sample(path: &Path) -> Option<Self> {
        fs::metadata(path).ok().map(|meta| Self {
            size: meta.len(),
            mtime: meta.modified().ok(),
        })
    }
}

/// Watches one file and reports [`ChangeReason`]s on a channel.
#[derive(Debug)]
pub struct FileWatcher {
    config: WatchConfig,
    target: WatchTarget,
    guard: Arc<SelfWriteGuard>,
    /// (size, mtime) at construction, seeding the polling strategy.
    initial_stat: Option<FileStat>,
    mode: Option<WatchMode>,
    shutdown_tx: watch::Sender<bool>,
}

impl FileWatcher {
    /// Creates an idle watcher for `config.path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be expanded or made absolute, or
    /// if it has no parent directory.
    pub fn new(config: WatchConfig, guard: Arc<SelfWriteGuard>) -> Result<Self> {
        let target = WatchTarget::resolve(&config.path)?;
        let initial_stat = FileStat::sample(&target.file);
        let (shutdown_tx, _) = watch::channel(false);

        debug!(
            path = %target.file.display(),
            exists = initial_stat.is_some(),
            "Initialized file watcher"
        );

        Ok(Self {
            config,
            target,
            guard,
            initial_stat,
            mode: None,
            shutdown_tx,
        })
    }

    /// Starts watching, delivering reasons on `change_tx`.
    ///
    /// Tries native notifications first (unless polling is forced) and falls
    /// back to polling if the notifier or the directory subscription cannot be
    /// created. Calling `start` on a running watcher returns its current mode.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`WatcherError::Stopped`] if the watcher was stopped
    /// - [`WatcherError::Unavailable`] if native notifications failed and the
    ///   polling fallback is disabled
    pub fn start(&mut self, change_tx: mpsc::Sender<ChangeReason>) -> Result<WatchMode> {
        if self.is_stopped() {
            return Err(WatcherError::Stopped);
        }
        if let Some(mode) = self.mode {
            return Ok(mode);
        }

        let mode = match self.config.strategy {
            WatchStrategy::Polling => self.start_polling(change_tx)?,
            WatchStrategy::Auto => match subscribe(&self.target, &self.guard) {
                Ok((notifier, raw_rx)) => {
                    let debouncer = self.debouncer(change_tx);
                    let target = self.target.clone();
                    let shutdown = self.shutdown_tx.subscribe();
                    tokio::spawn(async move {
                        process_raw_events(notifier, raw_rx, target, debouncer, shutdown).await;
                    });
                    info!(path = %self.target.file.display(), "Watching todo file with native events");
                    WatchMode::Events
                }
                Err(e) => {
                    warn!(
                        dir = %self.target.dir.display(),
                        error = %e,
                        "Native file events unavailable, falling back to polling"
                    );
                    self.start_polling(change_tx)?
                }
            },
        };

        self.mode = Some(mode);
        Ok(mode)
    }

    /// Stops watching. Safe to call more than once and from any task.
    ///
    /// Cancels the pending debounce and closes the native subscription. No
    /// reason is delivered after this returns, apart from one whose send was
    /// already in flight.
    pub fn stop(&self) {
        let was_stopped = self.shutdown_tx.send_replace(true);
        if !was_stopped {
            info!(path = %self.target.file.display(), "File watcher stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn state(&self) -> WatchState {
        match (self.is_stopped(), self.mode) {
            (true, _) => WatchState::Stopped,
            (false, Some(mode)) => WatchState::Watching(mode),
            (false, None) => WatchState::Idle,
        }
    }

    /// Mode chosen by [`start`](Self::start), if started.
    pub fn mode(&self) -> Option<WatchMode> {
        self.mode
    }

    /// Absolute path of the watched file.
    pub fn target(&self) -> &Path {
        &self.target.file
    }

    fn debouncer(&self, change_tx: mpsc::Sender<ChangeReason>) -> Debouncer<ChangeReason> {
        Debouncer::new(
            self.config.debounce,
            change_tx,
            self.shutdown_tx.subscribe(),
        )
    }

    fn start_polling(&self, change_tx: mpsc::Sender<ChangeReason>) -> Result<WatchMode> {
        let interval = self.config.poll_interval;
        if interval.is_zero() {
            error!(
                path = %self.target.file.display(),
                "Polling fallback disabled, auto-refresh unavailable"
            );
            return Err(WatcherError::Unavailable(
                "native events failed and polling is disabled".to_string(),
            ));
        }

        let debouncer = self.debouncer(change_tx);
        let poller = Poller {
            path: self.target.file.clone(),
            guard: Arc::clone(&self.guard),
            last: self.initial_stat,
        };
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            run_polling(poller, interval, debouncer, shutdown).await;
        });

        info!(
            path = %self.target.file.display(),
            interval_ms = interval.as_millis() as u64,
            "Watching todo file with polling"
        );
        Ok(WatchMode::Polling)
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Creates the native notifier and subscribes to the target's directory and,
/// if it exists, the file itself.
fn subscribe(
    target: &WatchTarget,
    guard: &Arc<SelfWriteGuard>,
) -> Result<(RecommendedWatcher, mpsc::Receiver<Event>)> {
    let (raw_tx, raw_rx) = mpsc::channel(RAW_EVENT_CAPACITY);
    let callback_target = target.clone();
    let callback_guard = Arc::clone(guard);

    let mut notifier = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            handle_notify_event(res, &callback_target, &callback_guard, &raw_tx);
        },
        Config::default(),
    )?;

    notifier.watch(&target.dir, RecursiveMode::NonRecursive)?;

    if target.file.exists() {
        if let Err(e) = notifier.watch(&target.file, RecursiveMode::NonRecursive) {
            warn!(path = %target.file.display(), error = %e, "Failed to watch file");
        }
    }

    debug!(dir = %target.dir.display(), "Subscribed to directory events");
    Ok((notifier, raw_rx))
}

/// Callback for the notify thread: filter, suppress, forward.
fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    target: &WatchTarget,
    guard: &SelfWriteGuard,
    raw_tx: &mpsc::Sender<Event>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            return;
        }
    };

    if !accept_event(&event, target, guard) {
        return;
    }

    // try_send keeps the notify thread from blocking; a full queue only
    // loses events inside a burst that is already pending.
    if let Err(e) = raw_tx.try_send(event) {
        warn!(error = %e, "Failed to queue file event");
    }
}

/// Returns `true` if `event` concerns the target and no self-write is open.
fn accept_event(event: &Event, target: &WatchTarget, guard: &SelfWriteGuard) -> bool {
    if !event.paths.iter().any(|p| target.matches(p)) {
        return false;
    }

    if guard.is_suppressed() {
        debug!(kind = ?event.kind, "Suppressing event during self-write");
        return false;
    }

    true
}

/// Maps a notify event kind to a change reason.
fn classify(kind: &EventKind) -> Option<ChangeReason> {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(ChangeReason::Chmod),
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Remove(_) => {
            Some(ChangeReason::Replace)
        }
        EventKind::Modify(_) | EventKind::Any => Some(ChangeReason::Write),
        EventKind::Create(_) => Some(ChangeReason::Create),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

/// Async task that classifies accepted events and feeds the debouncer.
///
/// Owns the notifier so it can re-subscribe to the file when editors delete
/// and recreate it. Dropping the notifier on exit closes the subscription.
async fn process_raw_events(
    mut notifier: RecommendedWatcher,
    mut raw_rx: mpsc::Receiver<Event>,
    target: WatchTarget,
    debouncer: Debouncer<ChangeReason>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }

            event = raw_rx.recv() => {
                let Some(event) = event else { break };
                let Some(reason) = classify(&event.kind) else {
                    trace!(kind = ?event.kind, "Ignoring event kind");
                    continue;
                };

                match reason {
                    ChangeReason::Create => resubscribe(&mut notifier, &target),
                    ChangeReason::Replace => {
                        // The old handle is stale; if a new file was renamed
                        // over the path, follow it.
                        unsubscribe(&mut notifier, &target);
                        if target.file.exists() {
                            resubscribe(&mut notifier, &target);
                        }
                    }
                    ChangeReason::Write | ChangeReason::Chmod => {}
                }

                debug!(kind = ?event.kind, reason = %reason, "File event accepted");
                if !debouncer.try_send(reason) {
                    warn!(reason = %reason, "Failed to queue change reason");
                }
            }
        }
    }

    debug!("Native event processor shutting down");
}

/// Drops the watch on the file itself. Returns `false` when notify reports
/// anything other than the file not being watched.
fn unsubscribe(notifier: &mut RecommendedWatcher, target: &WatchTarget) -> bool {
    match notifier.unwatch(&target.file) {
        Ok(()) => true,
        Err(e) if matches!(e.kind, notify::ErrorKind::WatchNotFound) => {
            trace!(path = %target.file.display(), "File was not watched");
            true
        }
        Err(e) => {
            debug!(path = %target.file.display(), error = %e, "Failed to unwatch file");
            false
        }
    }
}

fn resubscribe(notifier: &mut RecommendedWatcher, target: &WatchTarget) {
    if let Err(e) = notifier.watch(&target.file, RecursiveMode::NonRecursive) {
        debug!(path = %target.file.display(), error = %e, "Failed to re-watch file");
    }
}

/// State of the polling strategy.
#[derive(Debug)]
struct Poller {
    path: PathBuf,
    guard: Arc<SelfWriteGuard>,
    last: Option<FileStat>,
}

impl Poller {
    /// Samples the file once and reports what changed since the last sample.
    fn check(&mut self) -> Option<ChangeReason> {
        if self.guard.is_suppressed() {
            trace!("Skipping poll during self-write");
            return None;
        }

        match (FileStat::sample(&self.path), self.last) {
            (None, None) => None,
            (None, Some(_)) => {
                self.last = None;
                Some(ChangeReason::Replace)
            }
            (Some(current), None) => {
                self.last = Some(current);
                Some(ChangeReason::Create)
            }
            (Some(current), Some(previous)) => {
                if current.mtime > previous.mtime || current.size != previous.size {
                    self.last = Some(current);
                    Some(ChangeReason::Write)
                } else {
                    None
                }
            }
        }
    }
}

async fn run_polling(
    mut poller: Poller,
    interval: Duration,
    debouncer: Debouncer<ChangeReason>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }

            _ = ticker.tick() => {
                if let Some(reason) = poller.check() {
                    debug!(path = %poller.path.display(), reason = %reason, "Poll detected change");
                    if !debouncer.try_send(reason) {
                        warn!(reason = %reason, "Failed to queue change reason");
                    }
                }
            }
        }
    }

    debug!("Polling task shutting down");
}
