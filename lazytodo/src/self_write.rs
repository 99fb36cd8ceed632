//! Self-write suppression.
//!
//! Before the store writes the todo file it opens a suppression window with
//! [`SelfWriteGuard::begin`]. While the window is open the watcher discards
//! every notification for the file. The returned [`SelfWriteRelease`] closes
//! the window as soon as the write has finished (explicitly or on drop), so
//! external edits made right after a save are not masked for the full TTL.
//!
//! The deadline is a single atomic timestamp. Overlapping windows simply
//! reset it; writes are serialized by the store, so nothing needs queueing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

/// Default suppression TTL in milliseconds.
pub const DEFAULT_SELF_WRITE_TTL_MS: u64 = 500;

/// Time-windowed gate shared by the store (writer) and the watcher (reader).
#[derive(Debug)]
pub struct SelfWriteGuard {
    /// Reference point for the stored deadline.
    epoch: Instant,
    /// Suppression deadline as nanoseconds since `epoch`.
    deadline_nanos: AtomicU64,
    ttl: Duration,
}

impl SelfWriteGuard {
    /// Creates a guard with the given suppression TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            deadline_nanos: AtomicU64::new(0),
            ttl,
        }
    }

    /// Creates a shareable guard with the default TTL.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Opens a suppression window of `ttl` starting now.
    ///
    /// The window closes when the TTL elapses or when the returned release
    /// handle is released or dropped, whichever comes first.
    #[must_use = "dropping the release handle ends suppression immediately"]
    pub fn begin(&self) -> SelfWriteRelease<'_> {
        let deadline = self.now_nanos().saturating_add(duration_nanos(self.ttl));
        self.deadline_nanos.store(deadline, Ordering::SeqCst);
        trace!(ttl_ms = self.ttl.as_millis() as u64, "Self-write window opened");
        SelfWriteRelease {
            guard: self,
            released: false,
        }
    }

    /// Returns `true` while a suppression window is open.
    pub fn is_suppressed(&self) -> bool {
        self.now_nanos() < self.deadline_nanos.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.deadline_nanos.store(self.now_nanos(), Ordering::SeqCst);
        trace!("Self-write window released");
    }

    fn now_nanos(&self) -> u64 {
        duration_nanos(self.epoch.elapsed())
    }
}

impl Default for SelfWriteGuard {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_SELF_WRITE_TTL_MS))
    }
}

/// Early-release handle for a suppression window.
#[derive(Debug)]
pub struct SelfWriteRelease<'a> {
    guard: &'a SelfWriteGuard,
    released: bool,
}

impl SelfWriteRelease<'_> {
    /// Closes the suppression window now.
    pub fn release(mut self) {
        self.released = true;
        self.guard.release();
    }
}

impl Drop for SelfWriteRelease<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.guard.release();
        }
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
