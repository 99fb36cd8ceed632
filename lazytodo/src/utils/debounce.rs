//! Debounce utility for coalescing bursts of change notifications.
//!
//! Editors rarely save a file with a single filesystem operation: a save can
//! show up as write + chmod, or as create + rename of a temporary file. The
//! [`Debouncer`] collapses such a burst into one delivery.
//!
//! # Architecture
//!
//! A background task holds at most one pending value. When a value arrives:
//!
//! 1. It replaces any pending value (the last event of a burst wins)
//! 2. The single timer is reset to `now + interval`
//! 3. When the timer expires with no newer value, the pending value is sent
//!    on the output channel
//!
//! The task watches a shutdown flag. Once the flag is raised (or its sender
//! is dropped) the pending value is discarded and nothing is delivered
//! afterwards; every delivery re-checks the flag first.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tokio::sync::{mpsc, watch};
//! use lazytodo::utils::debounce::Debouncer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (output_tx, mut output_rx) = mpsc::channel(16);
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let debouncer = Debouncer::new(Duration::from_millis(300), output_tx, shutdown_rx);
//!
//!     debouncer.send("write").await.unwrap();
//!     debouncer.send("chmod").await.unwrap();
//!
//!     // Only "chmod" is delivered, once, after 300ms of quiet.
//!     assert_eq!(output_rx.recv().await, Some("chmod"));
//! }
//! ```

use std::fmt::Debug;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Capacity of the debouncer's input queue.
const INPUT_CAPACITY: usize = 256;

/// Error type for debouncer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebouncerError {
    /// The debouncer's background task has stopped.
    ChannelClosed,
}

impl std::fmt::Display for DebouncerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelClosed => write!(f, "debouncer channel closed"),
        }
    }
}

impl std::error::Error for DebouncerError {}

/// A value waiting for its debounce timer to expire.
#[derive(Debug)]
struct PendingEvent<V> {
    value: V,
    deadline: Instant,
}

/// Single-slot debouncer: at most one timer, last value wins.
#[derive(Debug)]
pub struct Debouncer<V>
where
    V: Send + 'static,
{
    /// Channel for sending values to the background task.
    input_tx: mpsc::Sender<V>,
    /// Handle to the background task.
    task_handle: tokio::task::JoinHandle<()>,
}

impl<V> Debouncer<V>
where
    V: Debug + Send + 'static,
{
    /// Creates a debouncer and spawns its background task.
    ///
    /// # Arguments
    ///
    /// * `interval` - Quiet period required before a value is delivered
    /// * `output_tx` - Channel receiving debounced values
    /// * `shutdown` - Flag that cancels the pending value and stops delivery
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(
        interval: Duration,
        output_tx: mpsc::Sender<V>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);

        let task_handle = tokio::spawn(async move {
            run_debounce_loop(interval, input_rx, output_tx, shutdown).await;
        });

        Self {
            input_tx,
            task_handle,
        }
    }

    /// Submits a value, replacing any pending one and restarting the timer.
    ///
    /// # Errors
    ///
    /// Returns `DebouncerError::ChannelClosed` if the background task has
    /// terminated.
    pub async fn send(&self, value: V) -> Result<(), DebouncerError> {
        self.input_tx
            .send(value)
            .await
            .map_err(|_| DebouncerError::ChannelClosed)
    }

    /// Submits a value without waiting, for use from synchronous code.
    ///
    /// Returns `false` if the queue is full or the task has stopped.
    pub fn try_send(&self, value: V) -> bool {
        self.input_tx.try_send(value).is_ok()
    }

    /// Returns `true` while the background task is alive.
    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }
}

/// Runs the debounce loop until shutdown or until the input side closes.
async fn run_debounce_loop<V>(
    interval: Duration,
    mut input_rx: mpsc::Receiver<V>,
    output_tx: mpsc::Sender<V>,
    mut shutdown: watch::Receiver<bool>,
) where
    V: Debug,
{
    let mut pending: Option<PendingEvent<V>> = None;

    debug!(interval_ms = interval.as_millis() as u64, "Starting debounce loop");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let next_deadline = pending.as_ref().map(|p| p.deadline);

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Sender dropped: treat as shutdown.
                    break;
                }
            }

            event = input_rx.recv() => {
                match event {
                    Some(value) => {
                        trace!(value = ?value, "Received event, resetting timer");
                        pending = Some(PendingEvent {
                            value,
                            deadline: Instant::now() + interval,
                        });
                    }
                    None => break,
                }
            }

            _ = async {
                match next_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                if let Some(event) = pending.take() {
                    if *shutdown.borrow() {
                        break;
                    }
                    debug!(value = ?event.value, "Emitting debounced event");
                    if output_tx.send(event.value).await.is_err() {
                        debug!("Debounce output receiver dropped");
                        break;
                    }
                }
            }
        }
    }

    if let Some(event) = pending.take() {
        trace!(value = ?event.value, "Discarding pending event on shutdown");
    }
    debug!("Debounce loop terminated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    /// Helper to create a debouncer with a short interval for testing.
    fn test_debouncer<V>(
        interval_ms: u64,
    ) -> (Debouncer<V>, mpsc::Receiver<V>, watch::Sender<bool>)
    where
        V: Debug + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(100);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let debouncer = Debouncer::new(Duration::from_millis(interval_ms), tx, shutdown_rx);
        (debouncer, rx, shutdown_tx)
    }

    #[tokio::test]
    async fn test_single_event_emitted_after_interval() {
        let (debouncer, mut rx, _shutdown) = test_debouncer::<i32>(50);

        debouncer.send(42).await.unwrap();

        let result = timeout(Duration::from_millis(300), rx.recv()).await;
        assert_eq!(result.expect("should receive within timeout"), Some(42));
    }

    #[tokio::test]
    async fn test_burst_collapses_to_last_value() {
        let (debouncer, mut rx, _shutdown) = test_debouncer::<i32>(50);

        for i in 0..100 {
            debouncer.send(i).await.unwrap();
        }

        let result = timeout(Duration::from_millis(300), rx.recv()).await;
        assert_eq!(result.unwrap(), Some(99), "should emit the last value");

        let more = timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(more.is_err(), "burst must produce exactly one delivery");
    }

    #[tokio::test]
    async fn test_timer_reset_on_new_event() {
        let (debouncer, mut rx, _shutdown) = test_debouncer::<i32>(100);

        debouncer.send(1).await.unwrap();
        sleep(Duration::from_millis(60)).await;
        debouncer.send(2).await.unwrap();
        sleep(Duration::from_millis(60)).await;
        debouncer.send(3).await.unwrap();

        // 120ms after the first event nothing has fired yet.
        assert!(rx.try_recv().is_err());

        let result = timeout(Duration::from_millis(400), rx.recv()).await;
        assert_eq!(result.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_event_not_emitted_before_interval() {
        let (debouncer, mut rx, _shutdown) = test_debouncer::<i32>(150);

        tokio_test::assert_ok!(debouncer.send(42).await);

        {
            let mut recv = tokio_test::task::spawn(rx.recv());
            tokio_test::assert_pending!(recv.poll());
        }
        let early = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(early.is_err(), "should not receive before the interval");

        let late = timeout(Duration::from_millis(400), rx.recv()).await;
        assert_eq!(late.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_sequential_bursts_each_deliver() {
        let (debouncer, mut rx, _shutdown) = test_debouncer::<&'static str>(40);

        debouncer.send("first").await.unwrap();
        let first = timeout(Duration::from_millis(300), rx.recv()).await;
        assert_eq!(first.unwrap(), Some("first"));

        debouncer.send("second").await.unwrap();
        let second = timeout(Duration::from_millis(300), rx.recv()).await;
        assert_eq!(second.unwrap(), Some("second"));
    }

    #[tokio::test]
    async fn test_shutdown_discards_pending_event() {
        let (debouncer, mut rx, shutdown) = test_debouncer::<i32>(100);

        debouncer.send(7).await.unwrap();
        shutdown.send_replace(true);

        let result = timeout(Duration::from_millis(300), rx.recv()).await;
        match result {
            Ok(None) => {}
            Ok(Some(v)) => panic!("no value may be delivered after shutdown, got {v}"),
            Err(_) => panic!("output channel should close once the task exits"),
        }
        sleep(Duration::from_millis(20)).await;
        assert!(!debouncer.is_running());
    }

    #[tokio::test]
    async fn test_dropping_shutdown_sender_stops_task() {
        let (debouncer, mut rx, shutdown) = test_debouncer::<i32>(100);

        debouncer.send(1).await.unwrap();
        drop(shutdown);

        let result = timeout(Duration::from_millis(300), rx.recv()).await;
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let (debouncer, _rx, shutdown) = test_debouncer::<i32>(10);

        shutdown.send_replace(true);
        sleep(Duration::from_millis(50)).await;

        assert_eq!(debouncer.send(1).await, Err(DebouncerError::ChannelClosed));
        assert!(!debouncer.try_send(2));
    }

    #[tokio::test]
    async fn test_try_send_success() {
        let (debouncer, mut rx, _shutdown) = test_debouncer::<i32>(20);

        assert!(debouncer.try_send(5));

        let result = timeout(Duration::from_millis(300), rx.recv()).await;
        assert_eq!(result.unwrap(), Some(5));
    }

    #[test]
    fn test_default_interval_constant() {
        assert_eq!(DEFAULT_DEBOUNCE_MS, 300);
    }

    #[test]
    fn test_debouncer_error_display() {
        assert_eq!(
            DebouncerError::ChannelClosed.to_string(),
            "debouncer channel closed"
        );
    }
}
