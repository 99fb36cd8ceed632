//! Integration tests for the store and watcher working on the same file.
//!
//! The watcher's notifications are hints; `reload_if_changed` decides, by
//! content hash, whether anything actually changed.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use lazytodo::self_write::SelfWriteGuard;
use lazytodo::store::{ReloadOutcome, TodoStore};
use lazytodo::watcher::{ChangeReason, FileWatcher, WatchConfig, WatchStrategy};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

// =============================================================================
// Test Helpers
// =============================================================================

struct Fixture {
    _dir: TempDir,
    store: TodoStore,
    watcher: FileWatcher,
    rx: mpsc::Receiver<ChangeReason>,
}

async fn fixture(content: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todo.txt");
    fs::write(&path, content).unwrap();

    let guard = Arc::new(SelfWriteGuard::new(Duration::from_millis(500)));
    let store = TodoStore::open(&path, Arc::clone(&guard)).unwrap();

    let config = WatchConfig::new(&path)
        .with_strategy(WatchStrategy::Polling)
        .with_poll_interval(Duration::from_millis(20))
        .with_debounce(Duration::from_millis(50));
    let (tx, rx) = mpsc::channel(16);
    let mut watcher = FileWatcher::new(config, guard).unwrap();
    watcher.start(tx).unwrap();

    // Let the poller settle on the initial file state.
    sleep(Duration::from_millis(100)).await;

    Fixture {
        _dir: dir,
        store,
        watcher,
        rx,
    }
}

fn raws(store: &TodoStore) -> Vec<&str> {
    store.todos().iter().map(|t| t.raw.as_str()).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn external_edit_is_reported_and_reloaded() {
    let mut fx = fixture("(A) call mom\n").await;

    fs::write(fx.store.path(), "(A) call mom\nbuy milk @store\n").unwrap();

    let reason = timeout(Duration::from_secs(5), fx.rx.recv())
        .await
        .expect("Timed out waiting for change")
        .expect("Channel closed");
    assert_eq!(reason, ChangeReason::Write);

    assert_eq!(fx.store.reload_if_changed().unwrap(), ReloadOutcome::Changed);
    assert_eq!(raws(&fx.store), vec!["(A) call mom", "buy milk @store"]);

    fx.watcher.stop();
}

#[tokio::test]
async fn own_save_never_causes_reload() {
    let mut fx = fixture("first\n").await;

    let id = fx.store.add("2024-01-01 second +home").unwrap();
    fx.store.toggle(id).unwrap();
    let before = fx.store.fingerprint();

    // Whatever the watcher reports for our own write, the content matches.
    let _ = timeout(Duration::from_millis(400), fx.rx.recv()).await;
    assert_eq!(
        fx.store.reload_if_changed().unwrap(),
        ReloadOutcome::Unchanged
    );
    assert_eq!(fx.store.fingerprint(), before);
    assert_eq!(fx.store.len(), 2);
    assert!(fx.store.get(id).is_some_and(|t| t.completed));

    fx.watcher.stop();
}

#[tokio::test]
async fn external_edit_right_after_save_is_not_lost() {
    let mut fx = fixture("first\n").await;

    fx.store.add("2024-01-01 mine").unwrap();
    // Suppression ends when the save returns, not after the TTL.
    fs::write(fx.store.path(), "first\n2024-01-01 mine\ntheirs\n").unwrap();

    timeout(Duration::from_secs(5), fx.rx.recv())
        .await
        .expect("Timed out waiting for change")
        .expect("Channel closed");

    assert_eq!(fx.store.reload_if_changed().unwrap(), ReloadOutcome::Changed);
    assert_eq!(raws(&fx.store), vec!["first", "2024-01-01 mine", "theirs"]);

    fx.watcher.stop();
}

#[tokio::test]
async fn deleted_file_reloads_as_empty() {
    let mut fx = fixture("first\nsecond\n").await;

    fs::remove_file(fx.store.path()).unwrap();

    let reason = timeout(Duration::from_secs(5), fx.rx.recv())
        .await
        .expect("Timed out waiting for change")
        .expect("Channel closed");
    assert_eq!(reason, ChangeReason::Replace);

    assert_eq!(fx.store.reload_if_changed().unwrap(), ReloadOutcome::Changed);
    assert!(fx.store.is_empty());

    // Saving recreates the file.
    fx.store.add("2024-01-01 fresh start").unwrap();
    assert_eq!(
        fs::read_to_string(fx.store.path()).unwrap(),
        "2024-01-01 fresh start\n"
    );

    fx.watcher.stop();
}
