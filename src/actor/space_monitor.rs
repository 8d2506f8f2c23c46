//! Watches the OS signal that desktop layout changed and republishes a
//! fresh snapshot per event.
//!
//! The signal channel is a well-known preferences file the OS deletes and
//! replaces whenever spaces are rearranged; the deletion is the event. The
//! monitor never polls: zero events are produced absent the OS signal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::EventKind;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

use crate::model::Snapshot;

/// Injected snapshot builder, decoupling the monitor from provider access.
pub type BuildFn = Arc<dyn Fn() -> Snapshot + Send + Sync>;

/// Stream of snapshots for one subscription. Dropping it cancels the
/// subscription and releases its watch.
pub type SnapshotStream = ReceiverStream<Snapshot>;

// The replaced file may not exist yet when the delete event arrives; allow
// a short window for the OS to write the replacement before giving up.
const REARM_RETRY_DELAY: Duration = Duration::from_millis(100);
const REARM_MAX_ATTEMPTS: u32 = 20;

/// Path of the preferences file whose deletion signals a layout change.
pub fn default_watch_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Library/Preferences/com.apple.spaces.plist"))
}

pub struct SpaceMonitor {
    watch_path: PathBuf,
    build: BuildFn,
}

impl SpaceMonitor {
    pub fn new(watch_path: PathBuf, build: BuildFn) -> Self {
        SpaceMonitor { watch_path, build }
    }

    /// Arm an independent watch/publish cycle. Each call establishes its own
    /// watch on the same signal file; subscriptions only see events from
    /// their own point of subscription onward, with no replay.
    ///
    /// If the watch cannot be opened the subscription stays permanently
    /// inert (the stream ends immediately); the process is unaffected.
    pub fn subscribe(&self) -> SnapshotStream {
        // Capacity 1: one event in flight at a time; rapid repeated signals
        // serialize through the rebuild step.
        let (out_tx, out_rx) = mpsc::channel(1);
        tokio::spawn(run_subscription(self.watch_path.clone(), self.build.clone(), out_tx));
        ReceiverStream::new(out_rx)
    }
}

async fn run_subscription(path: PathBuf, build: BuildFn, out_tx: mpsc::Sender<Snapshot>) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut watcher = match new_watcher(event_tx) {
        Ok(watcher) => watcher,
        Err(err) => {
            warn!(%err, "could not create space change watcher");
            return;
        }
    };
    if let Err(err) = watcher.watch(&path, RecursiveMode::NonRecursive) {
        warn!(path = %path.display(), %err, "could not open space change watch");
        return;
    }
    trace!(path = %path.display(), "space change watch armed");

    loop {
        tokio::select! {
            _ = out_tx.closed() => {
                trace!("subscriber cancelled; releasing watch");
                break;
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if !is_remove_of(&event, &path) {
                    continue;
                }
                debug!("space configuration change signaled; rebuilding snapshot");
                let snapshot = build();
                if out_tx.send(snapshot).await.is_err() {
                    break;
                }
                // The deletion that fired this event also made the watch
                // handle permanently stale: the file was replaced, not
                // modified. Re-arm on the replacement.
                if !rearm(&mut watcher, &path).await {
                    break;
                }
            }
        }
    }
}

fn new_watcher(event_tx: mpsc::UnboundedSender<Event>) -> notify::Result<RecommendedWatcher> {
    notify::recommended_watcher(move |result: notify::Result<Event>| match result {
        Ok(event) => {
            let _ = event_tx.send(event);
        }
        Err(err) => warn!(%err, "space change watch error"),
    })
}

fn is_remove_of(event: &Event, path: &Path) -> bool {
    matches!(event.kind, EventKind::Remove(_)) && event.paths.iter().any(|p| p == path)
}

async fn rearm(watcher: &mut RecommendedWatcher, path: &Path) -> bool {
    // The old handle points at the deleted file; drop it first.
    let _ = watcher.unwatch(path);
    for attempt in 1..=REARM_MAX_ATTEMPTS {
        match watcher.watch(path, RecursiveMode::NonRecursive) {
            Ok(()) => {
                trace!(attempt, "space change watch re-armed");
                return true;
            }
            Err(err) if attempt == REARM_MAX_ATTEMPTS => {
                warn!(%err, "could not re-arm space change watch; ending subscription");
            }
            Err(_) => tokio::time::sleep(REARM_RETRY_DELAY).await,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    use super::*;

    const EVENT_WAIT: Duration = Duration::from_secs(10);
    const SETTLE: Duration = Duration::from_millis(300);

    fn counting_monitor(path: PathBuf) -> (SpaceMonitor, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let build: BuildFn = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Snapshot::empty()
        });
        (SpaceMonitor::new(path, build), builds)
    }

    #[test_log::test(tokio::test)]
    async fn publishes_one_snapshot_per_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.plist");
        std::fs::write(&path, b"spaces").unwrap();

        let (monitor, builds) = counting_monitor(path.clone());
        let mut stream = monitor.subscribe();
        tokio::time::sleep(SETTLE).await;

        std::fs::remove_file(&path).unwrap();
        let first = timeout(EVENT_WAIT, stream.next()).await.expect("first event").unwrap();
        assert_eq!(first, Snapshot::empty());

        // Replace the file so the watch can re-arm, then signal again.
        std::fs::write(&path, b"spaces").unwrap();
        tokio::time::sleep(SETTLE).await;
        std::fs::remove_file(&path).unwrap();
        timeout(EVENT_WAIT, stream.next()).await.expect("second event").unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test_log::test(tokio::test)]
    async fn cancellation_stops_event_production() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.plist");
        std::fs::write(&path, b"spaces").unwrap();

        let (monitor, builds) = counting_monitor(path.clone());
        let mut stream = monitor.subscribe();
        tokio::time::sleep(SETTLE).await;

        std::fs::remove_file(&path).unwrap();
        timeout(EVENT_WAIT, stream.next()).await.expect("first event").unwrap();
        std::fs::write(&path, b"spaces").unwrap();
        tokio::time::sleep(SETTLE).await;
        drop(stream);
        tokio::time::sleep(SETTLE).await;

        // Signal again after cancellation; no rebuild may happen.
        std::fs::remove_file(&path).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test_log::test(tokio::test)]
    async fn unopenable_watch_ends_the_stream() {
        let path = PathBuf::from("/nonexistent-dir/nonexistent.plist");
        let (monitor, builds) = counting_monitor(path);
        let mut stream = monitor.subscribe();

        let end = timeout(EVENT_WAIT, stream.next()).await.expect("stream should end");
        assert_eq!(end, None);
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    #[test_log::test(tokio::test)]
    async fn subscriptions_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.plist");
        std::fs::write(&path, b"spaces").unwrap();

        let (monitor, builds) = counting_monitor(path.clone());
        let mut first = monitor.subscribe();
        let mut second = monitor.subscribe();
        tokio::time::sleep(SETTLE).await;

        std::fs::remove_file(&path).unwrap();
        timeout(EVENT_WAIT, first.next()).await.expect("first subscriber").unwrap();
        timeout(EVENT_WAIT, second.next()).await.expect("second subscriber").unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test_log::test(tokio::test)]
    async fn non_remove_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.plist");
        std::fs::write(&path, b"spaces").unwrap();

        let (monitor, builds) = counting_monitor(path.clone());
        let _stream = monitor.subscribe();
        tokio::time::sleep(SETTLE).await;

        std::fs::write(&path, b"modified in place").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }
}
