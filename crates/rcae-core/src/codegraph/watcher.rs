//! Background file watcher for incremental scans (§4.2 "State")
//!
//! A single watcher lives at process scope, `OnceLock`-backed the way the
//! embedding model singleton is (see [`crate::embeddings`]). `start_watch`
//! is a no-op if a watcher is already running; `stop_watch` is a no-op if
//! none is.

use super::scan::{CodeGraphBuilder, ScanOptions};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watcher setup failed: {0}")]
    Setup(#[from] notify::Error),
}

struct ActiveWatcher {
    _watcher: RecommendedWatcher,
    stop: Sender<()>,
}

static WATCHER: OnceLock<Mutex<Option<ActiveWatcher>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<ActiveWatcher>> {
    WATCHER.get_or_init(|| Mutex::new(None))
}

/// Starts watching `options.root` for changes, re-running `scan` on a
/// debounce interval after each filesystem event. No-op if already running.
pub fn start_watch(
    builder: Arc<CodeGraphBuilder>,
    options: ScanOptions,
    debounce: Duration,
) -> Result<(), WatchError> {
    let mut guard = slot().lock().unwrap();
    if guard.is_some() {
        return Ok(());
    }

    let (event_tx, event_rx) = channel();
    let (stop_tx, stop_rx) = channel();

    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = event_tx.send(res);
    })?;
    watcher.watch(&options.root, RecursiveMode::Recursive)?;

    std::thread::spawn(move || loop {
        if stop_rx.try_recv().is_ok() {
            break;
        }
        match event_rx.recv_timeout(debounce) {
            Ok(Ok(_event)) => {
                while event_rx.recv_timeout(debounce).is_ok() {}
                if let Err(err) = builder.scan(&options) {
                    tracing::error!(error = %err, "rescan after file change failed");
                }
            }
            Ok(Err(err)) => tracing::warn!(error = %err, "watch event error"),
            Err(_) => continue,
        }
    });

    *guard = Some(ActiveWatcher {
        _watcher: watcher,
        stop: stop_tx,
    });
    Ok(())
}

/// Idempotent shutdown: no-op if no watcher is running.
pub fn stop_watch() {
    let mut guard = slot().lock().unwrap();
    if let Some(active) = guard.take() {
        let _ = active.stop.send(());
    }
}

pub fn is_watching() -> bool {
    slot().lock().unwrap().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_watch_is_noop_when_absent() {
        stop_watch();
        assert!(!is_watching());
    }
}
