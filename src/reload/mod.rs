// Hot reload of the access documents
//
// A notify watcher on the documents' parent directories feeds a channel.
// Editors write files in several steps, so bursts of events within the
// debounce window collapse into a single reload.

use crate::access::{ConfigPaths, ConfigStore};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default quiet period before a reload runs
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Keeps the file watcher alive; dropping it stops hot reload.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start watching both access documents and reload `store` on change.
///
/// Paths are made absolute first: notify reports events under the watched
/// directory, so `users.yaml` would otherwise never equal `./users.yaml`.
pub fn watch_config_files(
    store: Arc<ConfigStore>,
    paths: ConfigPaths,
    debounce: Duration,
) -> Result<ConfigWatcher, notify::Error> {
    let paths = absolute_paths(&paths).map_err(notify::Error::io)?;
    let (tx, rx) = mpsc::unbounded_channel::<()>();

    let filter = paths.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if is_relevant(&event, &filter) {
                debug!(paths = ?event.paths, "Config file changed");
                let _ = tx.send(());
            }
        }
        Err(e) => warn!(error = %e, "Config watcher error"),
    })?;

    for dir in watch_dirs(&paths) {
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    }
    info!(
        users = %paths.users.display(),
        permissions = %paths.permissions.display(),
        "Watching config files for changes"
    );

    let task = tokio::spawn(run_reload_loop(rx, store, paths, debounce));

    Ok(ConfigWatcher {
        _watcher: watcher,
        task,
    })
}

fn absolute_paths(paths: &ConfigPaths) -> std::io::Result<ConfigPaths> {
    Ok(ConfigPaths::new(
        std::path::absolute(&paths.users)?,
        std::path::absolute(&paths.permissions)?,
    ))
}

/// Wait for a change signal, then keep absorbing signals until the channel
/// has been quiet for `debounce`, then reload once. Exits when all senders
/// are dropped.
pub async fn run_reload_loop(
    mut rx: mpsc::UnboundedReceiver<()>,
    store: Arc<ConfigStore>,
    paths: ConfigPaths,
    debounce: Duration,
) {
    while rx.recv().await.is_some() {
        let mut closed = false;
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        // Errors are logged by the store; the previous config stays active
        let _ = store.reload(&paths);

        if closed {
            break;
        }
    }
    debug!("Config reload loop stopped");
}

fn is_relevant(event: &Event, paths: &ConfigPaths) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event.paths.iter().any(|p| paths.contains(p))
}

/// Parent directories of both documents, deduplicated. Watching the
/// directory survives editors that replace the file by rename.
fn watch_dirs(paths: &ConfigPaths) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    [&paths.users, &paths.permissions]
        .into_iter()
        .map(|p| parent_dir(p))
        .filter(|d| seen.insert(d.clone()))
        .collect()
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
