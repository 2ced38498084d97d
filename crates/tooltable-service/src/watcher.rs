//! Tool table file watcher
//!
//! Watches the directory holding the file rather than the file itself so
//! editors that replace the file on save are still seen. Change
//! notifications are forwarded to a tokio channel.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use tooltable_core::{Error, Result};

/// Watches one file for external changes
pub struct FileWatcher {
    path: PathBuf,
    dir: PathBuf,
    watcher: Mutex<RecommendedWatcher>,
    armed: Arc<AtomicBool>,
}

impl FileWatcher {
    /// Start watching `path`. Returns the watcher and the channel that
    /// receives one message per relevant change.
    pub fn new(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<()>)> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name: OsString = path
            .file_name()
            .ok_or_else(|| Error::other(format!("Not a file path: {}", path.display())))?
            .to_os_string();

        let (tx, rx) = mpsc::unbounded_channel();
        let armed = Arc::new(AtomicBool::new(false));
        let handler_armed = armed.clone();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_relevant(&event, &file_name) {
                    let _ = tx.send(());
                }
            }
            Err(e) => {
                tracing::warn!("Tool table watch error: {}", e);
                handler_armed.store(false, Ordering::SeqCst);
            }
        })
        .map_err(watch_error)?;

        let file_watcher = Self {
            path: path.to_path_buf(),
            dir,
            watcher: Mutex::new(watcher),
            armed,
        };
        file_watcher.ensure_armed();
        Ok((file_watcher, rx))
    }

    /// Re-add the watch if it was lost. Returns whether it is armed.
    pub fn ensure_armed(&self) -> bool {
        if self.is_armed() {
            return true;
        }
        match self
            .watcher
            .lock()
            .watch(&self.dir, RecursiveMode::NonRecursive)
        {
            Ok(()) => {
                tracing::debug!("Watching {}", self.path.display());
                self.armed.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                tracing::warn!("Cannot watch {}: {}", self.dir.display(), e);
                false
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Watched file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("path", &self.path)
            .field("armed", &self.is_armed())
            .finish()
    }
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    let kind_matches = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    kind_matches
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some_and(|name| name == file_name.as_os_str()))
}

fn watch_error(e: notify::Error) -> Error {
    Error::other(format!("File watch failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};
    use std::time::Duration;

    #[test]
    fn test_relevance() {
        let name = OsString::from("tool.tbl");
        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/cnc/tool.tbl"));
        assert!(is_relevant(&modify, &name));

        let other_file = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/cnc/tool.tbl.bak"));
        assert!(!is_relevant(&other_file, &name));

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/cnc/tool.tbl"));
        assert!(!is_relevant(&access, &name));
    }

    #[tokio::test]
    async fn test_change_is_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.tbl");
        std::fs::write(&path, ";Tool\n").unwrap();

        let (watcher, mut rx) = FileWatcher::new(&path).unwrap();
        assert!(watcher.is_armed());

        std::fs::write(&path, ";Tool\nT1 P1\n").unwrap();
        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(received, Ok(Some(()))));
    }
}
