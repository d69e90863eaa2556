use crate::tlog;

use notify::event::{EventKind, ModifyKind};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver};
use thiserror::Error;

#[derive(Clone, Debug)]
pub enum WatchSignal {
    Changed,
    Error(String),
}

/// Watches a single file and queues change signals for the interaction
/// thread to pick up with `take_changed`.
#[derive(Debug)]
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<WatchSignal>,
}

#[derive(Debug, Error)]
pub enum WatchFileError {
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}

impl FileWatcher {
    pub fn watch(path: &Path) -> Result<Self, WatchFileError> {
        let (tx, rx) = channel::<WatchSignal>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if should_trigger_update(&event) {
                        let _ = tx.send(WatchSignal::Changed);
                    }
                }
                Err(error) => {
                    let _ = tx.send(WatchSignal::Error(error.to_string()));
                }
            },
            Config::default(),
        )?;

        watcher.watch(path, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Drains pending signals; true if any of them was a change.
    pub fn take_changed(&self) -> bool {
        let mut changed = false;
        while let Ok(signal) = self.rx.try_recv() {
            match signal {
                WatchSignal::Changed => changed = true,
                WatchSignal::Error(e) => tlog!(warn, "file watcher: {}", e),
            }
        }
        changed
    }
}

/// Content changes only; reads and attribute updates (atime, chmod) are
/// ignored.
fn should_trigger_update(event: &notify::Event) -> bool {
    !matches!(
        event.kind,
        EventKind::Access(_) | EventKind::Other | EventKind::Modify(ModifyKind::Metadata(_))
    )
}
