//! The set of open log files.
//!
//! A `Session` owns one entry per open file: the shared `LogData` (also
//! held by its indexing worker while one runs), the filtered projection of
//! it, and the lifecycle state. Views are created through a caller-supplied
//! factory and handed back; the session only knows them by `ViewId`.
//!
//! Indexing is asynchronous. Workers report through a channel that
//! [`Session::pump`] drains on the interaction thread, which is also where
//! entries move from `Opening` to `Ready`.

mod snapshot;

pub use snapshot::{SessionFile, SessionSnapshot};

use crate::data::{FileInfo, LoadEvent, LoadEventKind, LoadOutcome, LogData, LogFilteredData};
use crate::search::{QuickFindPattern, SearchHistory};
use crate::store::{Store, StoreError};
use crate::tlog;
use crate::view::LogView;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use thiserror::Error;

/// Identity of an open view. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of an entry. A closed entry is simply gone from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Opening,
    Ready,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot read {}: {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A load event for a live view, after ordering checks.
    Load { view: ViewId, event: LoadEventKind },
    /// The first load of the view finished and its data is usable.
    Ready(ViewId),
    /// The first load failed; the view should be closed.
    Failed { view: ViewId, reason: String },
}

pub struct OpenedView<V> {
    pub id: ViewId,
    pub view: Rc<RefCell<V>>,
}

/// What the window layer reports about a view when saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedView {
    pub view: ViewId,
    pub scroll_position: u64,
    pub view_state: Option<String>,
}

pub struct RestoredView<V> {
    pub path: PathBuf,
    pub id: ViewId,
    pub view: Rc<RefCell<V>>,
    pub scroll_position: u64,
    pub view_state: Option<String>,
}

pub struct Restored<V> {
    pub views: Vec<RestoredView<V>>,
    /// Which restored view was current. Not persisted, so always `None`.
    pub current_index: Option<usize>,
}

/// Ordering guard for one entry's load events.
#[derive(Debug, Default)]
struct LoadTracker {
    generation: u64,
    last_progress: Option<u8>,
    finished: bool,
}

impl LoadTracker {
    /// Whether `event` may be delivered. Older loads are ignored, progress
    /// never goes backwards and nothing follows a terminal event.
    fn accept(&mut self, event: &LoadEvent) -> bool {
        if event.generation < self.generation {
            return false;
        }
        if event.generation > self.generation {
            *self = Self {
                generation: event.generation,
                ..Self::default()
            };
        }
        if self.finished {
            return false;
        }
        match event.kind {
            LoadEventKind::Progress(percent) => {
                if self.last_progress.is_some_and(|last| percent < last) {
                    return false;
                }
                self.last_progress = Some(percent);
            }
            LoadEventKind::Finished(_) => self.finished = true,
        }
        true
    }
}

struct OpenFile {
    path: PathBuf,
    log_data: Arc<LogData>,
    filtered_data: Rc<RefCell<LogFilteredData>>,
    state: FileState,
    tracker: LoadTracker,
}

pub struct Session {
    store: Rc<Store>,
    files: BTreeMap<ViewId, OpenFile>,
    next_id: u64,
    events_tx: Sender<(ViewId, LoadEvent)>,
    events_rx: Receiver<(ViewId, LoadEvent)>,
    quick_find_pattern: Rc<RefCell<QuickFindPattern>>,
    search_history: Rc<RefCell<SearchHistory>>,
}

impl Session {
    pub fn new(store: Rc<Store>) -> Result<Self, SessionError> {
        let history = store.search_history()?;
        let (events_tx, events_rx) = mpsc::channel();
        Ok(Self {
            store,
            files: BTreeMap::new(),
            next_id: 1,
            events_tx,
            events_rx,
            quick_find_pattern: Rc::new(RefCell::new(QuickFindPattern::new())),
            search_history: Rc::new(RefCell::new(history)),
        })
    }

    /// Opens `path` in a new view built by `view_factory`. Fails without
    /// touching the table when the file cannot be read; otherwise returns
    /// as soon as indexing has started.
    pub fn open<V, F>(&mut self, path: &Path, view_factory: F) -> Result<OpenedView<V>, SessionError>
    where
        V: LogView,
        F: FnOnce() -> V,
    {
        check_readable(path).map_err(|source| {
            tlog!(warn, "cannot open {}: {}", path.display(), source);
            SessionError::FileUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(self.open_always(path, view_factory))
    }

    /// Stops the view's worker, waits for it, then forgets the view.
    pub fn close(&mut self, view: ViewId) {
        let entry = self.entry(view);
        entry.log_data.interrupt_loading();
        let path = entry.path.clone();
        self.files.remove(&view);
        tlog!(info, "closed {} ({})", view, path.display());
    }

    pub fn filename(&self, view: ViewId) -> &Path {
        &self.entry(view).path
    }

    pub fn file_info(&self, view: ViewId) -> FileInfo {
        self.entry(view).log_data.file_info()
    }

    pub fn state(&self, view: ViewId) -> FileState {
        self.entry(view).state
    }

    pub fn log_data(&self, view: ViewId) -> Arc<LogData> {
        Arc::clone(&self.entry(view).log_data)
    }

    pub fn filtered_data(&self, view: ViewId) -> Rc<RefCell<LogFilteredData>> {
        Rc::clone(&self.entry(view).filtered_data)
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.files.contains_key(&view)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Open views in the order they were opened.
    pub fn views(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.files.keys().copied()
    }

    pub fn quick_find_pattern(&self) -> Rc<RefCell<QuickFindPattern>> {
        Rc::clone(&self.quick_find_pattern)
    }

    pub fn search_history(&self) -> Rc<RefCell<SearchHistory>> {
        Rc::clone(&self.search_history)
    }

    pub fn save_search_history(&self) -> Result<(), SessionError> {
        self.store.save_search_history(&self.search_history.borrow())?;
        Ok(())
    }

    /// Persists `views` in the given order. Views left out are not saved.
    pub fn save(&self, views: &[SavedView]) -> Result<(), SessionError> {
        let snapshot = SessionSnapshot {
            files: views
                .iter()
                .map(|saved| SessionFile {
                    path: self.entry(saved.view).path.clone(),
                    scroll_position: saved.scroll_position,
                    view_state: saved.view_state.clone(),
                })
                .collect(),
        };
        self.store.save_session(&snapshot)?;
        tlog!(info, "saved session ({} files)", snapshot.len());
        Ok(())
    }

    /// Reopens every file of the saved session, in saved order. Files are
    /// not checked up front; one that is gone fails through `pump`.
    pub fn restore<V, F>(&mut self, mut view_factory: F) -> Result<Restored<V>, SessionError>
    where
        V: LogView,
        F: FnMut() -> V,
    {
        let snapshot = self.store.session()?;
        tlog!(info, "restoring session ({} files)", snapshot.len());

        let mut views = Vec::with_capacity(snapshot.len());
        for file in snapshot.files {
            let opened = self.open_always(&file.path, &mut view_factory);
            views.push(RestoredView {
                path: file.path,
                id: opened.id,
                view: opened.view,
                scroll_position: file.scroll_position,
                view_state: file.view_state,
            });
        }
        Ok(Restored {
            views,
            current_index: None,
        })
    }

    /// Polls file watchers and delivers pending load events. Events of
    /// closed views and of superseded loads are discarded here.
    pub fn pump(&mut self) -> Vec<SessionEvent> {
        for file in self.files.values() {
            file.log_data.check_for_changes();
        }

        let mut events = Vec::new();
        while let Ok((id, event)) = self.events_rx.try_recv() {
            let Some(file) = self.files.get_mut(&id) else {
                tlog!(info, "dropped load event for closed view {}", id);
                continue;
            };
            if event.generation < file.log_data.generation() {
                tlog!(info, "dropped event of superseded load for view {}", id);
                continue;
            }
            if !file.tracker.accept(&event) {
                continue;
            }

            let outcome = match &event.kind {
                LoadEventKind::Finished(outcome) => Some(outcome.clone()),
                LoadEventKind::Progress(_) => None,
            };
            events.push(SessionEvent::Load {
                view: id,
                event: event.kind,
            });

            match outcome {
                Some(outcome) if file.state == FileState::Opening => {
                    if let LoadOutcome::Failed(reason) = outcome {
                        tlog!(error, "loading {} failed: {}", file.path.display(), reason);
                        events.push(SessionEvent::Failed { view: id, reason });
                    } else {
                        file.state = FileState::Ready;
                        tlog!(
                            info,
                            "{} ready: {} lines",
                            file.path.display(),
                            file.log_data.line_count()
                        );
                        events.push(SessionEvent::Ready(id));
                    }
                }
                _ => {}
            }
        }
        events
    }

    fn open_always<V, F>(&mut self, path: &Path, view_factory: F) -> OpenedView<V>
    where
        V: LogView,
        F: FnOnce() -> V,
    {
        let id = ViewId(self.next_id);
        self.next_id += 1;

        let log_data = Arc::new(LogData::new());
        let filtered_data = Rc::new(RefCell::new(log_data.new_filtered_view()));

        let view = Rc::new(RefCell::new(view_factory()));
        {
            let mut v = view.borrow_mut();
            v.set_data(Arc::clone(&log_data), Rc::downgrade(&filtered_data));
            v.set_quick_find_pattern(Rc::clone(&self.quick_find_pattern));
            v.set_search_history(Rc::clone(&self.search_history));
            v.hide();
        }

        let tx = self.events_tx.clone();
        log_data.set_notifier(Arc::new(move |event| {
            let _ = tx.send((id, event));
        }));

        self.files.insert(
            id,
            OpenFile {
                path: path.to_path_buf(),
                log_data: Arc::clone(&log_data),
                filtered_data,
                state: FileState::Opening,
                tracker: LoadTracker::default(),
            },
        );
        log_data.attach_file(path);
        tlog!(info, "opening {} as view {}", path.display(), id);

        OpenedView { id, view }
    }

    fn entry(&self, view: ViewId) -> &OpenFile {
        match self.files.get(&view) {
            Some(entry) => entry,
            None => panic!("view {} is not open in this session", view),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for file in self.files.values() {
            file.log_data.interrupt_loading();
        }
    }
}

fn check_readable(path: &Path) -> io::Result<()> {
    if std::fs::metadata(path)?.is_dir() {
        return Err(io::Error::other("is a directory"));
    }
    std::fs::File::open(path)?;
    Ok(())
}
