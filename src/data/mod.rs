mod filtered;
mod indexer;
mod watch;

pub use filtered::{LogFilteredData, SearchProgress};
pub use watch::FileWatcher;

use crate::tlog;

use chrono::{DateTime, Utc};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;

use indexer::IndexMode;

/// Callback through which a worker reports progress. Installed by the owner
/// of the data object before `attach_file`; called from the worker thread.
pub type LoadNotifier = Arc<dyn Fn(LoadEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed,
    /// Stopped on request; whatever was indexed so far stays usable.
    Interrupted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEventKind {
    Progress(u8),
    Finished(LoadOutcome),
}

/// One notification of one load. Every load started by a `LogData` gets a
/// new, strictly larger generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadEvent {
    pub generation: u64,
    pub kind: LoadEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub line_count: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Line offsets discovered so far. `line_ends[i]` is the offset just past
/// the newline closing line `i`; bytes after the last newline form a
/// trailing partial line.
#[derive(Debug, Default)]
struct LineIndex {
    line_ends: Vec<u64>,
    indexed_size: u64,
    last_modified: Option<DateTime<Utc>>,
}

impl LineIndex {
    fn complete_end(&self) -> u64 {
        self.line_ends.last().copied().unwrap_or(0)
    }

    fn line_count(&self) -> u64 {
        let complete = self.line_ends.len() as u64;
        if self.indexed_size > self.complete_end() {
            complete + 1
        } else {
            complete
        }
    }

    fn line_range(&self, line: u64) -> Option<(u64, u64)> {
        if line >= self.line_count() {
            return None;
        }
        let idx = line as usize;
        let start = if idx == 0 { 0 } else { self.line_ends[idx - 1] };
        let end = self
            .line_ends
            .get(idx)
            .copied()
            .unwrap_or(self.indexed_size);
        Some((start, end))
    }

    fn clear(&mut self) {
        self.line_ends.clear();
        self.indexed_size = 0;
    }
}

struct IndexWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Indexed view of one file on disk. Shared between its owner and the
/// background worker currently indexing it; all state is behind locks so
/// readers on the interaction thread see a consistent prefix of the index.
pub struct LogData {
    path: RwLock<Option<PathBuf>>,
    index: RwLock<LineIndex>,
    worker: Mutex<Option<IndexWorker>>,
    notifier: Mutex<Option<LoadNotifier>>,
    watcher: Mutex<Option<FileWatcher>>,
    generation: AtomicU64,
    pending_change: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LogData {
    pub fn new() -> Self {
        Self {
            path: RwLock::new(None),
            index: RwLock::new(LineIndex::default()),
            worker: Mutex::new(None),
            notifier: Mutex::new(None),
            watcher: Mutex::new(None),
            generation: AtomicU64::new(0),
            pending_change: AtomicBool::new(false),
        }
    }

    pub fn set_notifier(&self, notifier: LoadNotifier) {
        *lock(&self.notifier) = Some(notifier);
    }

    /// Starts indexing `path` in the background and watches it for changes.
    /// Returns immediately; completion is reported through the notifier.
    pub fn attach_file(self: &Arc<Self>, path: &Path) {
        *self.path.write().unwrap_or_else(PoisonError::into_inner) = Some(path.to_path_buf());

        match FileWatcher::watch(path) {
            Ok(watcher) => *lock(&self.watcher) = Some(watcher),
            Err(e) => tlog!(warn, "not watching {}: {}", path.display(), e),
        }

        self.start_indexing(IndexMode::Full);
    }

    /// Discards the index and reads the whole file again.
    pub fn reload(self: &Arc<Self>) {
        self.pending_change.store(false, Ordering::Relaxed);
        self.start_indexing(IndexMode::Full);
    }

    /// Drains the file watcher and starts an incremental update when the
    /// file changed and no load is running. Returns whether one started.
    pub fn check_for_changes(self: &Arc<Self>) -> bool {
        let changed = lock(&self.watcher)
            .as_ref()
            .is_some_and(FileWatcher::take_changed);
        if changed {
            self.pending_change.store(true, Ordering::Relaxed);
        }

        self.reap_finished_worker();

        if self.pending_change.load(Ordering::Relaxed) && !self.is_loading() {
            self.pending_change.store(false, Ordering::Relaxed);
            self.start_indexing(IndexMode::Update);
            return true;
        }
        false
    }

    /// Asks the running worker (if any) to stop and waits until it has.
    /// The worker's terminal event is sent before this returns.
    pub fn interrupt_loading(&self) {
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::Relaxed);
            if worker.handle.thread().id() != std::thread::current().id() {
                let _ = worker.handle.join();
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Generation of the most recently started load, 0 before the first.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn file_size(&self) -> u64 {
        self.read_index().indexed_size
    }

    pub fn line_count(&self) -> u64 {
        self.read_index().line_count()
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.read_index().last_modified
    }

    pub fn file_info(&self) -> FileInfo {
        let index = self.read_index();
        FileInfo {
            size: index.indexed_size,
            line_count: index.line_count(),
            last_modified: index.last_modified,
        }
    }

    pub fn new_filtered_view(self: &Arc<Self>) -> LogFilteredData {
        LogFilteredData::new(Arc::clone(self))
    }

    pub fn line(&self, line: u64) -> Option<String> {
        self.read_lines(line, 1).ok()?.into_iter().next()
    }

    /// Reads up to `count` lines starting at `first`, without their line
    /// terminators. Lines past the end of the index are not returned.
    pub fn read_lines(&self, first: u64, count: usize) -> std::io::Result<Vec<String>> {
        let ranges: Vec<(u64, u64)> = {
            let index = self.read_index();
            (first..first.saturating_add(count as u64))
                .map_while(|n| index.line_range(n))
                .collect()
        };
        let (Some(&(base, _)), Some(&(_, end))) = (ranges.first(), ranges.last()) else {
            return Ok(Vec::new());
        };
        let Some(path) = self.path() else {
            return Ok(Vec::new());
        };

        let mut file = std::fs::File::open(path)?;
        file.seek(SeekFrom::Start(base))?;
        let mut buf = Vec::with_capacity((end - base) as usize);
        file.take(end - base).read_to_end(&mut buf)?;

        Ok(ranges
            .iter()
            .map(|&(start, end)| {
                let from = ((start - base) as usize).min(buf.len());
                let to = ((end - base) as usize).min(buf.len());
                let mut bytes = &buf[from..to];
                if let Some(stripped) = bytes.strip_suffix(b"\n") {
                    bytes = stripped;
                }
                if let Some(stripped) = bytes.strip_suffix(b"\r") {
                    bytes = stripped;
                }
                String::from_utf8_lossy(bytes).into_owned()
            })
            .collect())
    }

    fn start_indexing(self: &Arc<Self>, mode: IndexMode) {
        self.interrupt_loading();
        let Some(path) = self.path() else {
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let stop = Arc::new(AtomicBool::new(false));
        let data = Arc::clone(self);
        let stop_clone = Arc::clone(&stop);

        tlog!(
            info,
            "indexing {} ({:?}, load #{})",
            path.display(),
            mode,
            generation
        );
        let handle = std::thread::spawn(move || {
            indexer::run(data, path, mode, generation, stop_clone);
        });

        *lock(&self.worker) = Some(IndexWorker { stop, handle });
    }

    fn reap_finished_worker(&self) {
        let mut guard = lock(&self.worker);
        if guard.as_ref().is_some_and(|w| w.handle.is_finished()) {
            if let Some(worker) = guard.take() {
                let _ = worker.handle.join();
            }
        }
    }

    fn notify(&self, event: LoadEvent) {
        let notifier = lock(&self.notifier).clone();
        if let Some(notifier) = notifier {
            notifier(event);
        }
    }

    fn read_index(&self) -> RwLockReadGuard<'_, LineIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, LineIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LogData {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything a view can page through line by line.
pub trait LineSource {
    fn line_count(&self) -> u64;
    fn lines(&self, first: u64, count: usize) -> Vec<String>;
}

impl LineSource for LogData {
    fn line_count(&self) -> u64 {
        LogData::line_count(self)
    }

    fn lines(&self, first: u64, count: usize) -> Vec<String> {
        match self.read_lines(first, count) {
            Ok(lines) => lines,
            Err(e) => {
                tlog!(warn, "reading lines {}+{}: {}", first, count, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    /// Attaches `path` and blocks until the first load finishes, returning
    /// every event it produced.
    pub(crate) fn load_blocking(data: &Arc<LogData>, path: &Path) -> Vec<LoadEvent> {
        let (tx, rx) = mpsc::channel();
        data.set_notifier(Arc::new(move |ev| {
            let _ = tx.send(ev);
        }));
        data.attach_file(path);
        collect_until_finished(&rx)
    }

    pub(crate) fn collect_until_finished(rx: &mpsc::Receiver<LoadEvent>) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        loop {
            let ev = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("load did not finish");
            let done = matches!(ev.kind, LoadEventKind::Finished(_));
            events.push(ev);
            if done {
                return events;
            }
        }
    }

    #[test]
    fn test_index_counts_lines_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "one\ntwo\r\nthree\n").unwrap();

        let data = Arc::new(LogData::new());
        let events = load_blocking(&data, &path);

        assert_eq!(
            events.last().unwrap().kind,
            LoadEventKind::Finished(LoadOutcome::Completed)
        );
        assert_eq!(data.line_count(), 3);
        assert_eq!(data.file_size(), 16);
        assert!(data.last_modified().is_some());
        assert_eq!(
            data.read_lines(0, 10).unwrap(),
            vec!["one", "two", "three"]
        );
        assert_eq!(data.line(1).as_deref(), Some("two"));
        assert_eq!(data.line(3), None);
    }

    #[test]
    fn test_trailing_partial_line_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.log");
        std::fs::write(&path, "first\nsecond").unwrap();

        let data = Arc::new(LogData::new());
        load_blocking(&data, &path);

        assert_eq!(data.line_count(), 2);
        assert_eq!(data.read_lines(1, 1).unwrap(), vec!["second"]);
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.log");
        std::fs::write(&path, "").unwrap();

        let data = Arc::new(LogData::new());
        let events = load_blocking(&data, &path);

        assert_eq!(data.line_count(), 0);
        assert_eq!(data.file_size(), 0);
        assert!(data.read_lines(0, 5).unwrap().is_empty());
        assert!(matches!(
            events.last().unwrap().kind,
            LoadEventKind::Finished(LoadOutcome::Completed)
        ));
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let data = Arc::new(LogData::new());
        let events = load_blocking(&data, &dir.path().join("gone.log"));

        match &events.last().unwrap().kind {
            LoadEventKind::Finished(LoadOutcome::Failed(reason)) => assert!(!reason.is_empty()),
            other => panic!("unexpected terminal event {:?}", other),
        }
    }

    #[test]
    fn test_progress_is_monotonic_and_terminal_is_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.log");
        let line = "x".repeat(99) + "\n";
        std::fs::write(&path, line.repeat(40_000)).unwrap();

        let data = Arc::new(LogData::new());
        let events = load_blocking(&data, &path);

        let mut last = 0u8;
        for ev in &events[..events.len() - 1] {
            match ev.kind {
                LoadEventKind::Progress(p) => {
                    assert!(p >= last);
                    last = p;
                }
                LoadEventKind::Finished(_) => panic!("terminal event before the end"),
            }
        }
        assert_eq!(data.line_count(), 40_000);
    }

    #[test]
    fn test_reload_picks_up_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.log");
        std::fs::write(&path, "a\nb").unwrap();

        let (tx, rx) = mpsc::channel();
        let data = Arc::new(LogData::new());
        data.set_notifier(Arc::new(move |ev| {
            let _ = tx.send(ev);
        }));
        data.attach_file(&path);
        collect_until_finished(&rx);
        assert_eq!(data.line_count(), 2);

        std::fs::write(&path, "a\nbc\nd\n").unwrap();
        data.reload();
        let events = collect_until_finished(&rx);
        assert!(events.iter().all(|e| e.generation == 2));
        assert_eq!(data.line_count(), 3);
        assert_eq!(data.read_lines(0, 3).unwrap(), vec!["a", "bc", "d"]);
    }

    #[test]
    fn test_update_after_shrink_reindexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shrink.log");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let (tx, rx) = mpsc::channel();
        let data = Arc::new(LogData::new());
        data.set_notifier(Arc::new(move |ev| {
            let _ = tx.send(ev);
        }));
        data.attach_file(&path);
        collect_until_finished(&rx);

        std::fs::write(&path, "z\n").unwrap();
        data.start_indexing(IndexMode::Update);
        collect_until_finished(&rx);
        assert_eq!(data.line_count(), 1);
        assert_eq!(data.line(0).as_deref(), Some("z"));
    }

    #[test]
    fn test_line_index_ranges() {
        let index = LineIndex {
            line_ends: vec![4, 9],
            indexed_size: 12,
            last_modified: None,
        };
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_range(0), Some((0, 4)));
        assert_eq!(index.line_range(1), Some((4, 9)));
        assert_eq!(index.line_range(2), Some((9, 12)));
        assert_eq!(index.line_range(3), None);
    }
}
