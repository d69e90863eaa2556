use crate::config::AppConfig;
use crate::data::{LoadOutcome, LogData};
use crate::router::{ActionArg, ActionId, BindingId, CommandRouter, FindNotification, FindRouter, Notification, Slot};
use crate::search::{HighlightRules, SearchDirection};
use crate::session::{FileState, SavedView, Session, SessionEvent, ViewId};
use crate::store::{RecentFiles, Settings, Store};
use crate::tlog;
use crate::view::{CrawlerView, LogView};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    Main,
    /// Quick-find bar.
    Find,
    /// Filter search prompt.
    Search,
    /// Path prompt for opening a file.
    Open,
    Recent,
    Options,
    Help,
    Log,
}

pub const OPTION_LABELS: [&str; 3] = [
    "Show match overview",
    "Line numbers in main view",
    "Line numbers in filtered view",
];

/// The window: tabs of open views over one `Session`.
pub struct App {
    config: AppConfig,
    store: Rc<Store>,
    session: Session,
    router: CommandRouter,
    find_router: FindRouter,
    views: HashMap<ViewId, Rc<RefCell<CrawlerView>>>,
    tabs: Vec<ViewId>,
    current: Option<ViewId>,
    settings: Settings,
    highlights: HighlightRules,
    recent: RecentFiles,
    view_mode: ViewMode,
    prompt: String,
    prompt_ignore_case: bool,
    history_cursor: usize,
    find_message: Option<String>,
    status: Option<String>,
    loading_percent: Option<u8>,
    current_line: Option<u64>,
    options_binding: Option<BindingId>,
    recent_cursor: usize,
    log_scroll: usize,
    should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig, store: Store) -> Result<Self> {
        let store = Rc::new(store);
        let session = Session::new(Rc::clone(&store))?;
        let settings = store.settings()?;
        let highlights = store.filter_set()?.compile();
        let recent = store.recent_files()?;

        let mut router = CommandRouter::new();
        router.connect(ActionId::Reload, Slot::Reload);
        router.connect(ActionId::StopLoading, Slot::StopLoading);
        router.connect(ActionId::FollowSet, Slot::SetFollow);
        router.connect(ActionId::OptionsChanged, Slot::ApplyConfiguration);
        router.connect(ActionId::SelectAll, Slot::SelectAll);

        let find_router = FindRouter::new(session.quick_find_pattern());

        Ok(Self {
            config,
            store,
            session,
            router,
            find_router,
            views: HashMap::new(),
            tabs: Vec::new(),
            current: None,
            settings,
            highlights,
            recent,
            view_mode: ViewMode::Main,
            prompt: String::new(),
            prompt_ignore_case: false,
            history_cursor: 0,
            find_message: None,
            status: None,
            loading_percent: None,
            current_line: None,
            options_binding: None,
            recent_cursor: 0,
            log_scroll: 0,
            should_quit: false,
        })
    }

    /// Opens the files given on the command line, or restores the
    /// previous session when there are none.
    pub fn open_initial(&mut self, files: &[PathBuf], restore_session: bool) {
        if !files.is_empty() {
            for path in files {
                self.open_file(path);
            }
        } else if restore_session {
            self.restore_session();
        }
    }

    pub fn open_file(&mut self, path: &Path) -> Option<ViewId> {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let settings = self.settings;
        match self.session.open(&path, || CrawlerView::new(settings)) {
            Ok(opened) => {
                self.views.insert(opened.id, opened.view);
                self.tabs.push(opened.id);
                self.add_recent(&path);
                self.switch_to(opened.id);
                Some(opened.id)
            }
            Err(e) => {
                tlog!(error, "{}", e);
                self.status = Some(e.to_string());
                None
            }
        }
    }

    fn restore_session(&mut self) {
        let settings = self.settings;
        let restored = match self.session.restore(|| CrawlerView::new(settings)) {
            Ok(restored) => restored,
            Err(e) => {
                tlog!(error, "session restore failed: {}", e);
                self.status = Some(format!("session restore failed: {}", e));
                return;
            }
        };

        for entry in restored.views {
            {
                let mut view = entry.view.borrow_mut();
                view.set_scroll_position(entry.scroll_position);
                if let Some(state) = &entry.view_state {
                    view.restore_state(state);
                }
            }
            self.views.insert(entry.id, entry.view);
            self.tabs.push(entry.id);
        }

        let current = restored
            .current_index
            .and_then(|i| self.tabs.get(i))
            .or(self.tabs.first())
            .copied();
        if let Some(id) = current {
            self.switch_to(id);
        }
    }

    fn add_recent(&mut self, path: &Path) {
        // Re-read first: another instance may have updated the list.
        let mut recent = match self.store.recent_files() {
            Ok(recent) => recent,
            Err(e) => {
                tlog!(warn, "reading recent files: {}", e);
                self.recent.clone()
            }
        };
        recent.add_recent(&path.to_string_lossy(), self.config.max_recent_files);
        if let Err(e) = self.store.save_recent_files(&recent) {
            tlog!(warn, "saving recent files: {}", e);
        }
        self.recent = recent;
    }

    pub fn switch_to(&mut self, id: ViewId) {
        let Some(view) = self.views.get(&id).cloned() else {
            return;
        };
        if let Some(old) = self.current_view() {
            if !Rc::ptr_eq(&old, &view) {
                old.borrow_mut().hide();
            }
        }
        if self.session.state(id) == FileState::Ready {
            view.borrow_mut().show();
        }

        let weak: Weak<RefCell<CrawlerView>> = Rc::downgrade(&view);
        self.router.set_active_view(Some(weak.clone()));
        self.find_router.register_selector(Some(weak));
        self.current = Some(id);

        self.router
            .dispatch(ActionId::OptionsChanged, ActionArg::Options(self.settings));

        let view = view.borrow();
        self.current_line = view.selected_line();
        self.loading_percent = view.is_loading().then_some(0);
        self.find_message = None;
    }

    pub fn close_view(&mut self, id: ViewId) {
        if !self.session.contains(id) {
            return;
        }
        if let Some(view) = self.views.get(&id) {
            view.borrow_mut().stop_loading();
        }
        self.session.close(id);
        self.views.remove(&id);

        let position = self.tabs.iter().position(|t| *t == id);
        if let Some(position) = position {
            self.tabs.remove(position);
        }

        if self.current == Some(id) {
            self.current = None;
            self.router.set_active_view(None);
            self.find_router.register_selector(None);
            self.loading_percent = None;
            self.current_line = None;

            let next = position
                .and_then(|p| self.tabs.get(p).or(self.tabs.last()))
                .copied();
            if let Some(next) = next {
                self.switch_to(next);
            }
        }
    }

    pub fn close_current(&mut self) {
        if let Some(id) = self.current {
            self.close_view(id);
        }
    }

    pub fn next_tab(&mut self) {
        self.cycle_tab(1);
    }

    pub fn prev_tab(&mut self) {
        self.cycle_tab(self.tabs.len().saturating_sub(1));
    }

    fn cycle_tab(&mut self, step: usize) {
        let Some(index) = self.current_tab_index() else {
            return;
        };
        let next = (index + step) % self.tabs.len();
        self.switch_to(self.tabs[next]);
    }

    pub fn select_tab(&mut self, index: usize) {
        if let Some(&id) = self.tabs.get(index) {
            self.switch_to(id);
        }
    }

    /// Delivers load events and search progress. Returns whether anything
    /// visible may have changed.
    pub fn tick(&mut self) -> bool {
        let mut dirty = false;

        for event in self.session.pump() {
            dirty = true;
            match event {
                SessionEvent::Load { view, event } => {
                    if let Some(v) = self.views.get(&view) {
                        v.borrow_mut().handle_load_event(&event);
                    }
                }
                SessionEvent::Ready(view) => {
                    if self.current == Some(view) {
                        self.loading_percent = None;
                        if let Some(v) = self.views.get(&view) {
                            v.borrow_mut().show();
                        }
                    }
                }
                SessionEvent::Failed { view, reason } => {
                    let path = self.session.filename(view).display().to_string();
                    self.status = Some(format!("cannot load {}: {}", path, reason));
                    self.close_view(view);
                }
            }
        }

        for view in self.views.values() {
            let mut view = view.borrow_mut();
            let before = view.search_status();
            view.tick(self.config.search_chunk_lines);
            dirty |= view.search_status() != before || view.is_following();
        }

        dirty |= self.relay_notifications();
        dirty
    }

    fn relay_notifications(&mut self) -> bool {
        let mut dirty = false;
        for notification in self.router.relay() {
            dirty = true;
            match notification {
                Notification::LoadingProgressed(percent) => self.loading_percent = Some(percent),
                Notification::LoadingFinished(outcome) => {
                    self.loading_percent = None;
                    match outcome {
                        LoadOutcome::Completed => {}
                        LoadOutcome::Interrupted => {
                            self.status = Some("loading interrupted".to_string())
                        }
                        LoadOutcome::Failed(reason) => self.status = Some(reason),
                    }
                }
                Notification::FollowDisabled => self.status = Some("follow off".to_string()),
                Notification::LineNumberChanged(line) => self.current_line = Some(line),
            }
        }

        for notification in self.find_router.take_notifications() {
            dirty = true;
            match notification {
                FindNotification::Found { line } => {
                    self.find_message = None;
                    self.current_line = Some(line);
                }
                FindNotification::NotFound { direction } => {
                    let towards = match direction {
                        SearchDirection::Forward => "below",
                        SearchDirection::Backward => "above",
                    };
                    self.find_message = Some(format!("not found {}", towards));
                }
                FindNotification::PatternChanged { text, .. } => self.prompt = text,
            }
        }
        dirty
    }

    // Commands routed to the current view.

    pub fn reload(&mut self) {
        self.router.dispatch(ActionId::Reload, ActionArg::None);
    }

    pub fn stop_loading(&mut self) {
        self.router.dispatch(ActionId::StopLoading, ActionArg::None);
    }

    pub fn toggle_follow(&mut self) {
        let following = self
            .current_view()
            .is_some_and(|v| v.borrow().is_following());
        self.router
            .dispatch(ActionId::FollowSet, ActionArg::Flag(!following));
    }

    pub fn select_all(&mut self) {
        self.router.dispatch(ActionId::SelectAll, ActionArg::None);
    }

    pub fn copy_selection(&mut self) {
        let Some(view) = self.current_view() else {
            return;
        };
        let text = view.borrow().selected_text();
        if text.is_empty() {
            self.status = Some("nothing selected".to_string());
            return;
        }
        let lines = text.lines().count();
        tlog!(info, "copied {} line(s):\n{}", lines, text);
        let first = text.lines().next().unwrap_or_default();
        self.status = Some(format!("copied {} line(s): {}", lines, first));
    }

    // Direct view navigation.

    pub fn with_current_view(&mut self, f: impl FnOnce(&mut CrawlerView)) {
        if let Some(view) = self.current_view() {
            f(&mut view.borrow_mut());
        }
        self.relay_notifications();
    }

    /// Lays the current view out for a body of `height` rows.
    pub fn resize(&mut self, height: u16) {
        for view in self.views.values() {
            let mut view = view.borrow_mut();
            let (main, filtered) = crate::ui::pane_heights(height, view.filtered_pane_visible());
            view.set_viewport(main, filtered);
        }
    }

    // Quick find.

    pub fn open_find(&mut self, direction: SearchDirection) {
        self.find_router.change_quick_find("", direction);
        self.relay_notifications();
        self.view_mode = ViewMode::Find;
    }

    pub fn search_next(&mut self) {
        self.find_router.search_next();
        self.relay_notifications();
    }

    pub fn search_previous(&mut self) {
        self.find_router.search_previous();
        self.relay_notifications();
    }

    pub fn find_direction(&self) -> SearchDirection {
        self.find_router.direction()
    }

    pub fn find_message(&self) -> Option<&str> {
        self.find_message.as_deref()
    }

    // Prompts.

    pub fn open_prompt(&mut self, mode: ViewMode) {
        self.prompt.clear();
        self.history_cursor = 0;
        self.view_mode = mode;
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn prompt_ignore_case(&self) -> bool {
        self.prompt_ignore_case
    }

    pub fn prompt_push(&mut self, c: char) {
        self.prompt.push(c);
        self.prompt_changed();
    }

    pub fn prompt_pop(&mut self) {
        self.prompt.pop();
        self.prompt_changed();
    }

    pub fn prompt_toggle_case(&mut self) {
        self.prompt_ignore_case = !self.prompt_ignore_case;
        self.prompt_changed();
    }

    /// Replaces the prompt with the next older entry of the search history.
    pub fn prompt_history(&mut self) {
        if self.view_mode != ViewMode::Search {
            return;
        }
        let history = self.session.search_history();
        let history = history.borrow();
        let recent = history.recent();
        if recent.is_empty() {
            return;
        }
        self.prompt = recent[self.history_cursor % recent.len()].clone();
        self.history_cursor += 1;
    }

    fn prompt_changed(&mut self) {
        if self.view_mode == ViewMode::Find {
            self.find_router
                .pattern_updated(&self.prompt, self.prompt_ignore_case);
            self.relay_notifications();
        }
    }

    pub fn prompt_submit(&mut self) {
        let text = std::mem::take(&mut self.prompt);
        match self.view_mode {
            ViewMode::Find => {
                self.find_router
                    .pattern_confirmed(&text, self.prompt_ignore_case);
                self.relay_notifications();
            }
            ViewMode::Search if !text.is_empty() => {
                let ignore_case = self.prompt_ignore_case;
                if let Some(view) = self.current_view() {
                    if let Err(e) = view.borrow_mut().start_search(&text, ignore_case) {
                        self.status = Some(format!("invalid pattern: {}", e));
                    }
                }
            }
            ViewMode::Open if !text.is_empty() => {
                let path = expand_home(text.trim());
                self.open_file(&path);
            }
            ViewMode::Options => self.close_options(true),
            _ => {}
        }
        if self.view_mode != ViewMode::Options {
            self.view_mode = ViewMode::Main;
        }
    }

    pub fn prompt_cancel(&mut self) {
        match self.view_mode {
            ViewMode::Find => {
                self.find_router.cancel_search();
                self.relay_notifications();
            }
            ViewMode::Options => self.close_options(false),
            _ => {}
        }
        self.prompt.clear();
        self.view_mode = ViewMode::Main;
    }

    pub fn clear_search(&mut self) {
        self.with_current_view(|v| v.clear_search());
    }

    // Options overlay. While it is open, edits preview on the view that was
    // current when it opened; closing either keeps or reverts them.

    pub fn show_options(&mut self) {
        self.options_binding = self
            .router
            .bind(ActionId::OptionsEdited, Slot::ApplyConfiguration);
        self.view_mode = ViewMode::Options;
    }

    pub fn toggle_option(&mut self, index: usize) {
        let settings = &mut self.settings;
        match index {
            0 => settings.overview_visible = !settings.overview_visible,
            1 => settings.main_line_numbers_visible = !settings.main_line_numbers_visible,
            2 => {
                settings.filtered_line_numbers_visible = !settings.filtered_line_numbers_visible
            }
            _ => return,
        }
        self.router
            .dispatch(ActionId::OptionsEdited, ActionArg::Options(self.settings));
    }

    fn close_options(&mut self, keep: bool) {
        if keep {
            if let Err(e) = self.store.save_settings(&self.settings) {
                tlog!(error, "saving settings: {}", e);
            }
            self.router
                .dispatch(ActionId::OptionsChanged, ActionArg::Options(self.settings));
        } else {
            self.settings = self.store.settings().unwrap_or(self.settings);
            self.router
                .dispatch(ActionId::OptionsEdited, ActionArg::Options(self.settings));
        }
        if let Some(id) = self.options_binding.take() {
            self.router.unbind(id);
        }
        self.view_mode = ViewMode::Main;
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    // Recent files.

    pub fn recent_files(&self) -> &[String] {
        self.recent.files()
    }

    pub fn recent_cursor(&self) -> usize {
        self.recent_cursor
    }

    pub fn show_recent(&mut self) {
        self.recent_cursor = 0;
        self.view_mode = ViewMode::Recent;
    }

    pub fn move_recent_cursor(&mut self, down: bool) {
        let len = self.recent.files().len();
        if down && self.recent_cursor + 1 < len {
            self.recent_cursor += 1;
        } else if !down {
            self.recent_cursor = self.recent_cursor.saturating_sub(1);
        }
    }

    pub fn open_recent(&mut self, index: usize) {
        let Some(path) = self.recent.files().get(index).cloned() else {
            return;
        };
        self.view_mode = ViewMode::Main;
        self.open_file(Path::new(&path));
    }

    // Persistence.

    /// Saves the open views in tab order, with their display state.
    pub fn save_session(&self) -> Result<()> {
        let saved: Vec<SavedView> = self
            .tabs
            .iter()
            .filter_map(|id| {
                let view = self.views.get(id)?.borrow();
                Some(SavedView {
                    view: *id,
                    scroll_position: view.scroll_position(),
                    view_state: Some(view.save_state()),
                })
            })
            .collect();
        self.session.save(&saved)?;
        self.session.save_search_history()?;
        Ok(())
    }

    // Accessors for rendering.

    pub fn current_view(&self) -> Option<Rc<RefCell<CrawlerView>>> {
        self.current.and_then(|id| self.views.get(&id).cloned())
    }

    pub fn current_id(&self) -> Option<ViewId> {
        self.current
    }

    pub fn current_tab_index(&self) -> Option<usize> {
        let current = self.current?;
        self.tabs.iter().position(|t| *t == current)
    }

    pub fn tab_titles(&self) -> Vec<String> {
        self.tabs
            .iter()
            .map(|id| file_name(self.session.filename(*id)))
            .collect()
    }

    pub fn highlights(&self) -> &HighlightRules {
        &self.highlights
    }

    pub fn loading_percent(&self) -> Option<u8> {
        self.loading_percent
    }

    pub fn current_line(&self) -> Option<u64> {
        self.current_line
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// `name (size - N lines - modified on date)` for the current view.
    pub fn info_line(&self) -> Option<String> {
        let id = self.current?;
        let name = file_name(self.session.filename(id));
        let info = self.session.file_info(id);
        Some(format_info(&name, info.size, info.line_count, info.last_modified))
    }

    pub fn current_log_data(&self) -> Option<Arc<LogData>> {
        self.current.map(|id| self.session.log_data(id))
    }

    pub fn view_mode(&self) -> &ViewMode {
        &self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn log_scroll(&self) -> usize {
        self.log_scroll
    }

    pub fn log_scroll_up(&mut self) {
        self.log_scroll = self.log_scroll.saturating_sub(1);
    }

    pub fn log_scroll_down(&mut self) {
        self.log_scroll += 1;
    }

    pub fn log_scroll_to_top(&mut self) {
        self.log_scroll = 0;
    }

    pub fn log_scroll_to_bottom(&mut self) {
        self.log_scroll = crate::log::entry_count();
    }

    pub fn clear_log(&mut self) {
        crate::log::clear();
        self.log_scroll = 0;
    }

    pub fn tick_ms(&self) -> u64 {
        self.config.tick_ms
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn expand_home(text: &str) -> PathBuf {
    match text.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(text)),
        None => PathBuf::from(text),
    }
}

pub fn readable_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", size)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_info(name: &str, size: u64, lines: u64, modified: Option<DateTime<Utc>>) -> String {
    let mut info = format!("{} ({} - {} lines", name, readable_size(size), lines);
    if let Some(modified) = modified {
        let local: DateTime<Local> = modified.into();
        info.push_str(&format!(" - modified on {}", local.format("%Y-%m-%d %H:%M:%S")));
    }
    info.push(')');
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn test_app(dir: &Path) -> App {
        let config = AppConfig {
            data_dir: dir.to_path_buf(),
            max_recent_files: 2,
            search_chunk_lines: 100,
            tick_ms: 10,
        };
        App::new(config, Store::open_in_memory().unwrap()).unwrap()
    }

    fn write_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        std::fs::canonicalize(path).unwrap()
    }

    fn tick_until(app: &mut App, done: impl Fn(&App) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            app.tick();
            if done(app) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached");
    }

    fn loaded(app: &App) -> bool {
        app.current_view().is_some_and(|v| {
            let v = v.borrow();
            !v.is_loading() && v.line_count() > 0
        })
    }

    #[test]
    fn test_readable_size() {
        assert_eq!(readable_size(512), "512 B");
        assert_eq!(readable_size(4096), "4.0 KiB");
        assert_eq!(readable_size(3 * 1024 * 1024 + 512 * 1024), "3.5 MiB");
    }

    #[test]
    fn test_format_info_without_date() {
        assert_eq!(format_info("a.log", 10, 2, None), "a.log (10 B - 2 lines)");
    }

    #[test]
    fn test_open_adds_tab_and_recent_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let a = write_log(dir.path(), "a.log", &["x"]);
        let b = write_log(dir.path(), "b.log", &["y"]);
        let c = write_log(dir.path(), "c.log", &["z"]);

        app.open_file(&a);
        app.open_file(&b);
        app.open_file(&c);

        assert_eq!(app.tab_titles(), vec!["a.log", "b.log", "c.log"]);
        assert_eq!(app.current_tab_index(), Some(2));
        let recent: Vec<String> = vec![c.display().to_string(), b.display().to_string()];
        assert_eq!(app.recent_files(), recent.as_slice());
    }

    #[test]
    fn test_open_missing_file_sets_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        assert!(app.open_file(&dir.path().join("nope.log")).is_none());
        assert!(app.status().unwrap().contains("nope.log"));
        assert!(app.tab_titles().is_empty());
    }

    #[test]
    fn test_view_stays_hidden_until_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let a = write_log(dir.path(), "a.log", &["x", "y"]);
        let b = write_log(dir.path(), "b.log", &["z"]);

        let first = app.open_file(&a).unwrap();
        assert_eq!(app.session.state(first), FileState::Opening);
        assert!(!app.current_view().unwrap().borrow().is_visible());

        tick_until(&mut app, |app| app.session.state(first) == FileState::Ready);
        assert!(app.current_view().unwrap().borrow().is_visible());

        let second = app.open_file(&b).unwrap();
        assert!(!app.views[&first].borrow().is_visible());
        assert!(!app.views[&second].borrow().is_visible());

        app.select_tab(0);
        assert!(app.views[&first].borrow().is_visible());
        assert!(!app.views[&second].borrow().is_visible());

        tick_until(&mut app, |app| app.session.state(second) == FileState::Ready);
        assert!(!app.views[&second].borrow().is_visible());
        app.select_tab(1);
        assert!(app.views[&second].borrow().is_visible());
    }

    #[test]
    fn test_close_current_switches_to_neighbour() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let a = write_log(dir.path(), "a.log", &["x"]);
        let b = write_log(dir.path(), "b.log", &["y"]);
        let first = app.open_file(&a).unwrap();
        app.open_file(&b);

        app.select_tab(0);
        app.close_current();
        assert_eq!(app.tab_titles(), vec!["b.log"]);
        assert_eq!(app.current_tab_index(), Some(0));
        assert_ne!(app.current_id(), Some(first));

        app.close_current();
        assert!(app.current_view().is_none());
        app.reload();
    }

    #[test]
    fn test_commands_reach_only_current_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let a = write_log(dir.path(), "a.log", &["1", "2"]);
        let b = write_log(dir.path(), "b.log", &["3", "4"]);
        app.open_file(&a);
        let view_a = app.current_view().unwrap();
        app.open_file(&b);
        let view_b = app.current_view().unwrap();

        app.toggle_follow();
        assert!(view_b.borrow().is_following());
        assert!(!view_a.borrow().is_following());
        assert!(view_b.borrow().is_visible());
        assert!(!view_a.borrow().is_visible());
    }

    #[test]
    fn test_options_preview_and_revert() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let a = write_log(dir.path(), "a.log", &["x"]);
        app.open_file(&a);
        let view = app.current_view().unwrap();
        let original = app.settings();

        app.show_options();
        app.toggle_option(1);
        assert_ne!(view.borrow().settings(), original);
        app.prompt_cancel();
        assert_eq!(app.settings(), original);
        assert_eq!(view.borrow().settings(), original);

        app.show_options();
        app.toggle_option(1);
        app.prompt_submit();
        assert_eq!(*app.view_mode(), ViewMode::Main);
        assert!(app.settings().main_line_numbers_visible);
        assert_eq!(app.store.settings().unwrap(), app.settings());
        // The transient binding is gone once the overlay closes.
        assert_eq!(
            app.router
                .dispatch(ActionId::OptionsEdited, ActionArg::Options(original)),
            0
        );
    }

    #[test]
    fn test_quick_find_selects_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let a = write_log(dir.path(), "a.log", &["alpha", "beta", "gamma", "beta again"]);
        app.open_file(&a);
        tick_until(&mut app, loaded);

        app.open_find(SearchDirection::Forward);
        for c in "beta".chars() {
            app.prompt_push(c);
        }
        assert_eq!(app.current_line(), Some(1));
        app.prompt_submit();
        app.search_next();
        assert_eq!(app.current_line(), Some(3));
        app.search_next();
        assert_eq!(app.find_message(), Some("not found below"));
    }

    #[test]
    fn test_session_round_trip_through_app() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("state.db");
        let a = write_log(dir.path(), "a.log", &["ERROR one", "ok"]);
        let b = write_log(dir.path(), "b.log", &["two"]);
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            max_recent_files: 5,
            search_chunk_lines: 100,
            tick_ms: 10,
        };

        {
            let mut app = App::new(config.clone(), Store::open(&store_path).unwrap()).unwrap();
            app.open_file(&a);
            app.open_file(&b);
            app.select_tab(0);
            app.open_prompt(ViewMode::Search);
            for c in "error".chars() {
                app.prompt_push(c);
            }
            app.prompt_toggle_case();
            app.prompt_submit();
            app.save_session().unwrap();
        }

        let mut app = App::new(config, Store::open(&store_path).unwrap()).unwrap();
        app.open_initial(&[], true);
        assert_eq!(app.tab_titles(), vec!["a.log", "b.log"]);
        assert_eq!(app.current_tab_index(), Some(0));
        let view = app.current_view().unwrap();
        assert_eq!(view.borrow().search_text(), "error");
        assert!(view.borrow().filtered_pane_visible());
        assert_eq!(view.borrow().search_history(), vec!["error".to_string()]);
    }

    #[test]
    fn test_command_line_files_skip_restore() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let a = write_log(dir.path(), "a.log", &["x"]);
        app.open_initial(&[a], true);
        assert_eq!(app.tab_titles(), vec!["a.log"]);
    }
}
