use crate::data::{LineSource, LoadEventKind, LogData, LogFilteredData, SearchProgress};
use crate::router::{ActionArg, CommandTarget, FindNotification, Notification, Searchable, Slot};
use crate::search::{build_regex, find_match, QuickFindPattern, SearchDirection, SearchHistory};
use crate::store::Settings;
use crate::tlog;

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use super::LogView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Main,
    Filtered,
}

/// Scroll and selection of one pane. Positions are in the pane's own
/// coordinates: line numbers for the main pane, match indexes for the
/// filtered one.
#[derive(Debug, Clone, Copy, Default)]
struct PaneState {
    top: u64,
    selected: Option<u64>,
    height: usize,
}

impl PaneState {
    fn ensure_visible(&mut self, index: u64) {
        let height = self.height.max(1) as u64;
        if index < self.top {
            self.top = index;
        } else if index >= self.top + height {
            self.top = index + 1 - height;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct ViewState {
    filtered_pane_visible: bool,
    search_text: String,
    search_ignore_case: bool,
}

/// Main log pane plus a filtered pane of the lines matching a search.
pub struct CrawlerView {
    log_data: Option<Arc<LogData>>,
    filtered: Weak<RefCell<LogFilteredData>>,
    quick_find: Rc<RefCell<QuickFindPattern>>,
    history: Rc<RefCell<SearchHistory>>,
    settings: Settings,
    visible: bool,
    loading: bool,
    follow: bool,
    all_selected: bool,
    focus: Pane,
    main: PaneState,
    filtered_pane: PaneState,
    state: ViewState,
    search_status: Option<SearchProgress>,
    incremental_origin: Option<Option<u64>>,
    notifications: Vec<Notification>,
    find_notifications: Vec<FindNotification>,
}

impl CrawlerView {
    pub fn new(settings: Settings) -> Self {
        Self {
            log_data: None,
            filtered: Weak::new(),
            quick_find: Rc::new(RefCell::new(QuickFindPattern::new())),
            history: Rc::new(RefCell::new(SearchHistory::default())),
            settings,
            visible: true,
            loading: false,
            follow: false,
            all_selected: false,
            focus: Pane::Main,
            main: PaneState::default(),
            filtered_pane: PaneState::default(),
            state: ViewState::default(),
            search_status: None,
            incremental_origin: None,
            notifications: Vec::new(),
            find_notifications: Vec::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn focus(&self) -> Pane {
        self.focus
    }

    pub fn filtered_pane_visible(&self) -> bool {
        self.state.filtered_pane_visible
    }

    pub fn search_text(&self) -> &str {
        &self.state.search_text
    }

    pub fn search_status(&self) -> Option<SearchProgress> {
        self.search_status
    }

    pub fn quick_find_pattern(&self) -> Rc<RefCell<QuickFindPattern>> {
        Rc::clone(&self.quick_find)
    }

    pub fn search_history(&self) -> Vec<String> {
        self.history.borrow().recent().to_vec()
    }

    pub fn set_viewport(&mut self, main_height: usize, filtered_height: usize) {
        self.main.height = main_height;
        self.filtered_pane.height = filtered_height;
        if self.follow {
            self.scroll_to_end();
        }
    }

    /// First visible line of the main pane.
    pub fn scroll_position(&self) -> u64 {
        self.main.top
    }

    pub fn set_scroll_position(&mut self, line: u64) {
        self.main.top = line;
    }

    pub fn line_count(&self) -> u64 {
        self.log_data.as_ref().map_or(0, |d| d.line_count())
    }

    pub fn filtered_count(&self) -> u64 {
        self.filtered
            .upgrade()
            .map_or(0, |f| f.borrow().match_count() as u64)
    }

    /// Selected line in the main file, whichever pane holds the selection.
    pub fn selected_line(&self) -> Option<u64> {
        let index = self.pane().selected?;
        self.source_line(index)
    }

    pub fn selected_index(&self, pane: Pane) -> Option<u64> {
        match pane {
            Pane::Main => self.main.selected,
            Pane::Filtered => self.filtered_pane.selected,
        }
    }

    /// Visible lines of the main pane with their line numbers.
    pub fn main_lines(&self) -> Vec<(u64, String)> {
        let Some(data) = &self.log_data else {
            return Vec::new();
        };
        data.lines(self.main.top, self.main.height)
            .into_iter()
            .enumerate()
            .map(|(i, text)| (self.main.top + i as u64, text))
            .collect()
    }

    /// Visible lines of the filtered pane as `(match index, line number, text)`.
    pub fn filtered_lines(&self) -> Vec<(u64, u64, String)> {
        let Some(filtered) = self.filtered.upgrade() else {
            return Vec::new();
        };
        let filtered = filtered.borrow();
        filtered
            .numbered_lines(self.filtered_pane.top, self.filtered_pane.height)
            .into_iter()
            .enumerate()
            .map(|(i, (line, text))| (self.filtered_pane.top + i as u64, line, text))
            .collect()
    }

    pub fn is_line_matching_search(&self, line: u64) -> bool {
        self.filtered
            .upgrade()
            .is_some_and(|f| f.borrow().is_line_matching(line))
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Pane::Main if self.state.filtered_pane_visible => Pane::Filtered,
            _ => Pane::Main,
        };
    }

    pub fn move_selection(&mut self, delta: i64) {
        let count = self.pane_line_count(self.focus);
        if count == 0 {
            return;
        }
        let current = self.pane().selected.unwrap_or(self.pane().top);
        let target = if delta < 0 {
            self.disable_follow();
            current.saturating_sub(delta.unsigned_abs())
        } else {
            current.saturating_add(delta as u64).min(count - 1)
        };
        self.select(target);
    }

    pub fn page_down(&mut self) {
        let height = self.pane().height.max(1) as i64;
        self.move_selection(height);
    }

    pub fn page_up(&mut self) {
        let height = self.pane().height.max(1) as i64;
        self.move_selection(-height);
    }

    pub fn go_to_top(&mut self) {
        if self.pane_line_count(self.focus) > 0 {
            self.disable_follow();
            self.select(0);
        }
    }

    pub fn go_to_bottom(&mut self) {
        let count = self.pane_line_count(self.focus);
        if count > 0 {
            self.select(count - 1);
        }
    }

    /// Jumps the main pane to the line selected in the filtered pane.
    pub fn jump_to_filtered_selection(&mut self) {
        let Some(line) = self
            .filtered_pane
            .selected
            .and_then(|i| self.source_line_in(Pane::Filtered, i))
        else {
            return;
        };
        self.focus = Pane::Main;
        self.disable_follow();
        self.select(line);
    }

    /// Runs a filter search over the whole file and shows the filtered pane.
    pub fn start_search(&mut self, text: &str, ignore_case: bool) -> Result<(), regex::Error> {
        let regex = build_regex(text, ignore_case)?;
        if let Some(filtered) = self.filtered.upgrade() {
            filtered.borrow_mut().run_search(regex);
        }
        self.history.borrow_mut().add_recent(text);
        self.state.search_text = text.to_string();
        self.state.search_ignore_case = ignore_case;
        self.state.filtered_pane_visible = true;
        self.filtered_pane = PaneState {
            height: self.filtered_pane.height,
            ..PaneState::default()
        };
        self.search_status = None;
        Ok(())
    }

    pub fn clear_search(&mut self) {
        if let Some(filtered) = self.filtered.upgrade() {
            filtered.borrow_mut().clear_search();
        }
        self.state = ViewState::default();
        self.search_status = None;
        self.focus = Pane::Main;
    }

    /// Advances the filter search by at most `budget` lines and keeps a
    /// following view at the end of the file.
    pub fn tick(&mut self, budget: usize) {
        if let Some(filtered) = self.filtered.upgrade() {
            let progress = filtered.borrow_mut().search_step(budget);
            if progress.is_some() {
                self.search_status = progress;
            }
        }
        if self.follow {
            self.scroll_to_end();
        }
    }

    pub fn handle_load_event(&mut self, event: &LoadEventKind) {
        match event {
            LoadEventKind::Progress(percent) => {
                self.loading = true;
                self.notify(Notification::LoadingProgressed(*percent));
            }
            LoadEventKind::Finished(outcome) => {
                self.loading = false;
                self.notify(Notification::LoadingFinished(outcome.clone()));
            }
        }
        if self.follow {
            self.scroll_to_end();
        }
    }

    pub fn set_follow(&mut self, follow: bool) {
        self.follow = follow;
        if follow {
            self.scroll_to_end();
        }
    }

    fn disable_follow(&mut self) {
        if self.follow {
            self.follow = false;
            self.notify(Notification::FollowDisabled);
        }
    }

    fn scroll_to_end(&mut self) {
        let main_count = self.pane_line_count(Pane::Main);
        self.main.top = main_count.saturating_sub(self.main.height as u64);
        let filtered_count = self.pane_line_count(Pane::Filtered);
        self.filtered_pane.top = filtered_count.saturating_sub(self.filtered_pane.height as u64);
    }

    /// Queues `notification`, replacing any pending one of the same kind.
    /// At most one entry per kind waits for the router to relay it.
    fn notify(&mut self, notification: Notification) {
        let kind = mem::discriminant(&notification);
        self.notifications.retain(|n| mem::discriminant(n) != kind);
        self.notifications.push(notification);
    }

    fn pane(&self) -> &PaneState {
        match self.focus {
            Pane::Main => &self.main,
            Pane::Filtered => &self.filtered_pane,
        }
    }

    fn pane_mut(&mut self) -> &mut PaneState {
        match self.focus {
            Pane::Main => &mut self.main,
            Pane::Filtered => &mut self.filtered_pane,
        }
    }

    fn pane_line_count(&self, pane: Pane) -> u64 {
        match pane {
            Pane::Main => self.line_count(),
            Pane::Filtered => self.filtered_count(),
        }
    }

    fn source_line(&self, index: u64) -> Option<u64> {
        self.source_line_in(self.focus, index)
    }

    fn source_line_in(&self, pane: Pane, index: u64) -> Option<u64> {
        match pane {
            Pane::Main => Some(index),
            Pane::Filtered => self
                .filtered
                .upgrade()
                .and_then(|f| f.borrow().matching_line(index)),
        }
    }

    fn select(&mut self, index: u64) {
        self.all_selected = false;
        let pane = self.pane_mut();
        pane.selected = Some(index);
        pane.ensure_visible(index);
        if let Some(line) = self.source_line(index) {
            self.notify(Notification::LineNumberChanged(line));
        }
    }

    fn restore_selection(&mut self, selection: Option<u64>) {
        match selection {
            Some(index) => self.select(index),
            None => self.pane_mut().selected = None,
        }
    }

    fn find_in_focus(&self, from: u64, direction: SearchDirection) -> Option<u64> {
        let pattern = self.quick_find.borrow();
        match self.focus {
            Pane::Main => {
                let data = self.log_data.as_ref()?;
                find_match(&**data, &pattern, from, direction)
            }
            Pane::Filtered => {
                let filtered = self.filtered.upgrade()?;
                let filtered = filtered.borrow();
                find_match(&*filtered, &pattern, from, direction)
            }
        }
    }

    fn report_search(&mut self, found: Option<u64>, direction: SearchDirection) {
        match found.and_then(|index| self.source_line(index).map(|line| (index, line))) {
            Some((index, line)) => {
                if direction == SearchDirection::Backward {
                    self.disable_follow();
                }
                self.select(index);
                self.find_notifications.push(FindNotification::Found { line });
            }
            None => self
                .find_notifications
                .push(FindNotification::NotFound { direction }),
        }
    }

    fn search(&mut self, direction: SearchDirection) {
        let pane = *self.pane();
        let from = match (direction, pane.selected) {
            (SearchDirection::Forward, Some(s)) => Some(s + 1),
            (SearchDirection::Forward, None) => Some(pane.top),
            (SearchDirection::Backward, Some(s)) => s.checked_sub(1),
            (SearchDirection::Backward, None) => Some(pane.top),
        };
        let found = from.and_then(|f| self.find_in_focus(f, direction));
        self.report_search(found, direction);
    }

    fn incremental_search(&mut self, direction: SearchDirection) {
        let selected = self.pane().selected;
        let origin = *self.incremental_origin.get_or_insert(selected);
        let from = origin.unwrap_or(self.pane().top);
        let found = self.find_in_focus(from, direction);
        if found.is_none() {
            self.restore_selection(origin);
        }
        self.report_search(found, direction);
    }
}

impl LogView for CrawlerView {
    fn set_data(&mut self, log_data: Arc<LogData>, filtered_data: Weak<RefCell<LogFilteredData>>) {
        self.log_data = Some(log_data);
        self.filtered = filtered_data;
    }

    fn set_quick_find_pattern(&mut self, pattern: Rc<RefCell<QuickFindPattern>>) {
        self.quick_find = pattern;
    }

    fn set_search_history(&mut self, history: Rc<RefCell<SearchHistory>>) {
        self.history = history;
    }

    fn save_state(&self) -> String {
        serde_json::to_string(&self.state).unwrap_or_default()
    }

    fn restore_state(&mut self, state: &str) {
        let restored: ViewState = match serde_json::from_str(state) {
            Ok(s) => s,
            Err(e) => {
                tlog!(warn, "ignoring saved view state: {}", e);
                return;
            }
        };
        if restored.search_text.is_empty() {
            self.state = restored;
            return;
        }
        if let Err(e) = self.start_search(&restored.search_text, restored.search_ignore_case) {
            tlog!(warn, "saved search {:?} no longer valid: {}", restored.search_text, e);
            return;
        }
        self.state.filtered_pane_visible = restored.filtered_pane_visible;
    }

    fn select_all(&mut self) {
        self.all_selected = true;
    }

    fn selected_text(&self) -> String {
        let Some(data) = &self.log_data else {
            return String::new();
        };
        if self.all_selected {
            let count = usize::try_from(data.line_count()).unwrap_or(usize::MAX);
            return data.lines(0, count).join("\n");
        }
        self.selected_line()
            .and_then(|line| data.line(line))
            .unwrap_or_default()
    }

    fn show(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn stop_loading(&mut self) {
        if let Some(data) = &self.log_data {
            data.interrupt_loading();
        }
    }
}

impl CommandTarget for CrawlerView {
    fn invoke(&mut self, slot: Slot, arg: &ActionArg) {
        match (slot, arg) {
            (Slot::Reload, _) => {
                if let Some(data) = &self.log_data {
                    data.reload();
                }
                if let Some(filtered) = self.filtered.upgrade() {
                    filtered.borrow_mut().restart_search();
                }
            }
            (Slot::StopLoading, _) => self.stop_loading(),
            (Slot::SetFollow, ActionArg::Flag(follow)) => self.set_follow(*follow),
            (Slot::ApplyConfiguration, ActionArg::Options(settings)) => self.settings = *settings,
            (Slot::SelectAll, _) => self.select_all(),
            (slot, arg) => tlog!(warn, "{:?} ignored argument {:?}", slot, arg),
        }
    }

    fn take_notifications(&mut self) -> Vec<Notification> {
        mem::take(&mut self.notifications)
    }
}

impl Searchable for CrawlerView {
    fn search_forward(&mut self) {
        self.search(SearchDirection::Forward);
    }

    fn search_backward(&mut self) {
        self.search(SearchDirection::Backward);
    }

    fn incrementally_search_forward(&mut self) {
        self.incremental_search(SearchDirection::Forward);
    }

    fn incrementally_search_backward(&mut self) {
        self.incremental_search(SearchDirection::Backward);
    }

    fn incremental_search_stop(&mut self) {
        self.incremental_origin = None;
    }

    fn incremental_search_abort(&mut self) {
        if let Some(origin) = self.incremental_origin.take() {
            self.restore_selection(origin);
        }
    }

    fn take_find_notifications(&mut self) -> Vec<FindNotification> {
        mem::take(&mut self.find_notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::load_blocking;
    use crate::data::LoadOutcome;

    struct Fixture {
        _dir: tempfile::TempDir,
        _filtered: Rc<RefCell<LogFilteredData>>,
        view: CrawlerView,
    }

    fn fixture(lines: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.log");
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();

        let data = Arc::new(LogData::new());
        load_blocking(&data, &path);
        let filtered = Rc::new(RefCell::new(data.new_filtered_view()));

        let mut view = CrawlerView::new(Settings::default());
        view.set_data(data, Rc::downgrade(&filtered));
        view.set_viewport(3, 2);
        Fixture {
            _dir: dir,
            _filtered: filtered,
            view,
        }
    }

    fn run_search(view: &mut CrawlerView) {
        for _ in 0..100 {
            view.tick(2);
            if view.search_status().is_some_and(|s| s.complete) {
                return;
            }
        }
        panic!("search did not complete");
    }

    fn set_pattern(view: &CrawlerView, text: &str) {
        view.quick_find.borrow_mut().change_search_pattern(text, false);
    }

    #[test]
    fn test_search_forward_and_backward() {
        let mut fx = fixture(&["a", "hit 1", "b", "c", "hit 2", "d"]);
        set_pattern(&fx.view, "hit");

        fx.view.search_forward();
        assert_eq!(fx.view.selected_line(), Some(1));
        fx.view.search_forward();
        assert_eq!(fx.view.selected_line(), Some(4));
        fx.view.search_forward();
        assert_eq!(fx.view.selected_line(), Some(4));
        fx.view.search_backward();
        assert_eq!(fx.view.selected_line(), Some(1));

        assert_eq!(
            fx.view.take_find_notifications(),
            vec![
                FindNotification::Found { line: 1 },
                FindNotification::Found { line: 4 },
                FindNotification::NotFound {
                    direction: SearchDirection::Forward
                },
                FindNotification::Found { line: 1 },
            ]
        );
        // The selection scrolled the 3-line viewport.
        assert!(fx.view.scroll_position() <= 1);
    }

    #[test]
    fn test_incremental_abort_returns_to_origin() {
        let mut fx = fixture(&["zero", "one", "two", "three"]);
        fx.view.move_selection(1);
        assert_eq!(fx.view.selected_line(), Some(1));

        set_pattern(&fx.view, "thr");
        fx.view.incrementally_search_forward();
        assert_eq!(fx.view.selected_line(), Some(3));

        set_pattern(&fx.view, "tw");
        fx.view.incrementally_search_forward();
        assert_eq!(fx.view.selected_line(), Some(2));

        fx.view.incremental_search_abort();
        assert_eq!(fx.view.selected_line(), Some(1));
    }

    #[test]
    fn test_incremental_stop_keeps_match() {
        let mut fx = fixture(&["zero", "one", "two"]);
        set_pattern(&fx.view, "two");
        fx.view.incrementally_search_forward();
        fx.view.incremental_search_stop();
        fx.view.incremental_search_abort();
        assert_eq!(fx.view.selected_line(), Some(2));
    }

    #[test]
    fn test_filter_search_and_filtered_pane() {
        let mut fx = fixture(&["ERROR a", "ok", "ERROR b", "ok", "ERROR c"]);
        fx.view.start_search("ERROR", false).unwrap();
        run_search(&mut fx.view);

        assert_eq!(fx.view.filtered_count(), 3);
        assert!(fx.view.is_line_matching_search(2));
        assert_eq!(
            fx.view.filtered_lines(),
            vec![(0, 0, "ERROR a".to_string()), (1, 2, "ERROR b".to_string())]
        );

        fx.view.toggle_focus();
        assert_eq!(fx.view.focus(), Pane::Filtered);
        fx.view.go_to_bottom();
        assert_eq!(fx.view.selected_line(), Some(4));
        fx.view.jump_to_filtered_selection();
        assert_eq!(fx.view.focus(), Pane::Main);
        assert_eq!(fx.view.selected_index(Pane::Main), Some(4));
        assert_eq!(fx.view.search_history(), vec!["ERROR".to_string()]);
    }

    #[test]
    fn test_invalid_filter_search_is_rejected() {
        let mut fx = fixture(&["x"]);
        assert!(fx.view.start_search("(", false).is_err());
        assert!(!fx.view.filtered_pane_visible());
    }

    #[test]
    fn test_follow_disabled_by_scrolling_up() {
        let mut fx = fixture(&["1", "2", "3", "4", "5", "6"]);
        fx.view.invoke(Slot::SetFollow, &ActionArg::Flag(true));
        assert!(fx.view.is_following());
        assert_eq!(fx.view.scroll_position(), 3);

        fx.view.move_selection(-1);
        assert!(!fx.view.is_following());
        let notifications = fx.view.take_notifications();
        assert!(notifications.contains(&Notification::FollowDisabled));
    }

    #[test]
    fn test_progress_notifications_are_coalesced() {
        let mut fx = fixture(&["x"]);
        fx.view.handle_load_event(&LoadEventKind::Progress(10));
        fx.view.handle_load_event(&LoadEventKind::Progress(60));
        assert!(fx.view.is_loading());
        fx.view
            .handle_load_event(&LoadEventKind::Finished(LoadOutcome::Completed));
        assert!(!fx.view.is_loading());
        assert_eq!(
            fx.view.take_notifications(),
            vec![
                Notification::LoadingProgressed(60),
                Notification::LoadingFinished(LoadOutcome::Completed),
            ]
        );
    }

    #[test]
    fn test_unrelayed_notifications_keep_one_per_kind() {
        let mut fx = fixture(&["a", "b", "c"]);
        fx.view.set_follow(true);
        for _ in 0..200 {
            fx.view.handle_load_event(&LoadEventKind::Progress(50));
            fx.view
                .handle_load_event(&LoadEventKind::Finished(LoadOutcome::Completed));
            fx.view.move_selection(1);
        }
        fx.view.set_follow(true);
        fx.view.move_selection(-1);

        let queued = fx.view.take_notifications();
        assert_eq!(queued.len(), 4);
        assert_eq!(queued[0], Notification::LoadingProgressed(50));
        assert_eq!(
            queued[1],
            Notification::LoadingFinished(LoadOutcome::Completed)
        );
        assert!(queued.contains(&Notification::FollowDisabled));
        assert!(queued.iter().any(|n| matches!(n, Notification::LineNumberChanged(_))));
    }

    #[test]
    fn test_state_round_trip() {
        let mut fx = fixture(&["WARN a", "b"]);
        fx.view.start_search("warn", true).unwrap();
        let saved = fx.view.save_state();

        let mut other = fixture(&["c", "warn d", "WARN e"]);
        other.view.restore_state(&saved);
        run_search(&mut other.view);
        assert!(other.view.filtered_pane_visible());
        assert_eq!(other.view.search_text(), "warn");
        assert_eq!(other.view.filtered_count(), 2);

        other.view.restore_state("not json");
        assert_eq!(other.view.search_text(), "warn");
    }

    #[test]
    fn test_selected_text() {
        let mut fx = fixture(&["first", "second"]);
        assert_eq!(fx.view.selected_text(), "");
        fx.view.move_selection(1);
        assert_eq!(fx.view.selected_text(), "second");
        fx.view.invoke(Slot::SelectAll, &ActionArg::None);
        assert_eq!(fx.view.selected_text(), "first\nsecond");
    }

    #[test]
    fn test_apply_configuration() {
        let mut fx = fixture(&["x"]);
        let settings = Settings {
            main_line_numbers_visible: true,
            ..Settings::default()
        };
        fx.view
            .invoke(Slot::ApplyConfiguration, &ActionArg::Options(settings));
        assert_eq!(fx.view.settings(), settings);
    }
}
