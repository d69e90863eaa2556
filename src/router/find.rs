use crate::search::{QuickFindPattern, SearchDirection};
use crate::tlog;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindNotification {
    Found { line: u64 },
    NotFound { direction: SearchDirection },
    /// The find bar should display this pattern.
    PatternChanged { text: String, direction: SearchDirection },
}

/// The search-capable part of a view. Searches use the session's shared
/// `QuickFindPattern`, which the router updates before calling in.
pub trait Searchable {
    fn search_forward(&mut self);
    fn search_backward(&mut self);
    fn incrementally_search_forward(&mut self);
    fn incrementally_search_backward(&mut self);
    /// Ends an incremental search, keeping the current match selected.
    fn incremental_search_stop(&mut self);
    /// Ends an incremental search, going back to where it started.
    fn incremental_search_abort(&mut self);
    fn take_find_notifications(&mut self) -> Vec<FindNotification>;
}

pub type SelectorRef = Weak<RefCell<dyn Searchable>>;

/// Carries quick-find commands from the find bar to the registered
/// selector and its results back to the find bar.
pub struct FindRouter {
    direction: SearchDirection,
    pattern: Rc<RefCell<QuickFindPattern>>,
    selector: Option<SelectorRef>,
    outbox: Vec<FindNotification>,
}

impl FindRouter {
    pub fn new(pattern: Rc<RefCell<QuickFindPattern>>) -> Self {
        Self {
            direction: SearchDirection::Forward,
            pattern,
            selector: None,
            outbox: Vec::new(),
        }
    }

    /// Replaces the selector immediately.
    pub fn register_selector(&mut self, selector: Option<SelectorRef>) {
        self.selector = selector;
    }

    pub fn has_selector(&self) -> bool {
        self.selector.as_ref().is_some_and(|s| s.strong_count() > 0)
    }

    pub fn direction(&self) -> SearchDirection {
        self.direction
    }

    /// Takes effect on the next search; searches nothing by itself.
    pub fn set_direction(&mut self, direction: SearchDirection) {
        self.direction = direction;
    }

    /// Sets the direction and tells the find bar to show `text`.
    pub fn change_quick_find(&mut self, text: &str, direction: SearchDirection) {
        self.direction = direction;
        self.outbox.push(FindNotification::PatternChanged {
            text: text.to_string(),
            direction,
        });
    }

    pub fn pattern_updated(&mut self, text: &str, ignore_case: bool) {
        self.pattern.borrow_mut().change_search_pattern(text, ignore_case);
        let direction = self.direction;
        self.with_selector(|s| match direction {
            SearchDirection::Forward => s.incrementally_search_forward(),
            SearchDirection::Backward => s.incrementally_search_backward(),
        });
    }

    pub fn pattern_confirmed(&mut self, text: &str, ignore_case: bool) {
        self.pattern.borrow_mut().change_search_pattern(text, ignore_case);
        self.with_selector(|s| s.incremental_search_stop());
    }

    pub fn cancel_search(&mut self) {
        self.with_selector(|s| s.incremental_search_abort());
    }

    pub fn search_next(&mut self) {
        let direction = self.direction;
        self.search(direction);
    }

    pub fn search_previous(&mut self) {
        let direction = self.direction.reversed();
        self.search(direction);
    }

    /// Everything the selectors reported since the last call, in order.
    pub fn take_notifications(&mut self) -> Vec<FindNotification> {
        std::mem::take(&mut self.outbox)
    }

    fn search(&mut self, direction: SearchDirection) {
        self.with_selector(|s| match direction {
            SearchDirection::Forward => s.search_forward(),
            SearchDirection::Backward => s.search_backward(),
        });
    }

    fn with_selector(&mut self, command: impl FnOnce(&mut dyn Searchable)) {
        let Some(selector) = self.selector.as_ref().and_then(|s| s.upgrade()) else {
            tlog!(info, "quick find dropped: no selector");
            return;
        };
        let Ok(mut selector) = selector.try_borrow_mut() else {
            tlog!(warn, "quick find dropped: selector busy");
            return;
        };
        command(&mut *selector);
        self.outbox.extend(selector.take_find_notifications());
    }
}
