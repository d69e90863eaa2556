mod crawler;

pub use crawler::{CrawlerView, Pane};

use crate::data::{LogData, LogFilteredData};
use crate::search::{QuickFindPattern, SearchHistory};

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// What the session needs from a view of one open file.
///
/// The session only ever injects collaborators and asks for state; the
/// filtered data stays owned by the session, so views get a `Weak`.
pub trait LogView {
    fn set_data(&mut self, log_data: Arc<LogData>, filtered_data: Weak<RefCell<LogFilteredData>>);
    fn set_quick_find_pattern(&mut self, pattern: Rc<RefCell<QuickFindPattern>>);
    fn set_search_history(&mut self, history: Rc<RefCell<SearchHistory>>);

    /// Opaque display state, restored by `restore_state` in a later run.
    fn save_state(&self) -> String;
    fn restore_state(&mut self, state: &str);

    fn select_all(&mut self);
    fn selected_text(&self) -> String;

    fn show(&mut self);
    fn hide(&mut self);

    /// Interrupts the indexing of this view's file, if any.
    fn stop_loading(&mut self);
}
