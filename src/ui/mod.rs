mod help;
mod log_panel;
mod log_view;
mod overlays;
mod theme;

pub use help::render_help;
pub use log_panel::render_log_panel;
pub use log_view::render_log_view;
pub use overlays::{render_options, render_recent};

use ratatui::layout::{Constraint, Flex, Layout, Rect};

/// Rows of the main and filtered panes for a screen `height` rows tall.
/// Tab bar, info line and bottom bar take one row each; the filtered pane
/// gets 30% of the rest, one row of which is its header.
pub fn pane_heights(height: u16, filtered_visible: bool) -> (usize, usize) {
    let body = height.saturating_sub(3) as usize;
    if !filtered_visible {
        return (body, 0);
    }
    let lower = body * 3 / 10;
    (body - lower, lower.saturating_sub(1))
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .split(area);
    let horizontal = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .split(vertical[0]);
    horizontal[0]
}
