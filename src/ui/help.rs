use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::ui::centered_rect;
use crate::ui::theme::Theme;

const BINDINGS: &[(&str, &str)] = &[
    ("j / k, Up / Down", "Move selection"),
    ("Space / PgDn, PgUp", "Page down / up"),
    ("g / G", "Jump to top / bottom"),
    ("Tab / Shift+Tab", "Next / prev file"),
    ("1-9", "Go to file #"),
    ("o", "Open file"),
    ("R", "Recent files"),
    ("w", "Close file"),
    ("r / F5", "Reload"),
    ("x", "Stop loading"),
    ("f", "Toggle follow"),
    ("A / Ctrl+a", "Select all"),
    ("y", "Copy selection to log"),
    ("", ""),
    ("Search", ""),
    ("/ and ?", "Quick find forward / backward"),
    ("n / N", "Next / previous match"),
    ("s / &", "Filter search"),
    ("v", "Switch main / filtered pane"),
    ("Enter", "Jump to filtered line"),
    ("Esc", "Clear filter search"),
    ("Ctrl+t", "Toggle ignore case (in prompt)"),
    ("Up", "Search history (in prompt)"),
    ("", ""),
    ("p", "Options"),
    ("L", "Toggle log panel"),
    ("h / F1", "Toggle this help"),
    ("q / Ctrl+c", "Quit"),
];

pub fn render_help(f: &mut Frame, area: Rect) {
    let popup_width = 56;
    let popup_height = (BINDINGS.len() as u16) + 4;

    let popup_area = centered_rect(popup_width, popup_height, area);

    f.render_widget(Clear, popup_area);

    let lines: Vec<Line> = BINDINGS
        .iter()
        .map(|(key, desc)| {
            if key.is_empty() && desc.is_empty() {
                Line::from("")
            } else if desc.is_empty() {
                Line::from(Span::styled(format!("  -- {} --", key), Theme::footer()))
            } else {
                Line::from(vec![
                    Span::styled(format!("  {:<20}", key), Theme::help_key()),
                    Span::styled(*desc, Theme::help_desc()),
                ])
            }
        })
        .collect();

    let help = Paragraph::new(lines).block(
        Block::default()
            .title(" Keybindings ")
            .borders(Borders::ALL)
            .border_style(Theme::title()),
    );

    f.render_widget(help, popup_area);
}
