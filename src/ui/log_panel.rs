use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::log::{LogEntry, LogLevel};
use crate::ui::theme::Theme;

pub fn render_log_panel(f: &mut Frame, entries: &[LogEntry], scroll: usize, area: Rect) {
    let inner_height = area.height.saturating_sub(2) as usize;

    let lines: Vec<Line> = entries
        .iter()
        .flat_map(|entry| {
            let ts = entry.timestamp.format("%H:%M:%S").to_string();
            let level_style = match entry.level {
                LogLevel::Info => Style::default().fg(Color::DarkGray),
                LogLevel::Warn => Style::default().fg(Color::Yellow),
                LogLevel::Error => Style::default().fg(Color::Red),
            };
            let msg_style = match entry.level {
                LogLevel::Error => Style::default().fg(Color::Red),
                _ => Style::default().fg(Color::White),
            };

            // Copied text spans several lines; continuation lines are indented.
            entry.message.lines().enumerate().map(move |(i, text)| {
                let prefix = if i == 0 {
                    vec![
                        Span::styled(format!(" {} ", ts), Style::default().fg(Color::DarkGray)),
                        Span::styled(format!("[{:<5}] ", entry.level.label()), level_style),
                    ]
                } else {
                    vec![Span::raw(" ".repeat(18))]
                };
                let mut spans = prefix;
                spans.push(Span::styled(text.to_string(), msg_style));
                Line::from(spans)
            })
        })
        .collect();

    let total = lines.len();
    // Scrolled past the end means "follow": show the last page.
    let max_scroll = total.saturating_sub(inner_height);
    let effective_scroll = scroll.min(max_scroll);

    let footer_text = format!(
        " L:back  j/k:scroll  g/G:top/bottom  c:clear  ({} entries) ",
        entries.len()
    );

    let block = Block::default()
        .title(" Log ")
        .title_bottom(Line::from(footer_text).centered())
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((effective_scroll.min(u16::MAX as usize) as u16, 0));

    f.render_widget(paragraph, area);
}
