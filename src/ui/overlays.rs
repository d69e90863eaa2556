use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::app::OPTION_LABELS;
use crate::store::Settings;
use crate::ui::centered_rect;
use crate::ui::theme::Theme;

const POPUP_WIDTH: u16 = 70;

fn truncate_start(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - max + 1).collect();
        format!("~{}", tail)
    }
}

pub fn render_recent(f: &mut Frame, files: &[String], cursor: usize, area: Rect) {
    let count = files.len().clamp(1, 9);
    let popup_area = centered_rect(POPUP_WIDTH, count as u16 + 2, area);
    f.render_widget(Clear, popup_area);

    let lines: Vec<Line> = if files.is_empty() {
        vec![Line::from(Span::styled("  no recent files", Theme::footer()))]
    } else {
        files
            .iter()
            .take(9)
            .enumerate()
            .map(|(i, path)| {
                let style = if i == cursor {
                    Theme::selected()
                } else {
                    Style::default()
                };
                Line::from(vec![
                    Span::styled(
                        format!(" {} ", i + 1),
                        Theme::help_key().add_modifier(if i == cursor {
                            Modifier::REVERSED
                        } else {
                            Modifier::empty()
                        }),
                    ),
                    Span::styled(truncate_start(path, POPUP_WIDTH as usize - 6), style),
                ])
            })
            .collect()
    };

    let block = Block::default()
        .title(" Recent files [1-9/Enter: open  Esc: close] ")
        .borders(Borders::ALL)
        .border_style(Theme::title());
    f.render_widget(Paragraph::new(lines).block(block), popup_area);
}

pub fn render_options(f: &mut Frame, settings: &Settings, area: Rect) {
    let values = [
        settings.overview_visible,
        settings.main_line_numbers_visible,
        settings.filtered_line_numbers_visible,
    ];
    let popup_area = centered_rect(44, values.len() as u16 + 2, area);
    f.render_widget(Clear, popup_area);

    let lines: Vec<Line> = OPTION_LABELS
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (label, on))| {
            Line::from(vec![
                Span::styled(format!(" {} ", i + 1), Theme::help_key()),
                Span::styled(if on { "[x] " } else { "[ ] " }, Theme::prompt()),
                Span::styled(*label, Theme::help_desc()),
            ])
        })
        .collect();

    let block = Block::default()
        .title(" Options [1-3: toggle  Enter: keep  Esc: revert] ")
        .borders(Borders::ALL)
        .border_style(Theme::title());
    f.render_widget(Paragraph::new(lines).block(block), popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_start_keeps_file_name() {
        assert_eq!(truncate_start("/a/b.log", 20), "/a/b.log");
        assert_eq!(truncate_start("/var/log/app/server.log", 10), "~erver.log");
    }
}
