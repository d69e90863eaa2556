use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::{readable_size, App, ViewMode};
use crate::search::{HighlightRules, QuickFindPattern, SearchDirection};
use crate::ui::pane_heights;
use crate::ui::theme::{color_named, Theme};
use crate::view::{CrawlerView, Pane};

pub fn render_log_view(f: &mut Frame, app: &App, area: Rect) {
    let view = app.current_view();
    let filtered_visible = view.as_ref().is_some_and(|v| {
        let v = v.borrow();
        v.is_visible() && v.filtered_pane_visible()
    });
    let (main_height, filtered_height) = pane_heights(area.height, filtered_visible);
    let filtered_block = if filtered_visible {
        filtered_height + 1
    } else {
        0
    };

    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(main_height as u16),
        Constraint::Length(filtered_block as u16),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .split(area);

    render_tabs(f, app, chunks[0]);
    match view {
        Some(view) if !view.borrow().is_visible() => {
            let percent = app
                .loading_percent()
                .map(|p| format!(" {}%", p))
                .unwrap_or_default();
            let placeholder = Paragraph::new(Line::from(Span::styled(
                format!(" indexing…{}", percent),
                Theme::footer(),
            )));
            f.render_widget(placeholder, chunks[1]);
        }
        Some(view) => {
            let view = view.borrow();
            render_main_pane(f, &view, app.highlights(), chunks[1]);
            if filtered_visible {
                render_filtered_pane(f, &view, chunks[2]);
            }
        }
        None => {
            let hint = Paragraph::new(Line::from(Span::styled(
                " No file open.  o: open file  R: recent files  h: help  q: quit",
                Theme::footer(),
            )));
            f.render_widget(hint, chunks[1]);
        }
    }
    render_info_line(f, app, chunks[3]);
    render_bottom_bar(f, app, chunks[4]);
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let current = app.current_tab_index();
    let mut spans = Vec::new();
    for (i, title) in app.tab_titles().into_iter().enumerate() {
        let style = if Some(i) == current {
            Theme::tab_active()
        } else {
            Theme::tab_inactive()
        };
        spans.push(Span::styled(format!(" {}:{} ", i + 1, title), style));
        spans.push(Span::raw(" "));
    }
    if spans.is_empty() {
        spans.push(Span::styled(" logdeck ", Theme::title()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn number_width(count: u64) -> usize {
    count.max(1).to_string().len()
}

fn render_main_pane(f: &mut Frame, view: &CrawlerView, highlights: &HighlightRules, area: Rect) {
    let settings = view.settings();
    let pattern = view.quick_find_pattern();
    let pattern = pattern.borrow();
    let width = number_width(view.line_count());
    let selected = view.selected_index(Pane::Main);
    let focused = view.focus() == Pane::Main;

    let lines: Vec<Line> = view
        .main_lines()
        .into_iter()
        .map(|(number, text)| {
            let mut spans = Vec::new();
            if settings.overview_visible {
                let mark = if view.is_line_matching_search(number) { "▌" } else { " " };
                spans.push(Span::styled(mark, Theme::overview_mark()));
            }
            if settings.main_line_numbers_visible {
                spans.push(Span::styled(
                    format!("{:>width$} ", number + 1, width = width),
                    Theme::line_number(),
                ));
            }
            let base = line_style(&text, highlights, focused && selected == Some(number));
            spans.extend(highlight_matches(&text, base, &pattern));
            Line::from(spans)
        })
        .collect();

    f.render_widget(Paragraph::new(lines), area);
}

fn render_filtered_pane(f: &mut Frame, view: &CrawlerView, area: Rect) {
    let [header, body] = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);

    let progress = match view.search_status() {
        Some(status) if status.complete => format!("{} matches", status.matches),
        Some(status) => format!("{} matches, {}%", status.matches, status.percent),
        None => "searching".to_string(),
    };
    let focus_mark = if view.focus() == Pane::Filtered { "▶" } else { " " };
    let title = Line::from(vec![
        Span::styled(format!("{} filter: ", focus_mark), Theme::prompt_label()),
        Span::styled(view.search_text().to_string(), Theme::prompt()),
        Span::styled(format!("  ({})", progress), Theme::footer()),
    ]);
    f.render_widget(Paragraph::new(title).style(Theme::border()), header);

    let settings = view.settings();
    let width = number_width(view.line_count());
    let selected = view.selected_index(Pane::Filtered);
    let focused = view.focus() == Pane::Filtered;
    let pattern = view.quick_find_pattern();
    let pattern = pattern.borrow();

    let lines: Vec<Line> = view
        .filtered_lines()
        .into_iter()
        .map(|(index, number, text)| {
            let mut spans = Vec::new();
            if settings.filtered_line_numbers_visible {
                spans.push(Span::styled(
                    format!("{:>width$} ", number + 1, width = width),
                    Theme::line_number(),
                ));
            }
            let base = if focused && selected == Some(index) {
                Theme::selected()
            } else {
                Style::default()
            };
            spans.extend(highlight_matches(&text, base, &pattern));
            Line::from(spans)
        })
        .collect();
    f.render_widget(Paragraph::new(lines), body);
}

fn line_style(text: &str, highlights: &HighlightRules, selected: bool) -> Style {
    if selected {
        return Theme::selected();
    }
    let Some((fore, back)) = highlights.colors_for(text) else {
        return Style::default();
    };
    let mut style = Style::default();
    if let Some(color) = color_named(fore) {
        style = style.fg(color);
    }
    if let Some(color) = color_named(back) {
        style = style.bg(color);
    }
    style
}

/// Splits `text` into spans, marking quick-find matches.
fn highlight_matches(text: &str, base: Style, pattern: &QuickFindPattern) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut last = 0;
    for (start, end) in pattern.match_ranges(text) {
        if start > last {
            spans.push(Span::styled(text[last..start].to_string(), base));
        }
        spans.push(Span::styled(
            text[start..end].to_string(),
            base.patch(Theme::quick_find_match()),
        ));
        last = end;
    }
    if last < text.len() {
        spans.push(Span::styled(text[last..].to_string(), base));
    }
    spans
}

fn render_info_line(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        format!(" {}", app.info_line().unwrap_or_default()),
        Theme::info(),
    )];
    if let Some(percent) = app.loading_percent() {
        spans.push(Span::styled(format!("  indexing {:>3}% ", percent), Theme::gauge()));
    }
    if let Some(view) = app.current_view() {
        let view = view.borrow();
        if view.is_following() {
            spans.push(Span::styled("  [follow]", Theme::gauge()));
        }
    }
    if let Some(line) = app.current_line() {
        spans.push(Span::styled(format!("  L{}", line + 1), Theme::info()));
    }
    if let Some(data) = app.current_log_data() {
        if data.is_loading() && app.loading_percent().is_none() {
            spans.push(Span::styled(
                format!("  {} read", readable_size(data.file_size())),
                Theme::info(),
            ));
        }
    }
    f.render_widget(Paragraph::new(Line::from(spans)).style(Theme::info()), area);
}

fn render_bottom_bar(f: &mut Frame, app: &App, area: Rect) {
    let case = if app.prompt_ignore_case() { " [i]" } else { "" };
    let line = match app.view_mode() {
        ViewMode::Find => {
            let label = match app.find_direction() {
                SearchDirection::Forward => "/",
                SearchDirection::Backward => "?",
            };
            let mut spans = vec![
                Span::styled(label, Theme::prompt_label()),
                Span::styled(format!("{}_", app.prompt()), Theme::prompt()),
                Span::styled(case, Theme::footer()),
            ];
            if let Some(message) = app.find_message() {
                spans.push(Span::styled(format!("  {}", message), Theme::status_error()));
            }
            Line::from(spans)
        }
        ViewMode::Search => Line::from(vec![
            Span::styled("filter: ", Theme::prompt_label()),
            Span::styled(format!("{}_", app.prompt()), Theme::prompt()),
            Span::styled(case, Theme::footer()),
        ]),
        ViewMode::Open => Line::from(vec![
            Span::styled("open: ", Theme::prompt_label()),
            Span::styled(format!("{}_", app.prompt()), Theme::prompt()),
        ]),
        _ => match (app.find_message(), app.status()) {
            (Some(message), _) => Line::from(Span::styled(message.to_string(), Theme::status_error())),
            (None, Some(status)) => Line::from(Span::styled(
                status.to_string(),
                Theme::footer().add_modifier(Modifier::BOLD),
            )),
            (None, None) => Line::from(Span::styled(
                " h:help  o:open  /:find  s:filter  f:follow  r:reload  q:quit",
                Theme::footer(),
            )),
        },
    };
    f.render_widget(Paragraph::new(line), area);
}
