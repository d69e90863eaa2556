use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseEventKind};

use crate::app::ViewMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    MoveToTop,
    MoveToBottom,
    Select,
    Back,
    NextTab,
    PrevTab,
    SelectTab(usize),
    CloseTab,
    ToggleFocus,
    OpenFile,
    ShowRecent,
    OpenRecent(usize),
    Reload,
    StopLoading,
    ToggleFollow,
    SelectAll,
    Copy,
    QuickFindForward,
    QuickFindBackward,
    SearchNext,
    SearchPrevious,
    FilterSearch,
    ClearSearch,
    PromptInput(char),
    PromptBackspace,
    PromptSubmit,
    PromptCancel,
    PromptToggleCase,
    PromptHistory,
    ShowOptions,
    ToggleOption(usize),
    ShowHelp,
    ToggleLog,
    ClearLog,
    None,
}

pub fn handle_event(event: &Event, mode: &ViewMode) -> Action {
    match event {
        Event::Key(key) => handle_key(key, mode),
        Event::Mouse(mouse) => handle_mouse(mouse.kind, mode),
        _ => Action::None,
    }
}

fn handle_mouse(kind: MouseEventKind, mode: &ViewMode) -> Action {
    match (kind, mode) {
        (MouseEventKind::ScrollUp, ViewMode::Main | ViewMode::Log) => Action::MoveUp,
        (MouseEventKind::ScrollDown, ViewMode::Main | ViewMode::Log) => Action::MoveDown,
        _ => Action::None,
    }
}

fn handle_key(key: &KeyEvent, mode: &ViewMode) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match mode {
        ViewMode::Find | ViewMode::Search | ViewMode::Open => handle_prompt_key(key),
        ViewMode::Recent => handle_recent_key(key),
        ViewMode::Options => handle_options_key(key),
        ViewMode::Help => handle_help_key(key),
        ViewMode::Log => handle_log_key(key),
        ViewMode::Main => handle_main_key(key),
    }
}

fn handle_main_key(key: &KeyEvent) -> Action {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Char('j') | KeyCode::Down => Action::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => Action::MoveUp,
        KeyCode::Char('d') if ctrl => Action::PageDown,
        KeyCode::Char('u') if ctrl => Action::PageUp,
        KeyCode::PageDown | KeyCode::Char(' ') => Action::PageDown,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::Char('g') | KeyCode::Home => Action::MoveToTop,
        KeyCode::Char('G') | KeyCode::End => Action::MoveToBottom,
        KeyCode::Enter => Action::Select,
        KeyCode::Esc => Action::ClearSearch,
        KeyCode::Tab => Action::NextTab,
        KeyCode::BackTab => Action::PrevTab,
        KeyCode::Char(c @ '1'..='9') => Action::SelectTab((c as usize) - ('1' as usize)),
        KeyCode::Char('w') => Action::CloseTab,
        KeyCode::Char('v') => Action::ToggleFocus,
        KeyCode::Char('o') => Action::OpenFile,
        KeyCode::Char('R') => Action::ShowRecent,
        KeyCode::Char('r') | KeyCode::F(5) => Action::Reload,
        KeyCode::Char('x') => Action::StopLoading,
        KeyCode::Char('f') => Action::ToggleFollow,
        KeyCode::Char('a') if ctrl => Action::SelectAll,
        KeyCode::Char('A') => Action::SelectAll,
        KeyCode::Char('y') => Action::Copy,
        KeyCode::Char('/') => Action::QuickFindForward,
        KeyCode::Char('?') => Action::QuickFindBackward,
        KeyCode::Char('n') => Action::SearchNext,
        KeyCode::Char('N') => Action::SearchPrevious,
        KeyCode::Char('s') | KeyCode::Char('&') => Action::FilterSearch,
        KeyCode::Char('p') => Action::ShowOptions,
        KeyCode::Char('h') | KeyCode::F(1) => Action::ShowHelp,
        KeyCode::Char('L') => Action::ToggleLog,
        _ => Action::None,
    }
}

fn handle_prompt_key(key: &KeyEvent) -> Action {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => Action::PromptCancel,
        KeyCode::Enter => Action::PromptSubmit,
        KeyCode::Backspace => Action::PromptBackspace,
        KeyCode::Up => Action::PromptHistory,
        KeyCode::Char('t') if ctrl => Action::PromptToggleCase,
        KeyCode::Char(c) if !ctrl => Action::PromptInput(c),
        _ => Action::None,
    }
}

fn handle_recent_key(key: &KeyEvent) -> Action {
    match key.code {
        KeyCode::Char(c @ '1'..='9') => Action::OpenRecent((c as usize) - ('1' as usize)),
        KeyCode::Char('j') | KeyCode::Down => Action::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => Action::MoveUp,
        KeyCode::Enter => Action::Select,
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('R') => Action::Back,
        _ => Action::None,
    }
}

fn handle_options_key(key: &KeyEvent) -> Action {
    match key.code {
        KeyCode::Char(c @ '1'..='3') => Action::ToggleOption((c as usize) - ('1' as usize)),
        KeyCode::Enter => Action::PromptSubmit,
        KeyCode::Esc | KeyCode::Char('q') => Action::PromptCancel,
        _ => Action::None,
    }
}

fn handle_help_key(key: &KeyEvent) -> Action {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('h') | KeyCode::F(1) => Action::Back,
        _ => Action::None,
    }
}

fn handle_log_key(key: &KeyEvent) -> Action {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('L') => Action::ToggleLog,
        KeyCode::Char('j') | KeyCode::Down => Action::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => Action::MoveUp,
        KeyCode::Char('g') => Action::MoveToTop,
        KeyCode::Char('G') => Action::MoveToBottom,
        KeyCode::Char('c') => Action::ClearLog,
        _ => Action::None,
    }
}
