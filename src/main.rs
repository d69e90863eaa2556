mod app;
mod config;
mod data;
mod input;
mod log;
mod router;
mod search;
mod session;
mod store;
mod ui;
mod view;

use anyhow::Result;
use app::{App, ViewMode};
use clap::Parser;
use config::AppConfig;
use crossterm::event;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use input::{handle_event, Action};
use ratatui::prelude::CrosstermBackend;
use ratatui::Terminal;
use search::SearchDirection;
use std::io::{stdout, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use store::Store;
use view::Pane;

/// Terminal log explorer with multi-file sessions.
#[derive(Debug, Parser)]
#[command(name = "logdeck", version, about)]
struct Cli {
    /// Log files to open. Without any, the previous session is restored.
    files: Vec<PathBuf>,

    /// Start empty instead of restoring the previous session.
    #[arg(long)]
    no_session: bool,

    /// Directory for the state database and the log file.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if !stdout().is_terminal() {
        eprintln!("Error: logdeck requires an interactive terminal (TTY).");
        std::process::exit(1);
    }

    let config = AppConfig::load(cli.data_dir)?;
    log::init(&config.data_dir);
    tlog!(info, "logdeck {} starting", env!("CARGO_PKG_VERSION"));

    let store = Store::open(&config.db_path())?;
    let mut app = App::new(config, store)?;
    app.open_initial(&cli.files, !cli.no_session);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app);

    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    if let Err(e) = app.save_session() {
        tlog!(error, "saving session: {}", e);
        eprintln!("Warning: session not saved: {}", e);
    }

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let tick = Duration::from_millis(app.tick_ms().max(1));
    let mut needs_draw = true;

    loop {
        if app.tick() {
            needs_draw = true;
        }
        if *app.view_mode() == ViewMode::Log && log::take_dirty() {
            needs_draw = true;
        }

        if needs_draw {
            let size = terminal.size()?;
            app.resize(size.height);
            terminal.draw(|f| {
                let area = f.area();
                match app.view_mode() {
                    ViewMode::Log => {
                        let entries = log::entries();
                        ui::render_log_panel(f, &entries, app.log_scroll(), area);
                    }
                    ViewMode::Help => {
                        ui::render_log_view(f, app, area);
                        ui::render_help(f, area);
                    }
                    ViewMode::Recent => {
                        ui::render_log_view(f, app, area);
                        ui::render_recent(f, app.recent_files(), app.recent_cursor(), area);
                    }
                    ViewMode::Options => {
                        ui::render_log_view(f, app, area);
                        ui::render_options(f, &app.settings(), area);
                    }
                    ViewMode::Main | ViewMode::Find | ViewMode::Search | ViewMode::Open => {
                        ui::render_log_view(f, app, area);
                    }
                }
            })?;
            needs_draw = false;
        }

        if event::poll(tick)? {
            loop {
                let ev = event::read()?;
                if let event::Event::Resize(..) = ev {
                    needs_draw = true;
                }

                let action = handle_event(&ev, app.view_mode());
                if action != Action::None {
                    process_action(app, action);
                    needs_draw = true;
                }

                if app.should_quit() {
                    break;
                }
                if !event::poll(Duration::from_millis(0))? {
                    break;
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

fn process_action(app: &mut App, action: Action) {
    if !matches!(action, Action::PromptInput(_) | Action::PromptBackspace) {
        app.clear_status();
    }

    match action {
        Action::Quit => app.quit(),
        Action::MoveUp => match app.view_mode() {
            ViewMode::Log => app.log_scroll_up(),
            ViewMode::Recent => app.move_recent_cursor(false),
            _ => app.with_current_view(|v| v.move_selection(-1)),
        },
        Action::MoveDown => match app.view_mode() {
            ViewMode::Log => app.log_scroll_down(),
            ViewMode::Recent => app.move_recent_cursor(true),
            _ => app.with_current_view(|v| v.move_selection(1)),
        },
        Action::PageUp => app.with_current_view(|v| v.page_up()),
        Action::PageDown => app.with_current_view(|v| v.page_down()),
        Action::MoveToTop => match app.view_mode() {
            ViewMode::Log => app.log_scroll_to_top(),
            _ => app.with_current_view(|v| v.go_to_top()),
        },
        Action::MoveToBottom => match app.view_mode() {
            ViewMode::Log => app.log_scroll_to_bottom(),
            _ => app.with_current_view(|v| v.go_to_bottom()),
        },
        Action::Select => match app.view_mode() {
            ViewMode::Recent => app.open_recent(app.recent_cursor()),
            _ => app.with_current_view(|v| {
                if v.focus() == Pane::Filtered {
                    v.jump_to_filtered_selection();
                }
            }),
        },
        Action::Back => app.set_view_mode(ViewMode::Main),
        Action::NextTab => app.next_tab(),
        Action::PrevTab => app.prev_tab(),
        Action::SelectTab(index) => app.select_tab(index),
        Action::CloseTab => app.close_current(),
        Action::ToggleFocus => app.with_current_view(|v| v.toggle_focus()),
        Action::OpenFile => app.open_prompt(ViewMode::Open),
        Action::ShowRecent => app.show_recent(),
        Action::OpenRecent(index) => app.open_recent(index),
        Action::Reload => app.reload(),
        Action::StopLoading => app.stop_loading(),
        Action::ToggleFollow => app.toggle_follow(),
        Action::SelectAll => app.select_all(),
        Action::Copy => app.copy_selection(),
        Action::QuickFindForward => app.open_find(SearchDirection::Forward),
        Action::QuickFindBackward => app.open_find(SearchDirection::Backward),
        Action::SearchNext => app.search_next(),
        Action::SearchPrevious => app.search_previous(),
        Action::FilterSearch => app.open_prompt(ViewMode::Search),
        Action::ClearSearch => app.clear_search(),
        Action::PromptInput(c) => app.prompt_push(c),
        Action::PromptBackspace => app.prompt_pop(),
        Action::PromptSubmit => app.prompt_submit(),
        Action::PromptCancel => app.prompt_cancel(),
        Action::PromptToggleCase => app.prompt_toggle_case(),
        Action::PromptHistory => app.prompt_history(),
        Action::ShowOptions => app.show_options(),
        Action::ToggleOption(index) => app.toggle_option(index),
        Action::ShowHelp => {
            if *app.view_mode() == ViewMode::Help {
                app.set_view_mode(ViewMode::Main);
            } else {
                app.set_view_mode(ViewMode::Help);
            }
        }
        Action::ToggleLog => {
            if *app.view_mode() == ViewMode::Log {
                app.set_view_mode(ViewMode::Main);
            } else {
                app.log_scroll_to_bottom();
                app.set_view_mode(ViewMode::Log);
            }
        }
        Action::ClearLog => app.clear_log(),
        Action::None => {}
    }
}
