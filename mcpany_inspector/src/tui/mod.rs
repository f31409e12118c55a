//! Terminal user interface for the live inspector

mod app;
mod ui;

pub use app::{Action, HeaderInfo, TuiApp, TuiEvent};
pub use ui::draw;

use anyhow::Result;
use crossterm::{
    event::{self, DisableFocusChange, EnableFocusChange, Event as TermEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use mcpany_inspector::Pipeline;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

/// Run the inspector UI until the user quits
pub async fn run(pipeline: &Pipeline, info: HeaderInfo) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = TuiApp::new(info);
    app.search_input = pipeline.query().await;

    let result = run_loop(&mut terminal, &mut app, pipeline).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
    pipeline: &Pipeline,
) -> Result<()> {
    let mut tick_interval = tokio::time::interval(Duration::from_millis(100));

    loop {
        app.update_snapshot(
            pipeline.visible_events().await,
            pipeline.len().await,
            pipeline.selected_detail().await,
            pipeline.status(),
            pipeline.is_paused(),
            pipeline.metrics().await,
        );

        // Draw UI
        terminal.draw(|f| draw(f, app))?;

        tick_interval.tick().await;
        app.handle_event(TuiEvent::Tick);

        // Handle terminal events (non-blocking)
        while event::poll(Duration::from_millis(0))? {
            let tui_event = match event::read()? {
                TermEvent::Key(key) if key.kind == KeyEventKind::Press => TuiEvent::Key(key),
                TermEvent::FocusGained => TuiEvent::Focus(true),
                TermEvent::FocusLost => TuiEvent::Focus(false),
                _ => continue,
            };

            let action = app.handle_event(tui_event);
            if app.should_quit {
                return Ok(());
            }
            apply(pipeline, action).await;
        }
    }
}

async fn apply(pipeline: &Pipeline, action: Action) {
    match action {
        Action::None | Action::Quit => {}
        Action::TogglePause => {
            let paused = pipeline.toggle_pause();
            tracing::info!("Live feed {}", if paused { "paused" } else { "resumed" });
        }
        Action::Clear => pipeline.clear().await,
        Action::Refresh => pipeline.refresh(),
        Action::Select(id) => pipeline.select(&id).await,
        Action::CloseDetail => pipeline.clear_selection().await,
        Action::Search(query) => pipeline.set_query(&query).await,
        Action::Visibility(visible) => {
            tracing::debug!("Terminal {}", if visible { "focused" } else { "unfocused" });
            pipeline.set_visible(visible);
        }
    }
}
