//! TUI application state and event handling

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use mcpany_common::Event;
use mcpany_inspector::metrics::MetricsSnapshot;
use mcpany_inspector::pipeline::DetailView;
use mcpany_inspector::transport::ConnectionStatus;

/// Whether keys edit the search box or drive the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

/// Static information shown in the header
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    pub endpoint: String,
    pub transport: &'static str,
    pub capacity: usize,
    pub version: String,
}

/// Events that can be sent to the TUI
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Key event from terminal
    Key(KeyEvent),
    /// Terminal gained (true) or lost (false) focus
    Focus(bool),
    /// Tick for periodic updates
    Tick,
}

/// What the runner should do to the pipeline after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    TogglePause,
    Clear,
    Refresh,
    Select(String),
    CloseDetail,
    Search(String),
    Visibility(bool),
}

/// TUI application state
pub struct TuiApp {
    pub info: HeaderInfo,
    pub status: ConnectionStatus,
    pub paused: bool,
    pub metrics: MetricsSnapshot,
    /// Filtered events, in store order
    pub events: Vec<Event>,
    /// Events held by the store, before filtering
    pub buffered: usize,
    pub detail: DetailView,
    pub selected_index: usize,
    pub input_mode: InputMode,
    pub search_input: String,
    pub show_detail: bool,
    pub should_quit: bool,
}

impl TuiApp {
    pub fn new(info: HeaderInfo) -> Self {
        Self {
            info,
            status: ConnectionStatus::Connecting,
            paused: false,
            metrics: MetricsSnapshot::default(),
            events: Vec::new(),
            buffered: 0,
            detail: DetailView::None,
            selected_index: 0,
            input_mode: InputMode::Normal,
            search_input: String::new(),
            show_detail: false,
            should_quit: false,
        }
    }

    /// Replace the pipeline-derived view state
    pub fn update_snapshot(
        &mut self,
        events: Vec<Event>,
        buffered: usize,
        detail: DetailView,
        status: ConnectionStatus,
        paused: bool,
        metrics: MetricsSnapshot,
    ) {
        self.events = events;
        self.buffered = buffered;
        self.detail = detail;
        self.status = status;
        self.paused = paused;
        self.metrics = metrics;
        self.selected_index = self.selected_index.min(self.last_index());
    }

    fn last_index(&self) -> usize {
        self.events.len().saturating_sub(1)
    }

    /// Handle key events
    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
            self.should_quit = true;
            return Action::Quit;
        }

        match self.input_mode {
            InputMode::Search => self.handle_search_key(key),
            InputMode::Normal => self.handle_normal_key(key),
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                Action::None
            }
            // Esc abandons the search entirely
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.search_input.clear();
                self.selected_index = 0;
                Action::Search(String::new())
            }
            KeyCode::Backspace => {
                self.search_input.pop();
                self.selected_index = 0;
                Action::Search(self.search_input.clone())
            }
            KeyCode::Char(c) => {
                self.search_input.push(c);
                self.selected_index = 0;
                Action::Search(self.search_input.clone())
            }
            _ => Action::None,
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Action::Quit
            }
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Search;
                Action::None
            }
            KeyCode::Char('p') => Action::TogglePause,
            KeyCode::Char('c') => {
                self.selected_index = 0;
                self.show_detail = false;
                Action::Clear
            }
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Enter => match self.events.get(self.selected_index) {
                Some(event) => {
                    self.show_detail = true;
                    Action::Select(event.id.clone())
                }
                None => Action::None,
            },
            KeyCode::Esc if self.show_detail => {
                self.show_detail = false;
                Action::CloseDetail
            }
            // Navigation
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_index = self.selected_index.saturating_sub(1);
                Action::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected_index = (self.selected_index + 1).min(self.last_index());
                Action::None
            }
            KeyCode::PageUp => {
                self.selected_index = self.selected_index.saturating_sub(10);
                Action::None
            }
            KeyCode::PageDown => {
                self.selected_index = (self.selected_index + 10).min(self.last_index());
                Action::None
            }
            KeyCode::Home => {
                self.selected_index = 0;
                Action::None
            }
            KeyCode::End => {
                self.selected_index = self.last_index();
                Action::None
            }
            _ => Action::None,
        }
    }

    /// Handle TUI event
    pub fn handle_event(&mut self, event: TuiEvent) -> Action {
        match event {
            TuiEvent::Key(key) => self.handle_key(key),
            TuiEvent::Focus(visible) => Action::Visibility(visible),
            TuiEvent::Tick => Action::None, // Just triggers a redraw
        }
    }
}
