use anyhow::Result;
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::actions::Action;
use crate::annotation::{self, DisplayOptions};
use crate::runner::{
    format_time_ago, CommandStats, DangerDetector, DocumentContext, ExecutionRecord, NoticeLevel,
    SessionHost, SessionManager,
};

/// Theme colors
pub struct Theme {
    pub fg: Color,
    pub accent: Color,
    pub dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::Rgb(220, 220, 220),
            accent: Color::Rgb(86, 156, 214),
            dim: Color::Rgb(100, 100, 100),
            success: Color::Rgb(80, 200, 120),
            warning: Color::Rgb(255, 193, 7),
            error: Color::Rgb(220, 53, 69),
        }
    }
}

/// One clickable label above an annotated line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lens {
    /// 1-based line of the `run` keyword
    pub line: usize,
    pub title: String,
    pub tooltip: String,
    /// Trimmed command, ready to execute
    pub command: String,
    pub terminal_name: Option<String>,
    pub display_name: Option<String>,
}

/// Build the labels for every annotation in `text`
pub fn build_lenses(text: &str, display: &DisplayOptions) -> Vec<Lens> {
    let mut line = 1;
    let mut counted_to = 0;

    annotation::scan(text)
        .map(|found| {
            line += text[counted_to..found.span.start].matches('\n').count();
            counted_to = found.span.start;
            Lens {
                line,
                title: found.title(display),
                tooltip: found.tooltip(),
                command: found.execution_command().to_string(),
                terminal_name: found.terminal_name.map(str::to_string),
                display_name: found.sanitized_display_name(display.max_custom_name_length),
            }
        })
        .collect()
}

/// Which list the left pane shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Annotations,
    History,
}

/// A yes/no question on screen
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub message: String,
    /// Queued when the user answers yes
    pub on_accept: Option<Action>,
}

/// Main application state
pub struct App {
    /// Name of the annotated file, for the header
    pub file_name: String,
    pub lenses: Vec<Lens>,
    /// Statistics for each lens, same order as `lenses`
    pub lens_stats: Vec<Option<CommandStats>>,
    /// Snapshot of the manager's history, newest first
    pub history: Vec<ExecutionRecord>,
    pub list_state: ListState,
    pub history_state: ListState,
    pub view: View,
    /// Current message to display
    pub status: Option<(NoticeLevel, String)>,
    pub confirmation: Option<Confirmation>,
    pub display: DisplayOptions,
    pub show_hover_info: bool,
    pub theme: Theme,
    /// Pending action queue
    pub pending_actions: Vec<Action>,
}

impl App {
    pub fn new(file_name: String, display: DisplayOptions, show_hover_info: bool) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        let mut history_state = ListState::default();
        history_state.select(Some(0));

        Self {
            file_name,
            lenses: Vec::new(),
            lens_stats: Vec::new(),
            history: Vec::new(),
            list_state,
            history_state,
            view: View::Annotations,
            status: None,
            confirmation: None,
            display,
            show_hover_info,
            theme: Theme::default(),
            pending_actions: Vec::new(),
        }
    }

    pub fn set_lenses(&mut self, lenses: Vec<Lens>) {
        self.lenses = lenses;
        clamp_selection(&mut self.list_state, self.lenses.len());
    }

    /// Pull history and per-lens statistics from the manager
    pub fn sync<H: SessionHost>(&mut self, manager: &SessionManager<H>, context: &DocumentContext) {
        self.history = manager.get_history();
        clamp_selection(&mut self.history_state, self.history.len());
        self.lens_stats = self
            .lenses
            .iter()
            .map(|lens| manager.get_session_stats(&manager.expand_variables(&lens.command, context)))
            .collect();
    }

    pub fn set_status(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.status = Some((level, message.into()));
    }

    /// Get the currently selected lens
    pub fn selected_lens(&self) -> Option<&Lens> {
        self.list_state.selected().and_then(|i| self.lenses.get(i))
    }

    pub fn selected_history(&self) -> Option<&ExecutionRecord> {
        self.history_state
            .selected()
            .and_then(|i| self.history.get(i))
    }

    /// Take pending actions (drains the queue)
    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending_actions)
    }

    /// Put a question on screen
    pub fn ask(&mut self, message: impl Into<String>, on_accept: Option<Action>) {
        self.confirmation = Some(Confirmation {
            message: message.into(),
            on_accept,
        });
    }

    /// Feed a key to the open question. Returns the answer once the user
    /// has given one.
    pub fn answer_confirmation(&mut self, key: KeyEvent) -> Option<bool> {
        let accepted = match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => true,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => false,
            _ => return None,
        };
        let confirmation = self.confirmation.take()?;
        if accepted {
            if let Some(action) = confirmation.on_accept {
                self.pending_actions.push(action);
            }
        }
        Some(accepted)
    }

    /// Handle an action and return whether to quit
    pub fn handle_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::KeyPress(key) => self.handle_key(key),
            other => {
                self.pending_actions.push(other);
                Ok(false)
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.confirmation.is_some() {
            self.answer_confirmation(key);
            return Ok(false);
        }

        // Clear message on any key press
        self.status = None;

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(true);
        }

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.select_previous(),
            KeyCode::Char('h') => self.toggle_view(),
            KeyCode::Esc if self.view == View::History => self.view = View::Annotations,
            KeyCode::Enter => self.run_selected(),
            KeyCode::Char('c') => self.ask_clear_history(),
            KeyCode::Char('r') => self.pending_actions.push(Action::Rescan),
            KeyCode::Char('a') => {
                if let Some(terminal_name) = self.selected_terminal() {
                    self.pending_actions.push(Action::AttachSession(terminal_name));
                }
            }
            KeyCode::Char('y') => {
                if let Some(command) = self.selected_command() {
                    self.pending_actions.push(Action::CopyCommand(command));
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn toggle_view(&mut self) {
        if self.view == View::Annotations && self.history.is_empty() {
            self.set_status(NoticeLevel::Info, "No command history available yet");
            return;
        }
        self.view = match self.view {
            View::Annotations => View::History,
            View::History => View::Annotations,
        };
    }

    fn run_selected(&mut self) {
        let action = match self.view {
            View::Annotations => self.selected_lens().map(|lens| Action::RunCommand {
                command: lens.command.clone(),
                terminal_name: lens.terminal_name.clone(),
            }),
            View::History => self.selected_history().map(|record| Action::RunCommand {
                command: record.command.clone(),
                terminal_name: history_terminal(record),
            }),
        };
        if let Some(action) = action {
            self.pending_actions.push(action);
        }
    }

    fn ask_clear_history(&mut self) {
        if self.history.is_empty() {
            self.set_status(NoticeLevel::Info, "No command history available yet");
            return;
        }
        self.ask(
            "Are you sure you want to clear the command history?",
            Some(Action::ClearHistory),
        );
    }

    fn selected_terminal(&self) -> Option<Option<String>> {
        match self.view {
            View::Annotations => self.selected_lens().map(|lens| lens.terminal_name.clone()),
            View::History => self.selected_history().map(history_terminal),
        }
    }

    fn selected_command(&self) -> Option<String> {
        match self.view {
            View::Annotations => self.selected_lens().map(|lens| lens.command.clone()),
            View::History => self.selected_history().map(|record| record.command.clone()),
        }
    }

    fn active_list(&mut self) -> (&mut ListState, usize) {
        match self.view {
            View::Annotations => (&mut self.list_state, self.lenses.len()),
            View::History => (&mut self.history_state, self.history.len()),
        }
    }

    fn select_next(&mut self) {
        let (state, len) = self.active_list();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    fn select_previous(&mut self) {
        let (state, len) = self.active_list();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Main content
                Constraint::Length(3), // Footer/status
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_main(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);

        if self.confirmation.is_some() {
            self.render_confirm_dialog(frame);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                " Command Runner ",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("│ {}", self.file_name),
                Style::default().fg(self.theme.dim),
            ),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(title, area);
    }

    fn render_main(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(50), // Lens or history list
                Constraint::Percentage(50), // Detail pane
            ])
            .split(area);

        match self.view {
            View::Annotations => {
                self.render_lens_list(frame, chunks[0]);
                self.render_lens_detail(frame, chunks[1]);
            }
            View::History => {
                self.render_history_list(frame, chunks[0]);
                self.render_history_detail(frame, chunks[1]);
            }
        }
    }

    fn list_block(&self, title: &'static str) -> Block<'static> {
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.dim))
    }

    fn highlight_style(&self) -> Style {
        Style::default()
            .bg(Color::Rgb(50, 50, 50))
            .add_modifier(Modifier::BOLD)
    }

    fn render_lens_list(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = if self.lenses.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "  No run annotations found. Add one like: run `npm test`",
                Style::default().fg(self.theme.dim),
            )))]
        } else {
            self.lenses
                .iter()
                .map(|lens| {
                    let mut spans = vec![Span::styled(
                        format!("{:>4} ", lens.line),
                        Style::default().fg(self.theme.dim),
                    )];
                    if DangerDetector::is_dangerous(&lens.command) {
                        spans.push(Span::styled("⚠ ", Style::default().fg(self.theme.warning)));
                    }
                    spans.push(Span::styled(
                        lens.title.as_str(),
                        Style::default().fg(self.theme.fg),
                    ));
                    ListItem::new(Line::from(spans))
                })
                .collect()
        };

        let list = List::new(items)
            .block(self.list_block(" Annotations "))
            .highlight_style(self.highlight_style())
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn render_history_list(&mut self, frame: &mut Frame, area: Rect) {
        let now = Utc::now();
        let items: Vec<ListItem> = self
            .history
            .iter()
            .map(|record| {
                ListItem::new(Line::from(vec![
                    Span::styled(record.command.as_str(), Style::default().fg(self.theme.fg)),
                    Span::styled(
                        format!(
                            "  {} • {}",
                            record.terminal_name,
                            format_time_ago(record.timestamp, now)
                        ),
                        Style::default().fg(self.theme.dim),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(self.list_block(" History "))
            .highlight_style(self.highlight_style())
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(list, area, &mut self.history_state);
    }

    fn field<'a>(&self, label: &'a str, value: String) -> Line<'a> {
        Line::from(vec![
            Span::styled(label, Style::default().fg(self.theme.dim)),
            Span::styled(value, Style::default().fg(self.theme.fg)),
        ])
    }

    fn hint(&self, text: &'static str) -> Line<'static> {
        Line::from(Span::styled(text, Style::default().fg(self.theme.dim)))
    }

    fn render_lens_detail(&self, frame: &mut Frame, area: Rect) {
        let selected = self
            .list_state
            .selected()
            .and_then(|i| self.lenses.get(i).map(|lens| (lens, self.lens_stats.get(i).copied().flatten())));

        let content = match selected {
            Some((lens, _)) if !self.show_hover_info => {
                vec![Line::from(""), Line::from(lens.tooltip.clone())]
            }
            Some((lens, stats)) => {
                let mut lines = vec![self.field("Command: ", lens.command.clone())];
                if let Some(terminal) = &lens.terminal_name {
                    lines.push(self.field("Terminal: ", terminal.clone()));
                }
                if let Some(display_name) = &lens.display_name {
                    lines.push(self.field("Display Name: ", display_name.clone()));
                }
                lines.push(self.field("Line: ", lens.line.to_string()));
                if let Some(kind) = DangerDetector::check(&lens.command) {
                    lines.push(Line::from(Span::styled(
                        format!("Warning: this command {}", kind.describe()),
                        Style::default().fg(self.theme.warning),
                    )));
                }
                if let Some(stats) = stats {
                    lines.push(Line::from(""));
                    lines.push(self.field("Executed: ", times(stats.count)));
                    lines.push(self.field(
                        "Last run: ",
                        format_time_ago(stats.last_executed, Utc::now()),
                    ));
                }
                lines.push(Line::from(""));
                lines.push(self.hint("Press Enter to run, 'a' to attach, 'y' to copy"));
                lines
            }
            None => vec![
                self.hint("No annotation selected"),
                Line::from(""),
                self.hint("Press 'r' to rescan the file"),
            ],
        };

        let detail = Paragraph::new(content)
            .wrap(Wrap { trim: false })
            .block(self.list_block(" Details "));
        frame.render_widget(detail, area);
    }

    fn render_history_detail(&self, frame: &mut Frame, area: Rect) {
        let content = match self.selected_history() {
            Some(record) => vec![
                self.field("Command: ", record.command.clone()),
                self.field("Terminal: ", record.terminal_name.clone()),
                self.field("Executed: ", times(record.execution_count)),
                self.field("Run: ", format_time_ago(record.timestamp, Utc::now())),
                Line::from(""),
                self.hint("Press Enter to run again, 'h' to go back"),
            ],
            None => vec![self.hint("No command history available yet")],
        };

        let detail = Paragraph::new(content)
            .wrap(Wrap { trim: false })
            .block(self.list_block(" Details "));
        frame.render_widget(detail, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help_text = match self.view {
            View::Annotations => {
                " q: Quit │ j/k: Navigate │ Enter: Run │ h: History │ a: Attach │ y: Copy │ c: Clear │ r: Rescan "
            }
            View::History => " q: Quit │ j/k: Navigate │ Enter: Run again │ h/Esc: Back │ c: Clear ",
        };

        let content = if let Some((level, msg)) = &self.status {
            let color = match level {
                NoticeLevel::Info => self.theme.success,
                NoticeLevel::Warning => self.theme.warning,
                NoticeLevel::Error => self.theme.error,
            };
            Line::from(Span::styled(format!(" {} ", msg), Style::default().fg(color)))
        } else {
            Line::from(Span::styled(help_text, Style::default().fg(self.theme.dim)))
        };

        let footer = Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(footer, area);
    }

    fn render_confirm_dialog(&self, frame: &mut Frame) {
        let Some(confirmation) = &self.confirmation else {
            return;
        };
        let area = centered_rect(60, 40, frame.area());

        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(" Confirm ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.warning));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let mut text = vec![Line::from("")];
        text.extend(confirmation.message.lines().map(|line| {
            Line::from(Span::styled(line.to_string(), Style::default().fg(self.theme.fg)))
        }));
        text.push(Line::from(""));
        text.push(Line::from(Span::styled(
            "Press 'y' to confirm, 'n' or Esc to cancel",
            Style::default().fg(self.theme.dim),
        )));

        let paragraph = Paragraph::new(text).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, inner);
    }
}

/// History stores `"default"` for the unnamed session
fn history_terminal(record: &ExecutionRecord) -> Option<String> {
    (record.terminal_name != crate::runner::DEFAULT_TERMINAL_LABEL)
        .then(|| record.terminal_name.clone())
}

fn times(count: u32) -> String {
    if count == 1 {
        "1 time".to_string()
    } else {
        format!("{} times", count)
    }
}

fn clamp_selection(state: &mut ListState, len: usize) {
    match state.selected() {
        _ if len == 0 => state.select(Some(0)),
        Some(i) if i >= len => state.select(Some(len - 1)),
        None => state.select(Some(0)),
        _ => {}
    }
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
