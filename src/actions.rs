use crossterm::event::KeyEvent;

/// Actions that can be dispatched through the application
#[derive(Debug, Clone)]
pub enum Action {
    /// A key was pressed
    KeyPress(KeyEvent),
    /// Periodic refresh: rescan the file and update time-ago labels
    Tick,
    /// Send a command to a session (`None` = default session)
    RunCommand {
        command: String,
        terminal_name: Option<String>,
    },
    /// Suspend the TUI and attach to the session for a terminal name
    AttachSession(Option<String>),
    /// Forget command history and statistics
    ClearHistory,
    /// Copy a command to the clipboard
    CopyCommand(String),
    /// Re-read the annotated file now
    Rescan,
}
