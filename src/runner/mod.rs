mod danger;
mod history;
mod manager;
mod variables;

pub use danger::DangerDetector;
pub use history::{format_time_ago, CommandStats, ExecutionRecord, DEFAULT_TERMINAL_LABEL};
pub use manager::{RunOutcome, SessionManager};
pub use variables::DocumentContext;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A live shell session owned by a [`SessionHost`]
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Host-assigned identity, never reused for another session
    pub id: String,
    /// Display name the session was created with
    pub name: String,
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SessionHandle {}

/// Closed-session notifications from a host
pub struct CloseSubscription {
    receiver: mpsc::UnboundedReceiver<SessionHandle>,
    watcher: Option<JoinHandle<()>>,
}

impl CloseSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<SessionHandle>,
        watcher: Option<JoinHandle<()>>,
    ) -> Self {
        Self { receiver, watcher }
    }

    /// Next queued notification, without waiting
    pub fn try_next(&mut self) -> Option<SessionHandle> {
        self.receiver.try_recv().ok()
    }

    /// Stop watching for closed sessions
    pub fn cancel(mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.receiver.close();
    }
}

/// Something that can create shell sessions and type into them
#[async_trait]
pub trait SessionHost: Send + Sync {
    async fn create(&self, name: &str) -> Result<SessionHandle>;

    /// Bring the session to the user's attention
    async fn show(&self, session: &SessionHandle) -> Result<()>;

    /// Type `text` into the session, pressing Enter afterwards when
    /// `execute` is set
    async fn send_text(&self, session: &SessionHandle, text: &str, execute: bool) -> Result<()>;

    async fn list_active(&self) -> Result<Vec<SessionHandle>>;

    async fn close(&self, session: &SessionHandle) -> Result<()>;

    fn subscribe_closed(&self) -> CloseSubscription;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// The user: answers confirmations and receives notices
#[async_trait]
pub trait UserPrompt: Send {
    /// Modal yes/no question
    async fn confirm(&mut self, message: &str) -> bool;

    fn notify(&mut self, level: NoticeLevel, message: &str);
}
