use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use super::danger::DangerDetector;
use super::history::{CommandHistory, CommandStats, ExecutionRecord};
use super::variables::DocumentContext;
use super::{CloseSubscription, NoticeLevel, SessionHandle, SessionHost, UserPrompt};
use crate::config::Settings;
use crate::error::RunnerError;

/// Session name used when an annotation names no terminal
pub const DEFAULT_SESSION_NAME: &str = "command-runner";

const NOTICE_PREFIX: &str = "Command Runner";

/// How a call to [`SessionManager::run`] ended
#[derive(Debug)]
pub enum RunOutcome {
    Executed(ExecutionRecord),
    /// Nothing to run; the user was warned
    EmptyCommand,
    /// The user declined to run a dangerous command
    Cancelled,
    Failed(RunnerError),
}

/// Owns the shell sessions commands are sent to, plus execution history
pub struct SessionManager<H: SessionHost> {
    host: H,
    confirm_dangerous: bool,
    default_session: Option<SessionHandle>,
    named_sessions: HashMap<String, SessionHandle>,
    history: CommandHistory,
    closed: Option<CloseSubscription>,
}

impl<H: SessionHost> SessionManager<H> {
    pub fn new(host: H, settings: &Settings) -> Self {
        Self {
            host,
            confirm_dangerous: settings.confirm_dangerous_commands,
            default_session: None,
            named_sessions: HashMap::new(),
            history: CommandHistory::new(),
            closed: None,
        }
    }

    /// Start listening for sessions closed outside of the manager.
    /// Calling this again is a no-op.
    pub fn initialize(&mut self) {
        if self.closed.is_none() {
            self.closed = Some(self.host.subscribe_closed());
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Run `command` in the default session, or in the session called
    /// `terminal_name`, creating it when needed.
    pub async fn run<P>(
        &mut self,
        command: &str,
        terminal_name: Option<&str>,
        context: &DocumentContext,
        prompt: &mut P,
    ) -> RunOutcome
    where
        P: UserPrompt + ?Sized,
    {
        if command.trim().is_empty() {
            warn!("Refusing to run an empty command");
            prompt.notify(
                NoticeLevel::Warning,
                &format!("{NOTICE_PREFIX}: Cannot execute an empty command"),
            );
            return RunOutcome::EmptyCommand;
        }

        let terminal_name = terminal_name.filter(|name| !name.is_empty());
        let command = context.expand(command);

        if self.confirm_dangerous {
            if let Some(kind) = DangerDetector::check(&command) {
                warn!(command = %command, danger = ?kind, "Dangerous command needs confirmation");
                let question = format!(
                    "This command {}:\n\n{}\n\nRun it anyway?",
                    kind.describe(),
                    command
                );
                if !prompt.confirm(&question).await {
                    info!(command = %command, "Dangerous command cancelled");
                    prompt.notify(
                        NoticeLevel::Info,
                        &format!("{NOTICE_PREFIX}: Command execution cancelled"),
                    );
                    return RunOutcome::Cancelled;
                }
            }
        }

        match self.execute(&command, terminal_name).await {
            Ok(record) => RunOutcome::Executed(record),
            Err(e) => {
                error!(command = %command, error = %e, "Command execution failed");
                prompt.notify(NoticeLevel::Error, &format!("{NOTICE_PREFIX}: {e}"));
                RunOutcome::Failed(e)
            }
        }
    }

    async fn execute(
        &mut self,
        command: &str,
        terminal_name: Option<&str>,
    ) -> Result<ExecutionRecord, RunnerError> {
        let session = self.get_or_create(terminal_name).await?;

        if let Err(e) = self.host.show(&session).await {
            debug!(session = %session.name, error = %e, "Could not show session");
        }

        self.host
            .send_text(&session, command, true)
            .await
            .map_err(|source| RunnerError::Send {
                name: session.name.clone(),
                source,
            })?;

        let record = self.history.record(command, terminal_name, Utc::now());
        info!(
            command = %command,
            session = %session.name,
            count = record.execution_count,
            "Command sent"
        );
        Ok(record)
    }

    /// Live session for `terminal_name` (`None` = default), created if there
    /// is none or the cached one has gone away.
    pub async fn get_or_create(
        &mut self,
        terminal_name: Option<&str>,
    ) -> Result<SessionHandle, RunnerError> {
        self.process_close_events();

        let cached = match terminal_name {
            None => self.default_session.clone(),
            Some(name) => self.named_sessions.get(name).cloned(),
        };

        if let Some(session) = cached {
            if self.is_alive(&session).await? {
                return Ok(session);
            }
            debug!(session = %session.name, "Discarding stale session");
            match terminal_name {
                None => self.default_session = None,
                Some(name) => {
                    self.named_sessions.remove(name);
                }
            }
        }

        let display_name = session_display_name(terminal_name);
        let session = self
            .host
            .create(&display_name)
            .await
            .map_err(|source| RunnerError::SessionCreate {
                name: display_name.clone(),
                source,
            })?;
        info!(session = %session.name, id = %session.id, "Created session");

        match terminal_name {
            None => self.default_session = Some(session.clone()),
            Some(name) => {
                self.named_sessions.insert(name.to_string(), session.clone());
            }
        }
        Ok(session)
    }

    async fn is_alive(&self, session: &SessionHandle) -> Result<bool, RunnerError> {
        let active = self.host.list_active().await.map_err(RunnerError::Host)?;
        Ok(active.contains(session))
    }

    /// Apply queued close notifications from the host
    pub fn process_close_events(&mut self) {
        while let Some(closed) = self.closed.as_mut().and_then(CloseSubscription::try_next) {
            self.on_session_closed(&closed);
        }
    }

    pub fn on_session_closed(&mut self, closed: &SessionHandle) {
        debug!(session = %closed.name, id = %closed.id, "Session closed");
        if closed.name == DEFAULT_SESSION_NAME {
            self.default_session = None;
        } else {
            self.named_sessions.retain(|_, session| session != closed);
        }
    }

    /// Cached session for `terminal_name`, if one was created
    pub fn session_for(&self, terminal_name: Option<&str>) -> Option<&SessionHandle> {
        match terminal_name.filter(|name| !name.is_empty()) {
            None => self.default_session.as_ref(),
            Some(name) => self.named_sessions.get(name),
        }
    }

    /// The command as it would be sent, with `${...}` variables resolved
    pub fn expand_variables(&self, command: &str, context: &DocumentContext) -> String {
        context.expand(command)
    }

    pub fn get_session_stats(&self, command: &str) -> Option<CommandStats> {
        self.history.stats(command)
    }

    /// Newest first
    pub fn get_history(&self) -> Vec<ExecutionRecord> {
        self.history.entries()
    }

    /// Forget history and statistics; sessions stay open
    pub fn clear_history(&mut self) {
        self.history.clear();
        info!("History cleared");
    }

    /// Stop watching for closed sessions and close every session this
    /// manager created. Safe to call more than once.
    pub async fn dispose(&mut self) {
        if let Some(subscription) = self.closed.take() {
            subscription.cancel();
        }

        let mut sessions: Vec<SessionHandle> = self.default_session.take().into_iter().collect();
        sessions.extend(self.named_sessions.drain().map(|(_, session)| session));

        for session in sessions {
            if let Err(e) = self.host.close(&session).await {
                warn!(session = %session.name, error = %e, "Failed to close session");
            }
        }
    }
}

fn session_display_name(terminal_name: Option<&str>) -> String {
    match terminal_name {
        None => DEFAULT_SESSION_NAME.to_string(),
        Some(name) => format!("{DEFAULT_SESSION_NAME}-{name}"),
    }
}
